/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

// Operates on BGRA8 byte buffers, the layout of every raster in this crate.
// The multiply-by-alpha approximation follows Gecko's gfx/2d/Swizzle.cpp.

#[inline]
fn mul_div_255(c: u32, a: u32) -> u8 {
    let t = c * a + 0x80;
    ((t + (t >> 8)) >> 8) as u8
}

pub fn premultiply(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(4) {
        let a = pixel[3] as u32;
        pixel[0] = mul_div_255(pixel[0] as u32, a);
        pixel[1] = mul_div_255(pixel[1] as u32, a);
        pixel[2] = mul_div_255(pixel[2] as u32, a);
    }
}

#[test]
fn it_works() {
    let mut f = [0xff, 0xff, 0xff, 0x80, 0x00, 0xff, 0x00, 0x80];
    premultiply(&mut f);
    assert_eq!(f, [0x80, 0x80, 0x80, 0x80, 0x00, 0x80, 0x00, 0x80]);
}
