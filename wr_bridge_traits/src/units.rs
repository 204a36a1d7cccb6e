/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Coordinate spaces used on both sides of the bridge.
//!
//! Display items are positioned in layout pixels. Rasterized group and
//! fallback images are measured in device pixels, which are layout pixels
//! multiplied by the device pixel ratio (and any inherited scale).

use euclid::{Length, Point2D, Rect, Scale, Size2D, Transform2D, Transform3D, Vector2D};
use serde::{Deserialize, Serialize};

#[derive(Hash, Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LayoutPixel;

#[derive(Hash, Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DevicePixel;

pub type LayoutRect = Rect<f32, LayoutPixel>;
pub type LayoutPoint = Point2D<f32, LayoutPixel>;
pub type LayoutSize = Size2D<f32, LayoutPixel>;
pub type LayoutVector2D = Vector2D<f32, LayoutPixel>;
pub type LayoutTransform = Transform3D<f32, LayoutPixel, LayoutPixel>;
pub type LayoutTransform2D = Transform2D<f32, LayoutPixel, LayoutPixel>;

pub type DeviceRect = Rect<f32, DevicePixel>;
pub type DevicePoint = Point2D<f32, DevicePixel>;
pub type DeviceIntRect = Rect<i32, DevicePixel>;
pub type DeviceIntPoint = Point2D<i32, DevicePixel>;
pub type DeviceIntSize = Size2D<i32, DevicePixel>;
pub type DeviceIntVector2D = Vector2D<i32, DevicePixel>;
pub type DeviceIntLength = Length<i32, DevicePixel>;

pub type DevicePixelScale = Scale<f32, LayoutPixel, DevicePixel>;

pub fn device_pixel(value: f32, device_pixel_ratio: f32) -> DeviceIntLength {
    DeviceIntLength::new((value * device_pixel_ratio).round() as i32)
}

/// Converts a layout rectangle into device space without rounding.
pub fn layout_rect_to_device(rect: &LayoutRect, scale: f32) -> DeviceRect {
    DeviceRect::new(
        DevicePoint::new(rect.origin.x * scale, rect.origin.y * scale),
        euclid::Size2D::new(rect.size.width * scale, rect.size.height * scale),
    )
}

/// Converts a device rectangle back into layout space.
pub fn device_rect_to_layout(rect: &DeviceIntRect, scale: f32) -> LayoutRect {
    debug_assert!(scale > 0.0);
    LayoutRect::new(
        LayoutPoint::new(rect.origin.x as f32 / scale, rect.origin.y as f32 / scale),
        LayoutSize::new(rect.size.width as f32 / scale, rect.size.height as f32 / scale),
    )
}

#[test]
fn device_pixel_rounds_to_nearest() {
    assert_eq!(device_pixel(10.4, 1.0).get(), 10);
    assert_eq!(device_pixel(10.3, 2.0).get(), 21);
}

#[test]
fn device_round_trip() {
    let layout = LayoutRect::new(LayoutPoint::new(5.0, 10.0), LayoutSize::new(20.0, 4.0));
    let device = layout_rect_to_device(&layout, 2.0);
    assert_eq!(device.origin, DevicePoint::new(10.0, 20.0));
    let int = DeviceIntRect::new(DeviceIntPoint::new(10, 20), DeviceIntSize::new(40, 8));
    assert_eq!(device_rect_to_layout(&int, 2.0), layout);
}
