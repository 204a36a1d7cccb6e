/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::{DeviceIntPoint, DeviceIntRect, DeviceIntSize, DeviceRect, LayoutRect, LayoutTransform2D};
use euclid::num::Zero;
use euclid::{Point2D, Rect, Size2D};
use std::ops::{Add, Sub};
use time::precise_time_ns;

pub struct ProfileScope {
    name: &'static str,
    t0: u64,
}

impl ProfileScope {
    pub fn new(name: &'static str) -> ProfileScope {
        ProfileScope {
            name,
            t0: precise_time_ns(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let t1 = precise_time_ns();
        let ms = (t1 - self.t0) as f64 / 1000000f64;
        log::debug!("{} took {:.3}ms", self.name, ms);
    }
}

#[inline]
fn partial_min<T: PartialOrd>(a: T, b: T) -> T {
    if b < a { b } else { a }
}

#[inline]
fn partial_max<T: PartialOrd>(a: T, b: T) -> T {
    if b > a { b } else { a }
}

// Don't use euclid's is_empty: its semantics for negative sizes have changed
// between versions and the invalidation code relies on this exact meaning.
pub fn rect_is_empty<T, U>(rect: &Rect<T, U>) -> bool
where
    T: Copy + PartialOrd + Zero,
{
    !(rect.size.width > T::zero() && rect.size.height > T::zero())
}

/// Smallest rectangle containing both inputs. Empty rectangles contribute
/// nothing, so `empty ∪ r == r`.
pub fn union_rect<T, U>(a: &Rect<T, U>, b: &Rect<T, U>) -> Rect<T, U>
where
    T: Copy + PartialOrd + Zero + Add<T, Output = T> + Sub<T, Output = T>,
{
    if rect_is_empty(a) {
        return *b;
    }
    if rect_is_empty(b) {
        return *a;
    }
    let min_x = partial_min(a.min_x(), b.min_x());
    let min_y = partial_min(a.min_y(), b.min_y());
    let max_x = partial_max(a.max_x(), b.max_x());
    let max_y = partial_max(a.max_y(), b.max_y());
    Rect::new(Point2D::new(min_x, min_y), Size2D::new(max_x - min_x, max_y - min_y))
}

/// Overlap of both inputs, or the zero rectangle when they are disjoint.
/// Never larger than either input.
pub fn intersect_rect<T, U>(a: &Rect<T, U>, b: &Rect<T, U>) -> Rect<T, U>
where
    T: Copy + PartialOrd + Zero + Add<T, Output = T> + Sub<T, Output = T>,
{
    let min_x = partial_max(a.min_x(), b.min_x());
    let min_y = partial_max(a.min_y(), b.min_y());
    let max_x = partial_min(a.max_x(), b.max_x());
    let max_y = partial_min(a.max_y(), b.max_y());
    if max_x <= min_x || max_y <= min_y || rect_is_empty(a) || rect_is_empty(b) {
        return Rect::zero();
    }
    Rect::new(Point2D::new(min_x, min_y), Size2D::new(max_x - min_x, max_y - min_y))
}

pub fn rects_intersect<T, U>(a: &Rect<T, U>, b: &Rect<T, U>) -> bool
where
    T: Copy + PartialOrd + Zero + Add<T, Output = T> + Sub<T, Output = T>,
{
    !rect_is_empty(&intersect_rect(a, b))
}

pub fn rect_contains_rect<T, U>(outer: &Rect<T, U>, inner: &Rect<T, U>) -> bool
where
    T: Copy + PartialOrd + Zero + Add<T, Output = T> + Sub<T, Output = T>,
{
    rect_is_empty(inner) ||
        (outer.min_x() <= inner.min_x() &&
            outer.min_y() <= inner.min_y() &&
            outer.max_x() >= inner.max_x() &&
            outer.max_y() >= inner.max_y())
}

/// Integer device coordinates are clamped to this magnitude so that edge
/// differences and group offsets stay within `i32`.
pub const MAX_DEVICE_COORD: i32 = 1 << 29;

#[inline]
fn to_device_coord(v: f32) -> i32 {
    let limit = MAX_DEVICE_COORD as f32;
    if v.is_nan() {
        return 0;
    }
    v.max(-limit).min(limit) as i32
}

fn int_rect_from_edges(x0: f32, y0: f32, x1: f32, y1: f32) -> DeviceIntRect {
    let (x0, y0) = (to_device_coord(x0), to_device_coord(y0));
    let (x1, y1) = (to_device_coord(x1), to_device_coord(y1));
    DeviceIntRect::new(DeviceIntPoint::new(x0, y0), DeviceIntSize::new(x1 - x0, y1 - y0))
}

/// Rounds outward to the smallest integer rectangle containing `rect`.
/// Under-rounding here would leave stale pixels behind, so this never
/// shrinks, except where `rect` reaches past `MAX_DEVICE_COORD`.
pub fn round_out(rect: &DeviceRect) -> DeviceIntRect {
    if rect_is_empty(rect) {
        return DeviceIntRect::zero();
    }
    int_rect_from_edges(
        rect.min_x().floor(),
        rect.min_y().floor(),
        rect.max_x().ceil(),
        rect.max_y().ceil(),
    )
}

/// Rounds each edge to the nearest pixel.
pub fn round_to_int(rect: &DeviceRect) -> DeviceIntRect {
    int_rect_from_edges(
        rect.min_x().round(),
        rect.min_y().round(),
        rect.max_x().round(),
        rect.max_y().round(),
    )
}

pub trait MatrixHelpers {
    /// Axis-aligned bounds of `rect` after transformation.
    fn transform_rect(&self, rect: &LayoutRect) -> LayoutRect;
    /// Scale factors along both axes, ignoring rotation.
    fn scale_factors(&self) -> (f32, f32);
}

impl MatrixHelpers for LayoutTransform2D {
    fn transform_rect(&self, rect: &LayoutRect) -> LayoutRect {
        let corners = [
            self.transform_point(Point2D::new(rect.min_x(), rect.min_y())),
            self.transform_point(Point2D::new(rect.max_x(), rect.min_y())),
            self.transform_point(Point2D::new(rect.min_x(), rect.max_y())),
            self.transform_point(Point2D::new(rect.max_x(), rect.max_y())),
        ];
        let (mut min_x, mut min_y) = (corners[0].x, corners[0].y);
        let (mut max_x, mut max_y) = (min_x, min_y);
        for point in &corners[1..] {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        LayoutRect::new(Point2D::new(min_x, min_y), Size2D::new(max_x - min_x, max_y - min_y))
    }

    fn scale_factors(&self) -> (f32, f32) {
        (
            (self.m11 * self.m11 + self.m12 * self.m12).sqrt(),
            (self.m21 * self.m21 + self.m22 * self.m22).sqrt(),
        )
    }
}

/// Applies `transform`, scales into device pixels and rounds outward.
pub fn transform_bounds(transform: &LayoutTransform2D, rect: &LayoutRect, scale: f32) -> DeviceIntRect {
    if rect_is_empty(rect) {
        return DeviceIntRect::zero();
    }
    let bounds = transform.transform_rect(rect);
    round_out(&api::layout_rect_to_device(&bounds, scale))
}

pub fn translate_rect(rect: &DeviceIntRect, by: DeviceIntPoint) -> DeviceIntRect {
    let origin = DeviceIntPoint::new(rect.origin.x.saturating_add(by.x), rect.origin.y.saturating_add(by.y));
    DeviceIntRect::new(origin, rect.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::{DevicePoint, LayoutPoint, LayoutSize};
    use euclid::size2;

    fn int_rect(x: i32, y: i32, w: i32, h: i32) -> DeviceIntRect {
        DeviceIntRect::new(DeviceIntPoint::new(x, y), DeviceIntSize::new(w, h))
    }

    #[test]
    fn union_with_empty_is_identity() {
        let r = int_rect(3, 4, 5, 6);
        assert_eq!(union_rect(&DeviceIntRect::zero(), &r), r);
        assert_eq!(union_rect(&r, &DeviceIntRect::zero()), r);
        assert_eq!(union_rect(&int_rect(0, 0, 10, 10), &int_rect(50, 50, 10, 10)), int_rect(0, 0, 60, 60));
    }

    #[test]
    fn intersection_never_grows() {
        let a = int_rect(0, 0, 100, 100);
        assert_eq!(intersect_rect(&a, &int_rect(90, -10, 20, 20)), int_rect(90, 0, 10, 10));
        assert!(rect_is_empty(&intersect_rect(&a, &int_rect(100, 0, 5, 5))));
        assert!(rect_contains_rect(&a, &intersect_rect(&a, &int_rect(-5, -5, 500, 500))));
    }

    #[test]
    fn round_out_is_conservative() {
        let rect = DeviceRect::new(DevicePoint::new(0.5, 1.2), size2(9.2, 3.3));
        assert_eq!(round_out(&rect), int_rect(0, 1, 10, 4));
        let exact = DeviceRect::new(DevicePoint::new(2.0, 3.0), size2(4.0, 5.0));
        assert_eq!(round_out(&exact), int_rect(2, 3, 4, 5));
    }

    #[test]
    fn transformed_bounds_cover_the_true_extent() {
        let rect = LayoutRect::new(LayoutPoint::new(0.0, 0.0), LayoutSize::new(10.0, 10.0));
        let rotation = LayoutTransform2D::rotation(euclid::Angle::degrees(45.0));
        let bounds = transform_bounds(&rotation, &rect, 1.0);
        // The rotated square spans about 14.14 pixels along both axes.
        assert!(bounds.size.width >= 15);
        assert!(bounds.size.height >= 15);
        let translated = LayoutTransform2D::translation(0.25, 0.0);
        assert_eq!(transform_bounds(&translated, &rect, 2.0), int_rect(0, 0, 21, 20));
    }

    #[test]
    fn huge_bounds_are_clamped() {
        let rect = LayoutRect::new(LayoutPoint::new(-3e9, -3e9), LayoutSize::new(6e9, 6e9));
        let bounds = transform_bounds(&LayoutTransform2D::identity(), &rect, 1.0);
        assert_eq!(bounds.origin, DeviceIntPoint::new(-MAX_DEVICE_COORD, -MAX_DEVICE_COORD));
        assert_eq!(bounds.size, DeviceIntSize::new(2 * MAX_DEVICE_COORD, 2 * MAX_DEVICE_COORD));
        assert!(rect_contains_rect(&bounds, &int_rect(0, 0, 100, 100)));

        let moved = translate_rect(&bounds, DeviceIntPoint::new(-MAX_DEVICE_COORD, 0));
        assert_eq!(moved.origin.x, -2 * MAX_DEVICE_COORD);
    }
}
