/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The software target we bake content into before it becomes an image.
//!
//! Drawing goes through a tiny-skia `Pixmap`, which stores premultiplied
//! RGBA. Everything handed out of here is premultiplied BGRA8. Only
//! axis-aligned output is produced: transformed primitives are drawn as
//! their device-space bounding boxes.

use api::{ColorF, DeviceIntPoint, DeviceIntRect, DeviceIntSize, LayoutRect, LayoutTransform2D};
use crate::display_item::RasterImage;
use crate::util::{intersect_rect, rect_contains_rect, rect_is_empty, transform_bounds, translate_rect};
use tiny_skia::{
    Color, ColorU8, FilterQuality, GradientStop, LinearGradient, Paint, Pattern, Pixmap, PixmapPaint,
    Point, Rect as SkiaRect, Shader, SpreadMode, Transform,
};

/// Where and how to paint, passed by value down the paint recursion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintState {
    /// Layout-space transform accumulated from inactive ancestors.
    pub transform: LayoutTransform2D,
    /// Device pixels per layout pixel.
    pub scale: f32,
    /// Device-space origin of the target.
    pub offset: DeviceIntPoint,
    /// Target-space clip.
    pub clip: DeviceIntRect,
}

impl PaintState {
    pub fn new(scale: f32, offset: DeviceIntPoint, clip: DeviceIntRect) -> PaintState {
        PaintState {
            transform: LayoutTransform2D::identity(),
            scale,
            offset,
            clip,
        }
    }

    /// Maps a layout rectangle to target pixels, rounding outward.
    pub fn to_target_rect(&self, rect: &LayoutRect) -> DeviceIntRect {
        let device = transform_bounds(&self.transform, rect, self.scale);
        translate_rect(&device, DeviceIntPoint::new(-self.offset.x, -self.offset.y))
    }

    pub fn with_clip(&self, clip: &LayoutRect) -> PaintState {
        PaintState {
            clip: intersect_rect(&self.clip, &self.to_target_rect(clip)),
            ..*self
        }
    }

    pub fn with_transform(&self, transform: &LayoutTransform2D) -> PaintState {
        PaintState {
            transform: transform.then(&self.transform),
            ..*self
        }
    }
}

fn skia_color(color: &ColorF) -> Color {
    let channel = |c: f32| (c.max(0.0).min(1.0) * 255.0).round() as u8;
    Color::from_rgba8(channel(color.r), channel(color.g), channel(color.b), channel(color.a))
}

fn skia_rect(rect: &DeviceIntRect) -> Option<SkiaRect> {
    SkiaRect::from_xywh(
        rect.origin.x as f32,
        rect.origin.y as f32,
        rect.size.width as f32,
        rect.size.height as f32,
    )
}

pub struct DrawTarget {
    pixmap: Pixmap,
    // Content beneath each pushed opacity group.
    saved_layers: Vec<Pixmap>,
}

impl DrawTarget {
    /// Returns `None` for targets that are empty or larger than
    /// `max_size` in either dimension.
    pub fn new(size: DeviceIntSize, max_size: i32) -> Option<DrawTarget> {
        if size.width <= 0 || size.height <= 0 || size.width > max_size || size.height > max_size {
            return None;
        }
        let pixmap = Pixmap::new(size.width as u32, size.height as u32)?;
        Some(DrawTarget {
            pixmap,
            saved_layers: Vec::new(),
        })
    }

    pub fn size(&self) -> DeviceIntSize {
        DeviceIntSize::new(self.pixmap.width() as i32, self.pixmap.height() as i32)
    }

    pub fn bounds(&self) -> DeviceIntRect {
        DeviceIntRect::new(DeviceIntPoint::zero(), self.size())
    }

    /// Premultiplied BGRA8 value at `(x, y)`.
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.pixmap.pixel(x as u32, y as u32) {
            Some(c) => [c.blue(), c.green(), c.red(), c.alpha()],
            None => [0; 4],
        }
    }

    fn clipped(&self, state: &PaintState, rect: &LayoutRect) -> (DeviceIntRect, DeviceIntRect) {
        let target_rect = state.to_target_rect(rect);
        let clip = intersect_rect(&state.clip, &self.bounds());
        (target_rect, intersect_rect(&target_rect, &clip))
    }

    // Pixel-aligned rects without anti-aliasing cover whole pixels only.
    fn fill_visible(&mut self, visible: &DeviceIntRect, paint: &Paint) {
        if rect_is_empty(visible) {
            return;
        }
        if let Some(rect) = skia_rect(visible) {
            self.pixmap.fill_rect(rect, paint, Transform::identity(), None);
        }
    }

    fn solid_paint(color: &ColorF) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(skia_color(color));
        paint.anti_alias = false;
        paint
    }

    pub fn fill_rect(&mut self, state: &PaintState, rect: &LayoutRect, color: ColorF) {
        let (_, visible) = self.clipped(state, rect);
        self.fill_visible(&visible, &DrawTarget::solid_paint(&color));
    }

    /// Blends `color` over a rectangle given directly in target pixels.
    pub fn fill_device_rect(&mut self, rect: &DeviceIntRect, color: ColorF) {
        let visible = intersect_rect(rect, &self.bounds());
        self.fill_visible(&visible, &DrawTarget::solid_paint(&color));
    }

    /// Fills with a gradient running from `start` at the left edge to `end`
    /// at the right edge.
    pub fn fill_gradient(&mut self, state: &PaintState, rect: &LayoutRect, start: ColorF, end: ColorF) {
        let (full, visible) = self.clipped(state, rect);
        let y = full.min_y() as f32;
        let shader = LinearGradient::new(
            Point::from_xy(full.min_x() as f32, y),
            Point::from_xy(full.max_x() as f32, y),
            vec![
                GradientStop::new(0.0, skia_color(&start)),
                GradientStop::new(1.0, skia_color(&end)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        );
        let shader = match shader {
            Some(shader) => shader,
            None => Shader::SolidColor(skia_color(&start)),
        };
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = false;
        self.fill_visible(&visible, &paint);
    }

    /// Nearest-neighbour scaled image draw. `image` is unpremultiplied BGRA8.
    pub fn draw_image(&mut self, state: &PaintState, rect: &LayoutRect, image: &RasterImage) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let mut source = match Pixmap::new(image.width, image.height) {
            Some(pixmap) => pixmap,
            None => return,
        };
        for (dst, src) in source.pixels_mut().iter_mut().zip(image.data.chunks_exact(4)) {
            *dst = ColorU8::from_rgba(src[2], src[1], src[0], src[3]).premultiply();
        }

        let (full, visible) = self.clipped(state, rect);
        let sx = full.size.width.max(1) as f32 / image.width as f32;
        let sy = full.size.height.max(1) as f32 / image.height as f32;
        let mut paint = Paint::default();
        paint.shader = Pattern::new(
            source.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Nearest,
            1.0,
            Transform::from_row(sx, 0.0, 0.0, sy, full.min_x() as f32, full.min_y() as f32),
        );
        paint.anti_alias = false;
        self.fill_visible(&visible, &paint);
    }

    /// Starts an offscreen group; subsequent drawing lands in it until
    /// `pop_group_and_blend`.
    pub fn push_group(&mut self) {
        let mut fresh = self.pixmap.clone();
        fresh.fill(Color::TRANSPARENT);
        self.saved_layers.push(std::mem::replace(&mut self.pixmap, fresh));
    }

    pub fn pop_group_and_blend(&mut self, opacity: f32) {
        let group = match self.saved_layers.pop() {
            Some(below) => std::mem::replace(&mut self.pixmap, below),
            None => panic!("pop_group_and_blend without a matching push_group"),
        };
        let mut paint = PixmapPaint::default();
        paint.opacity = opacity.max(0.0).min(1.0);
        self.pixmap.draw_pixmap(0, 0, group.as_ref(), &paint, Transform::identity(), None);
    }

    /// True if every pixel of `rect` has full alpha.
    pub fn is_opaque(&self, rect: &DeviceIntRect) -> bool {
        if rect_is_empty(rect) || !rect_contains_rect(&self.bounds(), rect) {
            return false;
        }
        let width = self.pixmap.width() as usize;
        let pixels = self.pixmap.pixels();
        (rect.min_y()..rect.max_y()).all(|y| {
            let row = y as usize * width;
            pixels[row + rect.min_x() as usize..row + rect.max_x() as usize]
                .iter()
                .all(|p| p.alpha() == 255)
        })
    }

    /// Copies out `rect` as premultiplied BGRA8, rows tightly packed.
    pub fn read_rect(&self, rect: &DeviceIntRect) -> Vec<u8> {
        debug_assert!(self.saved_layers.is_empty());
        let rect = intersect_rect(rect, &self.bounds());
        let width = self.pixmap.width() as usize;
        let pixels = self.pixmap.pixels();
        let mut out = Vec::with_capacity((rect.size.width * rect.size.height * 4).max(0) as usize);
        for y in rect.min_y()..rect.max_y() {
            let row = y as usize * width;
            for p in &pixels[row + rect.min_x() as usize..row + rect.max_x() as usize] {
                out.extend_from_slice(&[p.blue(), p.green(), p.red(), p.alpha()]);
            }
        }
        out
    }

    /// The whole target as premultiplied BGRA8.
    pub fn into_data(self) -> Vec<u8> {
        debug_assert!(self.saved_layers.is_empty());
        let mut data = self.pixmap.take();
        for pixel in data.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        data
    }
}
