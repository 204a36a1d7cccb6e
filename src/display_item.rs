/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The display items handed to us by layout.
//!
//! Items form a tree: containers (transforms, opacity, scroll frames,
//! grouping wrappers) own a child `DisplayList`. Every item carries a
//! `DisplayItemKey` that stays the same across frames while the item
//! persists, which is what cross-frame invalidation keys on.

use api::{ColorF, LayoutRect, LayoutTransform, PipelineId, ScrollId};
use crate::draw_target::{DrawTarget, PaintState};
use crate::internal_types::DisplayItemKey;
use crate::util::{intersect_rect, rect_contains_rect, rect_is_empty, union_rect};
use euclid::{Point2D, Size2D};
use fxhash::FxHasher;
use std::hash::Hasher;
use std::sync::Arc;

/// A union of layout rectangles, kept as a list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    rects: Vec<LayoutRect>,
}

impl Region {
    pub fn new() -> Region {
        Region::default()
    }

    pub fn from_rect(rect: LayoutRect) -> Region {
        let mut region = Region::new();
        region.or_with(&rect);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[LayoutRect] {
        &self.rects
    }

    pub fn or_with(&mut self, rect: &LayoutRect) {
        if rect_is_empty(rect) || self.rects.iter().any(|r| rect_contains_rect(r, rect)) {
            return;
        }
        self.rects.retain(|r| !rect_contains_rect(rect, r));
        self.rects.push(*rect);
    }

    pub fn or_with_region(&mut self, other: &Region) {
        for rect in &other.rects {
            self.or_with(rect);
        }
    }

    pub fn bounds(&self) -> LayoutRect {
        self.rects.iter().fold(LayoutRect::zero(), |acc, r| union_rect(&acc, r))
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        self.rects.iter().any(|r| x >= r.min_x() && x < r.max_x() && y >= r.min_y() && y < r.max_y())
    }

    pub fn set_empty(&mut self) {
        self.rects.clear();
    }
}

/// Hit-test information for asynchronous scrolling and input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventRegions {
    pub hit_region: Region,
    pub maybe_hit_region: Region,
    pub dispatch_to_content_hit_region: Region,
    pub no_action_region: Region,
    pub horizontal_pan_region: Region,
    pub vertical_pan_region: Region,
}

impl EventRegions {
    pub fn is_empty(&self) -> bool {
        self.hit_region.is_empty() &&
            self.maybe_hit_region.is_empty() &&
            self.dispatch_to_content_hit_region.is_empty() &&
            self.no_action_region.is_empty() &&
            self.horizontal_pan_region.is_empty() &&
            self.vertical_pan_region.is_empty()
    }

    pub fn or_with(&mut self, other: &EventRegions) {
        self.hit_region.or_with_region(&other.hit_region);
        self.maybe_hit_region.or_with_region(&other.maybe_hit_region);
        self.dispatch_to_content_hit_region.or_with_region(&other.dispatch_to_content_hit_region);
        self.no_action_region.or_with_region(&other.no_action_region);
        self.horizontal_pan_region.or_with_region(&other.horizontal_pan_region);
        self.vertical_pan_region.or_with_region(&other.vertical_pan_region);
    }

    pub fn set_empty(&mut self) {
        *self = EventRegions::default();
    }
}

/// Decoded pixels of an image item, straight-alpha BGRA8.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Bumped by the producer whenever the pixels change.
    pub generation: u32,
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, generation: u32, data: Vec<u8>) -> RasterImage {
        debug_assert_eq!(data.len(), (width * height * 4) as usize);
        RasterImage { width, height, generation, data }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        [self.data[offset], self.data[offset + 1], self.data[offset + 2], self.data[offset + 3]]
    }
}

/// What the producer knows about an item's validity this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Invalidation {
    /// Nothing known; compare geometry against the last snapshot.
    Valid,
    /// Repaint everything the item covers, old and new.
    Full,
    /// The item changed inside this rectangle.
    Region(LayoutRect),
}

#[derive(Clone, Debug)]
pub enum DisplayItemKind {
    SolidColor {
        color: ColorF,
    },
    Image {
        image: Arc<RasterImage>,
    },
    /// Only expressible through raster fallback.
    Border {
        color: ColorF,
        width: f32,
    },
    /// Horizontal linear gradient; only expressible through raster fallback.
    Gradient {
        start: ColorF,
        end: ColorF,
    },
    Transform {
        transform: LayoutTransform,
        animated: bool,
        children: DisplayList,
    },
    Opacity {
        opacity: f32,
        animated: bool,
        children: DisplayList,
    },
    Container {
        children: DisplayList,
    },
    /// Turns on grouping for its subtree: inactive descendants are
    /// rasterized together into shared images.
    Grouped {
        children: DisplayList,
    },
    ScrollFrame {
        scroll_id: ScrollId,
        children: DisplayList,
    },
    Iframe {
        pipeline_id: PipelineId,
    },
    EventRegions(EventRegions),
}

#[derive(Clone, Debug)]
pub struct DisplayItem {
    pub key: DisplayItemKey,
    pub bounds: LayoutRect,
    pub clip: Option<LayoutRect>,
    /// The active scrolled root the item moves with.
    pub asr: Option<ScrollId>,
    pub invalidation: Invalidation,
    pub kind: DisplayItemKind,
}

/// What we remember about an item to diff it against the next frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemGeometry {
    pub bounds: LayoutRect,
    pub paint_bounds: LayoutRect,
    fingerprint: u64,
}

impl ItemGeometry {
    pub fn invalidation_region(&self) -> LayoutRect {
        self.paint_bounds
    }
}

impl DisplayItem {
    pub fn new(key: DisplayItemKey, bounds: LayoutRect, kind: DisplayItemKind) -> DisplayItem {
        DisplayItem {
            key,
            bounds,
            clip: None,
            asr: None,
            invalidation: Invalidation::Valid,
            kind,
        }
    }

    pub fn with_clip(mut self, clip: LayoutRect) -> DisplayItem {
        self.clip = Some(clip);
        self
    }

    pub fn with_asr(mut self, asr: ScrollId) -> DisplayItem {
        self.asr = Some(asr);
        self
    }

    pub fn with_invalidation(mut self, invalidation: Invalidation) -> DisplayItem {
        self.invalidation = invalidation;
        self
    }

    pub fn children(&self) -> Option<&DisplayList> {
        match self.kind {
            DisplayItemKind::Transform { ref children, .. } |
            DisplayItemKind::Opacity { ref children, .. } |
            DisplayItemKind::Container { ref children } |
            DisplayItemKind::Grouped { ref children } |
            DisplayItemKind::ScrollFrame { ref children, .. } => Some(children),
            DisplayItemKind::SolidColor { .. } |
            DisplayItemKind::Image { .. } |
            DisplayItemKind::Border { .. } |
            DisplayItemKind::Gradient { .. } |
            DisplayItemKind::Iframe { .. } |
            DisplayItemKind::EventRegions(..) => None,
        }
    }

    /// Bounds clipped by the item's clip. Event regions never paint.
    pub fn paint_bounds(&self) -> LayoutRect {
        if let DisplayItemKind::EventRegions(..) = self.kind {
            return LayoutRect::zero();
        }
        match self.clip {
            Some(ref clip) => intersect_rect(&self.bounds, clip),
            None => self.bounds,
        }
    }

    pub fn clip_rect(&self) -> LayoutRect {
        self.clip.unwrap_or(self.bounds)
    }

    pub fn is_invalid(&self) -> bool {
        self.invalidation != Invalidation::Valid
    }

    /// Transform and opacity containers are "layer" items: their visual
    /// properties can change without their bounds changing.
    pub fn is_layer_item(&self) -> bool {
        match self.kind {
            DisplayItemKind::Transform { .. } | DisplayItemKind::Opacity { .. } => true,
            _ => false,
        }
    }

    pub fn layer_transform(&self) -> Option<&LayoutTransform> {
        match self.kind {
            DisplayItemKind::Transform { ref transform, .. } => Some(transform),
            _ => None,
        }
    }

    pub fn layer_opacity(&self) -> Option<f32> {
        match self.kind {
            DisplayItemKind::Opacity { opacity, .. } => Some(opacity),
            _ => None,
        }
    }

    /// Whether this item must be re-evaluated every frame instead of being
    /// baked into a cached raster. Containers are active if any descendant
    /// is.
    pub fn is_active(&self) -> bool {
        match self.kind {
            DisplayItemKind::Transform { ref transform, animated, ref children } => {
                animated || !transform.is_2d() || children.has_active_items()
            }
            DisplayItemKind::Opacity { animated, ref children, .. } => {
                animated || children.has_active_items()
            }
            DisplayItemKind::Container { ref children } |
            DisplayItemKind::Grouped { ref children } => children.has_active_items(),
            DisplayItemKind::ScrollFrame { .. } | DisplayItemKind::Iframe { .. } => true,
            DisplayItemKind::SolidColor { .. } |
            DisplayItemKind::Image { .. } |
            DisplayItemKind::Border { .. } |
            DisplayItemKind::Gradient { .. } |
            DisplayItemKind::EventRegions(..) => false,
        }
    }

    /// Items that carry data asynchronous scrolling needs get their own
    /// scroll-data layer.
    pub fn updates_scroll_data(&self) -> bool {
        match self.kind {
            DisplayItemKind::Transform { .. } |
            DisplayItemKind::ScrollFrame { .. } |
            DisplayItemKind::Iframe { .. } => true,
            _ => false,
        }
    }

    fn fingerprint(&self) -> u64 {
        fn color(hasher: &mut FxHasher, color: &ColorF) {
            hasher.write_u32(color.r.to_bits());
            hasher.write_u32(color.g.to_bits());
            hasher.write_u32(color.b.to_bits());
            hasher.write_u32(color.a.to_bits());
        }

        let mut hasher = FxHasher::default();
        match self.kind {
            DisplayItemKind::SolidColor { color: ref c } => {
                hasher.write_u8(0);
                color(&mut hasher, c);
            }
            DisplayItemKind::Image { ref image } => {
                hasher.write_u8(1);
                hasher.write_u32(image.width);
                hasher.write_u32(image.height);
                hasher.write_u32(image.generation);
            }
            DisplayItemKind::Border { color: ref c, width } => {
                hasher.write_u8(2);
                color(&mut hasher, c);
                hasher.write_u32(width.to_bits());
            }
            DisplayItemKind::Gradient { ref start, ref end } => {
                hasher.write_u8(3);
                color(&mut hasher, start);
                color(&mut hasher, end);
            }
            // Layer properties are compared separately, see `is_layer_item`.
            DisplayItemKind::Transform { .. } => hasher.write_u8(4),
            DisplayItemKind::Opacity { .. } => hasher.write_u8(5),
            DisplayItemKind::Container { .. } => hasher.write_u8(6),
            DisplayItemKind::Grouped { .. } => hasher.write_u8(7),
            DisplayItemKind::ScrollFrame { scroll_id, .. } => {
                hasher.write_u8(8);
                hasher.write_u64(scroll_id.0);
            }
            DisplayItemKind::Iframe { pipeline_id } => {
                hasher.write_u8(9);
                hasher.write_u32(pipeline_id.0);
                hasher.write_u32(pipeline_id.1);
            }
            DisplayItemKind::EventRegions(..) => hasher.write_u8(10),
        }
        hasher.finish()
    }

    pub fn allocate_geometry(&self) -> ItemGeometry {
        ItemGeometry {
            bounds: self.bounds,
            paint_bounds: self.paint_bounds(),
            fingerprint: self.fingerprint(),
        }
    }

    /// The area that changed since `old` was taken. Empty if nothing did.
    pub fn compute_invalidation_region(&self, old: &ItemGeometry) -> LayoutRect {
        let new = self.allocate_geometry();
        if new.bounds != old.bounds || new.paint_bounds != old.paint_bounds {
            union_rect(&old.paint_bounds, &new.paint_bounds)
        } else if new.fingerprint != old.fingerprint {
            new.paint_bounds
        } else {
            LayoutRect::zero()
        }
    }

    /// Paints a leaf item. Containers are painted by whoever walks their
    /// children.
    pub fn paint(&self, target: &mut DrawTarget, state: &PaintState) {
        let state = state.with_clip(&self.clip_rect());
        match self.kind {
            DisplayItemKind::SolidColor { color } => {
                target.fill_rect(&state, &self.bounds, color);
            }
            DisplayItemKind::Image { ref image } => {
                target.draw_image(&state, &self.bounds, image);
            }
            DisplayItemKind::Border { color, width } => {
                let b = self.bounds;
                let w = width.min(b.size.width / 2.0).min(b.size.height / 2.0);
                let edges = [
                    LayoutRect::new(b.origin, Size2D::new(b.size.width, w)),
                    LayoutRect::new(Point2D::new(b.min_x(), b.max_y() - w), Size2D::new(b.size.width, w)),
                    LayoutRect::new(Point2D::new(b.min_x(), b.min_y() + w), Size2D::new(w, b.size.height - 2.0 * w)),
                    LayoutRect::new(Point2D::new(b.max_x() - w, b.min_y() + w), Size2D::new(w, b.size.height - 2.0 * w)),
                ];
                for edge in &edges {
                    target.fill_rect(&state, edge, color);
                }
            }
            DisplayItemKind::Gradient { start, end } => {
                target.fill_gradient(&state, &self.bounds, start, end);
            }
            DisplayItemKind::Transform { .. } |
            DisplayItemKind::Opacity { .. } |
            DisplayItemKind::Container { .. } |
            DisplayItemKind::Grouped { .. } |
            DisplayItemKind::ScrollFrame { .. } |
            DisplayItemKind::Iframe { .. } |
            DisplayItemKind::EventRegions(..) => {}
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    items: Vec<DisplayItem>,
}

impl DisplayList {
    pub fn new() -> DisplayList {
        DisplayList::default()
    }

    pub fn push(&mut self, item: DisplayItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<DisplayItem> {
        self.items.iter()
    }

    pub fn has_active_items(&self) -> bool {
        self.items.iter().any(DisplayItem::is_active)
    }
}

impl From<Vec<DisplayItem>> for DisplayList {
    fn from(items: Vec<DisplayItem>) -> DisplayList {
        DisplayList { items }
    }
}
