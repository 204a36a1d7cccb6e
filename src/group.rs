/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Groups of inactive display items rasterized into one shared image.
//!
//! A group remembers, per item, what it painted last time. Each traversal
//! the grouper feeds it the items that belong to it; the group diffs them
//! against the stored state, grows its invalid rectangle, and at
//! `end_group` repaints and uploads only that rectangle.

use api::{
    ColorF, DeviceIntPoint, DeviceIntRect, DeviceIntSize, ImageDescriptor, ImageFormat, ImageKey,
    LayoutRect, LayoutTransform2D,
};
use crate::blob_item_data::{BlobItemData, GroupId, ItemOwners};
use crate::command_builder::{BuilderOptions, CommandSink};
use crate::display_item::{DisplayItem, DisplayItemKind, DisplayList, Invalidation};
use crate::draw_target::{DrawTarget, PaintState};
use crate::internal_types::{DisplayItemKey, FastHashMap, FrameId, PaintSequenceNumber};
use crate::util::{
    intersect_rect, rect_contains_rect, rect_is_empty, rects_intersect, round_to_int,
    transform_bounds, translate_rect, union_rect,
};
use log::{debug, trace, warn};
use std::ops::Range;

/// What `end_group` did with the range it was given.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EndGroupOutcome {
    /// No items; nothing emitted.
    Empty,
    /// The image could not be allocated (zero-sized or too large).
    Skipped,
    /// Nothing was invalid; the existing image was pushed again.
    Reused(ImageKey),
    Added(ImageKey),
    Updated(ImageKey, DeviceIntRect),
    /// The resource queue refused the upload. The invalid area is kept so
    /// the next traversal tries again.
    UploadFailed,
}

pub struct Group {
    pub id: GroupId,
    items: FastHashMap<DisplayItemKey, BlobItemData>,
    invalid_rect: DeviceIntRect,
    group_bounds: LayoutRect,
    scale: f32,
    group_offset: DeviceIntPoint,
    image_size: DeviceIntSize,
    key: Option<ImageKey>,
    // Whether every pixel of the uploaded image is opaque.
    opaque: bool,
    traversal: Option<PaintSequenceNumber>,
}

/// Device rectangle, relative to the group origin, covered by `region`
/// under `matrix`.
fn item_rect(
    region: &LayoutRect,
    matrix: &LayoutTransform2D,
    scale: f32,
    offset: DeviceIntPoint,
    image_rect: &DeviceIntRect,
) -> DeviceIntRect {
    let device = transform_bounds(matrix, region, scale);
    let relative = translate_rect(&device, DeviceIntPoint::new(-offset.x, -offset.y));
    intersect_rect(&relative, image_rect)
}

fn explicit_region_is_unusable(item: &DisplayItem) -> bool {
    match item.invalidation {
        Invalidation::Region(ref r) => {
            rect_is_empty(r) ||
                !(r.origin.x.is_finite() &&
                    r.origin.y.is_finite() &&
                    r.size.width.is_finite() &&
                    r.size.height.is_finite())
        }
        Invalidation::Valid | Invalidation::Full => false,
    }
}

/// Diffs `item` against its stored state and returns the device area, in
/// group space, that must be repainted. Leaves `data` describing this
/// frame.
pub fn compute_geometry_change(
    item: &DisplayItem,
    data: &mut BlobItemData,
    matrix: &LayoutTransform2D,
    scale: f32,
    offset: DeviceIntPoint,
    image_rect: &DeviceIntRect,
) -> DeviceIntRect {
    let mut dirty = DeviceIntRect::zero();
    let has_geometry = data.geometry.is_some();

    if !has_geometry || explicit_region_is_unusable(item) {
        if has_geometry {
            warn!("item {:?} flagged an invalid region it could not supply, repainting it fully", item.key);
            dirty = union_rect(&dirty, &data.rect);
        }
        let geometry = item.allocate_geometry();
        data.rect = item_rect(&geometry.invalidation_region(), matrix, scale, offset, image_rect);
        trace!("new item {:?} rect {:?}", item.key, data.rect);
        dirty = union_rect(&dirty, &data.rect);
        data.geometry = Some(geometry);
        data.invalid = true;
    } else if item.invalidation == Invalidation::Full {
        let geometry = item.allocate_geometry();
        dirty = union_rect(&dirty, &data.rect);
        data.rect = item_rect(&geometry.invalidation_region(), matrix, scale, offset, image_rect);
        trace!("invalid item {:?} rect {:?}", item.key, data.rect);
        dirty = union_rect(&dirty, &data.rect);
        data.geometry = Some(geometry);
        data.invalid = true;
    } else {
        let mut changed = match data.geometry {
            Some(ref old) => item.compute_invalidation_region(old),
            None => unreachable!(),
        };
        if let Invalidation::Region(ref r) = item.invalidation {
            changed = union_rect(&changed, r);
        }

        if !rect_is_empty(&changed) {
            let geometry = item.allocate_geometry();
            dirty = union_rect(&dirty, &data.rect);
            dirty = union_rect(&dirty, &item_rect(&changed, matrix, scale, offset, image_rect));
            data.rect = item_rect(&geometry.invalidation_region(), matrix, scale, offset, image_rect);
            trace!("changed item {:?} rect {:?}", item.key, data.rect);
            dirty = union_rect(&dirty, &data.rect);
            data.geometry = Some(geometry);
            data.invalid = true;
        } else if data.matrix != *matrix {
            // A transform change does not show up in the geometry diff.
            let region = item.paint_bounds();
            dirty = union_rect(&dirty, &data.rect);
            data.rect = item_rect(&region, matrix, scale, offset, image_rect);
            trace!("transformed item {:?} rect {:?}", item.key, data.rect);
            dirty = union_rect(&dirty, &data.rect);
            data.invalid = true;
        } else if item.is_layer_item() {
            let rect = item_rect(&item.paint_bounds(), matrix, scale, offset, image_rect);
            let properties_changed = data.transform.as_ref() != item.layer_transform() ||
                data.opacity != item.layer_opacity();
            if properties_changed || rect != data.rect {
                dirty = union_rect(&dirty, &data.rect);
                data.rect = rect;
                trace!("layer item {:?} changed, rect {:?}", item.key, data.rect);
                dirty = union_rect(&dirty, &data.rect);
                data.invalid = true;
            }
        }
    }

    data.matrix = *matrix;
    data.transform = item.layer_transform().cloned();
    data.opacity = item.layer_opacity();
    dirty
}

impl Group {
    pub fn new(id: GroupId) -> Group {
        Group {
            id,
            items: FastHashMap::default(),
            invalid_rect: DeviceIntRect::zero(),
            group_bounds: LayoutRect::zero(),
            scale: 0.0,
            group_offset: DeviceIntPoint::zero(),
            image_size: DeviceIntSize::zero(),
            key: None,
            opaque: false,
            traversal: None,
        }
    }

    pub fn key(&self) -> Option<ImageKey> {
        self.key
    }

    pub fn invalid_rect(&self) -> DeviceIntRect {
        self.invalid_rect
    }

    pub fn group_bounds(&self) -> LayoutRect {
        self.group_bounds
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn group_offset(&self) -> DeviceIntPoint {
        self.group_offset
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn record(&self, key: &DisplayItemKey) -> Option<&BlobItemData> {
        self.items.get(key)
    }

    /// The group's pixels, relative to its own origin.
    pub fn image_rect(&self) -> DeviceIntRect {
        DeviceIntRect::new(DeviceIntPoint::zero(), self.image_size)
    }

    /// Prepares the group for a traversal with the given bounds and scale.
    /// A change of either throws away every record and the image, so the
    /// next rasterization covers the whole group.
    pub fn update_bounds(
        &mut self,
        bounds: LayoutRect,
        scale: f32,
        traversal: PaintSequenceNumber,
        owners: &mut ItemOwners,
        discarded: &mut Vec<ImageKey>,
    ) -> bool {
        let changed = self.traversal.is_none() || self.group_bounds != bounds || self.scale != scale;

        if self.traversal != Some(traversal) {
            for data in self.items.values_mut() {
                data.used = false;
            }
            self.traversal = Some(traversal);
        }

        self.group_bounds = bounds;
        self.scale = scale;
        let device = round_to_int(&api::layout_rect_to_device(&bounds, scale));
        self.group_offset = device.origin;
        self.image_size = DeviceIntSize::new(device.size.width.max(0), device.size.height.max(0));

        if changed {
            debug!("group {:?} bounds {:?} scale {}: starting over", self.id, bounds, scale);
            self.clear_items(owners);
            self.discard_image(discarded);
        }
        changed
    }

    /// Forgets the image. The next `end_group` repaints the whole group.
    pub fn discard_image(&mut self, discarded: &mut Vec<ImageKey>) {
        if let Some(key) = self.key.take() {
            debug!("group {:?} discarding {:?}", self.id, key);
            discarded.push(key);
        }
        self.invalid_rect = self.image_rect();
    }

    pub fn clear_items(&mut self, owners: &mut ItemOwners) {
        for key in self.items.keys() {
            owners.release(key, self.id);
        }
        self.items.clear();
    }

    pub fn invalidate_rect(&mut self, rect: &DeviceIntRect) {
        let rect = intersect_rect(rect, &self.image_rect());
        self.invalid_rect = union_rect(&self.invalid_rect, &rect);
    }

    /// Removes a record whose item now belongs to another group; its old
    /// pixels must be erased from this group's image.
    pub fn evict(&mut self, key: &DisplayItemKey, owners: &mut ItemOwners) {
        if let Some(data) = self.items.remove(key) {
            trace!("group {:?} evicting moved item {:?}", self.id, key);
            owners.release(key, self.id);
            self.invalidate_rect(&data.rect);
        }
    }

    /// Drops the records of items belonging to a destroyed layout frame.
    pub fn remove_frame_items(&mut self, frame: FrameId, owners: &mut ItemOwners) -> usize {
        let doomed = self
            .items
            .keys()
            .filter(|key| key.frame == frame)
            .cloned()
            .collect::<Vec<_>>();
        for key in &doomed {
            self.evict(key, owners);
        }
        doomed.len()
    }

    /// Looks up or creates the record for `item`, marks it used and folds
    /// its geometry change into the invalid rectangle.
    pub fn track_item(&mut self, item: &DisplayItem, matrix: &LayoutTransform2D, owners: &mut ItemOwners) {
        let image_rect = self.image_rect();
        let (id, offset, scale) = (self.id, self.group_offset, self.scale);

        let data = self
            .items
            .entry(item.key)
            .or_insert_with(|| BlobItemData::new(item.key, id));
        owners.claim(item.key, id);
        data.used = true;
        debug_assert_eq!(data.group, id);

        let dirty = compute_geometry_change(item, data, matrix, scale, offset, &image_rect);
        if !rect_is_empty(&dirty) {
            self.invalidate_rect(&dirty);
        }
    }

    /// Drops records no item claimed this traversal; their pixels are stale.
    fn sweep_unused(&mut self, owners: &mut ItemOwners) {
        let id = self.id;
        let image_rect = self.image_rect();
        let mut invalid_rect = self.invalid_rect;
        self.items.retain(|key, data| {
            if data.used {
                return true;
            }
            trace!("group {:?} dropping unused item {:?}", id, key);
            invalid_rect = union_rect(&invalid_rect, &intersect_rect(&data.rect, &image_rect));
            owners.release(key, id);
            false
        });
        self.invalid_rect = invalid_rect;
    }

    fn push_image(&self, key: ImageKey, sink: &mut CommandSink) {
        let device = translate_rect(&self.image_rect(), self.group_offset);
        let bounds = api::device_rect_to_layout(&device, self.scale);
        sink.builder.push_image(bounds, bounds, None, key);
    }

    /// Finishes the items in `range` of `list` that were assigned to this
    /// group this traversal.
    pub fn end_group(
        &mut self,
        list: &DisplayList,
        range: Range<usize>,
        owners: &mut ItemOwners,
        sink: &mut CommandSink,
        discarded: &mut Vec<ImageKey>,
        options: &BuilderOptions,
    ) -> EndGroupOutcome {
        self.sweep_unused(owners);

        if range.start >= range.end {
            if self.key.is_some() {
                self.discard_image(discarded);
            }
            trace!("group {:?} is empty", self.id);
            return EndGroupOutcome::Empty;
        }

        let image_rect = self.image_rect();
        if rect_is_empty(&image_rect) {
            warn!("group {:?} has no pixels, skipping", self.id);
            return EndGroupOutcome::Skipped;
        }

        let invalid = intersect_rect(&self.invalid_rect, &image_rect);
        if rect_is_empty(&invalid) {
            self.invalid_rect = DeviceIntRect::zero();
            return match self.key {
                Some(key) => {
                    trace!("group {:?} unchanged, reusing {:?}", self.id, key);
                    self.push_image(key, sink);
                    EndGroupOutcome::Reused(key)
                }
                None => EndGroupOutcome::Empty,
            };
        }

        let mut dt = match DrawTarget::new(image_rect.size, options.max_texture_size) {
            Some(dt) => dt,
            None => {
                warn!("group {:?} of size {:?} cannot be rasterized, skipping", self.id, image_rect.size);
                return EndGroupOutcome::Skipped;
            }
        };
        let state = PaintState::new(self.scale, self.group_offset, invalid);
        self.paint_item_range(&mut dt, list, range, &state, &invalid);
        if options.highlight_painted_layers {
            dt.fill_device_rect(&invalid, ColorF::new(1.0, 0.0, 0.0, 0.5));
        }

        // Only the invalid area was painted, so an update can keep the
        // image opaque but never make it so.
        let opaque = match self.key {
            None => dt.is_opaque(&image_rect),
            Some(_) => self.opaque && dt.is_opaque(&invalid),
        };
        let descriptor = ImageDescriptor::new(
            image_rect.size.width as u32,
            image_rect.size.height as u32,
            ImageFormat::BGRA8,
            opaque,
        );
        let (key, outcome) = match self.key {
            None => {
                assert_eq!(invalid, image_rect, "the first image of a group must be painted in full");
                let key = sink.keys.next_image_key();
                if let Err(err) = sink.resources.add_image(key, descriptor, dt.into_data()) {
                    warn!("group {:?} image add failed: {}", self.id, err);
                    return EndGroupOutcome::UploadFailed;
                }
                self.key = Some(key);
                (key, EndGroupOutcome::Added(key))
            }
            Some(key) => {
                assert!(
                    rect_contains_rect(&image_rect, &invalid),
                    "dirty rect {:?} exceeds group image {:?}",
                    invalid,
                    image_rect,
                );
                let bytes = dt.read_rect(&invalid);
                if let Err(err) = sink.resources.update_image(key, descriptor, bytes, invalid) {
                    warn!("group {:?} image update failed: {}", self.id, err);
                    return EndGroupOutcome::UploadFailed;
                }
                (key, EndGroupOutcome::Updated(key, invalid))
            }
        };
        debug!("group {:?} painted {:?} into {:?}", self.id, invalid, key);

        self.opaque = opaque;
        self.invalid_rect = DeviceIntRect::zero();
        self.push_image(key, sink);
        outcome
    }

    /// Paints the items of `range` that touch `state.clip`. `dirty` is the
    /// area being repainted this time.
    fn paint_item_range(
        &mut self,
        dt: &mut DrawTarget,
        list: &DisplayList,
        range: Range<usize>,
        state: &PaintState,
        dirty: &DeviceIntRect,
    ) {
        for item in &list.items()[range] {
            let bounds = match self.items.get_mut(&item.key) {
                Some(data) => {
                    // An invalid item only partly repainted would leave
                    // stale pixels behind.
                    if rect_contains_rect(dirty, &data.rect) {
                        data.invalid = false;
                    } else {
                        debug_assert!(!data.invalid, "invalid item {:?} is only partly repainted", item.key);
                    }
                    if !rects_intersect(&data.rect, &state.clip) {
                        continue;
                    }
                    data.rect
                }
                None => continue,
            };
            trace!("painting {:?} at {:?}", item.key, bounds);

            match item.children() {
                Some(children) => self.paint_container_item(dt, item, children, state, dirty),
                None => item.paint(dt, state),
            }
        }
    }

    fn paint_container_item(
        &mut self,
        dt: &mut DrawTarget,
        item: &DisplayItem,
        children: &DisplayList,
        state: &PaintState,
        dirty: &DeviceIntRect,
    ) {
        let state = state.with_clip(&item.clip_rect());
        let all = 0..children.len();
        match item.kind {
            DisplayItemKind::Transform { ref transform, .. } => {
                let state = state.with_transform(&transform.to_2d());
                self.paint_item_range(dt, children, all, &state, dirty);
            }
            DisplayItemKind::Opacity { opacity, .. } => {
                dt.push_group();
                self.paint_item_range(dt, children, all, &state, dirty);
                dt.pop_group_and_blend(opacity);
            }
            DisplayItemKind::Container { .. } |
            DisplayItemKind::Grouped { .. } |
            DisplayItemKind::ScrollFrame { .. } => {
                self.paint_item_range(dt, children, all, &state, dirty);
            }
            DisplayItemKind::SolidColor { .. } |
            DisplayItemKind::Image { .. } |
            DisplayItemKind::Border { .. } |
            DisplayItemKind::Gradient { .. } |
            DisplayItemKind::Iframe { .. } |
            DisplayItemKind::EventRegions(..) => unreachable!("leaf items have no children"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_item::DisplayItemKind;
    use crate::freelist::FreeListItemId;
    use api::{
        DisplayListBuilder, IdNamespace, ImageKeyGenerator, LayoutPoint, LayoutSize, PipelineId,
        ResourceUpdate, ResourceUpdates, WrCommand,
    };

    fn rect(x: f32, y: f32, w: f32, h: f32) -> LayoutRect {
        LayoutRect::new(LayoutPoint::new(x, y), LayoutSize::new(w, h))
    }

    fn int_rect(x: i32, y: i32, w: i32, h: i32) -> DeviceIntRect {
        DeviceIntRect::new(DeviceIntPoint::new(x, y), DeviceIntSize::new(w, h))
    }

    fn red_square(x: f32, y: f32) -> DisplayItem {
        DisplayItem::new(
            DisplayItemKey::new(FrameId(1), 1),
            rect(x, y, 10.0, 10.0),
            DisplayItemKind::SolidColor { color: ColorF::new(1.0, 0.0, 0.0, 1.0) },
        )
    }

    struct Harness {
        group: Group,
        owners: ItemOwners,
        keys: ImageKeyGenerator,
        discarded: Vec<ImageKey>,
        options: BuilderOptions,
        traversal: PaintSequenceNumber,
    }

    struct Frame {
        outcome: EndGroupOutcome,
        commands: Vec<WrCommand>,
        updates: ResourceUpdates,
    }

    impl Harness {
        fn new() -> Harness {
            Harness {
                group: Group::new(FreeListItemId::new(0)),
                owners: ItemOwners::new(),
                keys: ImageKeyGenerator::new(IdNamespace(1)),
                discarded: Vec::new(),
                options: BuilderOptions::default(),
                traversal: PaintSequenceNumber(0),
            }
        }

        fn begin(&mut self, bounds: LayoutRect) {
            self.traversal = self.traversal.next();
            self.group
                .update_bounds(bounds, 1.0, self.traversal, &mut self.owners, &mut self.discarded);
        }

        fn end(&mut self, list: &DisplayList, updates: ResourceUpdates) -> Frame {
            let mut builder = DisplayListBuilder::new(PipelineId(0, 0));
            let mut updates = updates;
            let outcome = {
                let mut sink = CommandSink {
                    builder: &mut builder,
                    resources: &mut updates,
                    keys: &self.keys,
                };
                self.group.end_group(
                    list,
                    0..list.len(),
                    &mut self.owners,
                    &mut sink,
                    &mut self.discarded,
                    &self.options,
                )
            };
            Frame {
                outcome,
                commands: builder.commands().to_vec(),
                updates,
            }
        }

        fn frame(&mut self, items: Vec<DisplayItem>) -> Frame {
            self.begin(rect(0.0, 0.0, 100.0, 100.0));
            let list = DisplayList::from(items);
            for item in list.iter() {
                self.group.track_item(item, &LayoutTransform2D::identity(), &mut self.owners);
            }
            self.end(&list, ResourceUpdates::new())
        }
    }

    fn added_pixels(updates: &ResourceUpdates) -> &[u8] {
        match updates.updates[0] {
            ResourceUpdate::AddImage(ref add) => &add.data,
            ref other => panic!("expected an add, got {:?}", other),
        }
    }

    #[test]
    fn moving_square_updates_union_of_old_and_new() {
        let mut h = Harness::new();

        let first = h.frame(vec![red_square(0.0, 0.0)]);
        let key = match first.outcome {
            EndGroupOutcome::Added(key) => key,
            other => panic!("unexpected {:?}", other),
        };
        let pixels = added_pixels(&first.updates);
        assert_eq!(pixels.len(), 100 * 100 * 4);
        assert_eq!(&pixels[0..4], &[0, 0, 255, 255]);
        let outside = (10 * 100 + 10) * 4;
        assert_eq!(&pixels[outside..outside + 4], &[0, 0, 0, 0]);
        assert!(rect_is_empty(&h.group.invalid_rect()));
        assert_eq!(first.commands.len(), 1);

        let second = h.frame(vec![red_square(50.0, 50.0)]);
        assert_eq!(second.outcome, EndGroupOutcome::Updated(key, int_rect(0, 0, 60, 60)));
        match second.updates.updates[0] {
            ResourceUpdate::UpdateImage(ref update) => {
                assert_eq!(update.dirty_rect, int_rect(0, 0, 60, 60));
                assert_eq!(update.data.len(), 60 * 60 * 4);
                assert_eq!(&update.data[0..4], &[0, 0, 0, 0]);
                let moved = (50 * 60 + 50) * 4;
                assert_eq!(&update.data[moved..moved + 4], &[0, 0, 255, 255]);
            }
            ref other => panic!("expected an update, got {:?}", other),
        }
        match second.commands[0] {
            WrCommand::Image { key: pushed, bounds, .. } => {
                assert_eq!(pushed, key);
                assert_eq!(bounds, rect(0.0, 0.0, 100.0, 100.0));
            }
            ref other => panic!("expected an image, got {:?}", other),
        }
    }

    #[test]
    fn new_item_invalidates_its_full_bounds() {
        let mut h = Harness::new();
        h.frame(vec![red_square(0.0, 0.0)]);

        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let mut other = red_square(20.0, 30.0);
        other.key = DisplayItemKey::new(FrameId(1), 2);
        h.group.track_item(&red_square(0.0, 0.0), &LayoutTransform2D::identity(), &mut h.owners);
        h.group.track_item(&other, &LayoutTransform2D::identity(), &mut h.owners);
        assert_eq!(h.group.invalid_rect(), int_rect(20, 30, 10, 10));
    }

    #[test]
    fn unchanged_frame_reuses_image() {
        let mut h = Harness::new();
        let first = h.frame(vec![red_square(0.0, 0.0)]);
        let rect_before = h.group.record(&red_square(0.0, 0.0).key).unwrap().rect;

        let second = h.frame(vec![red_square(0.0, 0.0)]);
        match (first.outcome, second.outcome) {
            (EndGroupOutcome::Added(a), EndGroupOutcome::Reused(b)) => assert_eq!(a, b),
            other => panic!("unexpected {:?}", other),
        }
        assert!(second.updates.is_empty());
        assert_eq!(h.group.record(&red_square(0.0, 0.0).key).unwrap().rect, rect_before);
    }

    #[test]
    fn end_group_is_idempotent() {
        let mut h = Harness::new();
        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let list = DisplayList::from(vec![red_square(0.0, 0.0)]);
        h.group.track_item(&list.items()[0], &LayoutTransform2D::identity(), &mut h.owners);
        let first = h.end(&list, ResourceUpdates::new());
        let second = h.end(&list, ResourceUpdates::new());
        let key = match first.outcome {
            EndGroupOutcome::Added(key) => key,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(second.outcome, EndGroupOutcome::Reused(key));
        assert!(second.updates.is_empty());
        assert_eq!(h.group.item_count(), 1);
    }

    #[test]
    fn removed_item_is_erased_and_forgotten() {
        let mut h = Harness::new();
        let mut other = red_square(40.0, 40.0);
        other.key = DisplayItemKey::new(FrameId(1), 2);
        h.frame(vec![red_square(0.0, 0.0), other.clone()]);
        assert_eq!(h.owners.len(), 2);

        let second = h.frame(vec![red_square(0.0, 0.0)]);
        match second.outcome {
            EndGroupOutcome::Updated(_, dirty) => assert_eq!(dirty, int_rect(40, 40, 10, 10)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.group.record(&other.key).is_none());
        assert_eq!(h.owners.owner(&other.key), None);

        let third = h.frame(vec![red_square(0.0, 0.0)]);
        assert!(matches!(third.outcome, EndGroupOutcome::Reused(_)));
    }

    #[test]
    fn destroyed_frame_items_are_erased() {
        let mut h = Harness::new();
        let mut other = red_square(40.0, 40.0);
        other.key = DisplayItemKey::new(FrameId(2), 1);
        h.frame(vec![red_square(0.0, 0.0), other.clone()]);

        assert_eq!(h.group.remove_frame_items(FrameId(2), &mut h.owners), 1);
        assert_eq!(h.group.item_count(), 1);
        assert_eq!(h.group.invalid_rect(), int_rect(40, 40, 10, 10));
        assert_eq!(h.owners.owner(&other.key), None);
    }

    #[test]
    fn empty_range_emits_nothing() {
        let mut h = Harness::new();
        let frame = h.frame(vec![]);
        assert_eq!(frame.outcome, EndGroupOutcome::Empty);
        assert!(frame.commands.is_empty());
        assert!(frame.updates.is_empty());
    }

    #[test]
    fn emptied_group_discards_its_image() {
        let mut h = Harness::new();
        let key = match h.frame(vec![red_square(0.0, 0.0)]).outcome {
            EndGroupOutcome::Added(key) => key,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(h.frame(vec![]).outcome, EndGroupOutcome::Empty);
        assert_eq!(h.discarded, vec![key]);
        assert_eq!(h.group.key(), None);
        assert!(matches!(h.frame(vec![red_square(0.0, 0.0)]).outcome, EndGroupOutcome::Added(_)));
    }

    #[test]
    fn bounds_change_starts_over() {
        let mut h = Harness::new();
        h.frame(vec![red_square(0.0, 0.0)]);
        let key = h.group.key().unwrap();
        h.begin(rect(0.0, 0.0, 50.0, 50.0));
        assert_eq!(h.discarded, vec![key]);
        assert_eq!(h.group.item_count(), 0);
        assert_eq!(h.group.invalid_rect(), int_rect(0, 0, 50, 50));
    }

    #[test]
    fn failed_upload_keeps_invalid_rect_and_key() {
        let mut h = Harness::new();
        let key = match h.frame(vec![red_square(0.0, 0.0)]).outcome {
            EndGroupOutcome::Added(key) => key,
            other => panic!("unexpected {:?}", other),
        };

        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let list = DisplayList::from(vec![red_square(50.0, 50.0)]);
        h.group.track_item(&list.items()[0], &LayoutTransform2D::identity(), &mut h.owners);
        let frame = h.end(&list, ResourceUpdates::with_byte_budget(16));
        assert_eq!(frame.outcome, EndGroupOutcome::UploadFailed);
        assert!(frame.commands.is_empty());
        assert_eq!(h.group.invalid_rect(), int_rect(0, 0, 60, 60));
        assert_eq!(h.group.key(), Some(key));

        let retry = h.end(&list, ResourceUpdates::new());
        assert_eq!(retry.outcome, EndGroupOutcome::Updated(key, int_rect(0, 0, 60, 60)));
    }

    #[test]
    fn zero_sized_group_is_skipped() {
        let mut h = Harness::new();
        h.begin(rect(0.0, 0.0, 0.0, 100.0));
        let list = DisplayList::from(vec![red_square(0.0, 0.0)]);
        h.group.track_item(&list.items()[0], &LayoutTransform2D::identity(), &mut h.owners);
        let frame = h.end(&list, ResourceUpdates::new());
        assert_eq!(frame.outcome, EndGroupOutcome::Skipped);
        assert!(frame.commands.is_empty());
        assert!(frame.updates.is_empty());
    }

    #[test]
    fn transform_change_alone_forces_recompute() {
        let mut h = Harness::new();
        h.frame(vec![red_square(0.0, 0.0)]);

        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        h.group.track_item(&red_square(0.0, 0.0), &LayoutTransform2D::translation(20.0, 0.0), &mut h.owners);
        assert_eq!(h.group.invalid_rect(), int_rect(0, 0, 30, 10));
        assert_eq!(h.group.record(&red_square(0.0, 0.0).key).unwrap().rect, int_rect(20, 0, 10, 10));
    }

    #[test]
    fn unusable_explicit_region_is_a_full_repaint() {
        let mut h = Harness::new();
        h.frame(vec![red_square(0.0, 0.0)]);

        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let item = red_square(0.0, 0.0).with_invalidation(Invalidation::Region(LayoutRect::zero()));
        h.group.track_item(&item, &LayoutTransform2D::identity(), &mut h.owners);
        assert_eq!(h.group.invalid_rect(), int_rect(0, 0, 10, 10));
    }

    #[test]
    fn explicit_region_is_added_to_the_diff() {
        let mut h = Harness::new();
        h.frame(vec![red_square(0.0, 0.0)]);

        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let item = red_square(0.0, 0.0).with_invalidation(Invalidation::Region(rect(2.0, 2.0, 3.0, 3.0)));
        h.group.track_item(&item, &LayoutTransform2D::identity(), &mut h.owners);
        assert_eq!(h.group.invalid_rect(), int_rect(0, 0, 10, 10));
    }

    #[test]
    fn huge_background_covers_the_group() {
        let mut h = Harness::new();
        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let background = DisplayItem::new(
            DisplayItemKey::new(FrameId(1), 1),
            rect(-3e9, -3e9, 6e9, 6e9),
            DisplayItemKind::SolidColor { color: ColorF::new(0.0, 0.0, 1.0, 1.0) },
        );
        let list = DisplayList::from(vec![background]);
        h.group.track_item(&list.items()[0], &LayoutTransform2D::identity(), &mut h.owners);
        assert_eq!(h.group.invalid_rect(), int_rect(0, 0, 100, 100));

        let frame = h.end(&list, ResourceUpdates::new());
        assert!(matches!(frame.outcome, EndGroupOutcome::Added(_)));
        let pixels = added_pixels(&frame.updates);
        let last = (100 * 100 - 1) * 4;
        assert_eq!(&pixels[last..last + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn painting_clears_the_invalid_flag() {
        let mut h = Harness::new();
        h.begin(rect(0.0, 0.0, 100.0, 100.0));
        let list = DisplayList::from(vec![red_square(0.0, 0.0)]);
        h.group.track_item(&list.items()[0], &LayoutTransform2D::identity(), &mut h.owners);
        assert!(h.group.record(&list.items()[0].key).unwrap().invalid);
        h.end(&list, ResourceUpdates::new());
        assert!(!h.group.record(&list.items()[0].key).unwrap().invalid);
    }

    fn added_descriptor(updates: &ResourceUpdates) -> ImageDescriptor {
        match updates.updates[0] {
            ResourceUpdate::AddImage(ref add) => add.descriptor,
            ref other => panic!("expected an add, got {:?}", other),
        }
    }

    #[test]
    fn fully_covered_image_is_opaque() {
        let mut h = Harness::new();
        let mut cover = red_square(0.0, 0.0);
        cover.bounds = rect(0.0, 0.0, 100.0, 100.0);
        let frame = h.frame(vec![cover]);
        assert!(added_descriptor(&frame.updates).is_opaque());

        let mut h = Harness::new();
        let frame = h.frame(vec![red_square(0.0, 0.0)]);
        assert!(!added_descriptor(&frame.updates).is_opaque());
    }
}
