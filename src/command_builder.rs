/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Turns a display list into a command stream, resource updates and scroll
//! data, once per transaction.

use api::{
    device_rect_to_layout, layout_rect_to_device, ColorF, DeviceIntPoint, DeviceIntRect, DeviceIntSize,
    DisplayListBuilder, ImageDescriptor, ImageFormat, ImageKey, ImageKeyGenerator,
    LayoutTransform, ResourceUpdates, ScrollId,
};
use crate::blob_item_data::{GroupId, ItemOwners};
use crate::display_item::{DisplayItem, DisplayItemKind, DisplayList, EventRegions, RasterImage};
use crate::draw_target::{DrawTarget, PaintState};
use crate::freelist::FreeList;
use crate::group::{EndGroupOutcome, Group};
use crate::internal_types::{DisplayItemKey, FrameId, PaintSequenceNumber};
use crate::scroll_data::{LayerScrollData, ScrollMetadataProvider, WebRenderScrollData};
use crate::stacking_context::StackingContextHelper;
use crate::user_data::{FallbackData, GroupData, ImageData, UserDataCache};
use crate::util::{rect_is_empty, round_out, ProfileScope};
use log::{debug, trace, warn};
use std::ops::Range;

#[derive(Clone, Debug)]
pub struct BuilderOptions {
    pub device_pixel_ratio: f32,
    /// Rasterize inactive content under `Grouped` items into shared images.
    pub enable_grouping: bool,
    /// Produce per-layer scroll and hit-test data.
    pub enable_async_scrolling: bool,
    /// Largest image dimension we will rasterize.
    pub max_texture_size: i32,
    /// Upper bound on bytes uploaded per transaction.
    pub resource_byte_budget: Option<usize>,
    /// Tint every freshly painted area.
    pub highlight_painted_layers: bool,
}

impl Default for BuilderOptions {
    fn default() -> BuilderOptions {
        BuilderOptions {
            device_pixel_ratio: 1.0,
            enable_grouping: true,
            enable_async_scrolling: true,
            max_texture_size: 8192,
            resource_byte_budget: None,
            highlight_painted_layers: false,
        }
    }
}

/// Where a build writes its output.
pub struct CommandSink<'a> {
    pub builder: &'a mut DisplayListBuilder,
    pub resources: &'a mut ResourceUpdates,
    pub keys: &'a ImageKeyGenerator,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuildStats {
    pub groups_painted: usize,
    pub groups_reused: usize,
    pub groups_skipped: usize,
    pub fallbacks_painted: usize,
    pub fallbacks_reused: usize,
    pub images_uploaded: usize,
}

pub struct CommandBuilder {
    pub(crate) options: BuilderOptions,
    pub(crate) groups: FreeList<Group>,
    pub(crate) owners: ItemOwners,
    pub(crate) group_data: UserDataCache<GroupData>,
    fallback_data: UserDataCache<FallbackData>,
    image_data: UserDataCache<ImageData>,
    /// Keys whose images are no longer referenced; deleted at the end of
    /// the next build.
    pub(crate) discarded_keys: Vec<ImageKey>,
    pub(crate) paint_sequence: PaintSequenceNumber,
    do_grouping: bool,
    layer_scroll_data: Vec<LayerScrollData>,
    asr_stack: Vec<Option<ScrollId>>,
    last_asr: Option<ScrollId>,
    pub(crate) stats: BuildStats,
}

impl CommandBuilder {
    pub fn new(options: BuilderOptions) -> CommandBuilder {
        CommandBuilder {
            options,
            groups: FreeList::new(),
            owners: ItemOwners::new(),
            group_data: UserDataCache::new(),
            fallback_data: UserDataCache::new(),
            image_data: UserDataCache::new(),
            discarded_keys: Vec::new(),
            paint_sequence: PaintSequenceNumber::default(),
            do_grouping: false,
            layer_scroll_data: Vec::new(),
            asr_stack: Vec::new(),
            last_asr: None,
            stats: BuildStats::default(),
        }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn paint_sequence(&self) -> PaintSequenceNumber {
        self.paint_sequence
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        if self.groups.contains(id) {
            Some(self.groups.get(id))
        } else {
            None
        }
    }

    /// Groups hanging off the item with `key`, if it has any.
    pub fn group_data(&self, key: &DisplayItemKey) -> Option<GroupData> {
        self.group_data.get(key).cloned()
    }

    /// One full traversal of `list`.
    pub fn build_commands(
        &mut self,
        list: &DisplayList,
        provider: &dyn ScrollMetadataProvider,
        sink: &mut CommandSink,
        is_first_paint: bool,
    ) -> WebRenderScrollData {
        let _profile = ProfileScope::new("build_commands");

        self.paint_sequence = self.paint_sequence.next();
        self.stats = BuildStats::default();
        self.do_grouping = false;
        self.last_asr = None;
        debug_assert!(self.layer_scroll_data.is_empty());
        debug_assert!(self.asr_stack.is_empty());

        let mut scroll_data = WebRenderScrollData::new(self.paint_sequence, is_first_paint);
        let sc = StackingContextHelper::root();
        self.create_commands_from_display_list(list, None, &sc, sink, &mut scroll_data, provider);

        // A root layer with everything else as descendants.
        let mut root = LayerScrollData::new();
        root.initialize_root(self.layer_scroll_data.len());
        if let Some(metadata) = provider.root_metadata() {
            root.append_scroll_metadata(&mut scroll_data, metadata);
        }
        self.layer_scroll_data.push(root);
        // Layers were produced children first; expose them parent first.
        for layer in self.layer_scroll_data.drain(..).rev() {
            scroll_data.add_layer_data(layer);
        }

        self.remove_unused_user_data();
        for key in self.discarded_keys.drain(..) {
            sink.resources.delete_image(key);
        }

        debug!("build {:?}: {:?}", self.paint_sequence, self.stats);
        scroll_data
    }

    pub(crate) fn create_commands_from_display_list(
        &mut self,
        list: &DisplayList,
        wrapping_item: Option<&DisplayItem>,
        sc: &StackingContextHelper,
        sink: &mut CommandSink,
        scroll_data: &mut WebRenderScrollData,
        provider: &dyn ScrollMetadataProvider,
    ) {
        if self.do_grouping {
            let wrapping_item = match wrapping_item {
                Some(item) => item,
                None => panic!("grouping requires a wrapping item"),
            };
            self.do_grouping_for_display_list(list, wrapping_item, sc, sink, scroll_data, provider);
            return;
        }

        let async_scrolling = self.options.enable_async_scrolling;
        let mut event_regions = EventRegions::default();

        for item in list.iter() {
            let regions = match item.kind {
                DisplayItemKind::EventRegions(ref regions) => {
                    if regions.is_empty() {
                        continue;
                    }
                    Some(regions)
                }
                _ => None,
            };

            let mut force_new_layer = false;
            let layer_count_before = self.layer_scroll_data.len();
            if async_scrolling {
                force_new_layer = item.updates_scroll_data();

                // Items under a different scrolled root cannot share a layer.
                if item.asr != self.last_asr {
                    self.last_asr = item.asr;
                    force_new_layer = true;
                }

                if force_new_layer && !event_regions.is_empty() {
                    match self.layer_scroll_data.last_mut() {
                        Some(layer) => layer.add_event_regions(&event_regions),
                        None => panic!("pending event regions without a layer"),
                    }
                    event_regions.set_empty();
                }

                if let Some(regions) = regions {
                    event_regions.or_with(regions);
                    if self.layer_scroll_data.is_empty() {
                        force_new_layer = true;
                    }
                }

                if force_new_layer {
                    self.asr_stack.push(item.asr);
                }
            }

            if regions.is_none() {
                let saved_do_grouping = self.do_grouping;
                if let DisplayItemKind::Grouped { .. } = item.kind {
                    self.do_grouping = self.options.enable_grouping;
                }
                let created = self.create_webrender_commands(item, sc, sink, scroll_data, provider);
                if !created {
                    self.push_item_as_image(item, sc, sink);
                }
                self.do_grouping = saved_do_grouping;
            }

            if async_scrolling {
                if force_new_layer {
                    self.asr_stack.pop();
                    let stop_at = self.asr_stack.last().cloned().unwrap_or(None);
                    let descendants = self.layer_scroll_data.len() - layer_count_before;
                    let mut layer = LayerScrollData::new();
                    layer.initialize(scroll_data, item, descendants, stop_at, provider);
                    self.layer_scroll_data.push(layer);
                } else if self.layer_scroll_data.len() != layer_count_before && !event_regions.is_empty() {
                    // Layers were created while recursing; the pending regions
                    // belong to the layer that was current before that.
                    assert!(layer_count_before > 0);
                    self.layer_scroll_data[layer_count_before - 1].add_event_regions(&event_regions);
                    event_regions.set_empty();
                }
            }
        }

        if !event_regions.is_empty() {
            match self.layer_scroll_data.last_mut() {
                Some(layer) => layer.add_event_regions(&event_regions),
                None => panic!("pending event regions without a layer"),
            }
        }
    }

    /// Emits native commands for `item`. Returns false if the item can
    /// only be drawn by rasterizing it.
    pub(crate) fn create_webrender_commands(
        &mut self,
        item: &DisplayItem,
        sc: &StackingContextHelper,
        sink: &mut CommandSink,
        scroll_data: &mut WebRenderScrollData,
        provider: &dyn ScrollMetadataProvider,
    ) -> bool {
        match item.kind {
            DisplayItemKind::SolidColor { color } => {
                sink.builder.push_rect(item.paint_bounds(), item.clip_rect(), color);
                true
            }
            DisplayItemKind::Image { ref image } => {
                self.push_raster_image(item, image, sink);
                true
            }
            DisplayItemKind::Border { .. } | DisplayItemKind::Gradient { .. } => false,
            DisplayItemKind::Transform { ref transform, ref children, .. } => {
                let child_sc = sc.child(Some(transform));
                sink.builder.push_stacking_context();
                self.create_commands_from_display_list(children, Some(item), &child_sc, sink, scroll_data, provider);
                sink.builder.pop_stacking_context(item.bounds, item.clip_rect(), *transform, 1.0, None);
                true
            }
            DisplayItemKind::Opacity { opacity, ref children, .. } => {
                sink.builder.push_stacking_context();
                self.create_commands_from_display_list(children, Some(item), sc, sink, scroll_data, provider);
                sink.builder.pop_stacking_context(
                    item.bounds,
                    item.clip_rect(),
                    LayoutTransform::identity(),
                    opacity,
                    None,
                );
                true
            }
            DisplayItemKind::ScrollFrame { scroll_id, ref children } => {
                sink.builder.push_stacking_context();
                self.create_commands_from_display_list(children, Some(item), sc, sink, scroll_data, provider);
                sink.builder.pop_stacking_context(
                    item.bounds,
                    item.clip_rect(),
                    LayoutTransform::identity(),
                    1.0,
                    Some(scroll_id),
                );
                true
            }
            DisplayItemKind::Container { ref children } | DisplayItemKind::Grouped { ref children } => {
                self.create_commands_from_display_list(children, Some(item), sc, sink, scroll_data, provider);
                true
            }
            DisplayItemKind::Iframe { pipeline_id } => {
                sink.builder.push_iframe(item.bounds, item.clip_rect(), pipeline_id);
                true
            }
            DisplayItemKind::EventRegions(..) => true,
        }
    }

    /// Uploads a raster image once and re-uploads it only when its
    /// generation changes.
    fn push_raster_image(&mut self, item: &DisplayItem, image: &RasterImage, sink: &mut CommandSink) {
        if image.width == 0 || image.height == 0 {
            trace!("skipping empty image {:?}", item.key);
            return;
        }

        let descriptor = ImageDescriptor::new(image.width, image.height, ImageFormat::BGRA8, false);
        let mut bytes = image.data.clone();
        api::premultiply(&mut bytes);

        let data = self.image_data.entry(item.key, self.paint_sequence).or_insert_with(ImageData::default);
        let key = match data.key {
            Some(key) if data.width == image.width && data.height == image.height => {
                if data.generation != image.generation {
                    let full = DeviceIntRect::new(
                        DeviceIntPoint::zero(),
                        DeviceIntSize::new(image.width as i32, image.height as i32),
                    );
                    match sink.resources.update_image(key, descriptor, bytes, full) {
                        Ok(()) => {
                            data.generation = image.generation;
                            self.stats.images_uploaded += 1;
                        }
                        Err(err) => warn!("image update for {:?} failed: {}", item.key, err),
                    }
                }
                key
            }
            stale => {
                let key = sink.keys.next_image_key();
                if let Err(err) = sink.resources.add_image(key, descriptor, bytes) {
                    warn!("image add for {:?} failed: {}", item.key, err);
                    return;
                }
                if let Some(old) = stale {
                    self.discarded_keys.push(old);
                }
                *data = ImageData {
                    key: Some(key),
                    generation: image.generation,
                    width: image.width,
                    height: image.height,
                };
                self.stats.images_uploaded += 1;
                key
            }
        };

        sink.builder.push_image(item.bounds, item.clip_rect(), None, key);
    }

    /// Rasterizes a single item into its own cached image.
    pub(crate) fn push_item_as_image(&mut self, item: &DisplayItem, sc: &StackingContextHelper, sink: &mut CommandSink) {
        let scale = self.options.device_pixel_ratio * sc.uniform_scale();
        let paint_bounds = item.paint_bounds();
        let device = round_out(&layout_rect_to_device(&paint_bounds, scale));
        if rect_is_empty(&device) {
            trace!("skipping fallback for {:?}, nothing to paint", item.key);
            return;
        }

        let max_texture_size = self.options.max_texture_size;
        let highlight = self.options.highlight_painted_layers;
        let discarded = &mut self.discarded_keys;
        let data = self
            .fallback_data
            .entry(item.key, self.paint_sequence)
            .or_insert_with(FallbackData::default);

        let needs_paint = match (data.key, data.geometry.as_ref()) {
            (Some(_), Some(old)) => {
                data.scale != scale ||
                    data.bounds != paint_bounds ||
                    data.size != device.size ||
                    item.is_invalid() ||
                    !rect_is_empty(&item.compute_invalidation_region(old))
            }
            _ => true,
        };

        let key = if needs_paint {
            let mut dt = match DrawTarget::new(device.size, max_texture_size) {
                Some(dt) => dt,
                None => {
                    warn!("fallback for {:?} of size {:?} cannot be rasterized", item.key, device.size);
                    return;
                }
            };
            let target_bounds = dt.bounds();
            item.paint(&mut dt, &PaintState::new(scale, device.origin, target_bounds));
            if highlight {
                dt.fill_device_rect(&target_bounds, ColorF::new(1.0, 0.0, 0.0, 0.5));
            }

            let descriptor = ImageDescriptor::new(
                device.size.width as u32,
                device.size.height as u32,
                ImageFormat::BGRA8,
                false,
            );
            let result = match data.key {
                Some(key) if data.size == device.size => sink
                    .resources
                    .update_image(key, descriptor, dt.into_data(), target_bounds)
                    .map(|()| key),
                old => {
                    let key = sink.keys.next_image_key();
                    sink.resources.add_image(key, descriptor, dt.into_data()).map(|()| {
                        if let Some(old) = old {
                            discarded.push(old);
                        }
                        key
                    })
                }
            };

            match result {
                Ok(key) => {
                    data.key = Some(key);
                    data.geometry = Some(item.allocate_geometry());
                    data.bounds = paint_bounds;
                    data.scale = scale;
                    data.size = device.size;
                    self.stats.fallbacks_painted += 1;
                    key
                }
                Err(err) => {
                    warn!("fallback upload for {:?} failed: {}", item.key, err);
                    match data.key {
                        Some(key) => key,
                        None => return,
                    }
                }
            }
        } else {
            self.stats.fallbacks_reused += 1;
            match data.key {
                Some(key) => key,
                None => return,
            }
        };

        let bounds = device_rect_to_layout(&device, scale);
        sink.builder.push_image(bounds, item.clip_rect(), None, key);
    }

    pub(crate) fn end_group(&mut self, id: GroupId, list: &DisplayList, range: Range<usize>, sink: &mut CommandSink) {
        let outcome = self.groups.get_mut(id).end_group(
            list,
            range,
            &mut self.owners,
            sink,
            &mut self.discarded_keys,
            &self.options,
        );
        match outcome {
            EndGroupOutcome::Added(..) | EndGroupOutcome::Updated(..) => self.stats.groups_painted += 1,
            EndGroupOutcome::Reused(..) => self.stats.groups_reused += 1,
            EndGroupOutcome::Skipped | EndGroupOutcome::UploadFailed => self.stats.groups_skipped += 1,
            EndGroupOutcome::Empty => {}
        }
    }

    pub(crate) fn free_group(&mut self, id: GroupId) {
        let mut group = self.groups.free(id);
        trace!("freeing group {:?}", id);
        group.clear_items(&mut self.owners);
        group.discard_image(&mut self.discarded_keys);
    }

    /// Evicts user data the last build did not touch.
    fn remove_unused_user_data(&mut self) {
        let sequence = self.paint_sequence;
        for data in self.group_data.expire_old_resources(sequence) {
            for id in data.groups() {
                self.free_group(id);
            }
        }
        for data in self.fallback_data.expire_old_resources(sequence) {
            self.discarded_keys.extend(data.key);
        }
        for data in self.image_data.expire_old_resources(sequence) {
            self.discarded_keys.extend(data.key);
        }
    }

    /// Forgets everything belonging to a destroyed layout frame. Freed
    /// image keys are deleted with the next build.
    pub fn remove_frame(&mut self, frame: FrameId) {
        for data in self.group_data.remove_frame(frame) {
            for id in data.groups() {
                self.free_group(id);
            }
        }
        for data in self.fallback_data.remove_frame(frame) {
            self.discarded_keys.extend(data.key);
        }
        for data in self.image_data.remove_frame(frame) {
            self.discarded_keys.extend(data.key);
        }

        let ids = self.groups.iter().map(|(id, _)| id).collect::<Vec<_>>();
        let mut removed = 0;
        for id in ids {
            removed += self.groups.get_mut(id).remove_frame_items(frame, &mut self.owners);
        }
        self.owners.remove_frame(frame);
        debug!("removed frame {:?}, {} grouped items", frame, removed);
    }

    /// Drops every cache and returns the keys that must be deleted.
    pub fn clear_cached_resources(&mut self) -> Vec<ImageKey> {
        let ids = self.groups.iter().map(|(id, _)| id).collect::<Vec<_>>();
        for id in ids {
            self.free_group(id);
        }
        self.group_data.drain();
        for data in self.fallback_data.drain() {
            self.discarded_keys.extend(data.key);
        }
        for data in self.image_data.drain() {
            self.discarded_keys.extend(data.key);
        }
        self.owners.clear();
        self.take_discarded_keys()
    }

    pub fn take_discarded_keys(&mut self) -> Vec<ImageKey> {
        std::mem::replace(&mut self.discarded_keys, Vec::new())
    }
}
