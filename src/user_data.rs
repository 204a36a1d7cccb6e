/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Per-item state kept by the command builder between transactions.

use api::{DeviceIntSize, ImageKey, LayoutRect};
use crate::blob_item_data::GroupId;
use crate::display_item::ItemGeometry;
use crate::internal_types::{DisplayItemKey, FastHashMap, FrameId, PaintSequenceNumber};
use std::collections::hash_map::Entry;

/// Groups hanging off an item: `sub_group` collects the inactive items
/// inside a grouping container, `following_group` those after an active
/// item.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroupData {
    pub sub_group: Option<GroupId>,
    pub following_group: Option<GroupId>,
}

impl GroupData {
    pub fn groups(&self) -> impl Iterator<Item = GroupId> {
        self.sub_group.into_iter().chain(self.following_group)
    }
}

/// A whole item painted into its own image because it has no native
/// command.
#[derive(Clone, Debug)]
pub struct FallbackData {
    pub key: Option<ImageKey>,
    pub geometry: Option<ItemGeometry>,
    pub bounds: LayoutRect,
    /// Device pixels per layout pixel the image was painted at.
    pub scale: f32,
    pub size: DeviceIntSize,
}

impl Default for FallbackData {
    fn default() -> FallbackData {
        FallbackData {
            key: None,
            geometry: None,
            bounds: LayoutRect::zero(),
            scale: 1.0,
            size: DeviceIntSize::zero(),
        }
    }
}

/// The image a raster item was last uploaded as.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImageData {
    pub key: Option<ImageKey>,
    pub generation: u32,
    pub width: u32,
    pub height: u32,
}

/// User data keyed by item, aged by the traversal that last touched it.
pub struct UserDataCache<V> {
    resources: FastHashMap<DisplayItemKey, V>,
    last_access_times: FastHashMap<DisplayItemKey, PaintSequenceNumber>,
}

impl<V> UserDataCache<V> {
    pub fn new() -> UserDataCache<V> {
        UserDataCache {
            resources: FastHashMap::default(),
            last_access_times: FastHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, key: &DisplayItemKey) -> Option<&V> {
        self.resources.get(key)
    }

    pub fn contains(&self, key: &DisplayItemKey) -> bool {
        self.resources.contains_key(key)
    }

    pub fn entry(&mut self, key: DisplayItemKey, sequence: PaintSequenceNumber) -> Entry<DisplayItemKey, V> {
        self.last_access_times.insert(key, sequence);
        self.resources.entry(key)
    }

    /// Removes and returns everything not touched during `sequence`.
    pub fn expire_old_resources(&mut self, sequence: PaintSequenceNumber) -> Vec<V> {
        let expired = self
            .last_access_times
            .iter()
            .filter(|&(_, last)| *last < sequence)
            .map(|(key, _)| *key)
            .collect::<Vec<_>>();
        self.remove_keys(expired)
    }

    /// Removes and returns everything belonging to items of `frame`.
    pub fn remove_frame(&mut self, frame: FrameId) -> Vec<V> {
        let doomed = self
            .resources
            .keys()
            .filter(|key| key.frame == frame)
            .cloned()
            .collect::<Vec<_>>();
        self.remove_keys(doomed)
    }

    pub fn drain(&mut self) -> Vec<V> {
        self.last_access_times.clear();
        self.resources.drain().map(|(_, v)| v).collect()
    }

    fn remove_keys(&mut self, keys: Vec<DisplayItemKey>) -> Vec<V> {
        keys.into_iter()
            .filter_map(|key| {
                self.last_access_times.remove(&key);
                self.resources.remove(&key)
            })
            .collect()
    }
}
