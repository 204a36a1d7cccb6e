/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::{DeviceIntRect, LayoutTransform, LayoutTransform2D};
use crate::display_item::ItemGeometry;
use crate::freelist::FreeListItemId;
use crate::internal_types::{DisplayItemKey, FastHashMap, FrameId};

pub type GroupId = FreeListItemId;

/// Cross-frame paint state of one display item inside a group.
#[derive(Debug)]
pub struct BlobItemData {
    pub key: DisplayItemKey,
    pub group: GroupId,
    /// Last painted rectangle, relative to the group origin.
    pub rect: DeviceIntRect,
    pub geometry: Option<ItemGeometry>,
    /// Accumulated transform from inactive ancestors inside the group.
    pub matrix: LayoutTransform2D,
    pub transform: Option<LayoutTransform>,
    pub opacity: Option<f32>,
    /// Changed since it was last painted.
    pub invalid: bool,
    pub used: bool,
}

impl BlobItemData {
    pub fn new(key: DisplayItemKey, group: GroupId) -> BlobItemData {
        BlobItemData {
            key,
            group,
            rect: DeviceIntRect::zero(),
            geometry: None,
            matrix: LayoutTransform2D::identity(),
            transform: None,
            opacity: None,
            invalid: false,
            used: false,
        }
    }
}

/// Which group currently holds the record for each display item.
///
/// This is the lookup layout frames would otherwise carry as a property:
/// records are found by item identity, and a frame going away is a scan
/// over this table.
#[derive(Debug, Default)]
pub struct ItemOwners {
    owners: FastHashMap<DisplayItemKey, GroupId>,
}

impl ItemOwners {
    pub fn new() -> ItemOwners {
        ItemOwners::default()
    }

    pub fn owner(&self, key: &DisplayItemKey) -> Option<GroupId> {
        self.owners.get(key).cloned()
    }

    pub fn claim(&mut self, key: DisplayItemKey, group: GroupId) {
        self.owners.insert(key, group);
    }

    /// Forgets `key`, but only if `group` still owns it.
    pub fn release(&mut self, key: &DisplayItemKey, group: GroupId) {
        if self.owners.get(key) == Some(&group) {
            self.owners.remove(key);
        }
    }

    /// Drops every entry of a destroyed frame. The records themselves stay in
    /// their groups until the next sweep so their area still gets repainted.
    pub fn remove_frame(&mut self, frame: FrameId) -> usize {
        let before = self.owners.len();
        self.owners.retain(|key, _| key.frame != frame);
        before - self.owners.len()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}
