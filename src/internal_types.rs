/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use fxhash::FxHasher;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;

pub type FastHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastHashSet<K> = HashSet<K, BuildHasherDefault<FxHasher>>;

/// Identity of a layout frame that owns display items.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct FrameId(pub u32);

/// Stable identity of a display item: its frame plus a key that is unique
/// within that frame and survives re-listing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct DisplayItemKey {
    pub frame: FrameId,
    pub per_frame_key: u32,
}

impl DisplayItemKey {
    pub fn new(frame: FrameId, per_frame_key: u32) -> DisplayItemKey {
        DisplayItemKey { frame, per_frame_key }
    }
}

/// Counts full traversals of the display list. Cached per-item data that
/// was last touched by an older traversal is expired.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct PaintSequenceNumber(pub u32);

impl PaintSequenceNumber {
    pub fn next(&self) -> PaintSequenceNumber {
        PaintSequenceNumber(self.0 + 1)
    }
}
