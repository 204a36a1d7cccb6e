/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct FreeListItemId(u32);

impl FreeListItemId {
    #[inline]
    pub fn new(value: u32) -> FreeListItemId {
        FreeListItemId(value)
    }

    #[inline]
    pub fn value(&self) -> u32 {
        let FreeListItemId(value) = *self;
        value
    }
}

enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<FreeListItemId> },
}

/// A vector whose freed slots are recycled by later inserts. Ids of freed
/// items must not be used again.
pub struct FreeList<T> {
    items: Vec<Slot<T>>,
    first_free_index: Option<FreeListItemId>,
    live_count: usize,
}

impl<T> FreeList<T> {
    pub fn new() -> FreeList<T> {
        FreeList {
            items: Vec::new(),
            first_free_index: None,
            live_count: 0,
        }
    }

    pub fn insert(&mut self, item: T) -> FreeListItemId {
        self.live_count += 1;
        match self.first_free_index {
            Some(free_index) => {
                let slot = &mut self.items[free_index.value() as usize];
                self.first_free_index = match *slot {
                    Slot::Vacant { next_free } => next_free,
                    Slot::Occupied(..) => unreachable!("free list points at a live item"),
                };
                *slot = Slot::Occupied(item);
                free_index
            }
            None => {
                let item_id = FreeListItemId(self.items.len() as u32);
                self.items.push(Slot::Occupied(item));
                item_id
            }
        }
    }

    /// Inserts an item built from the id it is about to receive.
    pub fn insert_with<F>(&mut self, f: F) -> FreeListItemId
    where
        F: FnOnce(FreeListItemId) -> T,
    {
        let id = match self.first_free_index {
            Some(free_index) => free_index,
            None => FreeListItemId(self.items.len() as u32),
        };
        let inserted = self.insert(f(id));
        debug_assert_eq!(inserted, id);
        inserted
    }

    pub fn get(&self, id: FreeListItemId) -> &T {
        match self.items[id.value() as usize] {
            Slot::Occupied(ref item) => item,
            Slot::Vacant { .. } => panic!("stale free list id {:?}", id),
        }
    }

    pub fn get_mut(&mut self, id: FreeListItemId) -> &mut T {
        match self.items[id.value() as usize] {
            Slot::Occupied(ref mut item) => item,
            Slot::Vacant { .. } => panic!("stale free list id {:?}", id),
        }
    }

    pub fn contains(&self, id: FreeListItemId) -> bool {
        match self.items.get(id.value() as usize) {
            Some(Slot::Occupied(..)) => true,
            _ => false,
        }
    }

    pub fn free(&mut self, id: FreeListItemId) -> T {
        let slot = std::mem::replace(
            &mut self.items[id.value() as usize],
            Slot::Vacant { next_free: self.first_free_index },
        );
        match slot {
            Slot::Occupied(item) => {
                self.first_free_index = Some(id);
                self.live_count -= 1;
                item
            }
            Slot::Vacant { .. } => panic!("double free of free list id {:?}", id),
        }
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (FreeListItemId, &T)> {
        self.items.iter().enumerate().filter_map(|(index, slot)| match *slot {
            Slot::Occupied(ref item) => Some((FreeListItemId(index as u32), item)),
            Slot::Vacant { .. } => None,
        })
    }
}
