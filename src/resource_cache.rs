/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::{
    AddImage, DeviceIntPoint, DeviceIntRect, DeviceIntSize, Epoch, ImageDescriptor, ImageKey,
    ResourceUpdate, UpdateImage,
};
use crate::internal_types::FastHashMap;
use crate::util::union_rect;
use log::trace;

/// A remote image and the area changed since the last frame used it.
#[derive(Clone, Debug)]
pub struct ImageResource {
    pub descriptor: ImageDescriptor,
    pub data: Vec<u8>,
    /// Bumped by every update.
    pub epoch: Epoch,
    pub dirty_rect: Option<DeviceIntRect>,
}

impl ImageResource {
    fn full_rect(&self) -> DeviceIntRect {
        DeviceIntRect::new(
            DeviceIntPoint::zero(),
            DeviceIntSize::new(self.descriptor.width as i32, self.descriptor.height as i32),
        )
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let o = (y * self.descriptor.compute_stride() + x * 4) as usize;
        [self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]]
    }
}

/// The consumer's image table. Keys are handed out by the producer; any
/// reference to a key the table does not hold is a protocol violation.
pub struct ResourceCache {
    images: FastHashMap<ImageKey, ImageResource>,
}

impl ResourceCache {
    pub fn new() -> ResourceCache {
        ResourceCache {
            images: FastHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains_image(&self, key: ImageKey) -> bool {
        self.images.contains_key(&key)
    }

    pub fn get_image(&self, key: ImageKey) -> &ImageResource {
        match self.images.get(&key) {
            Some(image) => image,
            None => panic!("reference to unknown image {:?}", key),
        }
    }

    pub fn add_image(&mut self, add: AddImage) {
        assert!(!self.images.contains_key(&add.key), "image {:?} added twice", add.key);
        trace!("adding {:?} {}x{}", add.key, add.descriptor.width, add.descriptor.height);
        let mut image = ImageResource {
            descriptor: add.descriptor,
            data: add.data,
            epoch: Epoch(0),
            dirty_rect: None,
        };
        image.dirty_rect = Some(image.full_rect());
        self.images.insert(add.key, image);
    }

    /// Copies the dirty sub-rectangle into the stored image.
    pub fn update_image(&mut self, update: UpdateImage) {
        let image = match self.images.get_mut(&update.key) {
            Some(image) => image,
            None => panic!("update of unknown image {:?}", update.key),
        };
        assert_eq!(
            (image.descriptor.width, image.descriptor.height),
            (update.descriptor.width, update.descriptor.height),
            "update of {:?} changes its size",
            update.key,
        );

        let bpp = image.descriptor.bytes_per_pixel() as usize;
        let stride = image.descriptor.compute_stride() as usize;
        let rect = update.dirty_rect;
        let row_bytes = rect.size.width as usize * bpp;
        for row in 0..rect.size.height as usize {
            let dst = (rect.origin.y as usize + row) * stride + rect.origin.x as usize * bpp;
            let src = row * row_bytes;
            image.data[dst..dst + row_bytes].copy_from_slice(&update.data[src..src + row_bytes]);
        }

        // Picks up a change of the opaque flag.
        image.descriptor = update.descriptor;
        image.epoch = image.epoch.next();
        image.dirty_rect = Some(match image.dirty_rect {
            Some(ref dirty) => union_rect(dirty, &rect),
            None => rect,
        });
        trace!("updated {:?} in {:?}", update.key, rect);
    }

    pub fn delete_image(&mut self, key: ImageKey) {
        if self.images.remove(&key).is_none() {
            panic!("delete of unknown image {:?}", key);
        }
        trace!("deleted {:?}", key);
    }

    /// Applies adds and updates and returns the deletions, which the caller
    /// applies once the commands that came with them have been consumed.
    pub fn apply_updates(&mut self, updates: Vec<ResourceUpdate>) -> Vec<ImageKey> {
        let mut deletes = Vec::new();
        for update in updates {
            match update {
                ResourceUpdate::AddImage(add) => self.add_image(add),
                ResourceUpdate::UpdateImage(update) => self.update_image(update),
                ResourceUpdate::DeleteImage(key) => deletes.push(key),
            }
        }
        deletes
    }

    /// Forgets per-frame dirty state.
    pub fn end_frame(&mut self) {
        for image in self.images.values_mut() {
            image.dirty_rect = None;
        }
    }
}
