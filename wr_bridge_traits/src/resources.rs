/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::api::{ImageDescriptor, ImageKey};
use crate::error::ResourceUpdateError;
use crate::units::DeviceIntRect;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddImage {
    pub key: ImageKey,
    pub descriptor: ImageDescriptor,
    pub data: Vec<u8>,
}

/// Replaces `dirty_rect` of an existing image. `data` holds only the
/// pixels of the dirty rectangle, rows tightly packed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateImage {
    pub key: ImageKey,
    pub descriptor: ImageDescriptor,
    pub data: Vec<u8>,
    pub dirty_rect: DeviceIntRect,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResourceUpdate {
    AddImage(AddImage),
    UpdateImage(UpdateImage),
    DeleteImage(ImageKey),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdates {
    pub updates: Vec<ResourceUpdate>,
    byte_budget: Option<usize>,
    used_bytes: usize,
}

impl ResourceUpdates {
    pub fn new() -> ResourceUpdates {
        ResourceUpdates::default()
    }

    /// A queue that refuses uploads once `bytes` of pixel data were queued.
    pub fn with_byte_budget(bytes: usize) -> ResourceUpdates {
        ResourceUpdates {
            byte_budget: Some(bytes),
            ..ResourceUpdates::default()
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    fn reserve(&mut self, requested: usize) -> Result<(), ResourceUpdateError> {
        if let Some(budget) = self.byte_budget {
            let remaining = budget.saturating_sub(self.used_bytes);
            if requested > remaining {
                return Err(ResourceUpdateError::BudgetExhausted { requested, remaining });
            }
        }
        self.used_bytes += requested;
        Ok(())
    }

    pub fn add_image(
        &mut self,
        key: ImageKey,
        descriptor: ImageDescriptor,
        data: Vec<u8>,
    ) -> Result<(), ResourceUpdateError> {
        let expected = descriptor.compute_total_size() as usize;
        if data.len() != expected {
            return Err(ResourceUpdateError::SizeMismatch {
                key,
                expected,
                actual: data.len(),
            });
        }
        self.reserve(data.len())?;
        self.updates.push(ResourceUpdate::AddImage(AddImage {
            key,
            descriptor,
            data,
        }));
        Ok(())
    }

    pub fn update_image(
        &mut self,
        key: ImageKey,
        descriptor: ImageDescriptor,
        data: Vec<u8>,
        dirty_rect: DeviceIntRect,
    ) -> Result<(), ResourceUpdateError> {
        assert!(
            dirty_rect.origin.x >= 0 &&
                dirty_rect.origin.y >= 0 &&
                dirty_rect.max_x() <= descriptor.width as i32 &&
                dirty_rect.max_y() <= descriptor.height as i32,
            "dirty rect {:?} exceeds image {:?} ({}x{})",
            dirty_rect,
            key,
            descriptor.width,
            descriptor.height,
        );
        let expected = (dirty_rect.size.width * dirty_rect.size.height) as usize *
            descriptor.bytes_per_pixel() as usize;
        if data.len() != expected {
            return Err(ResourceUpdateError::SizeMismatch {
                key,
                expected,
                actual: data.len(),
            });
        }
        self.reserve(data.len())?;
        self.updates.push(ResourceUpdate::UpdateImage(UpdateImage {
            key,
            descriptor,
            data,
            dirty_rect,
        }));
        Ok(())
    }

    pub fn delete_image(&mut self, key: ImageKey) {
        self.updates.push(ResourceUpdate::DeleteImage(key));
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn iter(&self) -> std::slice::Iter<ResourceUpdate> {
        self.updates.iter()
    }

    pub fn clear(&mut self) {
        self.updates.clear();
        self.used_bytes = 0;
    }

    /// Separates deletions, which must wait until the commands of the
    /// transaction they arrived with have been interpreted.
    pub fn split_deletes(self) -> (Vec<ResourceUpdate>, Vec<ImageKey>) {
        let mut deletes = Vec::new();
        let mut others = Vec::with_capacity(self.updates.len());
        for update in self.updates {
            match update {
                ResourceUpdate::DeleteImage(key) => deletes.push(key),
                other => others.push(other),
            }
        }
        (others, deletes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{IdNamespace, ImageFormat};
    use crate::units::{DeviceIntPoint, DeviceIntSize};

    fn key(id: u32) -> ImageKey {
        ImageKey(IdNamespace(1), id)
    }

    #[test]
    fn budget_refuses_oversized_uploads() {
        let descriptor = ImageDescriptor::new(4, 4, ImageFormat::BGRA8, false);
        let mut updates = ResourceUpdates::with_byte_budget(100);
        assert_eq!(
            updates.add_image(key(0), descriptor, vec![0; 64]),
            Ok(())
        );
        assert_eq!(
            updates.add_image(key(1), descriptor, vec![0; 64]),
            Err(ResourceUpdateError::BudgetExhausted { requested: 64, remaining: 36 })
        );
        assert_eq!(updates.len(), 1);
    }

    #[test]
    fn update_payload_covers_dirty_rect_only() {
        let descriptor = ImageDescriptor::new(100, 100, ImageFormat::BGRA8, false);
        let dirty = DeviceIntRect::new(DeviceIntPoint::new(0, 0), DeviceIntSize::new(60, 60));
        let mut updates = ResourceUpdates::new();
        assert!(updates.update_image(key(0), descriptor, vec![0; 60 * 60 * 4], dirty).is_ok());
        assert!(updates.update_image(key(0), descriptor, vec![0; 100 * 100 * 4], dirty).is_err());
    }

    #[test]
    #[should_panic]
    fn dirty_rect_outside_image_panics() {
        let descriptor = ImageDescriptor::new(10, 10, ImageFormat::BGRA8, false);
        let dirty = DeviceIntRect::new(DeviceIntPoint::new(5, 5), DeviceIntSize::new(6, 1));
        let mut updates = ResourceUpdates::new();
        let _ = updates.update_image(key(0), descriptor, vec![0; 24], dirty);
    }

    #[test]
    fn deletes_are_split_out() {
        let descriptor = ImageDescriptor::new(1, 1, ImageFormat::A8, false);
        let mut updates = ResourceUpdates::new();
        updates.delete_image(key(0));
        updates.add_image(key(1), descriptor, vec![0]).unwrap();
        updates.delete_image(key(2));
        let (others, deletes) = updates.split_deletes();
        assert_eq!(others.len(), 1);
        assert_eq!(deletes, vec![key(0), key(2)]);
    }
}
