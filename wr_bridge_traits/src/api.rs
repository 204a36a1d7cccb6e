/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::channel::{self, MsgSender, Payload};
use crate::display_list::BuiltDisplayList;
use crate::error::ApiError;
use crate::resources::ResourceUpdates;
use crate::units::DeviceIntRect;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct IdNamespace(pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ImageKey(pub IdNamespace, pub u32);

impl ImageKey {
    pub fn new(namespace: IdNamespace, id: u32) -> ImageKey {
        ImageKey(namespace, id)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Epoch(pub u32);

impl Epoch {
    pub fn next(&self) -> Epoch {
        Epoch(self.0 + 1)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PipelineId(pub u32, pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ScrollId(pub u64);

/// Hands out image keys within one id namespace. Keys are never reused.
#[derive(Debug)]
pub struct ImageKeyGenerator {
    namespace: IdNamespace,
    next_id: Cell<u32>,
}

impl ImageKeyGenerator {
    pub fn new(namespace: IdNamespace) -> ImageKeyGenerator {
        ImageKeyGenerator {
            namespace,
            next_id: Cell::new(0),
        }
    }

    pub fn namespace(&self) -> IdNamespace {
        self.namespace
    }

    pub fn next_image_key(&self) -> ImageKey {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ImageKey(self.namespace, id)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ImageFormat {
    Invalid,
    A8,
    RGB8,
    BGRA8,
    RGBAF32,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            ImageFormat::A8 => Some(1),
            ImageFormat::RGB8 => Some(3),
            ImageFormat::BGRA8 => Some(4),
            ImageFormat::RGBAF32 => Some(16),
            ImageFormat::Invalid => None,
        }
    }
}

bitflags! {
    #[derive(Serialize, Deserialize)]
    pub struct ImageDescriptorFlags: u32 {
        /// Every pixel of the image has an alpha of 1.0.
        const IS_OPAQUE = 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub stride: Option<u32>,
    pub format: ImageFormat,
    pub flags: ImageDescriptorFlags,
}

impl ImageDescriptor {
    pub fn new(width: u32, height: u32, format: ImageFormat, is_opaque: bool) -> ImageDescriptor {
        let mut flags = ImageDescriptorFlags::empty();
        if is_opaque {
            flags.insert(ImageDescriptorFlags::IS_OPAQUE);
        }
        ImageDescriptor {
            width,
            height,
            stride: None,
            format,
            flags,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel().unwrap_or(0)
    }

    pub fn compute_stride(&self) -> u32 {
        self.stride.unwrap_or(self.width * self.bytes_per_pixel())
    }

    pub fn compute_total_size(&self) -> u32 {
        self.compute_stride() * self.height
    }

    pub fn is_opaque(&self) -> bool {
        self.flags.contains(ImageDescriptorFlags::IS_OPAQUE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorF {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> ColorF {
        ColorF { r, g, b, a }
    }
}

#[cfg_attr(feature = "ipc", derive(Serialize, Deserialize))]
pub enum ApiMsg {
    /// Hands out a fresh id namespace for another `RenderApi`.
    CloneApi(MsgSender<IdNamespace>),
    Create {
        width: u32,
        height: u32,
        pipeline_id: PipelineId,
    },
    Destroy,
    /// Image updates sent outside of a transaction.
    UpdateResources(ResourceUpdates),
    DpBegin {
        width: u32,
        height: u32,
        reply: MsgSender<bool>,
    },
    DpEnd {
        payload: Vec<u8>,
        resources: ResourceUpdates,
    },
    ShutDown,
}

impl std::fmt::Debug for ApiMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match *self {
            ApiMsg::CloneApi(..) => "ApiMsg::CloneApi",
            ApiMsg::Create { .. } => "ApiMsg::Create",
            ApiMsg::Destroy => "ApiMsg::Destroy",
            ApiMsg::UpdateResources(..) => "ApiMsg::UpdateResources",
            ApiMsg::DpBegin { .. } => "ApiMsg::DpBegin",
            ApiMsg::DpEnd { .. } => "ApiMsg::DpEnd",
            ApiMsg::ShutDown => "ApiMsg::ShutDown",
        })
    }
}

#[derive(Clone)]
pub struct RenderApiSender {
    api_sender: MsgSender<ApiMsg>,
}

impl RenderApiSender {
    pub fn new(api_sender: MsgSender<ApiMsg>) -> RenderApiSender {
        RenderApiSender { api_sender }
    }

    /// Creates a new resource API object with a dedicated namespace.
    pub fn create_api(&self) -> Result<RenderApi, ApiError> {
        let (sync_tx, sync_rx) = channel::msg_channel()?;
        self.api_sender
            .send(ApiMsg::CloneApi(sync_tx))
            .map_err(|_| ApiError::ChannelClosed)?;
        let namespace = sync_rx.recv().map_err(|_| ApiError::ChannelClosed)?;
        Ok(RenderApi::new(self.api_sender.clone(), namespace))
    }
}

pub struct RenderApi {
    api_sender: MsgSender<ApiMsg>,
    keys: ImageKeyGenerator,
}

impl RenderApi {
    pub fn new(api_sender: MsgSender<ApiMsg>, namespace: IdNamespace) -> RenderApi {
        RenderApi {
            api_sender,
            keys: ImageKeyGenerator::new(namespace),
        }
    }

    pub fn id_namespace(&self) -> IdNamespace {
        self.keys.namespace()
    }

    pub fn key_generator(&self) -> &ImageKeyGenerator {
        &self.keys
    }

    pub fn generate_image_key(&self) -> ImageKey {
        self.keys.next_image_key()
    }

    fn send(&self, msg: ApiMsg) -> Result<(), ApiError> {
        self.api_sender.send(msg).map_err(|_| ApiError::ChannelClosed)
    }

    pub fn create(&self, width: u32, height: u32, pipeline_id: PipelineId) -> Result<(), ApiError> {
        self.send(ApiMsg::Create { width, height, pipeline_id })
    }

    pub fn destroy(&self) -> Result<(), ApiError> {
        self.send(ApiMsg::Destroy)
    }

    /// Uploads an image immediately and returns its key.
    pub fn add_image(&self, descriptor: ImageDescriptor, data: Vec<u8>) -> Result<ImageKey, ApiError> {
        let key = self.generate_image_key();
        let mut updates = ResourceUpdates::new();
        updates.add_image(key, descriptor, data)?;
        self.update_resources(updates)?;
        Ok(key)
    }

    /// Replaces `dirty_rect` of an uploaded image; `data` holds only the
    /// dirty pixels.
    pub fn update_image(
        &self,
        key: ImageKey,
        descriptor: ImageDescriptor,
        data: Vec<u8>,
        dirty_rect: DeviceIntRect,
    ) -> Result<(), ApiError> {
        let mut updates = ResourceUpdates::new();
        updates.update_image(key, descriptor, data, dirty_rect)?;
        self.update_resources(updates)
    }

    pub fn delete_image(&self, key: ImageKey) -> Result<(), ApiError> {
        let mut updates = ResourceUpdates::new();
        updates.delete_image(key);
        self.update_resources(updates)
    }

    pub fn update_resources(&self, updates: ResourceUpdates) -> Result<(), ApiError> {
        if updates.is_empty() {
            return Ok(());
        }
        self.send(ApiMsg::UpdateResources(updates))
    }

    /// Asks the remote side to start a frame. `Ok(false)` means it refused.
    pub fn dp_begin(&self, width: u32, height: u32) -> Result<bool, ApiError> {
        let (reply, reply_rx) = channel::msg_channel()?;
        self.send(ApiMsg::DpBegin { width, height, reply })?;
        reply_rx.recv().map_err(|_| ApiError::ChannelClosed)
    }

    pub fn dp_end(
        &self,
        epoch: Epoch,
        display_list: BuiltDisplayList,
        resources: ResourceUpdates,
    ) -> Result<(), ApiError> {
        let payload = Payload {
            epoch,
            command_count: display_list.descriptor().command_count,
            display_list_data: display_list.into_data(),
        };
        self.send(ApiMsg::DpEnd {
            payload: payload.to_data()?,
            resources,
        })
    }

    pub fn shut_down(&self) -> Result<(), ApiError> {
        self.send(ApiMsg::ShutDown)
    }
}
