/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::{ApiError, Epoch, PipelineId, RenderApi};
use crate::bridge::BridgeChild;
use crate::command_builder::{BuilderOptions, CommandBuilder};
use crate::display_item::DisplayList;
use crate::internal_types::FrameId;
use crate::scroll_data::{ScrollMetadataProvider, WebRenderScrollData};
use log::{debug, warn};

/// A painting session for one surface: the transaction bridge plus the
/// caches that survive from one paint to the next.
pub struct LayerManager {
    bridge: BridgeChild,
    builder: CommandBuilder,
    width: u32,
    height: u32,
    scroll_data: Option<WebRenderScrollData>,
    has_painted: bool,
}

impl LayerManager {
    pub fn new(
        api: RenderApi,
        pipeline_id: PipelineId,
        width: u32,
        height: u32,
        options: BuilderOptions,
    ) -> Result<LayerManager, ApiError> {
        let bridge = BridgeChild::new(api, pipeline_id, width, height, options.resource_byte_budget)?;
        Ok(LayerManager {
            bridge,
            builder: CommandBuilder::new(options),
            width,
            height,
            scroll_data: None,
            has_painted: false,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Paints `list` in one transaction. Returns `Ok(false)` without
    /// touching any cache when the remote side refuses to begin.
    pub fn end_transaction(
        &mut self,
        list: &DisplayList,
        provider: &dyn ScrollMetadataProvider,
    ) -> Result<bool, ApiError> {
        if !self.bridge.dp_begin(self.width, self.height)? {
            warn!("transaction refused, skipping paint");
            return Ok(false);
        }

        let is_first_paint = !self.has_painted;
        let scroll_data = {
            let mut sink = self.bridge.sink();
            self.builder.build_commands(list, provider, &mut sink, is_first_paint)
        };
        self.bridge.dp_end()?;

        debug!(
            "sent {:?} with {} scroll layers",
            self.bridge.epoch(),
            scroll_data.layers().len(),
        );
        self.has_painted = true;
        self.scroll_data = Some(scroll_data);
        Ok(true)
    }

    /// Scroll data of the last successful transaction.
    pub fn scroll_data(&self) -> Option<&WebRenderScrollData> {
        self.scroll_data.as_ref()
    }

    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    pub fn epoch(&self) -> Epoch {
        self.bridge.epoch()
    }

    pub fn pipeline_id(&self) -> PipelineId {
        self.bridge.pipeline_id()
    }

    /// A layout frame went away. Its images are deleted with the next
    /// transaction.
    pub fn remove_frame(&mut self, frame: FrameId) {
        self.builder.remove_frame(frame);
    }

    /// Drops every cached group and image, deleting their keys right away.
    pub fn clear_cached_resources(&mut self) -> Result<(), ApiError> {
        for key in self.builder.clear_cached_resources() {
            self.bridge.delete_image(key)?;
        }
        self.scroll_data = None;
        Ok(())
    }

    pub fn destroy(mut self) -> Result<(), ApiError> {
        self.clear_cached_resources()?;
        self.bridge.destroy()
    }
}
