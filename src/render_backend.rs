/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The remote side of the transaction protocol.

use api::channel::{MsgReceiver, Payload};
use api::{
    AddImage, ApiError, ApiMsg, BuiltDisplayList, BuiltDisplayListDescriptor, Epoch, IdNamespace,
    ImageKey, PipelineId, ResourceUpdate, ResourceUpdates, UpdateImage,
};
use crate::frame::{FrameBuilder, RenderedFrame};
use crate::resource_cache::ResourceCache;
use crate::util::ProfileScope;
use log::{debug, error, info, trace, warn};

/// Receives every frame the backend produces.
pub trait RenderNotifier: Send {
    fn new_frame_ready(&mut self, frame: &RenderedFrame);
}

/// The surface frames are presented to.
pub trait CompositorWidget: Send {
    /// Returns `false` when the surface cannot take a frame right now.
    fn pre_render(&mut self) -> bool;
    fn post_render(&mut self);
}

/// Per-surface state on the remote side: the image table plus whatever a
/// transaction in flight needs.
pub struct WrState {
    pipeline_id: PipelineId,
    width: u32,
    height: u32,
    resource_cache: ResourceCache,
    in_transaction: bool,
    // Deletions received while a transaction is open.
    pending_deletes: Vec<ImageKey>,
    epoch: Option<Epoch>,
}

impl WrState {
    pub fn new(width: u32, height: u32, pipeline_id: PipelineId) -> WrState {
        WrState {
            pipeline_id,
            width,
            height,
            resource_cache: ResourceCache::new(),
            in_transaction: false,
            pending_deletes: Vec::new(),
            epoch: None,
        }
    }

    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Epoch of the last frame built.
    pub fn epoch(&self) -> Option<Epoch> {
        self.epoch
    }

    pub fn resource_cache(&self) -> &ResourceCache {
        &self.resource_cache
    }

    pub fn add_image(&mut self, add: AddImage) {
        self.resource_cache.add_image(add);
    }

    pub fn update_image(&mut self, update: UpdateImage) {
        self.resource_cache.update_image(update);
    }

    /// Deferred to the end of the open transaction, if any.
    pub fn delete_image(&mut self, key: ImageKey) {
        if self.in_transaction {
            trace!("deferring delete of {:?}", key);
            self.pending_deletes.push(key);
        } else {
            self.resource_cache.delete_image(key);
        }
    }

    pub fn update_resources(&mut self, updates: ResourceUpdates) {
        for update in updates.updates {
            match update {
                ResourceUpdate::AddImage(add) => self.add_image(add),
                ResourceUpdate::UpdateImage(update) => self.update_image(update),
                ResourceUpdate::DeleteImage(key) => self.delete_image(key),
            }
        }
    }

    pub fn dp_begin(&mut self, width: u32, height: u32) {
        assert!(!self.in_transaction, "DpBegin inside a transaction");
        self.width = width;
        self.height = height;
        self.in_transaction = true;
    }

    /// Applies the transaction's adds and updates, interprets its commands
    /// and only then applies every deletion that arrived with or during it.
    pub fn dp_end(&mut self, payload: &[u8], resources: ResourceUpdates) -> Result<RenderedFrame, ApiError> {
        assert!(self.in_transaction, "DpEnd without DpBegin");
        self.in_transaction = false;

        let (updates, deletes) = resources.split_deletes();
        self.pending_deletes.extend(deletes);

        let result = self.build_frame(payload, updates);

        for key in self.pending_deletes.drain(..) {
            self.resource_cache.delete_image(key);
        }
        result
    }

    fn build_frame(&mut self, payload: &[u8], updates: Vec<ResourceUpdate>) -> Result<RenderedFrame, ApiError> {
        let _scope = ProfileScope::new("build_frame");
        let payload = Payload::from_data(payload)?;
        let display_list = BuiltDisplayList::from_data(
            payload.display_list_data,
            BuiltDisplayListDescriptor {
                command_count: payload.command_count,
            },
        );
        let commands = display_list.commands()?;
        if commands.len() != payload.command_count {
            warn!(
                "{:?} announced {} commands but carried {}",
                payload.epoch,
                payload.command_count,
                commands.len(),
            );
        }

        // Updates carry no deletions here, so nothing comes back.
        let leftover = self.resource_cache.apply_updates(updates);
        debug_assert!(leftover.is_empty());

        let frame = FrameBuilder::build_frame(self.pipeline_id, payload.epoch, commands, &self.resource_cache);
        self.epoch = Some(payload.epoch);
        Ok(frame)
    }

    /// Called once the frame was presented.
    pub fn end_frame(&mut self) {
        self.resource_cache.end_frame();
    }
}

pub struct RenderBackend {
    api_rx: MsgReceiver<ApiMsg>,
    next_namespace_id: IdNamespace,
    max_texture_size: u32,
    debug: bool,

    state: Option<WrState>,
    widget: Box<dyn CompositorWidget>,
    notifier: Box<dyn RenderNotifier>,
}

impl RenderBackend {
    pub fn new(
        api_rx: MsgReceiver<ApiMsg>,
        max_texture_size: u32,
        debug: bool,
        widget: Box<dyn CompositorWidget>,
        notifier: Box<dyn RenderNotifier>,
    ) -> RenderBackend {
        RenderBackend {
            api_rx,
            // Namespace 0 belongs to the api returned with the renderer.
            next_namespace_id: IdNamespace(1),
            max_texture_size,
            debug,
            state: None,
            widget,
            notifier,
        }
    }

    pub fn run(&mut self) {
        loop {
            let msg = self.api_rx.recv();
            match msg {
                Ok(msg) => {
                    trace!("backend received {:?}", msg);
                    match msg {
                        ApiMsg::CloneApi(sender) => {
                            let result = self.next_namespace_id;

                            let IdNamespace(id_namespace) = self.next_namespace_id;
                            self.next_namespace_id = IdNamespace(id_namespace + 1);

                            if sender.send(result).is_err() {
                                warn!("CloneApi requester went away");
                            }
                        }
                        ApiMsg::Create { width, height, pipeline_id } => {
                            assert!(self.state.is_none(), "Create while a state exists");
                            info!("creating {}x{} state for {:?}", width, height, pipeline_id);
                            self.state = Some(WrState::new(width, height, pipeline_id));
                        }
                        ApiMsg::Destroy => match self.state.take() {
                            Some(state) => {
                                assert!(!state.is_in_transaction(), "Destroy inside a transaction");
                                info!("destroyed state for {:?}", state.pipeline_id());
                            }
                            None => warn!("Destroy without a state"),
                        },
                        ApiMsg::UpdateResources(updates) => match self.state {
                            Some(ref mut state) => state.update_resources(updates),
                            None => warn!("dropping {} resource updates without a state", updates.len()),
                        },
                        ApiMsg::DpBegin { width, height, reply } => {
                            let accepted = self.begin(width, height);
                            if reply.send(accepted).is_err() {
                                warn!("DpBegin requester went away");
                            }
                        }
                        ApiMsg::DpEnd { payload, resources } => {
                            self.end(&payload, resources);
                        }
                        ApiMsg::ShutDown => {
                            info!("render backend shutting down");
                            break;
                        }
                    }
                }
                Err(..) => {
                    break;
                }
            }
        }
    }

    fn begin(&mut self, width: u32, height: u32) -> bool {
        let state = match self.state {
            Some(ref mut state) => state,
            None => {
                warn!("DpBegin without a state");
                return false;
            }
        };
        if width > self.max_texture_size || height > self.max_texture_size {
            warn!("refusing {}x{} frame, limit is {}", width, height, self.max_texture_size);
            return false;
        }
        if !self.widget.pre_render() {
            debug!("widget refused to render");
            return false;
        }
        state.dp_begin(width, height);
        true
    }

    fn end(&mut self, payload: &[u8], resources: ResourceUpdates) {
        let state = match self.state {
            Some(ref mut state) => state,
            None => panic!("DpEnd without a state"),
        };
        match state.dp_end(payload, resources) {
            Ok(frame) => {
                if self.debug {
                    debug!(
                        "frame {:?}: {} primitives, {} images live",
                        frame.epoch,
                        frame.primitive_count(),
                        state.resource_cache().len(),
                    );
                }
                self.widget.post_render();
                self.notifier.new_frame_ready(&frame);
                state.end_frame();
            }
            Err(err) => {
                error!("dropping transaction: {}", err);
                self.widget.post_render();
            }
        }
    }
}
