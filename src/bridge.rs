/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Producer end of the transaction protocol.
//!
//! Commands are only accepted between a successful `dp_begin` and the
//! matching `dp_end`, and are shipped together in one message at
//! `dp_end`. Image updates made during a transaction travel with it;
//! outside of one they are sent right away.

use api::{
    ApiError, ColorF, DeviceIntRect, DisplayListBuilder, Epoch, ImageDescriptor, ImageKey,
    ImageKeyGenerator, ImageMask, LayoutRect, LayoutTransform, PipelineId, RenderApi,
    ResourceUpdates, ScrollId,
};
use crate::command_builder::CommandSink;
use log::{debug, trace};

pub struct BridgeChild {
    api: RenderApi,
    pipeline_id: PipelineId,
    in_transaction: bool,
    commands: DisplayListBuilder,
    pending_resources: ResourceUpdates,
    resource_byte_budget: Option<usize>,
    epoch: Epoch,
}

impl BridgeChild {
    /// Creates the remote state for a `width` x `height` surface.
    pub fn new(
        api: RenderApi,
        pipeline_id: PipelineId,
        width: u32,
        height: u32,
        resource_byte_budget: Option<usize>,
    ) -> Result<BridgeChild, ApiError> {
        api.create(width, height, pipeline_id)?;
        Ok(BridgeChild {
            api,
            pipeline_id,
            in_transaction: false,
            commands: DisplayListBuilder::new(pipeline_id),
            pending_resources: ResourceUpdates::new(),
            resource_byte_budget,
            epoch: Epoch(0),
        })
    }

    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline_id
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Epoch of the last transaction sent.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn key_generator(&self) -> &ImageKeyGenerator {
        self.api.key_generator()
    }

    /// Commands recorded so far in the open transaction.
    pub fn pending_command_count(&self) -> usize {
        self.commands.len()
    }

    fn fresh_resources(&self) -> ResourceUpdates {
        match self.resource_byte_budget {
            Some(bytes) => ResourceUpdates::with_byte_budget(bytes),
            None => ResourceUpdates::new(),
        }
    }

    /// Opens a transaction. `Ok(false)` means the remote side refused and
    /// nothing changed.
    pub fn dp_begin(&mut self, width: u32, height: u32) -> Result<bool, ApiError> {
        assert!(!self.in_transaction, "dp_begin inside a transaction");
        if !self.api.dp_begin(width, height)? {
            debug!("remote refused a {}x{} transaction", width, height);
            return Ok(false);
        }
        self.commands.clear();
        self.pending_resources = self.fresh_resources();
        self.in_transaction = true;
        Ok(true)
    }

    /// Ships everything recorded since `dp_begin` as a single message.
    pub fn dp_end(&mut self) -> Result<(), ApiError> {
        assert!(self.in_transaction, "dp_end outside a transaction");
        self.in_transaction = false;
        let display_list = self.commands.finalize()?;
        let resources = std::mem::replace(&mut self.pending_resources, ResourceUpdates::new());
        self.epoch = self.epoch.next();
        trace!(
            "sending {:?}: {} commands, {} resource updates",
            self.epoch,
            display_list.descriptor().command_count,
            resources.len(),
        );
        self.api.dp_end(self.epoch, display_list, resources)
    }

    /// Access for the command builder while a transaction is open.
    pub fn sink(&mut self) -> CommandSink {
        assert!(self.in_transaction, "building commands outside a transaction");
        CommandSink {
            builder: &mut self.commands,
            resources: &mut self.pending_resources,
            keys: self.api.key_generator(),
        }
    }

    pub fn push_stacking_context(&mut self) {
        assert!(self.in_transaction);
        self.commands.push_stacking_context();
    }

    pub fn pop_stacking_context(
        &mut self,
        bounds: LayoutRect,
        overflow: LayoutRect,
        transform: LayoutTransform,
        opacity: f32,
        scroll_id: Option<ScrollId>,
    ) {
        assert!(self.in_transaction);
        self.commands.pop_stacking_context(bounds, overflow, transform, opacity, scroll_id);
    }

    pub fn dp_push_rect(&mut self, bounds: LayoutRect, clip: LayoutRect, color: ColorF) {
        assert!(self.in_transaction);
        self.commands.push_rect(bounds, clip, color);
    }

    pub fn dp_push_image(&mut self, bounds: LayoutRect, clip: LayoutRect, mask: Option<ImageMask>, key: ImageKey) {
        assert!(self.in_transaction);
        self.commands.push_image(bounds, clip, mask, key);
    }

    pub fn dp_push_iframe(&mut self, bounds: LayoutRect, clip: LayoutRect, pipeline_id: PipelineId) {
        assert!(self.in_transaction);
        self.commands.push_iframe(bounds, clip, pipeline_id);
    }

    pub fn add_image(&mut self, descriptor: ImageDescriptor, data: Vec<u8>) -> Result<ImageKey, ApiError> {
        if !self.in_transaction {
            return self.api.add_image(descriptor, data);
        }
        let key = self.api.generate_image_key();
        self.pending_resources.add_image(key, descriptor, data)?;
        Ok(key)
    }

    pub fn update_image(
        &mut self,
        key: ImageKey,
        descriptor: ImageDescriptor,
        data: Vec<u8>,
        dirty_rect: DeviceIntRect,
    ) -> Result<(), ApiError> {
        if self.in_transaction {
            self.pending_resources.update_image(key, descriptor, data, dirty_rect)?;
            return Ok(());
        }
        self.api.update_image(key, descriptor, data, dirty_rect)
    }

    /// Deletes made during a transaction take effect after its commands
    /// were interpreted.
    pub fn delete_image(&mut self, key: ImageKey) -> Result<(), ApiError> {
        if self.in_transaction {
            self.pending_resources.delete_image(key);
            return Ok(());
        }
        self.api.delete_image(key)
    }

    /// Tears down the remote state.
    pub fn destroy(self) -> Result<(), ApiError> {
        assert!(!self.in_transaction, "destroying with an open transaction");
        self.api.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::channel::{msg_channel, Payload};
    use api::{ApiMsg, BuiltDisplayList, BuiltDisplayListDescriptor, IdNamespace, ImageFormat, LayoutPoint, LayoutSize, ResourceUpdate, WrCommand};
    use std::thread;

    enum Seen {
        Create,
        Begin,
        Update(ResourceUpdates),
        End(Vec<WrCommand>, ResourceUpdates),
        Other,
    }

    /// A remote that answers `dp_begin` with `accept` and records the rest.
    fn bridge(accept: bool) -> (BridgeChild, thread::JoinHandle<Vec<Seen>>) {
        let (tx, rx) = msg_channel::<ApiMsg>().unwrap();
        let remote = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Ok(msg) = rx.recv() {
                seen.push(match msg {
                    ApiMsg::Create { .. } => Seen::Create,
                    ApiMsg::DpBegin { reply, .. } => {
                        reply.send(accept).unwrap();
                        Seen::Begin
                    }
                    ApiMsg::UpdateResources(updates) => Seen::Update(updates),
                    ApiMsg::DpEnd { payload, resources } => {
                        let payload = Payload::from_data(&payload).unwrap();
                        let list = BuiltDisplayList::from_data(
                            payload.display_list_data,
                            BuiltDisplayListDescriptor { command_count: payload.command_count },
                        );
                        Seen::End(list.commands().unwrap(), resources)
                    }
                    _ => Seen::Other,
                });
            }
            seen
        });
        let api = RenderApi::new(tx, IdNamespace(1));
        (BridgeChild::new(api, PipelineId(0, 1), 800, 600, None).unwrap(), remote)
    }

    fn rect() -> LayoutRect {
        LayoutRect::new(LayoutPoint::zero(), LayoutSize::new(10.0, 10.0))
    }

    #[test]
    fn refused_begin_stays_idle() {
        let (mut child, remote) = bridge(false);
        assert_eq!(child.dp_begin(800, 600).unwrap(), false);
        assert!(!child.is_in_transaction());
        assert_eq!(child.pending_command_count(), 0);
        drop(child);

        let seen = remote.join().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(match seen[0] { Seen::Create => true, _ => false });
        assert!(match seen[1] { Seen::Begin => true, _ => false });
    }

    #[test]
    fn transaction_ships_commands_and_resources_once() {
        let (mut child, remote) = bridge(true);
        assert!(child.dp_begin(800, 600).unwrap());
        let descriptor = ImageDescriptor::new(1, 1, ImageFormat::BGRA8, true);
        let key = child.add_image(descriptor, vec![0, 0, 0, 255]).unwrap();
        child.push_stacking_context();
        child.dp_push_rect(rect(), rect(), ColorF::new(1.0, 0.0, 0.0, 1.0));
        child.dp_push_image(rect(), rect(), None, key);
        child.pop_stacking_context(rect(), rect(), LayoutTransform::identity(), 1.0, None);
        child.delete_image(key).unwrap();
        child.dp_end().unwrap();
        assert!(!child.is_in_transaction());
        assert_eq!(child.epoch(), Epoch(1));
        drop(child);

        let seen = remote.join().unwrap();
        assert_eq!(seen.len(), 3);
        match seen[2] {
            Seen::End(ref commands, ref resources) => {
                assert_eq!(commands.len(), 4);
                assert_eq!(commands[2], WrCommand::Image { bounds: rect(), clip: rect(), mask: None, key });
                assert_eq!(resources.len(), 2);
                assert_eq!(resources.updates[1], ResourceUpdate::DeleteImage(key));
            }
            _ => panic!("expected the transaction last"),
        }
    }

    #[test]
    fn idle_resource_changes_are_sent_immediately() {
        let (mut child, remote) = bridge(true);
        let descriptor = ImageDescriptor::new(1, 1, ImageFormat::BGRA8, true);
        let key = child.add_image(descriptor, vec![0, 0, 0, 255]).unwrap();
        child.delete_image(key).unwrap();
        drop(child);

        let seen = remote.join().unwrap();
        assert_eq!(seen.len(), 3);
        match seen[2] {
            Seen::Update(ref updates) => assert_eq!(updates.updates, vec![ResourceUpdate::DeleteImage(key)]),
            _ => panic!("expected a resource update"),
        }
    }

    #[test]
    #[should_panic]
    fn commands_outside_a_transaction_panic() {
        let (mut child, _remote) = bridge(true);
        child.dp_push_rect(rect(), rect(), ColorF::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    #[should_panic(expected = "dp_begin inside a transaction")]
    fn nested_begin_panics() {
        let (mut child, _remote) = bridge(true);
        assert!(child.dp_begin(10, 10).unwrap());
        let _ = child.dp_begin(10, 10);
    }

    #[test]
    fn unbalanced_commands_fail_to_end() {
        let (mut child, _remote) = bridge(true);
        assert!(child.dp_begin(10, 10).unwrap());
        child.push_stacking_context();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| child.dp_end()));
        assert!(result.is_err());
    }
}
