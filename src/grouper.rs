/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Splits grouped content into groups.
//!
//! Inactive items accumulate in the current group. Every active item ends
//! the current group, is emitted as native commands, and starts a new
//! group for the items after it.

use api::{LayoutRect, LayoutTransform2D};
use crate::blob_item_data::GroupId;
use crate::command_builder::{CommandBuilder, CommandSink};
use crate::display_item::{DisplayItem, DisplayItemKind, DisplayList};
use crate::group::Group;
use crate::internal_types::DisplayItemKey;
use crate::scroll_data::{ScrollMetadataProvider, WebRenderScrollData};
use crate::stacking_context::StackingContextHelper;
use crate::user_data::GroupData;
use log::{debug, trace};

/// The state threaded through a grouping traversal.
#[derive(Clone, Copy, Debug)]
pub struct GroupingContext {
    /// Transform from the current item's space to the group's space.
    pub transform: LayoutTransform2D,
    pub group: GroupId,
}

impl GroupingContext {
    pub fn new(group: GroupId) -> GroupingContext {
        GroupingContext {
            transform: LayoutTransform2D::identity(),
            group,
        }
    }
}

fn sub_group(data: &mut GroupData) -> &mut Option<GroupId> {
    &mut data.sub_group
}

fn following_group(data: &mut GroupData) -> &mut Option<GroupId> {
    &mut data.following_group
}

impl CommandBuilder {
    fn ensure_group(&mut self, key: DisplayItemKey, slot: fn(&mut GroupData) -> &mut Option<GroupId>) -> GroupId {
        let groups = &mut self.groups;
        let data = self
            .group_data
            .entry(key, self.paint_sequence)
            .or_insert_with(GroupData::default);
        *slot(data).get_or_insert_with(|| groups.insert_with(Group::new))
    }

    /// Gives `group` the bounds and scale of this traversal.
    fn prepare_group(&mut self, group: GroupId, bounds: LayoutRect, scale: f32) {
        let sequence = self.paint_sequence;
        self.groups
            .get_mut(group)
            .update_bounds(bounds, scale, sequence, &mut self.owners, &mut self.discarded_keys);
    }

    pub(crate) fn do_grouping_for_display_list(
        &mut self,
        list: &DisplayList,
        wrapping_item: &DisplayItem,
        sc: &StackingContextHelper,
        sink: &mut CommandSink,
        scroll_data: &mut WebRenderScrollData,
        provider: &dyn ScrollMetadataProvider,
    ) {
        let scale = self.options.device_pixel_ratio * sc.uniform_scale();
        let group = self.ensure_group(wrapping_item.key, sub_group);
        self.prepare_group(group, wrapping_item.bounds, scale);
        debug!(
            "grouping {} items of {:?} into {:?} at scale {}",
            list.len(),
            wrapping_item.key,
            group,
            scale,
        );
        self.construct_groups(list, GroupingContext::new(group), sc, sink, scroll_data, provider);
    }

    fn construct_groups(
        &mut self,
        list: &DisplayList,
        context: GroupingContext,
        sc: &StackingContextHelper,
        sink: &mut CommandSink,
        scroll_data: &mut WebRenderScrollData,
        provider: &dyn ScrollMetadataProvider,
    ) {
        let mut group = context.group;
        let mut start = 0;

        for (index, item) in list.iter().enumerate() {
            if !item.is_active() {
                self.construct_item_inside_inactive(item, GroupingContext { group, ..context });
                continue;
            }

            trace!("active item {:?} ends group {:?}", item.key, group);
            self.end_group(group, list, start..index, sink);

            let created = self.create_webrender_commands(item, sc, sink, scroll_data, provider);
            assert!(created, "active item {:?} has no native commands", item.key);

            let (bounds, scale) = {
                let current = self.groups.get(group);
                (current.group_bounds(), current.scale())
            };
            let next = self.ensure_group(item.key, following_group);
            self.prepare_group(next, bounds, scale);
            group = next;
            start = index + 1;
        }

        self.end_group(group, list, start..list.len(), sink);
    }

    fn construct_item_inside_inactive(&mut self, item: &DisplayItem, context: GroupingContext) {
        if let Some(owner) = self.owners.owner(&item.key) {
            if owner != context.group && self.groups.contains(owner) {
                self.groups.get_mut(owner).evict(&item.key, &mut self.owners);
            }
        }
        self.groups
            .get_mut(context.group)
            .track_item(item, &context.transform, &mut self.owners);

        match item.kind {
            DisplayItemKind::Transform { ref transform, ref children, .. } => {
                assert!(transform.is_2d(), "inactive transform on {:?} is not 2D", item.key);
                let context = GroupingContext {
                    transform: transform.to_2d().then(&context.transform),
                    ..context
                };
                for child in children.iter() {
                    self.construct_item_inside_inactive(child, context);
                }
            }
            _ => {
                if let Some(children) = item.children() {
                    for child in children.iter() {
                        self.construct_item_inside_inactive(child, context);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_builder::BuilderOptions;
    use crate::internal_types::FrameId;
    use crate::scroll_data::ScrollMetadata;
    use api::{
        ColorF, DeviceIntPoint, DeviceIntRect, DeviceIntSize, DisplayListBuilder, IdNamespace,
        ImageKey, ImageKeyGenerator, LayoutPoint, LayoutSize, LayoutTransform, PipelineId,
        ResourceUpdate, ResourceUpdates, ScrollId, WrCommand,
    };

    fn no_metadata(_: ScrollId) -> Option<ScrollMetadata> {
        None
    }

    fn key(n: u32) -> DisplayItemKey {
        DisplayItemKey::new(FrameId(1), n)
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> LayoutRect {
        LayoutRect::new(LayoutPoint::new(x, y), LayoutSize::new(w, h))
    }

    fn square(n: u32, x: f32, y: f32) -> DisplayItem {
        DisplayItem::new(
            key(n),
            rect(x, y, 10.0, 10.0),
            DisplayItemKind::SolidColor { color: ColorF::new(0.0, 1.0, 0.0, 1.0) },
        )
    }

    fn grouped(n: u32, children: Vec<DisplayItem>) -> DisplayItem {
        DisplayItem::new(
            key(n),
            rect(0.0, 0.0, 100.0, 100.0),
            DisplayItemKind::Grouped { children: children.into() },
        )
    }

    fn container(n: u32, children: Vec<DisplayItem>) -> DisplayItem {
        DisplayItem::new(
            key(n),
            rect(0.0, 0.0, 100.0, 100.0),
            DisplayItemKind::Container { children: children.into() },
        )
    }

    fn animated(n: u32, children: Vec<DisplayItem>) -> DisplayItem {
        DisplayItem::new(
            key(n),
            rect(0.0, 0.0, 100.0, 100.0),
            DisplayItemKind::Transform {
                transform: LayoutTransform::identity(),
                animated: true,
                children: children.into(),
            },
        )
    }

    struct Harness {
        builder: CommandBuilder,
        keys: ImageKeyGenerator,
    }

    impl Harness {
        fn new(options: BuilderOptions) -> Harness {
            Harness {
                builder: CommandBuilder::new(options),
                keys: ImageKeyGenerator::new(IdNamespace(7)),
            }
        }

        fn build(&mut self, items: Vec<DisplayItem>) -> (Vec<WrCommand>, ResourceUpdates) {
            let list = DisplayList::from(items);
            let mut commands = DisplayListBuilder::new(PipelineId(0, 1));
            let mut resources = ResourceUpdates::new();
            {
                let mut sink = CommandSink {
                    builder: &mut commands,
                    resources: &mut resources,
                    keys: &self.keys,
                };
                self.builder.build_commands(&list, &no_metadata, &mut sink, false);
            }
            (commands.commands().to_vec(), resources)
        }
    }

    fn added_keys(resources: &ResourceUpdates) -> Vec<ImageKey> {
        resources
            .iter()
            .filter_map(|update| match *update {
                ResourceUpdate::AddImage(ref add) => Some(add.key),
                _ => None,
            })
            .collect()
    }

    fn image_keys(commands: &[WrCommand]) -> Vec<ImageKey> {
        commands
            .iter()
            .filter_map(|command| match *command {
                WrCommand::Image { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn inactive_items_share_one_image() {
        let mut h = Harness::new(BuilderOptions::default());
        let (commands, resources) = h.build(vec![grouped(1, vec![square(2, 0.0, 0.0), square(3, 50.0, 50.0)])]);
        assert_eq!(added_keys(&resources).len(), 1);
        assert_eq!(image_keys(&commands), added_keys(&resources));
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn grouping_can_be_disabled() {
        let options = BuilderOptions {
            enable_grouping: false,
            ..BuilderOptions::default()
        };
        let mut h = Harness::new(options);
        let (commands, resources) = h.build(vec![grouped(1, vec![square(2, 0.0, 0.0), square(3, 50.0, 50.0)])]);
        assert!(resources.is_empty());
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| match *c {
            WrCommand::Rect { .. } => true,
            _ => false,
        }));
    }

    #[test]
    fn nested_active_item_splits_every_ancestor() {
        let mut h = Harness::new(BuilderOptions::default());
        let items = vec![grouped(1, vec![
            square(2, 0.0, 0.0),
            container(3, vec![container(4, vec![animated(5, vec![square(6, 20.0, 20.0)])])]),
            square(7, 50.0, 50.0),
        ])];

        let (commands, resources) = h.build(items.clone());
        let added = added_keys(&resources);
        assert_eq!(added.len(), 3);
        match commands.as_slice() {
            [WrCommand::Image { key: before, .. }, WrCommand::PushStackingContext, WrCommand::Image { key: inside, .. }, WrCommand::PopStackingContext { .. }, WrCommand::Image { key: after, .. }] => {
                assert_eq!(vec![*before, *inside, *after], added);
            }
            other => panic!("unexpected commands {:?}", other),
        }

        // The outer wrapper has no animation of its own but still ends the
        // first group and starts another one after it.
        let wrapper = h.builder.group_data(&key(3)).unwrap();
        assert!(wrapper.following_group.is_some());
        assert!(wrapper.sub_group.is_some());
        let first = h.builder.group_data(&key(1)).unwrap().sub_group.unwrap();
        assert_eq!(h.builder.group(first).unwrap().item_count(), 1);

        let (again, resources) = h.build(items);
        assert!(resources.is_empty());
        assert_eq!(image_keys(&again), added);
        assert_eq!(h.builder.stats().groups_reused, 3);
        assert_eq!(h.builder.stats().groups_painted, 0);
    }

    #[test]
    fn item_moving_between_groups_is_evicted_from_the_old_one() {
        let mut h = Harness::new(BuilderOptions::default());
        let (_, first) = h.build(vec![grouped(1, vec![
            square(2, 0.0, 0.0),
            animated(3, vec![square(4, 30.0, 30.0)]),
            square(5, 60.0, 60.0),
        ])]);
        let added = added_keys(&first);
        assert_eq!(added.len(), 3);
        let following = h.builder.group_data(&key(3)).unwrap().following_group.unwrap();
        let following_key = h.builder.group(following).unwrap().key().unwrap();

        let (_, second) = h.build(vec![grouped(1, vec![
            square(2, 0.0, 0.0),
            square(5, 60.0, 60.0),
            animated(3, vec![square(4, 30.0, 30.0)]),
        ])]);

        let mut saw_update = false;
        let mut saw_delete = false;
        for update in second.iter() {
            match *update {
                ResourceUpdate::UpdateImage(ref update) => {
                    assert_eq!(update.key, added[0]);
                    assert_eq!(
                        update.dirty_rect,
                        DeviceIntRect::new(DeviceIntPoint::new(60, 60), DeviceIntSize::new(10, 10)),
                    );
                    saw_update = true;
                }
                ResourceUpdate::DeleteImage(key) => {
                    assert_eq!(key, following_key);
                    saw_delete = true;
                }
                ResourceUpdate::AddImage(..) => panic!("nothing new should be added"),
            }
        }
        assert!(saw_update && saw_delete);
        assert_eq!(h.builder.group(following).unwrap().item_count(), 0);
    }

    #[test]
    fn vanished_wrapper_frees_its_group() {
        let mut h = Harness::new(BuilderOptions::default());
        let (_, first) = h.build(vec![grouped(1, vec![square(2, 0.0, 0.0)])]);
        assert_eq!(h.builder.group_count(), 1);

        let (commands, second) = h.build(vec![square(9, 0.0, 0.0)]);
        assert_eq!(h.builder.group_count(), 0);
        assert_eq!(commands.len(), 1);
        match second.updates.as_slice() {
            [ResourceUpdate::DeleteImage(key)] => assert_eq!(vec![*key], added_keys(&first)),
            other => panic!("unexpected updates {:?}", other),
        }
    }

    #[test]
    fn inactive_transform_moves_children() {
        let mut h = Harness::new(BuilderOptions::default());
        let moved = DisplayItem::new(
            key(3),
            rect(0.0, 0.0, 100.0, 100.0),
            DisplayItemKind::Transform {
                transform: LayoutTransform::translation(40.0, 0.0, 0.0),
                animated: false,
                children: vec![square(4, 0.0, 0.0)].into(),
            },
        );
        h.build(vec![grouped(1, vec![moved])]);
        let group = h.builder.group_data(&key(1)).unwrap().sub_group.unwrap();
        let record = h.builder.group(group).unwrap().record(&key(4)).unwrap();
        assert_eq!(record.rect, DeviceIntRect::new(DeviceIntPoint::new(40, 0), DeviceIntSize::new(10, 10)));
    }
}
