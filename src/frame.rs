/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::{
    ColorF, Epoch, ImageKey, ImageMask, LayoutRect, LayoutTransform, PipelineId, ScrollId,
    WrCommand,
};
use crate::resource_cache::ResourceCache;
use log::trace;

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Rect {
        bounds: LayoutRect,
        clip: LayoutRect,
        color: ColorF,
    },
    Image {
        bounds: LayoutRect,
        clip: LayoutRect,
        mask: Option<ImageMask>,
        key: ImageKey,
        /// Epoch of the image contents this frame was built against.
        image_epoch: Epoch,
    },
    Iframe {
        bounds: LayoutRect,
        clip: LayoutRect,
        pipeline_id: PipelineId,
    },
    StackingContext(StackingContext),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackingContext {
    pub bounds: LayoutRect,
    pub overflow: LayoutRect,
    pub transform: LayoutTransform,
    pub opacity: f32,
    pub scroll_id: Option<ScrollId>,
    pub children: Vec<Primitive>,
}

/// The interpreted result of one transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFrame {
    pub pipeline_id: PipelineId,
    pub epoch: Epoch,
    pub root: Vec<Primitive>,
}

impl RenderedFrame {
    /// Every image key the frame references, in document order.
    pub fn image_keys(&self) -> Vec<ImageKey> {
        fn collect(primitives: &[Primitive], keys: &mut Vec<ImageKey>) {
            for primitive in primitives {
                match *primitive {
                    Primitive::Image { key, ref mask, .. } => {
                        keys.push(key);
                        if let Some(ref mask) = *mask {
                            keys.push(mask.image);
                        }
                    }
                    Primitive::StackingContext(ref sc) => collect(&sc.children, keys),
                    Primitive::Rect { .. } | Primitive::Iframe { .. } => {}
                }
            }
        }
        let mut keys = Vec::new();
        collect(&self.root, &mut keys);
        keys
    }

    pub fn primitive_count(&self) -> usize {
        fn count(primitives: &[Primitive]) -> usize {
            primitives
                .iter()
                .map(|p| match *p {
                    Primitive::StackingContext(ref sc) => 1 + count(&sc.children),
                    _ => 1,
                })
                .sum()
        }
        count(&self.root)
    }
}

/// Rebuilds the nesting of a command stream. The stack here is
/// independent of the producer's: a stream that does not balance is a
/// protocol violation.
pub struct FrameBuilder {
    pipeline_id: PipelineId,
    epoch: Epoch,
    stack: Vec<Vec<Primitive>>,
}

impl FrameBuilder {
    pub fn new(pipeline_id: PipelineId, epoch: Epoch) -> FrameBuilder {
        FrameBuilder {
            pipeline_id,
            epoch,
            stack: vec![Vec::new()],
        }
    }

    fn current(&mut self) -> &mut Vec<Primitive> {
        match self.stack.last_mut() {
            Some(list) => list,
            None => panic!("frame nesting stack underflow"),
        }
    }

    pub fn add_command(&mut self, command: WrCommand, resources: &ResourceCache) {
        match command {
            WrCommand::PushStackingContext => {
                self.stack.push(Vec::new());
            }
            WrCommand::PopStackingContext { bounds, overflow, transform, opacity, scroll_id } => {
                if self.stack.len() < 2 {
                    panic!("PopStackingContext without a matching push");
                }
                let children = self.stack.pop().unwrap_or_default();
                self.current().push(Primitive::StackingContext(StackingContext {
                    bounds,
                    overflow,
                    transform,
                    opacity,
                    scroll_id,
                    children,
                }));
            }
            WrCommand::Rect { bounds, clip, color } => {
                self.current().push(Primitive::Rect { bounds, clip, color });
            }
            WrCommand::Image { bounds, clip, mask, key } => {
                let image_epoch = resources.get_image(key).epoch;
                if let Some(ref mask) = mask {
                    resources.get_image(mask.image);
                }
                self.current().push(Primitive::Image { bounds, clip, mask, key, image_epoch });
            }
            WrCommand::Iframe { bounds, clip, pipeline_id } => {
                self.current().push(Primitive::Iframe { bounds, clip, pipeline_id });
            }
        }
    }

    pub fn build(mut self) -> RenderedFrame {
        assert_eq!(self.stack.len(), 1, "{} stacking contexts left open", self.stack.len() - 1);
        let root = self.stack.pop().unwrap_or_default();
        trace!("built frame {:?} for {:?}", self.epoch, self.pipeline_id);
        RenderedFrame {
            pipeline_id: self.pipeline_id,
            epoch: self.epoch,
            root,
        }
    }

    /// Interprets a whole command stream.
    pub fn build_frame(
        pipeline_id: PipelineId,
        epoch: Epoch,
        commands: Vec<WrCommand>,
        resources: &ResourceCache,
    ) -> RenderedFrame {
        let mut builder = FrameBuilder::new(pipeline_id, epoch);
        for command in commands {
            builder.add_command(command, resources);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::{AddImage, IdNamespace, ImageDescriptor, ImageFormat, LayoutPoint, LayoutSize};

    fn rect(x: f32, y: f32, w: f32, h: f32) -> LayoutRect {
        LayoutRect::new(LayoutPoint::new(x, y), LayoutSize::new(w, h))
    }

    fn pop() -> WrCommand {
        WrCommand::PopStackingContext {
            bounds: rect(0.0, 0.0, 10.0, 10.0),
            overflow: rect(0.0, 0.0, 10.0, 10.0),
            transform: LayoutTransform::identity(),
            opacity: 1.0,
            scroll_id: None,
        }
    }

    #[test]
    fn nesting_is_rebuilt() {
        let resources = ResourceCache::new();
        let red = ColorF::new(1.0, 0.0, 0.0, 1.0);
        let frame = FrameBuilder::build_frame(
            PipelineId(0, 0),
            Epoch(1),
            vec![
                WrCommand::Rect { bounds: rect(0.0, 0.0, 1.0, 1.0), clip: rect(0.0, 0.0, 1.0, 1.0), color: red },
                WrCommand::PushStackingContext,
                WrCommand::Rect { bounds: rect(1.0, 1.0, 1.0, 1.0), clip: rect(1.0, 1.0, 1.0, 1.0), color: red },
                pop(),
            ],
            &resources,
        );
        assert_eq!(frame.root.len(), 2);
        assert_eq!(frame.primitive_count(), 3);
        match frame.root[1] {
            Primitive::StackingContext(ref sc) => assert_eq!(sc.children.len(), 1),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn images_record_their_epoch() {
        let mut resources = ResourceCache::new();
        let key = ImageKey(IdNamespace(1), 0);
        resources.add_image(AddImage {
            key,
            descriptor: ImageDescriptor::new(1, 1, ImageFormat::BGRA8, false),
            data: vec![0; 4],
        });
        let frame = FrameBuilder::build_frame(
            PipelineId(0, 0),
            Epoch(1),
            vec![WrCommand::Image { bounds: rect(0.0, 0.0, 1.0, 1.0), clip: rect(0.0, 0.0, 1.0, 1.0), mask: None, key }],
            &resources,
        );
        assert_eq!(frame.image_keys(), vec![key]);
    }

    #[test]
    #[should_panic(expected = "unknown image")]
    fn unknown_image_is_fatal() {
        let resources = ResourceCache::new();
        FrameBuilder::build_frame(
            PipelineId(0, 0),
            Epoch(1),
            vec![WrCommand::Image {
                bounds: rect(0.0, 0.0, 1.0, 1.0),
                clip: rect(0.0, 0.0, 1.0, 1.0),
                mask: None,
                key: ImageKey(IdNamespace(1), 7),
            }],
            &resources,
        );
    }

    #[test]
    #[should_panic(expected = "without a matching push")]
    fn unbalanced_pop_is_fatal() {
        let resources = ResourceCache::new();
        FrameBuilder::build_frame(PipelineId(0, 0), Epoch(1), vec![pop()], &resources);
    }

    #[test]
    #[should_panic(expected = "left open")]
    fn unclosed_push_is_fatal() {
        let resources = ResourceCache::new();
        FrameBuilder::build_frame(PipelineId(0, 0), Epoch(1), vec![WrCommand::PushStackingContext], &resources);
    }
}
