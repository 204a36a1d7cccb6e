/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::api::{ColorF, ImageKey, PipelineId, ScrollId};
use crate::error::ApiError;
use crate::units::{LayoutRect, LayoutTransform};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageMask {
    pub image: ImageKey,
    pub rect: LayoutRect,
    pub repeat: bool,
}

/// One entry of the command stream, interpreted by the remote side in the
/// order it was pushed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WrCommand {
    PushStackingContext,
    PopStackingContext {
        bounds: LayoutRect,
        overflow: LayoutRect,
        transform: LayoutTransform,
        opacity: f32,
        scroll_id: Option<ScrollId>,
    },
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
    },
    Iframe {
        bounds: LayoutRect,
        clip: LayoutRect,
        pipeline_id: PipelineId,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltDisplayListDescriptor {
    pub command_count: usize,
}

/// A serialized command stream ready to be shipped in one message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuiltDisplayList {
    data: Vec<u8>,
    descriptor: BuiltDisplayListDescriptor,
}

impl BuiltDisplayList {
    pub fn from_commands(commands: &[WrCommand]) -> Result<BuiltDisplayList, ApiError> {
        Ok(BuiltDisplayList {
            data: bincode::serialize(commands)?,
            descriptor: BuiltDisplayListDescriptor {
                command_count: commands.len(),
            },
        })
    }

    pub fn from_data(data: Vec<u8>, descriptor: BuiltDisplayListDescriptor) -> BuiltDisplayList {
        BuiltDisplayList { data, descriptor }
    }

    pub fn descriptor(&self) -> &BuiltDisplayListDescriptor {
        &self.descriptor
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn commands(&self) -> Result<Vec<WrCommand>, ApiError> {
        let commands: Vec<WrCommand> = bincode::deserialize(&self.data)?;
        debug_assert_eq!(commands.len(), self.descriptor.command_count);
        Ok(commands)
    }
}

pub struct DisplayListBuilder {
    pub pipeline_id: PipelineId,
    commands: Vec<WrCommand>,
    depth: usize,
}

impl DisplayListBuilder {
    pub fn new(pipeline_id: PipelineId) -> DisplayListBuilder {
        DisplayListBuilder {
            pipeline_id,
            commands: Vec::new(),
            depth: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn commands(&self) -> &[WrCommand] {
        &self.commands
    }

    pub fn push_stacking_context(&mut self) {
        self.depth += 1;
        self.commands.push(WrCommand::PushStackingContext);
    }

    pub fn pop_stacking_context(
        &mut self,
        bounds: LayoutRect,
        overflow: LayoutRect,
        transform: LayoutTransform,
        opacity: f32,
        scroll_id: Option<ScrollId>,
    ) {
        assert!(self.depth > 0, "popped a stacking context that was never pushed");
        self.depth -= 1;
        self.commands.push(WrCommand::PopStackingContext {
            bounds,
            overflow,
            transform,
            opacity,
            scroll_id,
        });
    }

    pub fn push_rect(&mut self, bounds: LayoutRect, clip: LayoutRect, color: ColorF) {
        self.commands.push(WrCommand::Rect { bounds, clip, color });
    }

    pub fn push_image(
        &mut self,
        bounds: LayoutRect,
        clip: LayoutRect,
        mask: Option<ImageMask>,
        key: ImageKey,
    ) {
        self.commands.push(WrCommand::Image {
            bounds,
            clip,
            mask,
            key,
        });
    }

    pub fn push_iframe(&mut self, bounds: LayoutRect, clip: LayoutRect, pipeline_id: PipelineId) {
        self.commands.push(WrCommand::Iframe {
            bounds,
            clip,
            pipeline_id,
        });
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.depth = 0;
    }

    pub fn finalize(&mut self) -> Result<BuiltDisplayList, ApiError> {
        assert_eq!(self.depth, 0, "unbalanced stacking contexts in display list");
        let built = BuiltDisplayList::from_commands(&self.commands)?;
        self.commands.clear();
        Ok(built)
    }
}
