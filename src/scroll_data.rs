/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Data the compositor needs to scroll content asynchronously.
//!
//! The command builder emits one `LayerScrollData` per item that carries
//! scroll-relevant state and per change of active scrolled root. Layers
//! are stored parent-first: each layer is followed by its
//! `descendant_count` descendants.

use api::{LayoutRect, LayoutTransform, LayoutVector2D, PipelineId, ScrollId};
use crate::display_item::{DisplayItem, DisplayItemKind, EventRegions};
use crate::internal_types::{FastHashMap, PaintSequenceNumber};
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq)]
pub struct ScrollMetadata {
    pub scroll_id: ScrollId,
    /// The enclosing scroll frame, if any.
    pub parent: Option<ScrollId>,
    pub scroll_offset: LayoutVector2D,
    pub scrollable_rect: LayoutRect,
    pub composition_bounds: LayoutRect,
    pub is_root: bool,
}

/// Supplies metadata for scroll frames known to the layout side.
pub trait ScrollMetadataProvider {
    fn scroll_metadata(&self, scroll_id: ScrollId) -> Option<ScrollMetadata>;

    /// Metadata for the root scroll frame of the page.
    fn root_metadata(&self) -> Option<ScrollMetadata> {
        None
    }
}

impl<F> ScrollMetadataProvider for F
where
    F: Fn(ScrollId) -> Option<ScrollMetadata>,
{
    fn scroll_metadata(&self, scroll_id: ScrollId) -> Option<ScrollMetadata> {
        self(scroll_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerScrollData {
    pub descendant_count: usize,
    /// Indices into `WebRenderScrollData::metadata`, innermost first.
    pub scroll_metadata: SmallVec<[usize; 2]>,
    pub transform: Option<LayoutTransform>,
    pub event_regions: EventRegions,
    pub iframe_pipeline: Option<PipelineId>,
}

impl LayerScrollData {
    pub fn new() -> LayerScrollData {
        LayerScrollData::default()
    }

    /// Fills in the layer for `item`, walking its scrolled-root chain up
    /// to (not including) `stop_at`.
    pub fn initialize(
        &mut self,
        owner: &mut WebRenderScrollData,
        item: &DisplayItem,
        descendant_count: usize,
        stop_at: Option<ScrollId>,
        provider: &dyn ScrollMetadataProvider,
    ) {
        self.descendant_count = descendant_count;

        let mut asr = item.asr;
        while let Some(scroll_id) = asr {
            if Some(scroll_id) == stop_at {
                break;
            }
            let metadata = match provider.scroll_metadata(scroll_id) {
                Some(metadata) => metadata,
                None => break,
            };
            asr = metadata.parent;
            self.scroll_metadata.push(owner.add_metadata(metadata));
        }

        match item.kind {
            DisplayItemKind::Transform { ref transform, .. } => self.transform = Some(*transform),
            DisplayItemKind::Iframe { pipeline_id } => self.iframe_pipeline = Some(pipeline_id),
            _ => {}
        }
    }

    /// The root layer has every other layer as a descendant.
    pub fn initialize_root(&mut self, descendant_count: usize) {
        self.descendant_count = descendant_count;
    }

    pub fn append_scroll_metadata(&mut self, owner: &mut WebRenderScrollData, metadata: ScrollMetadata) {
        self.scroll_metadata.push(owner.add_metadata(metadata));
    }

    pub fn add_event_regions(&mut self, regions: &EventRegions) {
        self.event_regions.or_with(regions);
    }
}

#[derive(Clone, Debug, Default)]
pub struct WebRenderScrollData {
    metadata: Vec<ScrollMetadata>,
    metadata_index: FastHashMap<ScrollId, usize>,
    layers: Vec<LayerScrollData>,
    pub paint_sequence_number: PaintSequenceNumber,
    pub is_first_paint: bool,
}

impl WebRenderScrollData {
    pub fn new(paint_sequence_number: PaintSequenceNumber, is_first_paint: bool) -> WebRenderScrollData {
        WebRenderScrollData {
            paint_sequence_number,
            is_first_paint,
            ..WebRenderScrollData::default()
        }
    }

    /// Stores `metadata` once per scroll id and returns its index.
    pub fn add_metadata(&mut self, metadata: ScrollMetadata) -> usize {
        if let Some(&index) = self.metadata_index.get(&metadata.scroll_id) {
            return index;
        }
        let index = self.metadata.len();
        self.metadata_index.insert(metadata.scroll_id, index);
        self.metadata.push(metadata);
        index
    }

    pub fn add_layer_data(&mut self, layer: LayerScrollData) {
        self.layers.push(layer);
    }

    pub fn metadata(&self) -> &[ScrollMetadata] {
        &self.metadata
    }

    pub fn layers(&self) -> &[LayerScrollData] {
        &self.layers
    }

    pub fn layer_metadata(&self, layer: &LayerScrollData) -> Vec<&ScrollMetadata> {
        layer.scroll_metadata.iter().map(|&i| &self.metadata[i]).collect()
    }
}
