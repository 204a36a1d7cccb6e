/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/*!
Turns a retained display-item tree into command streams for a remote
renderer.

Runs of inactive items are partitioned into groups, each rasterized into a
single image that is only repainted where its items changed. Active items
(animated transforms and opacity, scroll frames, iframes) become native
commands. Commands and image updates travel to the renderer in
transactions bracketed by `dp_begin` / `dp_end`; the renderer applies
deletions only after interpreting the commands that came with them.

The producer entry point is [`LayerManager`]; [`Renderer`] starts the
consumer thread.
*/

mod blob_item_data;
mod bridge;
mod command_builder;
mod display_item;
mod draw_target;
mod frame;
mod freelist;
mod group;
mod grouper;
mod internal_types;
mod layer_manager;
mod render_backend;
mod renderer;
mod resource_cache;
mod scroll_data;
mod stacking_context;
mod user_data;
mod util;

pub use crate::blob_item_data::GroupId;
pub use crate::bridge::BridgeChild;
pub use crate::command_builder::{BuildStats, BuilderOptions, CommandBuilder, CommandSink};
pub use crate::display_item::{
    DisplayItem, DisplayItemKind, DisplayList, EventRegions, Invalidation, ItemGeometry,
    RasterImage, Region,
};
pub use crate::draw_target::{DrawTarget, PaintState};
pub use crate::frame::{FrameBuilder, Primitive, RenderedFrame, StackingContext};
pub use crate::group::{EndGroupOutcome, Group};
pub use crate::internal_types::{DisplayItemKey, FastHashMap, FastHashSet, FrameId, PaintSequenceNumber};
pub use crate::layer_manager::LayerManager;
pub use crate::render_backend::{CompositorWidget, RenderBackend, RenderNotifier, WrState};
pub use crate::renderer::{Renderer, RendererOptions};
pub use crate::resource_cache::{ImageResource, ResourceCache};
pub use crate::scroll_data::{LayerScrollData, ScrollMetadata, ScrollMetadataProvider, WebRenderScrollData};
pub use crate::stacking_context::StackingContextHelper;
pub use crate::user_data::GroupData;

pub use api;
