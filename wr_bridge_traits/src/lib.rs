/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Types shared by the display-list producer and the remote renderer.

mod api;
pub mod channel;
mod display_list;
mod error;
mod premultiply;
mod resources;
pub mod units;

pub use crate::api::*;
pub use crate::display_list::*;
pub use crate::error::{ApiError, ResourceUpdateError};
pub use crate::premultiply::premultiply;
pub use crate::resources::*;
pub use crate::units::*;
