/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::api::ImageKey;
use thiserror::Error;

/// Failures talking to the remote renderer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("the render backend channel is closed")]
    ChannelClosed,
    #[error("malformed transaction payload: {0}")]
    Payload(#[from] std::io::Error),
    #[error("display list codec failure: {0}")]
    DisplayList(#[from] bincode::Error),
    #[error("failed to start the render backend thread: {0}")]
    Spawn(std::io::Error),
    #[error(transparent)]
    ResourceUpdate(#[from] ResourceUpdateError),
}

/// A resource update the queue refused to accept.
///
/// These are transient: the caller skips this frame's visual update for the
/// affected image and keeps whatever was uploaded before.
#[derive(Debug, Error, PartialEq)]
pub enum ResourceUpdateError {
    #[error("resource budget exhausted ({requested} bytes requested, {remaining} remaining)")]
    BudgetExhausted { requested: usize, remaining: usize },
    #[error("image {key:?} expects {expected} bytes but {actual} were supplied")]
    SizeMismatch {
        key: ImageKey,
        expected: usize,
        actual: usize,
    },
}
