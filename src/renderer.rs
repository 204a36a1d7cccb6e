/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use api::channel::{msg_channel, MsgSender};
use api::{ApiError, ApiMsg, RenderApiSender};
use crate::render_backend::{CompositorWidget, RenderBackend, RenderNotifier};
use log::warn;
use std::thread::{self, JoinHandle};

#[derive(Clone, Debug)]
pub struct RendererOptions {
    /// Largest surface the backend accepts a frame for.
    pub max_texture_size: u32,
    /// Logs a summary of every frame built.
    pub debug: bool,
}

impl Default for RendererOptions {
    fn default() -> RendererOptions {
        RendererOptions {
            max_texture_size: 8192,
            debug: false,
        }
    }
}

/// Owns the render backend thread.
pub struct Renderer {
    api_tx: MsgSender<ApiMsg>,
    backend_thread: Option<JoinHandle<()>>,
}

impl Renderer {
    /// Starts the backend and returns the sender producers create their
    /// `RenderApi`s from.
    pub fn new(
        options: RendererOptions,
        widget: Box<dyn CompositorWidget>,
        notifier: Box<dyn RenderNotifier>,
    ) -> Result<(Renderer, RenderApiSender), ApiError> {
        let (api_tx, api_rx) = msg_channel()?;

        let RendererOptions { max_texture_size, debug } = options;
        let backend_thread = thread::Builder::new()
            .name("WRRenderBackend".to_owned())
            .spawn(move || {
                let mut backend = RenderBackend::new(api_rx, max_texture_size, debug, widget, notifier);
                backend.run();
            })
            .map_err(ApiError::Spawn)?;

        let renderer = Renderer {
            api_tx: api_tx.clone(),
            backend_thread: Some(backend_thread),
        };
        Ok((renderer, RenderApiSender::new(api_tx)))
    }

    /// Stops the backend thread once it has drained earlier messages.
    pub fn deinit(mut self) {
        if self.api_tx.send(ApiMsg::ShutDown).is_err() {
            warn!("render backend already gone");
        }
        if let Some(thread) = self.backend_thread.take() {
            if thread.join().is_err() {
                warn!("render backend panicked");
            }
        }
    }
}
