//! The render engine: a dedicated thread that owns the GPU context and
//! serializes every interaction with it through a command queue.
//!
//! Producer calls never block on GPU work. They return [`Submit::Queued`]
//! while the engine is alive and [`Submit::Discarded`] once
//! [`FilterEngine::destroy`] has been called.

mod backend;
mod command;
mod dispatch;
mod lifecycle;
mod throttle;
mod worker;

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Sender, unbounded};
use image::RgbaImage;
use parking_lot::Mutex;
use tracing::info;

pub use backend::{Frame, FrameOutcome, ImageCache, RenderBackend, RenderSurface};
pub use command::{BitmapCallback, RenderCommand, Submit};
pub use dispatch::{ChannelDispatcher, DispatchQueue, Dispatcher, InlineDispatcher, Task};
pub use lifecycle::EngineLifecycleState;

use crate::{
    config::EngineConfig, error::EngineError, processing::gpu_pipeline::GpuBackend,
    state::FilterState,
};
use lifecycle::Shared;
use throttle::RenderThrottle;
use worker::Worker;

/// Handle to one render engine and its thread.
///
/// Dropping the handle destroys the engine and waits for the render thread
/// to release its resources.
pub struct FilterEngine {
    tx: Mutex<Option<Sender<RenderCommand>>>,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FilterEngine {
    /// Starts an engine backed by the wgpu renderer and queues its setup.
    pub fn new(
        surface: RenderSurface,
        initial_image: Option<RgbaImage>,
        state: Arc<FilterState>,
        dispatcher: Arc<dyn Dispatcher>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        Self::with_backend(
            GpuBackend::from_config(config),
            surface,
            initial_image,
            state,
            dispatcher,
            config,
        )
    }

    /// Starts an engine over a custom backend.
    pub fn with_backend<B>(
        backend: B,
        surface: RenderSurface,
        initial_image: Option<RgbaImage>,
        state: Arc<FilterState>,
        dispatcher: Arc<dyn Dispatcher>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError>
    where
        B: RenderBackend + Send + 'static,
    {
        let (width, height) = surface.size();
        let shared = Arc::new(Shared::new(width, height));
        let (tx, rx) = unbounded();
        let throttle = RenderThrottle::new(config.render_interval());

        let worker = Worker::new(
            backend,
            rx,
            Arc::clone(&shared),
            dispatcher,
            throttle,
            state,
        );
        let thread_name = config.thread_name();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker.run())?;
        info!(thread = %thread_name, width, height, "render thread started");

        let engine = Self {
            tx: Mutex::new(Some(tx)),
            shared,
            thread: Mutex::new(Some(handle)),
        };
        let _ = engine.submit(RenderCommand::Init {
            surface,
            image: initial_image,
        });
        Ok(engine)
    }

    /// Replaces the image and filter snapshot, unpauses, and forces a render.
    pub fn resume_with_data(&self, image: RgbaImage, state: Arc<FilterState>) -> Submit {
        self.submit(RenderCommand::Resume { image, state })
    }

    pub fn pause(&self) -> Submit {
        self.submit(RenderCommand::Pause)
    }

    /// Requests a frame. Non-forced requests closer together than the
    /// render interval collapse into one trailing frame.
    pub fn request_render(&self, update_blur: bool, force: bool) -> Submit {
        self.submit(RenderCommand::Render { update_blur, force })
    }

    /// Reads back the composited image once every earlier command has run.
    ///
    /// The callback runs through the engine's dispatcher and receives `None`
    /// when the engine is inert or has no image.
    pub fn get_bitmap<F>(&self, callback: F) -> Submit
    where
        F: FnOnce(Option<RgbaImage>) + Send + 'static,
    {
        self.submit(RenderCommand::GetBitmap(Box::new(callback)))
    }

    /// Toggles neutral "before" rendering and forces a frame when it changes.
    pub fn set_show_original(&self, show_original: bool) -> Submit {
        self.submit(RenderCommand::ShowOriginal(show_original))
    }

    /// Queues teardown and closes the queue to further commands.
    pub fn destroy(&self) -> Submit {
        let Some(tx) = self.tx.lock().take() else {
            return Submit::Discarded;
        };
        match tx.send(RenderCommand::Destroy) {
            Ok(()) => Submit::Queued,
            Err(_) => Submit::Discarded,
        }
    }

    /// Publishes the presentable size; the next frame presents at this size.
    pub fn set_surface_size(&self, width: u32, height: u32) {
        self.shared.set_surface_size(width, height);
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.shared.surface_size()
    }

    pub fn state(&self) -> EngineLifecycleState {
        self.shared.lifecycle()
    }

    fn submit(&self, cmd: RenderCommand) -> Submit {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Submit::Discarded;
        };
        match tx.send(cmd) {
            Ok(()) => Submit::Queued,
            Err(_) => Submit::Discarded,
        }
    }
}

impl Drop for FilterEngine {
    fn drop(&mut self) {
        let _ = self.destroy();
        if let Some(handle) = self.thread.lock().take() {
            // Joining from the render thread itself would never return.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
