use std::{sync::Arc, time::Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use image::RgbaImage;
use tracing::{debug, error, info, warn};

use crate::{
    engine::{
        BitmapCallback, Dispatcher, EngineLifecycleState, Frame, FrameOutcome, ImageCache,
        RenderBackend, RenderCommand, RenderSurface, lifecycle::Shared, throttle::RenderThrottle,
    },
    error::SetupError,
    state::FilterState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Render-thread state machine. Owns the backend and everything it touches.
pub(crate) struct Worker<B> {
    backend: B,
    rx: Receiver<RenderCommand>,
    shared: Arc<Shared>,
    dispatcher: Arc<dyn Dispatcher>,
    throttle: RenderThrottle,
    state: Arc<FilterState>,
    cache: ImageCache,
    inited: bool,
    paused: bool,
    has_image: bool,
    show_original: bool,
}

impl<B: RenderBackend> Worker<B> {
    pub(crate) fn new(
        backend: B,
        rx: Receiver<RenderCommand>,
        shared: Arc<Shared>,
        dispatcher: Arc<dyn Dispatcher>,
        throttle: RenderThrottle,
        state: Arc<FilterState>,
    ) -> Self {
        Self {
            backend,
            rx,
            shared,
            dispatcher,
            throttle,
            state,
            cache: ImageCache::fresh(),
            inited: false,
            paused: false,
            has_image: false,
            show_original: false,
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            let next = match self.throttle.deadline() {
                Some(deadline) => match self.rx.recv_deadline(deadline) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            match next {
                Some(cmd) => {
                    if self.handle(cmd) == Flow::Exit {
                        return;
                    }
                }
                None => {
                    let now = Instant::now();
                    if self.throttle.take_due(now) {
                        self.render(now);
                    }
                }
            }
        }

        // Every producer handle is gone without an explicit destroy.
        self.shutdown();
    }

    fn handle(&mut self, cmd: RenderCommand) -> Flow {
        debug!(command = cmd.name(), "render command");
        match cmd {
            RenderCommand::Init { surface, image } => self.init(surface, image),
            RenderCommand::Render { update_blur, force } => self.request_render(update_blur, force),
            RenderCommand::Pause => self.pause(),
            RenderCommand::Resume { image, state } => self.resume(image, state),
            RenderCommand::GetBitmap(callback) => self.get_bitmap(callback),
            RenderCommand::ShowOriginal(on) => self.set_show_original(on),
            RenderCommand::Destroy => {
                self.shutdown();
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn init(&mut self, surface: RenderSurface, image: Option<RgbaImage>) {
        if self.inited {
            warn!("render context already initialized; ignoring init");
            return;
        }
        if let Err(err) = self.setup(surface, image) {
            error!(error = %err, "render context setup failed; engine is inert");
            self.backend.release();
            self.has_image = false;
            return;
        }
        self.inited = true;
        self.shared.set_lifecycle(if self.paused {
            EngineLifecycleState::Paused
        } else {
            EngineLifecycleState::Initialized
        });
        info!(has_image = self.has_image, "render context initialized");
    }

    fn setup(&mut self, surface: RenderSurface, image: Option<RgbaImage>) -> Result<(), SetupError> {
        self.backend.init(surface)?;
        if let Some(image) = image {
            self.backend
                .load_image(&image)
                .map_err(SetupError::InitialImage)?;
            self.has_image = true;
            self.cache = ImageCache::fresh();
        }
        Ok(())
    }

    fn request_render(&mut self, update_blur: bool, force: bool) {
        self.cache.blur_stale |= update_blur;
        let now = Instant::now();
        if self.throttle.request(now, force) {
            self.render(now);
        }
    }

    fn render(&mut self, now: Instant) {
        self.throttle.mark_rendered(now);
        if !self.inited || self.paused || !self.has_image {
            return;
        }

        let mut frame = Frame {
            state: &self.state,
            cache: &mut self.cache,
            show_original: self.show_original,
            surface_size: self.shared.surface_size(),
        };
        match self.backend.render_frame(&mut frame) {
            Ok(FrameOutcome::Presented { blurred }) => {
                debug!(blurred, elapsed = ?now.elapsed(), "frame presented");
            }
            Err(err) => warn!(error = %err, "frame dropped"),
        }
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.throttle.cancel_pending();
        if self.inited {
            self.shared.set_lifecycle(EngineLifecycleState::Paused);
            info!("render paused");
        }
    }

    fn resume(&mut self, image: RgbaImage, state: Arc<FilterState>) {
        if !self.inited {
            debug!("resume ignored; render context is not initialized");
            return;
        }
        self.state = state;
        self.cache = ImageCache::fresh();
        self.has_image = match self.backend.load_image(&image) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "image upload failed");
                false
            }
        };
        drop(image);

        self.paused = false;
        self.shared.set_lifecycle(EngineLifecycleState::Initialized);
        info!(has_image = self.has_image, "render resumed");
        self.request_render(true, true);
    }

    fn get_bitmap(&mut self, callback: BitmapCallback) {
        let bitmap = if self.inited && self.has_image {
            self.backend.read_bitmap().unwrap_or_else(|err| {
                warn!(error = %err, "bitmap readback failed");
                None
            })
        } else {
            None
        };
        self.dispatcher.post(Box::new(move || callback(bitmap)));
    }

    fn set_show_original(&mut self, on: bool) {
        if self.show_original == on {
            return;
        }
        self.show_original = on;
        self.request_render(false, true);
    }

    fn shutdown(&mut self) {
        self.throttle.cancel_pending();
        self.backend.release();
        self.inited = false;
        self.has_image = false;
        self.shared.set_lifecycle(EngineLifecycleState::Destroyed);
        info!("render thread finished");
    }
}
