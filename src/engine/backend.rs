use std::fmt;

use image::RgbaImage;

use crate::{
    error::{FrameError, SetupError},
    state::FilterState,
};

/// Drawing target handed to the engine for one session.
pub enum RenderSurface {
    /// A presentable window surface supplied by the host.
    Window {
        target: wgpu::SurfaceTarget<'static>,
        width: u32,
        height: u32,
    },
    /// An engine-owned texture standing in for the screen.
    Offscreen { width: u32, height: u32 },
}

impl RenderSurface {
    pub fn offscreen(width: u32, height: u32) -> Self {
        Self::Offscreen { width, height }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Window { width, height, .. } | Self::Offscreen { width, height } => {
                (*width, *height)
            }
        }
    }
}

impl fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window { width, height, .. } => f
                .debug_struct("Window")
                .field("width", width)
                .field("height", height)
                .finish_non_exhaustive(),
            Self::Offscreen { width, height } => f
                .debug_struct("Offscreen")
                .field("width", width)
                .field("height", height)
                .finish(),
        }
    }
}

/// Validity of the derived textures attached to the loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCache {
    /// The HSV copy of the source has been rendered.
    pub hsv_ready: bool,
    /// The CDT lookup was computed from the HSV copy and uploaded.
    pub lookup_ready: bool,
    /// The blurred copy must be regenerated before compositing.
    pub blur_stale: bool,
}

impl ImageCache {
    /// State right after an image load: nothing derived, blur pending.
    pub fn fresh() -> Self {
        Self {
            hsv_ready: false,
            lookup_ready: false,
            blur_stale: true,
        }
    }

    pub fn histogram_generated(&self) -> bool {
        self.hsv_ready && self.lookup_ready
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Everything one render pass chain reads, plus the cache it updates.
pub struct Frame<'a> {
    pub state: &'a FilterState,
    pub cache: &'a mut ImageCache,
    pub show_original: bool,
    /// Current presentable size as last published by the host.
    pub surface_size: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was composited and shown; `blurred` tells which slot holds it.
    Presented { blurred: bool },
}

/// GPU work behind the render queue.
///
/// All methods run on the render thread. Implementations own every GPU
/// resource; [`RenderBackend::release`] must drop them in surface, device,
/// instance order and leave the backend reusable for a later `init`.
pub trait RenderBackend {
    fn init(&mut self, surface: RenderSurface) -> Result<(), SetupError>;

    /// Replaces the source image and reallocates the per-image texture pool.
    fn load_image(&mut self, image: &RgbaImage) -> Result<(), FrameError>;

    fn render_frame(&mut self, frame: &mut Frame<'_>) -> Result<FrameOutcome, FrameError>;

    /// Reads back the most recently composited image, or the source if no
    /// frame has been rendered since the last load.
    fn read_bitmap(&mut self) -> Result<Option<RgbaImage>, FrameError>;

    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_needs_everything() {
        let cache = ImageCache::fresh();
        assert!(!cache.histogram_generated());
        assert!(cache.blur_stale);
        assert_eq!(cache, ImageCache::default());
    }

    #[test]
    fn histogram_needs_both_halves() {
        let mut cache = ImageCache::fresh();
        cache.hsv_ready = true;
        assert!(!cache.histogram_generated());
        cache.lookup_ready = true;
        assert!(cache.histogram_generated());
    }

    #[test]
    fn surface_reports_size() {
        let surface = RenderSurface::offscreen(640, 480);
        assert_eq!(surface.size(), (640, 480));
        assert_eq!(
            format!("{surface:?}"),
            "Offscreen { width: 640, height: 480 }"
        );
    }
}
