use std::{fmt, sync::Arc};

use image::RgbaImage;

use crate::{engine::RenderSurface, state::FilterState};

/// Receives the result of [`crate::engine::FilterEngine::get_bitmap`].
pub type BitmapCallback = Box<dyn FnOnce(Option<RgbaImage>) + Send + 'static>;

/// One unit of work for the render thread. Consumed exactly once, in order.
pub enum RenderCommand {
    Init {
        surface: RenderSurface,
        image: Option<RgbaImage>,
    },
    Render {
        update_blur: bool,
        force: bool,
    },
    Pause,
    Resume {
        image: RgbaImage,
        state: Arc<FilterState>,
    },
    GetBitmap(BitmapCallback),
    ShowOriginal(bool),
    Destroy,
}

impl RenderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Render { .. } => "render",
            Self::Pause => "pause",
            Self::Resume { .. } => "resume",
            Self::GetBitmap(_) => "get_bitmap",
            Self::ShowOriginal(_) => "show_original",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init { surface, image } => f
                .debug_struct("Init")
                .field("surface", surface)
                .field("image", &image.as_ref().map(|i| i.dimensions()))
                .finish(),
            Self::Render { update_blur, force } => f
                .debug_struct("Render")
                .field("update_blur", update_blur)
                .field("force", force)
                .finish(),
            Self::Resume { image, .. } => f
                .debug_struct("Resume")
                .field("image", &image.dimensions())
                .finish_non_exhaustive(),
            Self::ShowOriginal(on) => f.debug_tuple("ShowOriginal").field(on).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Whether a producer call reached the render queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Submit {
    Queued,
    /// The engine was destroyed; the command was dropped.
    Discarded,
}

impl Submit {
    pub fn is_queued(self) -> bool {
        self == Self::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_omits_payloads() {
        let cmd = RenderCommand::Resume {
            image: RgbaImage::new(3, 2),
            state: Arc::new(FilterState::default()),
        };
        assert_eq!(format!("{cmd:?}"), "Resume { image: (3, 2), .. }");
        assert_eq!(format!("{:?}", RenderCommand::Pause), "pause");
        let cb: BitmapCallback = Box::new(|_| {});
        assert_eq!(RenderCommand::GetBitmap(cb).name(), "get_bitmap");
    }
}
