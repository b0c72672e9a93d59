use std::collections::TryReserveError;

use thiserror::Error;

/// Failure while negotiating the GPU context or building shader programs.
///
/// Setup errors leave the engine inert; recovery means building a new engine.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface offers no usable 8-bit RGBA format")]
    UnsupportedSurface,

    #[error("surface size {width}x{height} is invalid")]
    InvalidSurfaceSize { width: u32, height: u32 },

    #[error("shader program `{label}` failed validation: {message}")]
    Program { label: &'static str, message: String },

    #[error("initial image upload failed: {0}")]
    InitialImage(#[source] FrameError),
}

/// Failure confined to one frame or one readback. The frame is dropped.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("gpu context is not initialized")]
    NotInitialized,

    #[error("surface texture unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("gpu buffer mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("gpu readback was abandoned before completion")]
    ReadbackAbandoned,

    #[error("image is empty")]
    EmptyImage,

    #[error("image {width}x{height} exceeds the device texture limit of {max}")]
    ImageTooLarge { width: u32, height: u32, max: u32 },
}

/// Failure in the histogram / CDT lookup computation.
#[derive(Debug, Error)]
pub enum CdtError {
    #[error("image dimensions {width}x{height} are empty")]
    EmptyImage { width: u32, height: u32 },

    #[error("hsv buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("cannot allocate lookup buffer: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Failure while starting an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),
}
