use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Engine lifecycle as observed from producer threads.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineLifecycleState {
    /// Not set up yet, or setup failed and the engine is inert.
    Uninitialized = 0,
    Initialized = 1,
    Paused = 2,
    Destroyed = 3,
}

impl EngineLifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initialized,
            2 => Self::Paused,
            3 => Self::Destroyed,
            _ => Self::Uninitialized,
        }
    }
}

/// State the render thread publishes and producers read without locking.
#[derive(Debug)]
pub(crate) struct Shared {
    lifecycle: AtomicU8,
    // Width in the high half, height in the low half, so readers never see a
    // width from one update paired with a height from another.
    surface_size: AtomicU64,
}

impl Shared {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            lifecycle: AtomicU8::new(EngineLifecycleState::Uninitialized as u8),
            surface_size: AtomicU64::new(pack(width, height)),
        }
    }

    pub(crate) fn lifecycle(&self) -> EngineLifecycleState {
        EngineLifecycleState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub(crate) fn set_lifecycle(&self, state: EngineLifecycleState) {
        self.lifecycle.store(state as u8, Ordering::Release);
    }

    pub(crate) fn surface_size(&self) -> (u32, u32) {
        unpack(self.surface_size.load(Ordering::Acquire))
    }

    pub(crate) fn set_surface_size(&self, width: u32, height: u32) {
        self.surface_size
            .store(pack(width, height), Ordering::Release);
    }
}

fn pack(width: u32, height: u32) -> u64 {
    ((width as u64) << 32) | height as u64
}

fn unpack(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}
