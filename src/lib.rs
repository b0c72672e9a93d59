//! GPU photo filter engine.
//!
//! [`engine::FilterEngine`] runs a fixed chain of filter passes on a
//! dedicated render thread and presents the result to a window surface or an
//! offscreen target.

pub mod config;
pub mod engine;
pub mod error;
pub mod processing;
pub mod state;

pub use config::EngineConfig;
pub use engine::{FilterEngine, RenderSurface, Submit};
pub use state::{BlurGeometry, BlurType, FilterState, TintColor};
