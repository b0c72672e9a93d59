pub mod cdt;
pub mod gpu_pipeline;
pub mod params;
mod passes;
pub mod shaders;
