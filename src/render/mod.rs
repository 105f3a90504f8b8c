//! GPU upload seam

pub mod backend;

pub use backend::{GpuBackend, GpuTexture, NullBackend, RecordingBackend};
