//! Upload backend trait decoupling the cache from the graphics API
//!
//! The cache treats GPU textures as opaque handles. It only needs to create
//! them from decoded pixels, release them on eviction or purge, and account
//! their size against the memory budget. Everything else (formats, mipmap
//! generation, binding) belongs to the renderer.

use crate::cache::params::ImageParams;
use crate::core::types::PixelData;

/// Opaque handle to an uploaded GPU texture
///
/// Deliberately not `Clone`: the cache owns each handle exactly once and
/// passes it back to the backend on release.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GpuTexture {
    id: u64,
}

impl GpuTexture {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Graphics-API collaborator performing uploads and releases
pub trait GpuBackend {
    /// Upload decoded pixels, returning an opaque texture handle.
    ///
    /// Returns `None` when the graphics subsystem is not available (headless
    /// tools, or generators invoked before renderer init). The cache still
    /// tracks residency and size in that case so lifecycle logic behaves
    /// identically.
    fn upload(&mut self, pixels: &PixelData, params: &ImageParams) -> Option<GpuTexture>;

    /// Release a texture previously returned by `upload`.
    fn release(&mut self, texture: GpuTexture);
}

/// Backend for headless operation: uploads nothing, releases nothing
pub struct NullBackend;

impl GpuBackend for NullBackend {
    fn upload(&mut self, _pixels: &PixelData, _params: &ImageParams) -> Option<GpuTexture> {
        None
    }

    fn release(&mut self, _texture: GpuTexture) {}
}

/// Backend that hands out fake handles and records traffic
///
/// Used by the unit tests and useful for asset tooling that wants upload
/// accounting without a device.
#[derive(Default)]
pub struct RecordingBackend {
    next_id: u64,
    /// Number of uploads performed
    pub uploads: usize,
    /// Ids released, in release order
    pub released: Vec<u64>,
}

impl GpuBackend for RecordingBackend {
    fn upload(&mut self, _pixels: &PixelData, _params: &ImageParams) -> Option<GpuTexture> {
        self.next_id += 1;
        self.uploads += 1;
        Some(GpuTexture::new(self.next_id))
    }

    fn release(&mut self, texture: GpuTexture) {
        self.released.push(texture.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend() {
        let mut backend = NullBackend;
        let pixels = PixelData::new(2, 2);
        assert!(backend.upload(&pixels, &ImageParams::default()).is_none());
    }

    #[test]
    fn test_recording_backend_tracks_traffic() {
        let mut backend = RecordingBackend::default();
        let pixels = PixelData::new(2, 2);

        let a = backend.upload(&pixels, &ImageParams::default()).unwrap();
        let b = backend.upload(&pixels, &ImageParams::default()).unwrap();
        assert_eq!(backend.uploads, 2);
        assert_ne!(a.id(), b.id());

        backend.release(a);
        assert_eq!(backend.released, vec![1]);
        backend.release(b);
        assert_eq!(backend.released, vec![1, 2]);
    }
}
