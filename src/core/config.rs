//! Image cache configuration (user-facing global settings).
//!
//! Read-only to the cache core. Per-image settings (filter, repeat, quality
//! depth) travel with each request as `ImageParams` in `cache::params`.

use std::path::PathBuf;

/// User-facing image cache configuration.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Byte ceiling for the dynamically cached (evictable) portion of
    /// resident image data.
    pub budget_bytes: u64,
    /// Maximum bytes of a precompressed image read at specification time.
    /// Larger files get a resident low-resolution stand-in while the full
    /// image streams in the background. 0 disables partial caching.
    pub cache_min_bytes: u64,
    /// Maximum number of concurrent background file reads.
    pub max_background_loads: usize,
    /// Load images when first requested instead of deferring to the end of
    /// the level load.
    pub preload: bool,
    /// Enable background streaming and partial caching of large images.
    pub use_cache: bool,
    /// Purge every file-backed image at the start of a level load.
    pub purge_all_on_level_load: bool,
    /// Root directory of the image store (precompressed and source files).
    pub base_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 20 * 1024 * 1024,
            cache_min_bytes: 200 * 1024,
            max_background_loads: 8,
            preload: true,
            use_cache: false,
            purge_all_on_level_load: false,
            base_dir: PathBuf::from("images"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.budget_bytes, 20 * 1024 * 1024);
        assert_eq!(config.cache_min_bytes, 200 * 1024);
        assert_eq!(config.max_background_loads, 8);
        assert!(config.preload);
        assert!(!config.use_cache);
        assert!(!config.purge_all_on_level_load);
    }
}
