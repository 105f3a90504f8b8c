//! Image registry, LRU eviction and level lifecycle

pub mod params;
pub mod name;
pub mod entry;
pub mod lru;
pub mod manager;

pub use params::{
    CubeKind, ImageParams, Reconcile, TextureDepth, TextureFilter, TextureRepeat, reconcile,
};
pub use entry::{EntryId, ImageEntry, ImageState, Origin};
pub use lru::CacheLru;
pub use manager::{ImageCache, LevelLoadStats};
