//! Cache entries and their state machine
//!
//! Entries live in an arena owned by the `ImageCache` and are addressed by
//! stable `EntryId` indices, so handles held by callers stay valid for the
//! whole session. Purging releases an entry's content but never frees its
//! slot.

use crate::cache::params::ImageParams;
use crate::generate::GeneratorId;
use crate::render::backend::GpuTexture;

/// Stable handle to an image entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Load state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// Never loaded, or evicted from the dynamic cache
    NotLoaded,
    /// Synchronous load in progress on the caller's thread
    LoadingSync,
    /// Background file read in flight; pinned against eviction
    LoadingAsync,
    /// Content uploaded and usable
    Resident,
    /// Content released by a purge; loadable again on demand
    Purged,
}

/// Where an entry's content comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Streamed or decoded from the image store on disk
    FileBacked,
    /// Recomputed on demand; never streams, never purged by the level sweep
    Procedural(GeneratorId),
}

/// One cached image
#[derive(Debug)]
pub struct ImageEntry {
    pub id: EntryId,
    /// Display name as first requested
    pub name: String,
    /// Normalized registry key
    pub key: String,
    pub params: ImageParams,
    pub state: ImageState,
    /// Resident storage size; 0 whenever not resident
    pub size_bytes: u64,
    /// Touched by a resolve during the current level load window
    pub level_load_referenced: bool,
    /// Sticky: requested outside any level load, exempt from the sweep
    pub referenced_outside_level_load: bool,
    pub origin: Origin,
    /// Participates in the dynamic (evictable) cache
    pub dynamic_cache: bool,
    /// Currently linked into the LRU order
    pub in_cache_list: bool,
    /// Full image -> its low-resolution stand-in
    pub companion: Option<EntryId>,
    /// Stand-in -> the full image it previews
    pub partial_of: Option<EntryId>,
    /// A precompressed store file exists, so this entry may stream
    pub precompressed: bool,
    /// Expected resident size of the full image, learned from the store
    /// header; used to free budget before admitting a background load
    pub full_size_estimate: u64,
    pub texture: Option<GpuTexture>,
}

impl ImageEntry {
    pub fn new(id: EntryId, name: &str, key: String, origin: Origin) -> Self {
        Self {
            id,
            name: name.to_string(),
            key,
            params: ImageParams::default(),
            state: ImageState::NotLoaded,
            size_bytes: 0,
            level_load_referenced: false,
            referenced_outside_level_load: false,
            origin,
            dynamic_cache: false,
            in_cache_list: false,
            companion: None,
            partial_of: None,
            precompressed: false,
            full_size_estimate: 0,
            texture: None,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.state == ImageState::Resident
    }

    /// Not resident and not currently loading
    pub fn needs_load(&self) -> bool {
        matches!(self.state, ImageState::NotLoaded | ImageState::Purged)
    }

    pub fn is_procedural(&self) -> bool {
        matches!(self.origin, Origin::Procedural(_))
    }
}
