//! The image cache: registry, streaming control and level lifecycle
//!
//! Single owner of every image entry. Callers resolve names into stable
//! handles and bind them each frame; the cache keeps one resident resource
//! per name, streams large images in the background, evicts under budget
//! pressure and purges unreferenced images across level transitions.
//!
//! All mutation happens on the calling thread. The only work off-thread is
//! the raw file read inside `ImageLoader`; its results are applied by
//! `pump()`.

use std::collections::HashMap;

use crate::cache::entry::{EntryId, ImageEntry, ImageState, Origin};
use crate::cache::lru::CacheLru;
use crate::cache::name::{self, MAX_IMAGE_NAME};
use crate::cache::params::{ImageParams, Reconcile, reconcile};
use crate::core::config::CacheConfig;
use crate::core::error::Error;
use crate::core::types::PixelData;
use crate::generate::{self, GeneratorId};
use crate::render::backend::GpuBackend;
use crate::streaming::disk;
use crate::streaming::loader::{ImageLoader, LoadOutcome};

/// Counters reported by `end_level_load`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelLoadStats {
    /// Entries whose content was released because nothing referenced them
    pub purged: usize,
    /// Referenced entries that stayed resident from the previous level
    pub kept: usize,
    /// Referenced entries loaded by the sweep
    pub loaded: usize,
}

/// Image registry, dynamic cache and level lifecycle controller
pub struct ImageCache<B: GpuBackend> {
    config: CacheConfig,
    backend: B,
    /// Entry arena; slots are never freed while the cache lives
    entries: Vec<ImageEntry>,
    /// Normalized key -> entry. Partial stand-ins are not registered here
    by_key: HashMap<String, EntryId>,
    lru: CacheLru,
    loader: ImageLoader,
    default_image: EntryId,
    inside_level_load: bool,
    last_logged_in_flight: usize,
}

impl<B: GpuBackend> ImageCache<B> {
    /// Create the cache and its built-in procedural images
    pub fn new(config: CacheConfig, backend: B) -> Self {
        let loader = ImageLoader::new(config.max_background_loads);
        let lru = CacheLru::new(config.budget_bytes);

        let mut cache = Self {
            config,
            backend,
            entries: Vec::new(),
            by_key: HashMap::new(),
            lru,
            loader,
            default_image: EntryId::new(0),
            inside_level_load: false,
            last_logged_in_flight: 0,
        };

        cache.default_image = cache.from_generator("_default", GeneratorId::Default);
        cache.from_generator("_white", GeneratorId::White);
        cache.from_generator("_black", GeneratorId::Black);
        cache.from_generator("_flat", GeneratorId::FlatNormal);
        cache.from_generator("_ramp", GeneratorId::Ramp);
        cache.from_generator("_alphaNotch", GeneratorId::AlphaNotch);
        cache.from_generator("_borderClamp", GeneratorId::BorderClamp);

        cache
    }

    /// Find or create the image for a name, always returning a valid handle.
    ///
    /// Loading may be deferred for dynamic or level loading; content streams
    /// in over later frames and `bind` falls back to the default image until
    /// then.
    ///
    /// # Panics
    /// When the name was previously requested with a different cube map
    /// kind. That is a configuration bug upstream and cannot be reconciled.
    pub fn resolve(&mut self, name_str: &str, params: ImageParams) -> EntryId {
        if name::is_default_name(name_str) {
            log::debug!("defaulted image request");
            return self.default_image;
        }
        if name_str.len() > MAX_IMAGE_NAME {
            log::warn!(
                "image name too long ({} bytes), using default",
                name_str.len()
            );
            return self.default_image;
        }

        let key = name::normalize(name_str);

        if let Some(&id) = self.by_key.get(&key) {
            // built-ins like _white and _flat always match the other options
            if key.starts_with('_') {
                return id;
            }

            if self.entries[id.index()].params.cube != params.cube {
                panic!(
                    "image '{}' has been referenced with conflicting cube map states",
                    name_str
                );
            }

            match reconcile(&self.entries[id.index()].params, &params) {
                Reconcile::CubeConflict => unreachable!("cube kinds compared above"),
                Reconcile::Keep => {
                    self.mark_referenced(id);
                }
                Reconcile::KeepWarnSampling => {
                    log::warn!(
                        "image {} requested with mismatched filter/repeat, sharing existing data",
                        name_str
                    );
                    self.mark_referenced(id);
                }
                Reconcile::Reload(union) => {
                    self.entries[id.index()].params = union;
                    self.mark_referenced(id);
                    if self.config.preload && !self.inside_level_load {
                        self.entries[id.index()].referenced_outside_level_load = true;
                        self.load_entry_sync(id);
                        log::debug!("{} reloaded for mixed references", name_str);
                    }
                }
            }
            return id;
        }

        // create a new entry
        let mut effective = params;
        if name::forces_no_downsize(&key) {
            effective.allow_downsize = false;
        }

        let store = disk::store_path(&self.config.base_dir, &key);
        let store_len = disk::store_len(&store);

        let id = self.alloc_entry(name_str, key.clone(), Origin::FileBacked);
        self.by_key.insert(key.clone(), id);
        {
            let entry = &mut self.entries[id.index()];
            entry.params = effective;
            entry.level_load_referenced = true;
            entry.precompressed = store_len.is_some();
        }

        // a large precompressed image gets a resident stand-in now and
        // streams the full version on demand through the dynamic cache
        if self.should_partial_cache(effective, store_len) {
            let pid = self.alloc_entry(name_str, key, Origin::FileBacked);
            {
                let partial = &mut self.entries[pid.index()];
                partial.params = effective;
                partial.level_load_referenced = true;
                partial.precompressed = true;
                partial.partial_of = Some(id);
            }
            let entry = &mut self.entries[id.index()];
            entry.companion = Some(pid);
            entry.dynamic_cache = true;

            if self.config.preload && !self.inside_level_load {
                self.load_entry_sync(pid);
            }
            return id;
        }

        if self.config.preload && !self.inside_level_load {
            self.entries[id.index()].referenced_outside_level_load = true;
            self.load_entry_sync(id);
        }

        id
    }

    /// Find or create a procedural image computed by `generator`
    pub fn from_generator(&mut self, name_str: &str, generator: GeneratorId) -> EntryId {
        if name_str.len() > MAX_IMAGE_NAME {
            log::warn!(
                "image name too long ({} bytes), using default",
                name_str.len()
            );
            return self.default_image;
        }

        let key = name::normalize(name_str);
        if let Some(&id) = self.by_key.get(&key) {
            let same_generator =
                matches!(self.entries[id.index()].origin, Origin::Procedural(g) if g == generator);
            if !same_generator {
                log::warn!("reused image {} with mixed generators", name_str);
            }
            return id;
        }

        let id = self.alloc_entry(name_str, key.clone(), Origin::Procedural(generator));
        self.by_key.insert(key, id);

        if self.config.preload {
            self.entries[id.index()].referenced_outside_level_load = true;
            self.load_entry_sync(id);
        }

        id
    }

    /// Look an image up without creating it
    pub fn get(&self, name_str: &str) -> Option<EntryId> {
        if name::is_default_name(name_str) {
            return Some(self.default_image);
        }
        self.by_key.get(&name::normalize(name_str)).copied()
    }

    /// Pick the entry to draw with this frame and keep the streaming state
    /// moving.
    ///
    /// Resident entries are touched in the LRU and returned as-is. A
    /// dynamically cached image that is not resident returns its stand-in
    /// and kicks a background load of the full version. Anything else is
    /// loaded on the spot if possible; the default image covers the rest.
    pub fn bind(&mut self, id: EntryId) -> EntryId {
        if self.entries[id.index()].is_resident() {
            if self.entries[id.index()].in_cache_list {
                self.lru.touch(id);
            }
            return id;
        }

        if let Some(pid) = self.entries[id.index()].companion {
            if self.entries[pid.index()].is_resident() {
                if self.entries[id.index()].state != ImageState::LoadingAsync {
                    self.start_background_load(id);
                }
                return pid;
            }
        }

        if self.entries[id.index()].needs_load() {
            self.load_entry_sync(id);
            if self.entries[id.index()].is_resident() {
                if self.entries[id.index()].dynamic_cache {
                    self.lru.insert(id);
                    self.entries[id.index()].in_cache_list = true;
                }
                return id;
            }
        }

        self.default_image
    }

    /// Apply completed background loads; call once per frame
    pub fn pump(&mut self) {
        for outcome in self.loader.poll() {
            match outcome {
                LoadOutcome::Loaded { id, bytes } => {
                    if self.entries[id.index()].state != ImageState::LoadingAsync {
                        // purged while the read was in flight; the slot may
                        // have been repurposed, never upload stale bytes
                        log::debug!(
                            "discarding stale background load for {}",
                            self.entries[id.index()].name
                        );
                        continue;
                    }
                    let pixels = disk::decompress_image(&bytes)
                        .and_then(|data| disk::level_pixels(&data, 0));
                    match pixels {
                        Ok(pixels) => {
                            self.entries[id.index()].full_size_estimate = pixels.size_bytes();
                            self.upload_entry(id, &pixels);
                            if self.entries[id.index()].dynamic_cache {
                                self.lru.insert(id);
                                self.entries[id.index()].in_cache_list = true;
                            }
                            log::debug!(
                                "background load completed: {}",
                                self.entries[id.index()].name
                            );
                        }
                        Err(e) => {
                            log::warn!(
                                "background load of {} failed: {}",
                                self.entries[id.index()].name,
                                e
                            );
                            self.entries[id.index()].state = ImageState::NotLoaded;
                        }
                    }
                }
                LoadOutcome::Failed { id, error } => {
                    log::warn!(
                        "background load of {} failed: {}",
                        self.entries[id.index()].name,
                        error
                    );
                    if self.entries[id.index()].state == ImageState::LoadingAsync {
                        self.entries[id.index()].state = ImageState::NotLoaded;
                    }
                }
            }
        }

        let in_flight = self.loader.pending_count();
        if in_flight != self.last_logged_in_flight {
            log::debug!("background loads: {}", in_flight);
            self.last_logged_in_flight = in_flight;
        }
    }

    /// Mark all file-backed images as unreferenced for the coming level,
    /// without freeing anything (unless the purge-all policy is active)
    pub fn begin_level_load(&mut self) {
        self.inside_level_load = true;

        for i in 0..self.entries.len() {
            if self.entries[i].is_procedural() {
                continue;
            }
            if self.config.purge_all_on_level_load {
                self.purge_entry(EntryId::new(i));
            }
            self.entries[i].level_load_referenced = false;
        }
    }

    /// Free all images the level never referenced, then load the ones it
    /// did. Purging first bounds peak memory to one level's worth of data
    /// instead of the union of two.
    pub fn end_level_load(&mut self) -> LevelLoadStats {
        self.inside_level_load = false;
        let mut stats = LevelLoadStats::default();

        for i in 0..self.entries.len() {
            let (procedural, referenced, sticky, resident) = {
                let e = &self.entries[i];
                (
                    e.is_procedural(),
                    e.level_load_referenced,
                    e.referenced_outside_level_load,
                    e.is_resident(),
                )
            };
            if procedural {
                continue;
            }
            if !referenced && !sticky {
                stats.purged += 1;
                self.purge_entry(EntryId::new(i));
            } else if resident {
                stats.kept += 1;
            }
        }

        for i in 0..self.entries.len() {
            let (procedural, referenced, needs_load, paired) = {
                let e = &self.entries[i];
                (
                    e.is_procedural(),
                    e.level_load_referenced,
                    e.needs_load(),
                    e.companion.is_some(),
                )
            };
            if procedural {
                continue;
            }
            // full images with a stand-in stream on demand instead
            if referenced && needs_load && !paired {
                stats.loaded += 1;
                self.load_entry_sync(EntryId::new(i));
            }
        }

        log::info!(
            "level load finished: {} purged, {} kept, {} new loaded",
            stats.purged,
            stats.kept,
            stats.loaded
        );
        stats
    }

    /// Release the content of every image, keeping all handles valid
    pub fn purge_all(&mut self) {
        for i in 0..self.entries.len() {
            self.purge_entry(EntryId::new(i));
        }
    }

    /// Reload an image from its origin with its current params
    pub fn reload(&mut self, id: EntryId) {
        self.load_entry_sync(id);
    }

    /// Regenerate all procedural images and reload all resident file-backed
    /// images from their source
    pub fn reload_all(&mut self) {
        for i in 0..self.entries.len() {
            let reload = match self.entries[i].origin {
                Origin::Procedural(_) => true,
                Origin::FileBacked => self.entries[i].is_resident(),
            };
            if reload {
                self.load_entry_sync(EntryId::new(i));
            }
        }
    }

    /// Tear the cache down, releasing every texture. Handles die with it.
    /// Returns the backend to its owner.
    pub fn shutdown(mut self) -> B {
        for i in 0..self.entries.len() {
            if let Some(texture) = self.entries[i].texture.take() {
                self.backend.release(texture);
            }
        }
        self.entries.clear();
        self.by_key.clear();
        self.backend
    }

    // --- Accessors and diagnostics ---

    pub fn entry(&self, id: EntryId) -> &ImageEntry {
        &self.entries[id.index()]
    }

    pub fn default_image(&self) -> EntryId {
        self.default_image
    }

    pub fn image_count(&self) -> usize {
        self.entries.len()
    }

    /// All entries, partial stand-ins included
    pub fn images(&self) -> impl Iterator<Item = &ImageEntry> {
        self.entries.iter()
    }

    /// Bytes resident across the whole registry
    pub fn resident_bytes_total(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.is_resident())
            .map(|e| e.size_bytes)
            .sum()
    }

    /// Bytes resident in the dynamic (evictable) cache only
    pub fn cached_bytes(&self) -> u64 {
        self.lru.resident_bytes(&self.entries)
    }

    pub fn in_flight_loads(&self) -> usize {
        self.loader.pending_count()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // --- Internals ---

    fn alloc_entry(&mut self, name_str: &str, key: String, origin: Origin) -> EntryId {
        let id = EntryId::new(self.entries.len());
        self.entries.push(ImageEntry::new(id, name_str, key, origin));
        id
    }

    fn mark_referenced(&mut self, id: EntryId) {
        self.entries[id.index()].level_load_referenced = true;
        if self.entries[id.index()].in_cache_list {
            self.lru.touch(id);
        }
        if let Some(pid) = self.entries[id.index()].companion {
            self.entries[pid.index()].level_load_referenced = true;
        }
    }

    fn should_partial_cache(&self, params: ImageParams, store_len: Option<u64>) -> bool {
        if !self.config.use_cache {
            return false;
        }
        // downsize permission doubles as permission to partial-load
        if !params.allow_downsize {
            return false;
        }
        if self.config.cache_min_bytes == 0 {
            return false;
        }
        matches!(store_len, Some(len) if len > self.config.cache_min_bytes)
    }

    /// Load an entry's content on the calling thread
    fn load_entry_sync(&mut self, id: EntryId) {
        self.entries[id.index()].state = ImageState::LoadingSync;
        match self.entries[id.index()].origin {
            Origin::Procedural(generator) => {
                let pixels = generate::generate(generator);
                self.upload_entry(id, &pixels);
            }
            Origin::FileBacked => match self.read_file_pixels(id) {
                Ok(pixels) => self.upload_entry(id, &pixels),
                Err(e) => {
                    log::warn!(
                        "couldn't load image {}: {}",
                        self.entries[id.index()].name,
                        e
                    );
                    self.entries[id.index()].state = ImageState::NotLoaded;
                }
            },
        }
    }

    fn read_file_pixels(&mut self, id: EntryId) -> Result<PixelData, Error> {
        let key = self.entries[id.index()].key.clone();
        let store = disk::store_path(&self.config.base_dir, &key);

        // the store may have been built since this entry was specified
        if !self.entries[id.index()].precompressed && disk::store_len(&store).is_some() {
            self.entries[id.index()].precompressed = true;
        }

        if self.entries[id.index()].precompressed {
            let data = disk::load_image_sync(&store)?;
            let full_bytes = data
                .levels
                .first()
                .map(|l| l.pixels.len() as u64)
                .unwrap_or(0);
            if let Some(full_id) = self.entries[id.index()].partial_of {
                self.entries[full_id.index()].full_size_estimate = full_bytes;
                let level = disk::partial_level(&data, self.config.cache_min_bytes);
                disk::level_pixels(&data, level)
            } else {
                self.entries[id.index()].full_size_estimate = full_bytes;
                disk::level_pixels(&data, 0)
            }
        } else {
            let source = disk::source_path(&self.config.base_dir, &key)
                .ok_or_else(|| Error::Decode(format!("no image file for '{}'", key)))?;
            disk::decode_source(&source)
        }
    }

    fn upload_entry(&mut self, id: EntryId, pixels: &PixelData) {
        if let Some(old) = self.entries[id.index()].texture.take() {
            self.backend.release(old);
        }
        let params = self.entries[id.index()].params;
        let texture = self.backend.upload(pixels, &params);
        let entry = &mut self.entries[id.index()];
        entry.texture = texture;
        entry.size_bytes = pixels.size_bytes();
        entry.state = ImageState::Resident;
    }

    /// Admit a background read of an entry's store file
    ///
    /// Budget is freed before admission, and the entry leaves the LRU list
    /// so the load it caused can never evict it.
    fn start_background_load(&mut self, id: EntryId) {
        if self.entries[id.index()].state == ImageState::LoadingAsync {
            return;
        }
        if !self.entries[id.index()].precompressed {
            log::warn!(
                "{} has no precompressed file, cannot stream",
                self.entries[id.index()].name
            );
            return;
        }

        let needed = self.entries[id.index()].full_size_estimate;
        self.lru
            .ensure_budget(&mut self.entries, &mut self.backend, needed);

        self.lru.remove(id);
        {
            let entry = &mut self.entries[id.index()];
            entry.in_cache_list = false;
            entry.state = ImageState::LoadingAsync;
        }

        let path = disk::store_path(&self.config.base_dir, &self.entries[id.index()].key);
        self.loader.request(id, path);
        log::debug!("background load started: {}", self.entries[id.index()].name);
    }

    /// Release an entry's content; the slot and handle stay valid
    fn purge_entry(&mut self, id: EntryId) {
        self.lru.remove(id);
        let entry = &mut self.entries[id.index()];
        entry.in_cache_list = false;
        entry.size_bytes = 0;
        entry.state = ImageState::Purged;
        if let Some(texture) = entry.texture.take() {
            self.backend.release(texture);
        }
    }
}
