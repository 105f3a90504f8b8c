//! Budgeted LRU list over the dynamically cached entries
//!
//! Tracks recency for exactly the entries that opted into dynamic caching
//! and evicts from the least recently used end until the configured byte
//! budget holds. The list stores arena indices, never pointers; entries in
//! flight are removed from the list before their load starts and therefore
//! can never be eviction candidates.

use crate::cache::entry::{EntryId, ImageEntry, ImageState};
use crate::render::backend::GpuBackend;

/// LRU order and byte budget for the dynamic image cache
pub struct CacheLru {
    /// Recency order: least recently used first, most recent last
    order: Vec<EntryId>,
    /// Byte ceiling for resident entries in the list
    budget_bytes: u64,
}

impl CacheLru {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            order: Vec::new(),
            budget_bytes,
        }
    }

    /// Link an entry at the most recently used end
    ///
    /// Re-inserting an already linked entry just refreshes its recency.
    pub fn insert(&mut self, id: EntryId) {
        self.unlink(id);
        self.order.push(id);
    }

    /// Move an entry to the most recently used end
    pub fn touch(&mut self, id: EntryId) {
        if self.unlink(id) {
            self.order.push(id);
        }
    }

    /// Unlink an entry from the order
    pub fn remove(&mut self, id: EntryId) {
        self.unlink(id);
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.order.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total resident bytes of the listed entries
    pub fn resident_bytes(&self, entries: &[ImageEntry]) -> u64 {
        self.order
            .iter()
            .map(|id| entries[id.index()].size_bytes)
            .sum()
    }

    /// Evict least recently used entries until `resident + needed` fits the
    /// budget, releasing their textures through the backend.
    ///
    /// Only `Resident` entries are candidates; anything else in the list is
    /// skipped. When no candidate remains the budget is allowed to overrun
    /// and a warning is logged. Returns the number of bytes freed.
    pub fn ensure_budget<B: GpuBackend>(
        &mut self,
        entries: &mut [ImageEntry],
        backend: &mut B,
        needed: u64,
    ) -> u64 {
        let mut total = self.resident_bytes(entries);
        let mut freed = 0u64;
        let mut skip = 0usize;

        while total.saturating_add(needed) > self.budget_bytes {
            let Some(pos) = self.order[skip..]
                .iter()
                .position(|id| entries[id.index()].state == ImageState::Resident)
                .map(|p| p + skip)
            else {
                log::warn!(
                    "image cache budget exceeded: {} resident + {} needed > {} budget, nothing evictable",
                    total,
                    needed,
                    self.budget_bytes
                );
                break;
            };

            let id = self.order.remove(pos);
            skip = pos;
            let entry = &mut entries[id.index()];
            log::debug!("evicting {} ({} bytes)", entry.name, entry.size_bytes);
            total -= entry.size_bytes;
            freed += entry.size_bytes;
            entry.size_bytes = 0;
            entry.state = ImageState::NotLoaded;
            entry.in_cache_list = false;
            if let Some(texture) = entry.texture.take() {
                backend.release(texture);
            }
        }

        freed
    }

    fn unlink(&mut self, id: EntryId) -> bool {
        if let Some(pos) = self.order.iter().position(|&e| e == id) {
            self.order.remove(pos);
            true
        } else {
            false
        }
    }
}
