//! Cost-weighted LRU cache of materialized tiles.
//!
//! Entries live in an arena addressed by a stable slot index. A separate
//! recency index maps a monotonically increasing access tick to the slot,
//! so the least recently used entry is always the first key of the index
//! and ties cannot occur: two entries never share a tick, and entries that
//! were never touched keep their insertion order.
//!
//! One cache is shared by every survey in the process and enforces a single
//! global byte budget. All mutation goes through one `parking_lot::Mutex`
//! that is never held while calling into a materializer: evicted payloads
//! are collected under the lock and released after it is dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::types::{CacheKey, CacheStats, SurveyId};
use crate::tile::{MaterializedTile, Payload, TileMaterializer, TransparencyMask};

/// A cache hit: the payload handle and what the cache knows about it.
///
/// The payload is a shared handle; renderers must not keep it beyond the
/// frame that resolved it, otherwise eviction cannot reclaim the memory.
#[derive(Clone)]
pub struct CachedTile {
    pub payload: Payload,
    pub cost: usize,
    pub transparency: TransparencyMask,
    /// When the tile entered the cache.
    pub loaded_at: Instant,
}

impl std::fmt::Debug for CachedTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTile")
            .field("cost", &self.cost)
            .field("transparency", &self.transparency)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

struct Slot {
    key: CacheKey,
    tile: CachedTile,
    releaser: Arc<dyn TileMaterializer>,
    tick: u64,
}

/// Payloads waiting for their release hook.
type Released = Vec<(Arc<dyn TileMaterializer>, Payload)>;

#[derive(Default)]
struct CacheInner {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<CacheKey, usize>,
    recency: BTreeMap<u64, usize>,
    tick: u64,
    resident: usize,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch_slot(&mut self, slot_id: usize) {
        let tick = self.next_tick();
        if let Some(slot) = self.slots[slot_id].as_mut() {
            self.recency.remove(&slot.tick);
            slot.tick = tick;
            self.recency.insert(tick, slot_id);
        }
    }

    fn remove_slot(&mut self, slot_id: usize) -> Option<Slot> {
        let slot = self.slots[slot_id].take()?;
        self.recency.remove(&slot.tick);
        self.index.remove(&slot.key);
        self.resident -= slot.tile.cost;
        self.free.push(slot_id);
        Some(slot)
    }

    fn insert_slot(&mut self, slot: Slot) -> usize {
        let key = slot.key;
        let tick = slot.tick;
        self.resident += slot.tile.cost;
        let slot_id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot_id);
        self.recency.insert(tick, slot_id);
        slot_id
    }

    /// Evict least recently used entries until under `budget`.
    ///
    /// The most recently used entry is never evicted, so an oversized entry
    /// survives until the next insertion.
    fn evict_to(&mut self, budget: usize, released: &mut Released) -> u64 {
        let mut evicted = 0;
        while self.resident > budget && self.index.len() > 1 {
            let Some((_, &slot_id)) = self.recency.iter().next() else {
                break;
            };
            if let Some(slot) = self.remove_slot(slot_id) {
                trace!(key = %slot.key, cost = slot.tile.cost, "Evicted tile");
                released.push((slot.releaser, slot.tile.payload));
                evicted += 1;
            }
        }
        evicted
    }
}

/// Process-wide tile cache with a global byte budget.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use skyhips::cache::{CacheKey, SurveyId, TileCache};
/// use skyhips::index::TileAddress;
/// use skyhips::tile::{ImageMaterializer, MaterializedTile};
///
/// let cache = TileCache::new(1024);
/// let key = CacheKey::new(SurveyId::next(), TileAddress::new(0, 3).unwrap());
/// cache.put(key, MaterializedTile::new(7u8, 16), Arc::new(ImageMaterializer::new()));
/// assert!(cache.get(&key).is_some());
/// ```
pub struct TileCache {
    inner: Mutex<CacheInner>,
    budget: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TileCache {
    /// Create a cache with a byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            budget: AtomicU64::new(budget_bytes as u64),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a tile and mark it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CachedTile> {
        let mut inner = self.inner.lock();
        match inner.index.get(key).copied() {
            Some(slot_id) => {
                inner.touch_slot(slot_id);
                self.hits.fetch_add(1, Ordering::Relaxed);
                inner.slots[slot_id].as_ref().map(|s| s.tile.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace a tile, evicting LRU entries when over budget.
    ///
    /// `releaser` is the materializer whose `destroy` hook releases the
    /// payload once it leaves the cache.
    pub fn put(
        &self,
        key: CacheKey,
        tile: MaterializedTile,
        releaser: Arc<dyn TileMaterializer>,
    ) {
        let budget = self.budget_bytes();
        let mut released = Released::new();
        let evicted = {
            let mut inner = self.inner.lock();
            if let Some(old) = inner.index.get(&key).copied() {
                if let Some(slot) = inner.remove_slot(old) {
                    released.push((slot.releaser, slot.tile.payload));
                }
            }
            let tick = inner.next_tick();
            inner.insert_slot(Slot {
                key,
                tile: CachedTile {
                    payload: tile.payload,
                    cost: tile.cost,
                    transparency: tile.transparency,
                    loaded_at: Instant::now(),
                },
                releaser,
                tick,
            });
            inner.evict_to(budget, &mut released)
        };
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(key = %key, evicted, "Cache over budget, evicted tiles");
        }
        release_all(released);
    }

    /// Mark a tile most recently used without reading it.
    ///
    /// Returns false when the tile is not resident.
    pub fn touch(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock();
        match inner.index.get(key).copied() {
            Some(slot_id) => {
                inner.touch_slot(slot_id);
                true
            }
            None => false,
        }
    }

    /// Whether a tile is resident. Does not affect recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().index.contains_key(key)
    }

    /// Child transparency mask of a resident tile. Does not affect recency.
    pub fn transparency(&self, key: &CacheKey) -> Option<TransparencyMask> {
        let inner = self.inner.lock();
        let slot_id = *inner.index.get(key)?;
        inner.slots[slot_id].as_ref().map(|s| s.tile.transparency)
    }

    /// Remove one tile, releasing its payload. Returns whether it existed.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let slot_id = inner.index.get(key).copied();
            slot_id.and_then(|id| inner.remove_slot(id))
        };
        match removed {
            Some(slot) => {
                slot.releaser.destroy(slot.tile.payload);
                true
            }
            None => false,
        }
    }

    /// Remove every tile of a survey. Returns the number removed.
    pub fn remove_survey(&self, survey: SurveyId) -> usize {
        let released: Released = {
            let mut inner = self.inner.lock();
            let ids: Vec<usize> = inner
                .index
                .iter()
                .filter(|(key, _)| key.survey == survey)
                .map(|(_, &id)| id)
                .collect();
            ids.into_iter()
                .filter_map(|id| inner.remove_slot(id))
                .map(|slot| (slot.releaser, slot.tile.payload))
                .collect()
        };
        let count = released.len();
        if count > 0 {
            debug!(survey = %survey, count, "Purged survey tiles");
        }
        release_all(released);
        count
    }

    /// Change the budget, evicting immediately if the cache is now over it.
    pub fn set_budget(&self, budget_bytes: usize) {
        self.budget.store(budget_bytes as u64, Ordering::Relaxed);
        let mut released = Released::new();
        let evicted = self.inner.lock().evict_to(budget_bytes, &mut released);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        release_all(released);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let released: Released = {
            let mut inner = self.inner.lock();
            let slots = std::mem::take(&mut inner.slots);
            *inner = CacheInner::default();
            slots
                .into_iter()
                .flatten()
                .map(|slot| (slot.releaser, slot.tile.payload))
                .collect()
        };
        release_all(released);
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget.load(Ordering::Relaxed) as usize
    }

    pub fn resident_bytes(&self) -> usize {
        self.inner.lock().resident
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Keys from least to most recently used.
    pub fn lru_order(&self) -> Vec<CacheKey> {
        let inner = self.inner.lock();
        inner
            .recency
            .values()
            .filter_map(|&id| inner.slots[id].as_ref().map(|s| s.key))
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (entry_count, resident_bytes) = {
            let inner = self.inner.lock();
            (inner.index.len(), inner.resident)
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count,
            resident_bytes,
            budget_bytes: self.budget_bytes(),
        }
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.clear();
    }
}

fn release_all(released: Released) {
    for (releaser, payload) in released {
        releaser.destroy(payload);
    }
}
