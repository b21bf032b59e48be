//! Negative result cache for failed tiles.
//!
//! A tile that failed to fetch or decode is remembered for a bounded
//! window so that the traversal, which asks for the same tiles every frame,
//! does not hammer the fetcher. Entries expire on their own.

use std::time::Duration;

use moka::sync::Cache;

use crate::index::TileAddress;
use crate::tile::TileError;

/// Default retry suppression window.
pub const DEFAULT_NEGATIVE_TTL_SECS: u64 = 60;

/// Upper bound on remembered failures per survey.
const MAX_NEGATIVE_ENTRIES: u64 = 100_000;

/// Failed tiles with a time-to-live.
#[derive(Clone)]
pub struct NegativeCache {
    entries: Cache<TileAddress, TileError>,
    ttl: Duration,
}

impl NegativeCache {
    pub fn new(ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(MAX_NEGATIVE_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { entries, ttl }
    }

    /// The recorded failure, if still within the window.
    pub fn get(&self, addr: &TileAddress) -> Option<TileError> {
        self.entries.get(addr)
    }

    pub fn insert(&self, addr: TileAddress, err: TileError) {
        self.entries.insert(addr, err);
    }

    /// Forget a failure before it expires.
    pub fn invalidate(&self, addr: &TileAddress) {
        self.entries.invalidate(addr);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl std::fmt::Debug for NegativeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegativeCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
