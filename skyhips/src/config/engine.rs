//! Engine-wide settings.

use std::time::Duration;

use crate::fetch::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_NEGATIVE_TTL_SECS};

// ==================== Engine Defaults ====================

/// Default global tile cache budget (512 MB).
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 512 * 1024 * 1024;

/// Default number of background materialization threads.
pub const DEFAULT_MATERIALIZE_THREADS: usize = 2;

/// Default fade-in duration for newly materialized tiles in milliseconds.
pub const DEFAULT_FADE_IN_MS: u64 = 500;

/// Order of the all-sky mosaic.
///
/// HiPS all-sky files are always built from order-3 cells.
pub const DEFAULT_ALLSKY_ORDER: u8 = 3;

/// Settings shared by every survey created from one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Byte budget of the shared tile cache.
    pub cache_budget_bytes: usize,

    /// How long a failed tile is left alone before it may be fetched again.
    pub negative_ttl: Duration,

    /// Timeout applied to every remote fetch.
    pub fetch_timeout: Duration,

    /// Worker threads for off-thread materialization.
    pub materialize_threads: usize,

    /// Fade-in duration of a freshly materialized exact tile.
    ///
    /// Zero disables fading.
    pub fade_in: Duration,

    /// Order of the all-sky mosaic cells.
    pub allsky_order: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            negative_ttl: Duration::from_secs(DEFAULT_NEGATIVE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            materialize_threads: DEFAULT_MATERIALIZE_THREADS,
            fade_in: Duration::from_millis(DEFAULT_FADE_IN_MS),
            allsky_order: DEFAULT_ALLSKY_ORDER,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tile cache budget in bytes.
    pub fn with_cache_budget(mut self, bytes: usize) -> Self {
        self.cache_budget_bytes = bytes;
        self
    }

    /// Set the failed-tile retry suppression window.
    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the number of materialization threads (at least one).
    pub fn with_materialize_threads(mut self, threads: usize) -> Self {
        self.materialize_threads = threads.max(1);
        self
    }

    pub fn with_fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = fade_in;
        self
    }
}
