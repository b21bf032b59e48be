//! Engine context shared by all surveys.

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheStats, TileCache};
use crate::config::{format_size, EngineConfig};
use crate::fetch::ByteFetcher;
use crate::survey::{Survey, SurveyError, SurveyOptions};

/// Owns the process-wide tile cache and the background materialization pool.
///
/// Construct one at startup and create every survey from it; surveys share
/// the cache budget and release their entries when dropped.
pub struct Engine {
    config: EngineConfig,
    cache: Arc<TileCache>,
    pool: Arc<rayon::ThreadPool>,
    fetcher: Arc<dyn ByteFetcher>,
}

impl Engine {
    /// Create an engine fetching through `fetcher` by default.
    pub fn new(config: EngineConfig, fetcher: Arc<dyn ByteFetcher>) -> Result<Self, SurveyError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.materialize_threads.max(1))
            .thread_name(|i| format!("skyhips-materialize-{}", i))
            .build()
            .map_err(|e| SurveyError::WorkerPool(e.to_string()))?;

        info!(
            budget = %format_size(config.cache_budget_bytes),
            threads = config.materialize_threads,
            "Engine started"
        );

        Ok(Self {
            cache: Arc::new(TileCache::new(config.cache_budget_bytes)),
            pool: Arc::new(pool),
            fetcher,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Change the shared cache budget, evicting as needed.
    pub fn set_cache_budget(&mut self, bytes: usize) {
        self.config.cache_budget_bytes = bytes;
        self.cache.set_budget(bytes);
    }

    pub fn create_survey(&self, options: SurveyOptions) -> Survey {
        Survey::new(
            options,
            &self.config,
            Arc::clone(&self.cache),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.pool),
        )
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .finish()
    }
}
