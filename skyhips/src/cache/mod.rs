//! Tile cache shared by all surveys.
//!
//! The cache maps `(survey, tile address)` to a materialized payload with a
//! byte cost and a child transparency mask, and evicts least recently used
//! entries once the process-wide budget is exceeded.
//!
//! # Example
//!
//! ```ignore
//! use skyhips::cache::{CacheKey, TileCache};
//!
//! let cache = Arc::new(TileCache::new(512 * 1024 * 1024));
//! cache.put(key, materialized, materializer.clone());
//! if let Some(hit) = cache.get(&key) {
//!     let texture = hit.payload.downcast_ref::<Texture>();
//! }
//! ```

mod tile_cache;
mod types;

pub use tile_cache::{CachedTile, TileCache};
pub use types::{CacheKey, CacheStats, SurveyId};
