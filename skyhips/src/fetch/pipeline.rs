//! Per-tile fetch state machine.
//!
//! ```text
//! idle ──request──► requested ──bytes──► bytes-ready ──create──► materialized
//!   │                   │                     │                  (cache entry)
//!   │ cache-only        └──fetch error──┐     └──decode error──┐
//!   ▼                                   ▼                      ▼
//! idle                                error (negative cache, expires back to idle)
//! ```
//!
//! The render thread drives the machine by calling [`FetchPipeline::request`]
//! every time it needs a tile. Each call polls the fetcher once and returns
//! the latest committed state without waiting. When a background pool is
//! configured, materialization runs on it and commits straight into the
//! tile cache; otherwise it runs inline on the calling thread.
//!
//! Once a tile is materialized its in-flight record is discarded: the cache
//! entry is the durable record from then on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::fetcher::{ByteFetcher, FetchPoll};
use super::negative::NegativeCache;
use crate::cache::{CacheKey, SurveyId, TileCache};
use crate::index::TileAddress;
use crate::tile::{TileError, TileMaterializer};

/// Observed state of one tile in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    /// Nothing requested (or cache-only mode).
    Idle,
    /// Bytes are being retrieved.
    Requested,
    /// Bytes arrived and are being materialized off-thread.
    BytesReady,
    /// The tile is in the cache.
    Materialized,
    /// The tile failed recently; requests are suppressed until it expires.
    Error(TileError),
}

impl FetchState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FetchState::Requested | FetchState::BytesReady)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Requested,
    Materializing,
}

/// Counters for pipeline activity.
#[derive(Debug, Default)]
pub struct FetchCounters {
    requests: AtomicU64,
    materialized: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`FetchCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Fetches started.
    pub requests: u64,
    /// Tiles committed to the cache.
    pub materialized: u64,
    /// Fetch or decode failures.
    pub failed: u64,
    /// Tiles currently in flight.
    pub in_flight: usize,
}

/// Everything needed to commit a materialized tile, shareable with workers.
#[derive(Clone)]
struct Committer {
    survey: SurveyId,
    cache: Arc<TileCache>,
    materializer: Arc<dyn TileMaterializer>,
    negative: NegativeCache,
    in_flight: Arc<DashMap<TileAddress, InFlight>>,
    counters: Arc<FetchCounters>,
    /// Set once the owning survey is gone; late commits are released.
    closed: Arc<AtomicBool>,
}

impl Committer {
    fn materialize(&self, addr: TileAddress, data: Bytes) -> FetchState {
        match self.materializer.create(addr, &data) {
            Ok(tile) => {
                debug!(
                    survey = %self.survey,
                    order = addr.order(),
                    pix = addr.pix(),
                    cost = tile.cost,
                    "Tile materialized"
                );
                if self.closed.load(Ordering::Acquire) {
                    self.materializer.destroy(tile.payload);
                    self.in_flight.remove(&addr);
                    return FetchState::Idle;
                }
                // Cache first, then drop the record: readers always see one of them.
                let key = CacheKey::new(self.survey, addr);
                self.cache.put(key, tile, Arc::clone(&self.materializer));
                self.counters.materialized.fetch_add(1, Ordering::Relaxed);
                self.in_flight.remove(&addr);
                // The survey may have purged its tiles between the check and the put.
                if self.closed.load(Ordering::Acquire) {
                    self.cache.remove(&key);
                    return FetchState::Idle;
                }
                FetchState::Materialized
            }
            Err(e) => self.fail(addr, e.into()),
        }
    }

    fn fail(&self, addr: TileAddress, err: TileError) -> FetchState {
        warn!(
            survey = %self.survey,
            order = addr.order(),
            pix = addr.pix(),
            error = %err,
            "Tile load failed"
        );
        self.negative.insert(addr, err.clone());
        self.in_flight.remove(&addr);
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        FetchState::Error(err)
    }
}

/// Options for a survey's pipeline.
#[derive(Clone, Default)]
pub struct PipelineOptions {
    /// Serve only what is cached; never start a fetch.
    pub cache_only: bool,
    /// Pool for off-thread materialization. `None` materializes inline.
    pub background: Option<Arc<rayon::ThreadPool>>,
}

/// Fetch pipeline owned by one survey.
pub struct FetchPipeline {
    fetcher: Arc<dyn ByteFetcher>,
    committer: Committer,
    options: PipelineOptions,
}

impl FetchPipeline {
    pub fn new(
        survey: SurveyId,
        fetcher: Arc<dyn ByteFetcher>,
        materializer: Arc<dyn TileMaterializer>,
        cache: Arc<TileCache>,
        negative: NegativeCache,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            committer: Committer {
                survey,
                cache,
                materializer,
                negative,
                in_flight: Arc::new(DashMap::new()),
                counters: Arc::new(FetchCounters::default()),
                closed: Arc::new(AtomicBool::new(false)),
            },
            options,
        }
    }

    /// Advance the state machine for `addr` by one step and report the result.
    ///
    /// `locator` is only evaluated when the fetcher has to be polled.
    pub fn request(&self, addr: TileAddress, locator: impl FnOnce() -> String) -> FetchState {
        let c = &self.committer;
        if c.cache.contains(&CacheKey::new(c.survey, addr)) {
            return FetchState::Materialized;
        }
        if let Some(err) = c.negative.get(&addr) {
            return FetchState::Error(err);
        }
        if self.options.cache_only {
            return FetchState::Idle;
        }
        if let Some(InFlight::Materializing) = c.in_flight.get(&addr).map(|r| *r) {
            return FetchState::BytesReady;
        }

        let first = c.in_flight.insert(addr, InFlight::Requested).is_none();
        // A background commit may have landed since the first cache check.
        if c.cache.contains(&CacheKey::new(c.survey, addr)) {
            c.in_flight.remove(&addr);
            return FetchState::Materialized;
        }
        if first {
            c.counters.requests.fetch_add(1, Ordering::Relaxed);
        }

        match self.fetcher.fetch(&locator()) {
            FetchPoll::Pending => FetchState::Requested,
            FetchPoll::Failed(e) => c.fail(addr, e.into()),
            FetchPoll::Ready(data) => match &self.options.background {
                Some(pool) => {
                    c.in_flight.insert(addr, InFlight::Materializing);
                    let committer = c.clone();
                    pool.spawn(move || {
                        committer.materialize(addr, data);
                    });
                    FetchState::BytesReady
                }
                None => c.materialize(addr, data),
            },
        }
    }

    /// Current state of `addr` without side effects.
    pub fn state(&self, addr: TileAddress) -> FetchState {
        let c = &self.committer;
        if c.cache.contains(&CacheKey::new(c.survey, addr)) {
            return FetchState::Materialized;
        }
        if let Some(err) = c.negative.get(&addr) {
            return FetchState::Error(err);
        }
        match c.in_flight.get(&addr).map(|r| *r) {
            Some(InFlight::Requested) => FetchState::Requested,
            Some(InFlight::Materializing) => FetchState::BytesReady,
            None => FetchState::Idle,
        }
    }

    /// Forget a recorded failure so the next request retries immediately.
    pub fn retry(&self, addr: TileAddress) {
        self.committer.negative.invalidate(&addr);
    }

    /// Stop committing to the cache. Materializations still running on the
    /// background pool release their payload instead of caching it.
    pub fn close(&self) {
        self.committer.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.committer.closed.load(Ordering::Acquire)
    }

    pub fn is_cache_only(&self) -> bool {
        self.options.cache_only
    }

    pub fn stats(&self) -> FetchStats {
        let c = &self.committer;
        FetchStats {
            requests: c.counters.requests.load(Ordering::Relaxed),
            materialized: c.counters.materialized.load(Ordering::Relaxed),
            failed: c.counters.failed.load(Ordering::Relaxed),
            in_flight: c.in_flight.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fetcher::tests::MockFetcher;
    use crate::fetch::FetchError;
    use crate::tile::{MaterializeError, MaterializedTile, TransparencyMask};
    use std::time::{Duration, Instant};

    /// Materializer turning bytes into their length; `b"bad"` fails.
    struct LenMaterializer;

    impl TileMaterializer for LenMaterializer {
        fn create(
            &self,
            _addr: TileAddress,
            data: &[u8],
        ) -> Result<MaterializedTile, MaterializeError> {
            if data == b"bad" {
                return Err(MaterializeError::Decode("bad".to_string()));
            }
            Ok(MaterializedTile::new(data.len(), data.len())
                .with_transparency(TransparencyMask::from_bits(0b0001)))
        }
    }

    struct Fixture {
        fetcher: Arc<MockFetcher>,
        cache: Arc<TileCache>,
        pipeline: FetchPipeline,
        survey: SurveyId,
    }

    fn fixture(options: PipelineOptions) -> Fixture {
        let fetcher = Arc::new(MockFetcher::new());
        let cache = Arc::new(TileCache::new(1 << 20));
        let survey = SurveyId::next();
        let pipeline = FetchPipeline::new(
            survey,
            fetcher.clone(),
            Arc::new(LenMaterializer),
            cache.clone(),
            NegativeCache::new(Duration::from_secs(60)),
            options,
        );
        Fixture {
            fetcher,
            cache,
            pipeline,
            survey,
        }
    }

    fn addr(pix: u64) -> TileAddress {
        TileAddress::new(3, pix).unwrap()
    }

    fn loc(pix: u64) -> String {
        format!("tile/{}", pix)
    }

    #[test]
    fn test_inline_materialization() {
        let f = fixture(PipelineOptions::default());
        f.fetcher.insert(loc(1), vec![0u8; 12]);

        assert_eq!(f.pipeline.request(addr(1), || loc(1)), FetchState::Materialized);
        let hit = f.cache.get(&CacheKey::new(f.survey, addr(1))).unwrap();
        assert_eq!(hit.payload.downcast_ref::<usize>(), Some(&12));
        assert_eq!(hit.transparency.bits(), 0b0001);
        assert_eq!(f.pipeline.stats().in_flight, 0);
        assert_eq!(f.pipeline.stats().materialized, 1);
    }

    #[test]
    fn test_pending_then_ready() {
        let f = fixture(PipelineOptions::default());
        f.fetcher.insert(loc(2), vec![1, 2]);
        f.fetcher.pending(loc(2));

        assert_eq!(f.pipeline.request(addr(2), || loc(2)), FetchState::Requested);
        assert_eq!(f.pipeline.request(addr(2), || loc(2)), FetchState::Requested);
        assert_eq!(f.pipeline.state(addr(2)), FetchState::Requested);
        assert_eq!(f.pipeline.stats().requests, 1);

        f.fetcher.release(&loc(2));
        assert_eq!(f.pipeline.request(addr(2), || loc(2)), FetchState::Materialized);
        assert_eq!(f.pipeline.state(addr(2)), FetchState::Materialized);
    }

    #[test]
    fn test_materialized_tile_is_not_refetched() {
        let f = fixture(PipelineOptions::default());
        f.fetcher.insert(loc(3), vec![1]);
        f.pipeline.request(addr(3), || loc(3));
        f.pipeline.request(addr(3), || loc(3));
        assert_eq!(f.fetcher.calls(&loc(3)), 1);
    }

    #[test]
    fn test_fetch_error_is_negatively_cached() {
        let f = fixture(PipelineOptions::default());
        f.fetcher.fail(loc(4), FetchError::Http("503".to_string()));

        let state = f.pipeline.request(addr(4), || loc(4));
        assert!(matches!(state, FetchState::Error(TileError::FetchFailed(_))));

        // Immediate re-requests are coalesced into no-ops.
        for _ in 0..10 {
            assert!(matches!(
                f.pipeline.request(addr(4), || loc(4)),
                FetchState::Error(_)
            ));
        }
        assert_eq!(f.fetcher.calls(&loc(4)), 1);
        assert_eq!(f.pipeline.stats().failed, 1);

        f.pipeline.retry(addr(4));
        f.pipeline.request(addr(4), || loc(4));
        assert_eq!(f.fetcher.calls(&loc(4)), 2);
    }

    #[test]
    fn test_decode_error_is_negatively_cached() {
        let f = fixture(PipelineOptions::default());
        f.fetcher.insert(loc(5), b"bad".to_vec());
        assert!(matches!(
            f.pipeline.request(addr(5), || loc(5)),
            FetchState::Error(TileError::DecodeFailed(_))
        ));
        assert!(matches!(f.pipeline.state(addr(5)), FetchState::Error(_)));
        assert!(!f.cache.contains(&CacheKey::new(f.survey, addr(5))));
    }

    #[test]
    fn test_cache_only_never_fetches() {
        let f = fixture(PipelineOptions {
            cache_only: true,
            background: None,
        });
        f.fetcher.insert(loc(6), vec![1]);
        assert_eq!(f.pipeline.request(addr(6), || loc(6)), FetchState::Idle);
        assert_eq!(f.fetcher.total_calls(), 0);
    }

    #[test]
    fn test_background_materialization() {
        let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap());
        let f = fixture(PipelineOptions {
            cache_only: false,
            background: Some(pool),
        });
        f.fetcher.insert(loc(7), vec![0u8; 3]);

        let first = f.pipeline.request(addr(7), || loc(7));
        assert!(matches!(
            first,
            FetchState::BytesReady | FetchState::Materialized
        ));

        let deadline = Instant::now() + Duration::from_secs(5);
        while f.pipeline.state(addr(7)) != FetchState::Materialized {
            assert!(Instant::now() < deadline, "background materialization stalled");
            // Polling while materializing must not reach the fetcher again.
            f.pipeline.request(addr(7), || loc(7));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(f.fetcher.calls(&loc(7)), 1);
        assert!(f.cache.contains(&CacheKey::new(f.survey, addr(7))));
    }

    /// Blocks in `create` until the gate opens.
    struct GatedMaterializer {
        gate: Arc<parking_lot::Mutex<()>>,
        destroyed: Arc<AtomicU64>,
    }

    impl TileMaterializer for GatedMaterializer {
        fn create(
            &self,
            _addr: TileAddress,
            data: &[u8],
        ) -> Result<MaterializedTile, MaterializeError> {
            let _open = self.gate.lock();
            Ok(MaterializedTile::new(data.len(), data.len()))
        }

        fn destroy(&self, payload: crate::tile::Payload) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            drop(payload);
        }
    }

    #[test]
    fn test_closed_pipeline_releases_late_commit() {
        let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        let cache = Arc::new(TileCache::new(1 << 20));
        let gate = Arc::new(parking_lot::Mutex::new(()));
        let destroyed = Arc::new(AtomicU64::new(0));
        let pipeline = FetchPipeline::new(
            SurveyId::next(),
            fetcher.clone(),
            Arc::new(GatedMaterializer {
                gate: Arc::clone(&gate),
                destroyed: Arc::clone(&destroyed),
            }),
            cache.clone(),
            NegativeCache::new(Duration::from_secs(60)),
            PipelineOptions {
                cache_only: false,
                background: Some(pool),
            },
        );
        fetcher.insert(loc(8), vec![0u8; 5]);

        let held = gate.lock();
        assert_eq!(pipeline.request(addr(8), || loc(8)), FetchState::BytesReady);
        pipeline.close();
        assert!(pipeline.is_closed());
        drop(held);

        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.stats().in_flight > 0 {
            assert!(Instant::now() < deadline, "background job never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.resident_bytes(), 0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_background_commits_leave_no_stale_records() {
        let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap());
        let f = fixture(PipelineOptions {
            cache_only: false,
            background: Some(pool),
        });
        for pix in 0..64 {
            f.fetcher.insert(loc(pix), vec![0u8; 2]);
        }

        // Poll every tile as fast as possible while workers commit.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let mut done = 0;
            for pix in 0..64 {
                if f.pipeline.request(addr(pix), || loc(pix)) == FetchState::Materialized {
                    done += 1;
                }
            }
            if done == 64 {
                break;
            }
            assert!(Instant::now() < deadline, "background materialization stalled");
        }

        // Workers drop their record just after the commit becomes visible.
        while f.pipeline.stats().in_flight > 0 {
            assert!(Instant::now() < deadline, "in-flight records never cleared");
            std::thread::yield_now();
        }
        let stats = f.pipeline.stats();
        assert_eq!(stats.requests, 64);
        assert_eq!(stats.materialized, 64);
        for pix in 0..64 {
            assert_eq!(f.fetcher.calls(&loc(pix)), 1);
        }
    }
}
