//! A HiPS survey: metadata, tile requests and fallback resolution.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::SurveyError;
use super::flags::SurveyFlags;
use super::properties::{HipsFrame, Properties};
use super::resolver::{ancestor_uv, AllskyLayout, TextureSource, TileTexture};
use crate::cache::{CacheKey, CachedTile, SurveyId, TileCache};
use crate::config::EngineConfig;
use crate::fetch::{
    ByteFetcher, FetchPipeline, FetchPoll, FetchState, FetchStats, NegativeCache,
    PipelineOptions, SurveyLocator,
};
use crate::index::TileAddress;
use crate::tile::{ImageMaterializer, Payload, TileError, TileMaterializer, TransparencyMask};
use crate::traverse::{self, depth_ceiling, TraverseStatus, VisitAction};

/// Options for creating a survey.
#[derive(Clone)]
pub struct SurveyOptions {
    pub(crate) base: String,
    pub(crate) release_date: f64,
    pub(crate) flags: SurveyFlags,
    pub(crate) materializer: Option<Arc<dyn TileMaterializer>>,
    pub(crate) fetcher: Option<Arc<dyn ByteFetcher>>,
}

impl SurveyOptions {
    /// Survey rooted at `base` (URL or path prefix).
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            release_date: 0.0,
            flags: SurveyFlags::NONE,
            materializer: None,
            fetcher: None,
        }
    }

    /// Known release date as MJD; appended to every locator.
    pub fn with_release_date(mut self, mjd: f64) -> Self {
        self.release_date = mjd;
        self
    }

    pub fn with_flags(mut self, flags: SurveyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Custom tile materializer. Image surveys use [`ImageMaterializer`].
    pub fn with_materializer(mut self, materializer: Arc<dyn TileMaterializer>) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Fetcher for this survey instead of the engine's.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

/// Metadata loading progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataState {
    LoadingProperties,
    LoadingAllsky,
    Ready,
    /// Permanent; the survey never becomes ready.
    Failed(SurveyError),
}

struct Allsky {
    payload: Payload,
    layout: AllskyLayout,
}

struct Metadata {
    state: MetadataState,
    properties: Option<Arc<Properties>>,
    allsky: Option<Arc<Allsky>>,
    label: Option<String>,
    frame: Option<HipsFrame>,
}

/// One survey.
///
/// All methods take `&self` and never block on I/O: metadata and tiles are
/// polled from the fetcher and whatever has arrived is used.
pub struct Survey {
    id: SurveyId,
    flags: SurveyFlags,
    config: EngineConfig,
    fetcher: Arc<dyn ByteFetcher>,
    materializer: Arc<dyn TileMaterializer>,
    cache: Arc<TileCache>,
    pipeline: FetchPipeline,
    locator: RwLock<SurveyLocator>,
    meta: Mutex<Metadata>,
}

impl Survey {
    pub(crate) fn new(
        options: SurveyOptions,
        config: &EngineConfig,
        cache: Arc<TileCache>,
        fetcher: Arc<dyn ByteFetcher>,
        pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        let id = SurveyId::next();
        let fetcher = options.fetcher.unwrap_or(fetcher);
        let materializer = options
            .materializer
            .unwrap_or_else(|| Arc::new(ImageMaterializer::new()));
        let flags = options.flags;

        let pipeline = FetchPipeline::new(
            id,
            Arc::clone(&fetcher),
            Arc::clone(&materializer),
            Arc::clone(&cache),
            NegativeCache::new(config.negative_ttl),
            PipelineOptions {
                cache_only: flags.contains(SurveyFlags::CACHED_ONLY),
                background: flags
                    .contains(SurveyFlags::LOAD_IN_BACKGROUND)
                    .then_some(pool),
            },
        );

        debug!(survey = %id, base = %options.base, ?flags, "Survey created");

        Self {
            id,
            flags,
            config: config.clone(),
            fetcher,
            materializer,
            cache,
            pipeline,
            locator: RwLock::new(SurveyLocator::new(&options.base, options.release_date)),
            meta: Mutex::new(Metadata {
                state: MetadataState::LoadingProperties,
                properties: None,
                allsky: None,
                label: None,
                frame: None,
            }),
        }
    }

    pub fn id(&self) -> SurveyId {
        self.id
    }

    pub fn flags(&self) -> SurveyFlags {
        self.flags
    }

    pub fn base(&self) -> String {
        self.locator.read().base().to_string()
    }

    /// Release date (MJD) used for locators, `0.0` when unknown.
    pub fn release_date(&self) -> f64 {
        self.locator.read().release_date()
    }

    // ==================== Metadata ====================

    /// Advance metadata loading by one poll.
    pub fn update(&self) {
        let mut meta = self.meta.lock();
        if meta.state == MetadataState::LoadingProperties {
            self.poll_properties(&mut meta);
        }
        if meta.state == MetadataState::LoadingAllsky {
            self.poll_allsky(&mut meta);
        }
    }

    fn poll_properties(&self, meta: &mut Metadata) {
        let locator = self.locator.read().properties();
        let data = match self.fetcher.fetch(&locator) {
            FetchPoll::Pending => return,
            FetchPoll::Failed(e) => {
                warn!(survey = %self.id, url = %locator, error = %e, "Survey properties unavailable");
                meta.state = MetadataState::Failed(SurveyError::PropertiesUnavailable(e));
                return;
            }
            FetchPoll::Ready(data) => data,
        };

        let props = match Properties::from_bytes(&data) {
            Ok(props) => props,
            Err(e) => {
                warn!(survey = %self.id, url = %locator, error = %e, "Invalid survey properties");
                meta.state = MetadataState::Failed(e.into());
                return;
            }
        };

        {
            let mut loc = self.locator.write();
            if loc.release_date() == 0.0 && props.release_date != 0.0 {
                loc.set_release_date(props.release_date);
            }
        }

        info!(
            survey = %self.id,
            title = props.title.as_deref().unwrap_or(""),
            max_order = props.max_order,
            format = props.tile_format.ext(),
            "Survey properties loaded"
        );

        let wants_allsky =
            props.tile_format.is_image() && props.max_order >= self.config.allsky_order;
        meta.properties = Some(Arc::new(props));
        meta.state = if wants_allsky {
            MetadataState::LoadingAllsky
        } else {
            MetadataState::Ready
        };
    }

    fn poll_allsky(&self, meta: &mut Metadata) {
        let Some(props) = meta.properties.clone() else {
            meta.state = MetadataState::LoadingProperties;
            return;
        };
        let order = self.config.allsky_order;
        let locator = self.locator.read().allsky(order, props.tile_format.ext());

        match self.fetcher.fetch(&locator) {
            FetchPoll::Pending => return,
            FetchPoll::Failed(e) => {
                warn!(survey = %self.id, url = %locator, error = %e, "All-sky mosaic unavailable");
            }
            FetchPoll::Ready(data) => {
                let addr = TileAddress::new_unchecked(order, 0);
                match self.materializer.create(addr, &data) {
                    Ok(tile) => {
                        let layout = match tile.payload.downcast_ref::<crate::tile::Texture>() {
                            Some(texture) => AllskyLayout::for_texture(order, texture),
                            None => AllskyLayout::new(order),
                        };
                        info!(survey = %self.id, bytes = tile.cost, "All-sky mosaic loaded");
                        meta.allsky = Some(Arc::new(Allsky {
                            payload: tile.payload,
                            layout,
                        }));
                    }
                    Err(e) => {
                        warn!(survey = %self.id, url = %locator, error = %e, "All-sky mosaic undecodable");
                    }
                }
            }
        }
        meta.state = MetadataState::Ready;
    }

    /// Whether properties (and the all-sky mosaic, if any) have loaded.
    ///
    /// Polls metadata loading first.
    pub fn is_ready(&self) -> bool {
        self.update();
        self.meta.lock().state == MetadataState::Ready
    }

    pub fn metadata_state(&self) -> MetadataState {
        self.meta.lock().state.clone()
    }

    pub fn properties(&self) -> Option<Arc<Properties>> {
        self.meta.lock().properties.clone()
    }

    pub(super) fn ready_properties(&self) -> Option<Arc<Properties>> {
        self.update();
        let meta = self.meta.lock();
        match meta.state {
            MetadataState::Ready => meta.properties.clone(),
            _ => None,
        }
    }

    pub fn has_allsky(&self) -> bool {
        self.meta.lock().allsky.is_some()
    }

    /// Display label: the override, else `obs_title`, else the base locator.
    pub fn label(&self) -> String {
        let meta = self.meta.lock();
        meta.label
            .clone()
            .or_else(|| meta.properties.as_ref().and_then(|p| p.title.clone()))
            .unwrap_or_else(|| self.base())
    }

    pub fn set_label(&self, label: impl Into<String>) {
        self.meta.lock().label = Some(label.into());
    }

    /// Reference frame: the override, else `hips_frame`, else equatorial.
    ///
    /// Planets default to their body-fixed frame.
    pub fn frame(&self) -> HipsFrame {
        let meta = self.meta.lock();
        if let Some(frame) = meta.frame {
            return frame;
        }
        if self.flags.contains(SurveyFlags::PLANET) {
            return HipsFrame::Body;
        }
        meta.properties
            .as_ref()
            .and_then(|p| p.frame)
            .unwrap_or(HipsFrame::Equatorial)
    }

    pub fn set_frame(&self, frame: HipsFrame) {
        self.meta.lock().frame = Some(frame);
    }

    /// Deepest order with tiles, once properties are loaded.
    pub fn max_order(&self) -> Option<u8> {
        self.meta.lock().properties.as_ref().map(|p| p.max_order)
    }

    // ==================== Tiles ====================

    fn has_tile(props: &Properties, addr: TileAddress) -> bool {
        addr.order() >= props.min_order && addr.order() <= props.max_order
    }

    fn key(&self, addr: TileAddress) -> CacheKey {
        CacheKey::new(self.id, addr)
    }

    fn request(&self, props: &Properties, addr: TileAddress) -> FetchState {
        self.pipeline.request(addr, || {
            self.locator.read().tile(addr, props.tile_format.ext())
        })
    }

    /// The cached payload of `addr`, starting its fetch on a miss.
    ///
    /// `None` while the tile is loading, failed, or outside the survey's
    /// order range. Use [`Survey::tile_error`] to tell these apart.
    pub fn get_tile(&self, addr: TileAddress) -> Option<CachedTile> {
        let props = self.ready_properties()?;
        if !Self::has_tile(&props, addr) {
            return None;
        }
        match self.request(&props, addr) {
            FetchState::Materialized => self.cache.get(&self.key(addr)),
            _ => None,
        }
    }

    /// Why `addr` has no payload, if it failed recently.
    pub fn tile_error(&self, addr: TileAddress) -> Option<TileError> {
        match self.pipeline.state(addr) {
            FetchState::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn fetch_state(&self, addr: TileAddress) -> FetchState {
        self.pipeline.state(addr)
    }

    /// Forget a recorded failure for `addr`.
    pub fn retry_tile(&self, addr: TileAddress) {
        self.pipeline.retry(addr);
    }

    pub fn fetch_stats(&self) -> FetchStats {
        self.pipeline.stats()
    }

    /// Best available texture for `addr`.
    ///
    /// Tries the exact tile, then the nearest cached ancestor, then the
    /// all-sky mosaic. Tiles deeper than the survey's max order resolve to
    /// their max-order ancestor, which is fetched in their place. The
    /// result always carries a UV transform, even without a payload.
    pub fn get_tile_texture(&self, addr: TileAddress, flags: SurveyFlags) -> TileTexture {
        let Some(props) = self.ready_properties() else {
            return TileTexture::none();
        };

        if !(self.flags | flags).contains(SurveyFlags::FORCE_USE_ALLSKY) {
            if let Some(found) = self.resolve_cached(&props, addr) {
                return found;
            }
        }

        let allsky = self.meta.lock().allsky.clone();
        if let Some(allsky) = allsky {
            if let Some(uv) = allsky.layout.tile_uv(addr) {
                return TileTexture {
                    payload: Some(Arc::clone(&allsky.payload)),
                    uv,
                    fade: 1.0,
                    loading_complete: false,
                    source: TextureSource::Allsky,
                };
            }
        }

        TileTexture::none()
    }

    fn resolve_cached(&self, props: &Properties, addr: TileAddress) -> Option<TileTexture> {
        let effective = addr.ancestor_at(addr.order().min(props.max_order))?;

        if effective.order() >= props.min_order
            && self.request(props, effective) == FetchState::Materialized
        {
            if let Some(hit) = self.cache.get(&self.key(effective)) {
                let source = if effective == addr {
                    TextureSource::Exact
                } else {
                    TextureSource::Ancestor(effective)
                };
                return Some(TileTexture {
                    payload: Some(hit.payload),
                    uv: ancestor_uv(addr, effective.order())?,
                    fade: self.fade_for(&hit.loaded_at),
                    loading_complete: true,
                    source,
                });
            }
        }

        // Ancestors are looked up, not fetched.
        for order in (props.min_order..effective.order()).rev() {
            let ancestor = addr.ancestor_at(order)?;
            if let Some(hit) = self.cache.get(&self.key(ancestor)) {
                return Some(TileTexture {
                    payload: Some(hit.payload),
                    uv: ancestor_uv(addr, order)?,
                    fade: 1.0,
                    loading_complete: false,
                    source: TextureSource::Ancestor(ancestor),
                });
            }
        }
        None
    }

    fn fade_for(&self, loaded_at: &std::time::Instant) -> f64 {
        if self.config.fade_in.is_zero() {
            return 1.0;
        }
        (loaded_at.elapsed().as_secs_f64() / self.config.fade_in.as_secs_f64()).clamp(0.0, 1.0)
    }

    fn child_mask(&self, addr: TileAddress) -> TransparencyMask {
        self.cache
            .transparency(&self.key(addr))
            .unwrap_or(TransparencyMask::NONE)
    }

    // ==================== Traversal ====================

    /// Depth-first traversal bounded by the resolution for `visible_angle`.
    ///
    /// With the whole sky visible (`2π`) no node deeper than `split_order`
    /// is visited. Children marked empty in a cached parent are skipped.
    pub fn traverse<V>(&self, visible_angle: f64, split_order: u8, visit: V) -> TraverseStatus
    where
        V: FnMut(TileAddress) -> VisitAction,
    {
        self.traverse_to(depth_ceiling(visible_angle, split_order), visit)
    }

    pub(crate) fn traverse_to<V>(&self, max_order: u8, visit: V) -> TraverseStatus
    where
        V: FnMut(TileAddress) -> VisitAction,
    {
        traverse::traverse(max_order, |addr| self.child_mask(addr), visit)
    }
}

impl Drop for Survey {
    fn drop(&mut self) {
        self.pipeline.close();
        let removed = self.cache.remove_survey(self.id);
        if let Some(allsky) = self.meta.get_mut().allsky.take() {
            if let Ok(allsky) = Arc::try_unwrap(allsky) {
                self.materializer.destroy(allsky.payload);
            }
        }
        debug!(survey = %self.id, removed, "Survey dropped");
    }
}

impl std::fmt::Debug for Survey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Survey")
            .field("id", &self.id)
            .field("base", &self.base())
            .field("flags", &self.flags)
            .field("state", &self.meta.lock().state)
            .finish()
    }
}
