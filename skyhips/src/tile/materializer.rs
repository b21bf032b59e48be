//! Materialization contract: raw tile bytes to a cached payload.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::error::MaterializeError;
use crate::index::TileAddress;

/// Opaque payload held by the tile cache.
///
/// Image surveys store a [`super::Texture`]; custom surveys store whatever
/// their materializer produces and downcast it on read.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Four-bit hint marking which children of a tile are known to be empty.
///
/// Bit `k` set means child `k` is fully transparent and never needs to be
/// fetched or visited.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TransparencyMask(u8);

impl TransparencyMask {
    pub const NONE: TransparencyMask = TransparencyMask(0);
    pub const ALL: TransparencyMask = TransparencyMask(0b1111);

    /// Build a mask from raw bits; only the low four bits are kept.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1111)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_transparent(&self, child: u8) -> bool {
        child < 4 && self.0 & (1 << child) != 0
    }

    pub fn with_transparent(self, child: u8) -> Self {
        Self::from_bits(self.0 | (1 << (child & 3)))
    }
}

impl fmt::Debug for TransparencyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransparencyMask({:04b})", self.0)
    }
}

/// Result of a successful materialization.
#[derive(Clone)]
pub struct MaterializedTile {
    /// The payload to cache.
    pub payload: Payload,
    /// Cost in bytes, used for cache budget accounting.
    pub cost: usize,
    /// Children known to be empty.
    pub transparency: TransparencyMask,
}

impl MaterializedTile {
    pub fn new<T: Any + Send + Sync>(payload: T, cost: usize) -> Self {
        Self {
            payload: Arc::new(payload),
            cost,
            transparency: TransparencyMask::NONE,
        }
    }

    pub fn with_transparency(mut self, mask: TransparencyMask) -> Self {
        self.transparency = mask;
        self
    }
}

impl fmt::Debug for MaterializedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializedTile")
            .field("cost", &self.cost)
            .field("transparency", &self.transparency)
            .finish_non_exhaustive()
    }
}

/// Survey-specific conversion of raw tile bytes into a payload.
///
/// Supplied by whoever creates the survey. `create` may run on a worker
/// thread when the survey loads in the background, so implementations must
/// be thread-safe.
///
/// `destroy` is the release hook called exactly once when the cache evicts
/// or purges an entry. The default simply drops the payload handle.
pub trait TileMaterializer: Send + Sync {
    /// Convert the bytes of tile `addr` into a payload.
    fn create(&self, addr: TileAddress, data: &[u8]) -> Result<MaterializedTile, MaterializeError>;

    /// Release a payload removed from the cache.
    fn destroy(&self, payload: Payload) {
        drop(payload);
    }
}
