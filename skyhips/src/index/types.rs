//! Tile address types for the nested HEALPix tiling.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of base tiles at order 0.
pub const BASE_TILES: u64 = 12;

/// Deepest order supported by the 64-bit nested scheme.
pub const MAX_ORDER: u8 = 29;

/// Errors raised for addresses outside the tiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("Invalid order: {0} (max: {MAX_ORDER})")]
    InvalidOrder(u8),

    #[error("Invalid pixel {pix} at order {order} (max: {max})")]
    InvalidPixel { order: u8, pix: u64, max: u64 },

    #[error("Invalid child index: {0} (expected 0-3)")]
    InvalidChild(u8),
}

/// Address of one tile: `(order, pixel-in-order)`.
///
/// Pixels follow the nested scheme, so the four children of `pix` are
/// `4 * pix + k` for `k` in `0..4` and the parent is `pix / 4`.
///
/// # Example
///
/// ```
/// use skyhips::index::TileAddress;
///
/// let tile = TileAddress::new(3, 100).unwrap();
/// assert_eq!(tile.parent(), Some(TileAddress::new(2, 25).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    order: u8,
    pix: u64,
}

impl TileAddress {
    /// Create an address, validating the pixel range for the order.
    pub fn new(order: u8, pix: u64) -> Result<Self, IndexError> {
        if order > MAX_ORDER {
            return Err(IndexError::InvalidOrder(order));
        }
        let max = npix(order);
        if pix >= max {
            return Err(IndexError::InvalidPixel { order, pix, max });
        }
        Ok(Self { order, pix })
    }

    /// Base tile `base` at order 0.
    pub(crate) fn base(base: u64) -> Self {
        debug_assert!(base < BASE_TILES);
        Self {
            order: 0,
            pix: base,
        }
    }

    /// Build an address without validation. Callers guarantee the range.
    pub(crate) fn new_unchecked(order: u8, pix: u64) -> Self {
        Self { order, pix }
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn pix(&self) -> u64 {
        self.pix
    }

    /// Parent address, or `None` at order 0.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.order == 0 {
            return None;
        }
        Some(Self {
            order: self.order - 1,
            pix: self.pix >> 2,
        })
    }

    /// Child `k` (0..4) at `order + 1`.
    pub fn child(&self, k: u8) -> Result<TileAddress, IndexError> {
        if k > 3 {
            return Err(IndexError::InvalidChild(k));
        }
        if self.order >= MAX_ORDER {
            return Err(IndexError::InvalidOrder(self.order + 1));
        }
        Ok(Self {
            order: self.order + 1,
            pix: (self.pix << 2) | k as u64,
        })
    }

    /// All four children in index order.
    ///
    /// Returns `None` at [`MAX_ORDER`].
    pub fn children(&self) -> Option<[TileAddress; 4]> {
        if self.order >= MAX_ORDER {
            return None;
        }
        let order = self.order + 1;
        let first = self.pix << 2;
        Some([0, 1, 2, 3].map(|k| Self {
            order,
            pix: first | k,
        }))
    }

    /// Index of this tile within its parent (`pix % 4`).
    pub fn child_index(&self) -> u8 {
        (self.pix & 3) as u8
    }

    /// Ancestor at a coarser order, or `None` if `order` is deeper than this tile.
    pub fn ancestor_at(&self, order: u8) -> Option<TileAddress> {
        if order > self.order {
            return None;
        }
        let shift = 2 * (self.order - order) as u32;
        Some(Self {
            order,
            pix: self.pix >> shift,
        })
    }

    /// Whether `other` is this tile or one of its descendants.
    pub fn contains(&self, other: &TileAddress) -> bool {
        other.ancestor_at(self.order) == Some(*self)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order, self.pix)
    }
}

/// Nside at a given order: 2^order.
#[inline]
pub fn nside(order: u8) -> u64 {
    1u64 << order
}

/// Number of tiles at a given order: 12 * 4^order.
#[inline]
pub fn npix(order: u8) -> u64 {
    BASE_TILES << (2 * order as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_pixel_range() {
        assert!(TileAddress::new(0, 11).is_ok());
        assert_eq!(
            TileAddress::new(0, 12),
            Err(IndexError::InvalidPixel {
                order: 0,
                pix: 12,
                max: 12
            })
        );
        assert!(TileAddress::new(1, 47).is_ok());
        assert!(TileAddress::new(1, 48).is_err());
    }

    #[test]
    fn test_new_rejects_deep_order() {
        assert_eq!(
            TileAddress::new(MAX_ORDER + 1, 0),
            Err(IndexError::InvalidOrder(MAX_ORDER + 1))
        );
    }

    #[test]
    fn test_parent_of_base_is_none() {
        assert_eq!(TileAddress::base(5).parent(), None);
    }

    #[test]
    fn test_child_and_parent() {
        let tile = TileAddress::new(2, 37).unwrap();
        for k in 0..4 {
            let child = tile.child(k).unwrap();
            assert_eq!(child.order(), 3);
            assert_eq!(child.pix(), 37 * 4 + k as u64);
            assert_eq!(child.child_index(), k);
            assert_eq!(child.parent(), Some(tile));
        }
        assert_eq!(tile.child(4), Err(IndexError::InvalidChild(4)));
    }

    #[test]
    fn test_children_matches_child() {
        let tile = TileAddress::new(4, 1000).unwrap();
        let children = tile.children().unwrap();
        for (k, child) in children.iter().enumerate() {
            assert_eq!(*child, tile.child(k as u8).unwrap());
        }
    }

    #[test]
    fn test_ancestor_at() {
        let tile = TileAddress::new(5, 0b10_11_01_00_11).unwrap();
        assert_eq!(tile.ancestor_at(5), Some(tile));
        assert_eq!(tile.ancestor_at(3).unwrap().pix(), 0b10_11_01);
        assert_eq!(tile.ancestor_at(0).unwrap().pix(), 0b10);
        assert_eq!(tile.ancestor_at(6), None);
        assert!(tile.ancestor_at(1).unwrap().contains(&tile));
    }

    #[test]
    fn test_npix() {
        assert_eq!(npix(0), 12);
        assert_eq!(npix(1), 48);
        assert_eq!(npix(3), 768);
        assert_eq!(nside(3), 8);
    }

    #[test]
    fn test_display() {
        assert_eq!(TileAddress::new(3, 42).unwrap().to_string(), "3/42");
    }
}
