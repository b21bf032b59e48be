//! Fallback resolution: exact tile, nearest ancestor, all-sky mosaic, none.
//!
//! Every result carries a UV transform mapping the requested tile's unit
//! square into the texture actually returned, so the renderer samples the
//! right sub-region whatever level answered.

use glam::{DMat3, DVec2};

use crate::index::{npix, TileAddress};
use crate::tile::{Payload, Texture};

/// Columns of order-3 cells in an all-sky mosaic.
pub const ALLSKY_COLUMNS: u32 = 27;

/// Which level of the fallback chain answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    /// The requested tile itself.
    Exact,
    /// A coarser ancestor.
    Ancestor(TileAddress),
    /// The all-sky mosaic.
    Allsky,
    /// Nothing is loaded.
    None,
}

/// Resolved texture for one tile.
#[derive(Clone)]
pub struct TileTexture {
    /// Payload to sample, `None` when nothing is available.
    pub payload: Option<Payload>,
    /// Maps the requested tile's UV square into the payload's UV space.
    pub uv: DMat3,
    /// Recommended alpha in `[0, 1]`.
    pub fade: f64,
    /// True only when the exact tile answered.
    pub loading_complete: bool,
    pub source: TextureSource,
}

impl TileTexture {
    pub(crate) fn none() -> Self {
        Self {
            payload: None,
            uv: DMat3::IDENTITY,
            fade: 0.0,
            loading_complete: false,
            source: TextureSource::None,
        }
    }

    /// The payload as an image texture, for surveys using the image materializer.
    pub fn texture(&self) -> Option<&Texture> {
        self.payload.as_ref()?.downcast_ref::<Texture>()
    }

    pub fn has_texture(&self) -> bool {
        self.payload.is_some()
    }

    /// UV in the returned texture for a UV inside the requested tile.
    pub fn map_uv(&self, uv: DVec2) -> DVec2 {
        self.uv.transform_point2(uv)
    }
}

impl std::fmt::Debug for TileTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileTexture")
            .field("source", &self.source)
            .field("fade", &self.fade)
            .field("loading_complete", &self.loading_complete)
            .field("uv", &self.uv)
            .finish()
    }
}

/// Mapping of child `k`'s UV square into its parent's quadrant.
pub fn child_uv(k: u8) -> DMat3 {
    let offset = DVec2::new((k & 1) as f64 * 0.5, ((k >> 1) & 1) as f64 * 0.5);
    DMat3::from_translation(offset) * DMat3::from_scale(DVec2::splat(0.5))
}

/// UV transform from `addr` into its ancestor at `order`.
///
/// Composes one quadrant mapping per level walked. Returns `None` when
/// `order` is deeper than `addr`.
pub fn ancestor_uv(addr: TileAddress, order: u8) -> Option<DMat3> {
    if order > addr.order() {
        return None;
    }
    let mut uv = DMat3::IDENTITY;
    let mut cur = addr;
    while cur.order() > order {
        uv = child_uv(cur.child_index()) * uv;
        cur = cur.parent()?;
    }
    Some(uv)
}

/// Grid layout of an all-sky mosaic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllskyLayout {
    /// Order of the mosaic cells.
    pub order: u8,
    pub columns: u32,
    pub rows: u32,
    /// Fraction of the mosaic height covered by the cell rows.
    height_fill: f64,
}

impl AllskyLayout {
    /// Layout for a mosaic of `order` cells; rows follow from the column count.
    pub fn new(order: u8) -> Self {
        let cells = npix(order) as u32;
        let columns = ALLSKY_COLUMNS.min(cells);
        let rows = cells.div_ceil(columns);
        Self {
            order,
            columns,
            rows,
            height_fill: 1.0,
        }
    }

    /// Layout matched to an actual mosaic image, whose last row may be padded.
    pub fn for_texture(order: u8, texture: &Texture) -> Self {
        let mut layout = Self::new(order);
        let cell = texture.width() as f64 / layout.columns as f64;
        if texture.height() > 0 && cell > 0.0 {
            layout.height_fill = (cell * layout.rows as f64 / texture.height() as f64).min(1.0);
        }
        layout
    }

    /// UV transform of cell `pix` (at the layout's order) in the mosaic.
    pub fn cell_uv(&self, pix: u64) -> DMat3 {
        let col = (pix % self.columns as u64) as f64;
        let row = (pix / self.columns as u64) as f64;
        let sx = 1.0 / self.columns as f64;
        let sy = self.height_fill / self.rows as f64;
        DMat3::from_translation(DVec2::new(col * sx, row * sy))
            * DMat3::from_scale(DVec2::new(sx, sy))
    }

    /// UV transform of any tile at or below the mosaic order.
    pub fn tile_uv(&self, addr: TileAddress) -> Option<DMat3> {
        let cell = addr.ancestor_at(self.order)?;
        Some(self.cell_uv(cell.pix()) * ancestor_uv(addr, self.order)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec2, b: DVec2) -> bool {
        (a - b).length() < 1e-12
    }

    #[test]
    fn test_child_uv_quadrants() {
        let corner = DVec2::ZERO;
        assert!(close(child_uv(0).transform_point2(corner), DVec2::new(0.0, 0.0)));
        assert!(close(child_uv(1).transform_point2(corner), DVec2::new(0.5, 0.0)));
        assert!(close(child_uv(2).transform_point2(corner), DVec2::new(0.0, 0.5)));
        assert!(close(child_uv(3).transform_point2(DVec2::ONE), DVec2::new(1.0, 1.0)));
    }

    #[test]
    fn test_ancestor_uv_composes_levels() {
        // Order 3 tile with child indices 1, 2, 3 under base 5.
        let pix = (((5u64 << 2) | 1) << 2 | 2) << 2 | 3;
        let addr = TileAddress::new(3, pix).unwrap();
        let uv = ancestor_uv(addr, 0).unwrap();

        let expected = child_uv(1) * child_uv(2) * child_uv(3);
        assert!(uv.abs_diff_eq(expected, 1e-12));

        // The tile occupies an eighth of the base tile's side.
        let origin = uv.transform_point2(DVec2::ZERO);
        let far = uv.transform_point2(DVec2::ONE);
        assert!(close(far - origin, DVec2::splat(0.125)));
        assert!(close(origin, DVec2::new(0.5 + 0.0 + 0.125, 0.0 + 0.25 + 0.125)));
    }

    #[test]
    fn test_ancestor_uv_identity_and_invalid() {
        let addr = TileAddress::new(2, 17).unwrap();
        assert_eq!(ancestor_uv(addr, 2), Some(DMat3::IDENTITY));
        assert_eq!(ancestor_uv(addr, 3), None);
    }

    #[test]
    fn test_allsky_layout() {
        let layout = AllskyLayout::new(3);
        assert_eq!(layout.columns, 27);
        assert_eq!(layout.rows, 29);

        let uv = layout.cell_uv(28);
        let origin = uv.transform_point2(DVec2::ZERO);
        assert!(close(origin, DVec2::new(1.0 / 27.0, 1.0 / 29.0)));
    }

    #[test]
    fn test_allsky_tile_below_mosaic_order() {
        let layout = AllskyLayout::new(3);
        let cell = TileAddress::new(3, 40).unwrap();
        let child = cell.child(3).unwrap();
        let uv = layout.tile_uv(child).unwrap();
        let expected = layout.cell_uv(40) * child_uv(3);
        assert!(uv.abs_diff_eq(expected, 1e-12));

        assert!(layout.tile_uv(TileAddress::new(2, 1).unwrap()).is_none());
    }

    #[test]
    fn test_allsky_padded_texture() {
        // 27 x 30 cells of 4 px: one padding row.
        let texture = Texture::from_rgba(108, 120, vec![0; 108 * 120 * 4]).unwrap();
        let layout = AllskyLayout::for_texture(3, &texture);
        let last_row = layout.cell_uv(27 * 28);
        let bottom = last_row.transform_point2(DVec2::ONE);
        assert!((bottom.y - 116.0 / 120.0).abs() < 1e-12);
    }
}
