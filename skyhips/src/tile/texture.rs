//! Default materializer for image surveys.
//!
//! Tiles are decoded with the `image` crate into CPU-side RGBA textures. The
//! renderer uploads them; this crate never touches the GPU.
//!
//! # UV convention
//!
//! Texture coordinate `(u, v)` addresses image column `u * width` and row
//! `v * height`. `u` follows the nested `x` axis of the tile and `v` the
//! nested `y` axis, so child `k` covers the quadrant starting at
//! `((k & 1) / 2, (k >> 1) / 2)`.

use image::RgbaImage;
use tracing::trace;

use super::error::MaterializeError;
use super::materializer::{MaterializedTile, TileMaterializer, TransparencyMask};
use crate::index::TileAddress;

/// Decoded RGBA tile image.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Texture {
    /// Create a texture from RGBA8 pixels.
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        if rgba.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Memory cost in bytes.
    pub fn cost(&self) -> usize {
        self.rgba.len()
    }

    /// Pixel at `(x, y)` as RGBA.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ])
    }

    /// Quadrants whose pixels are all fully transparent.
    pub fn transparent_quadrants(&self) -> TransparencyMask {
        let half_w = self.width / 2;
        let half_h = self.height / 2;
        if half_w == 0 || half_h == 0 {
            return TransparencyMask::NONE;
        }
        let mut mask = TransparencyMask::NONE;
        for k in 0..4u8 {
            let x0 = (k & 1) as u32 * half_w;
            let y0 = (k >> 1) as u32 * half_h;
            let x1 = if k & 1 == 1 { self.width } else { half_w };
            let y1 = if k >> 1 == 1 { self.height } else { half_h };
            let empty = (y0..y1).all(|y| {
                let row = y as usize * self.width as usize * 4;
                (x0..x1).all(|x| self.rgba[row + x as usize * 4 + 3] == 0)
            });
            if empty {
                mask = mask.with_transparent(k);
            }
        }
        mask
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl From<RgbaImage> for Texture {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            rgba: img.into_raw(),
        }
    }
}

/// Decodes jpeg/png/webp tile bytes into [`Texture`] payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageMaterializer;

impl ImageMaterializer {
    pub fn new() -> Self {
        Self
    }

    /// Decode bytes into a texture without wrapping it as a cache payload.
    pub fn decode(data: &[u8]) -> Result<Texture, MaterializeError> {
        let img = image::load_from_memory(data)
            .map_err(|e| MaterializeError::Decode(e.to_string()))?;
        Ok(Texture::from(img.to_rgba8()))
    }
}

impl TileMaterializer for ImageMaterializer {
    fn create(&self, addr: TileAddress, data: &[u8]) -> Result<MaterializedTile, MaterializeError> {
        let texture = Self::decode(data)?;
        let cost = texture.cost();
        let mask = texture.transparent_quadrants();
        trace!(
            order = addr.order(),
            pix = addr.pix(),
            width = texture.width(),
            height = texture.height(),
            transparency = mask.bits(),
            "Decoded tile image"
        );
        Ok(MaterializedTile::new(texture, cost).with_transparency(mask))
    }
}
