//! Tile payloads and their materialization.
//!
//! A materializer turns the raw bytes of one tile into an opaque payload,
//! a byte cost for the cache budget, and a child transparency mask. Image
//! surveys use [`ImageMaterializer`]; custom surveys bring their own
//! [`TileMaterializer`].

mod error;
mod materializer;
mod texture;

pub use error::{MaterializeError, TileError};
pub use materializer::{MaterializedTile, Payload, TileMaterializer, TransparencyMask};
pub use texture::{ImageMaterializer, Texture};
