//! Surveys: metadata, tile resolution and rendering traversal.
//!
//! A [`Survey`] is created from an [`crate::Engine`], which supplies the
//! shared tile cache, the fetcher and the background pool. The render
//! thread then polls it every frame:
//!
//! ```ignore
//! let survey = engine.create_survey(SurveyOptions::new("https://example.org/DSS"));
//! if survey.is_ready() {
//!     survey.render_traverse(&view, TAU, 4, |addr| cull.is_outside(addr), |tile| {
//!         let texture = survey.get_tile_texture(tile.addr, SurveyFlags::NONE);
//!         draw(&texture, tile.split);
//!         ControlFlow::Continue(())
//!     });
//! }
//! ```

mod date;
mod error;
mod flags;
mod hips;
mod hipslist;
mod properties;
mod render;
mod resolver;

pub use date::parse_date;
pub use error::SurveyError;
pub use flags::SurveyFlags;
pub use hips::{MetadataState, Survey, SurveyOptions};
pub use hipslist::{collect_hipslist, parse_hipslist, HipsListEntry, HipsListError};
pub use properties::{HipsFrame, Properties, PropertiesError, TileFormat, DEFAULT_TILE_WIDTH};
pub use render::{RenderTile, RenderView};
pub use resolver::{ancestor_uv, child_uv, AllskyLayout, TextureSource, TileTexture, ALLSKY_COLUMNS};
