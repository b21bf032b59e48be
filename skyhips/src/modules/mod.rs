//! Sky modules: renderable layers built on surveys.
//!
//! Each module type implements [`SkyModule`] and describes its public state
//! with a table of typed [`Property`] descriptors. A [`ModuleRegistry`]
//! holds the module classes known to the host, instantiates them, routes
//! data sources to them and iterates them in render order.

mod fader;
mod milkyway;
mod property;
mod registry;

pub use fader::{smoothstep, Fader, DEFAULT_FADE_DURATION_SECS};
pub use milkyway::MilkyWay;
pub use property::{
    get_property, set_property, Property, PropertyError, PropertyKind, PropertyValue,
};
pub use registry::{ModuleClass, ModuleError, ModuleRegistry};

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use crate::engine::Engine;
use crate::survey::{RenderTile, RenderView, TileTexture};
use crate::traverse::{ConeCull, TraverseStatus};

/// Maps a luminance in cd/m² to a display value in `[0, 1]`.
pub trait ToneMapper {
    fn map(&self, luminance: f64) -> f64;
}

/// Per-frame state handed to modules by the host.
pub struct FrameContext<'a> {
    pub view: RenderView,
    /// Visible region, when the host culls.
    pub cull: Option<ConeCull>,
    /// Base alpha of the painter.
    pub alpha: f64,
    /// Average sky luminance in cd/m².
    pub sky_luminance: f64,
    pub tonemapper: &'a dyn ToneMapper,
}

/// One textured tile for the host renderer.
#[derive(Debug, Clone)]
pub struct DrawTile {
    pub tile: RenderTile,
    pub texture: TileTexture,
    /// Final alpha including the tile's fade hint.
    pub alpha: f64,
}

/// Whether a module took ownership of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Accepted,
    Declined,
}

/// A renderable sky layer.
pub trait SkyModule: Send {
    /// Instance id, unique within a registry.
    fn id(&self) -> &str;

    /// Modules render in increasing order.
    fn render_order(&self) -> f64;

    /// Advance animations. Returns true if anything changed.
    fn update(&mut self, _dt: f64) -> bool {
        false
    }

    fn render(
        &self,
        _ctx: &FrameContext<'_>,
        _draw: &mut dyn FnMut(DrawTile) -> ControlFlow<i32>,
    ) -> TraverseStatus {
        TraverseStatus::Complete
    }

    /// Offer a data source (`kind` is e.g. `hips`; `args` its metadata).
    fn add_data_source(
        &mut self,
        _engine: &Engine,
        _url: &str,
        _kind: &str,
        _args: &BTreeMap<String, String>,
    ) -> DataSource {
        DataSource::Declined
    }

    /// Names of the exposed properties.
    fn property_names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        Err(PropertyError::Unknown(name.to_string()))
    }

    fn set_property(&mut self, name: &str, _value: PropertyValue) -> Result<(), PropertyError> {
        Err(PropertyError::Unknown(name.to_string()))
    }
}
