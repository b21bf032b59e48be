//! Milky Way background layer.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::ops::ControlFlow;

use tracing::info;

use super::fader::{smoothstep, Fader};
use super::property::{get_property, set_property, Property, PropertyKind, PropertyValue};
use super::{DataSource, DrawTile, FrameContext, PropertyError, SkyModule};
use crate::engine::Engine;
use crate::survey::{parse_date, Survey, SurveyFlags, SurveyOptions};
use crate::traverse::TraverseStatus;

/// Tessellation order of the rendered quads.
const SPLIT_ORDER: u8 = 2;

/// Luminance used for the tone mapping of the Milky Way band.
const BAND_LUMINANCE: f64 = 0.002;

/// Fully visible above this field of view; hidden below `FADE_START_DEG`.
const FADE_END_DEG: f64 = 20.0;
const FADE_START_DEG: f64 = 10.0;

/// Renders the `milkyway` HiPS survey behind everything else.
pub struct MilkyWay {
    visible: Fader,
    survey: Option<Survey>,
}

impl MilkyWay {
    pub const CLASS: &'static str = "milkyway";

    pub fn new() -> Self {
        Self {
            visible: Fader::new(true),
            survey: None,
        }
    }

    pub fn survey(&self) -> Option<&Survey> {
        self.survey.as_ref()
    }

    pub fn fade(&self) -> f64 {
        self.visible.value()
    }

    /// Painter alpha for the current frame, before per-tile fades.
    pub fn frame_alpha(&self, ctx: &FrameContext<'_>) -> f64 {
        let visibility = smoothstep(FADE_START_DEG.to_radians(), FADE_END_DEG.to_radians(), ctx.view.fov);
        let mut c = ctx.tonemapper.map(BAND_LUMINANCE) * 10.0;
        // Dimmer under a bright sky, e.g. with a full moon.
        c *= (0.0002 / ctx.sky_luminance.max(0.000001)).min(1.0);
        c = c.clamp(0.0, 1.0) * 0.64;
        ctx.alpha * self.visible.value() * visibility * c
    }

    fn props() -> &'static [Property<MilkyWay>] {
        &PROPERTIES
    }
}

impl Default for MilkyWay {
    fn default() -> Self {
        Self::new()
    }
}

fn get_visible(m: &MilkyWay) -> PropertyValue {
    PropertyValue::Bool(m.visible.target)
}

fn set_visible(m: &mut MilkyWay, v: PropertyValue) -> Option<()> {
    m.visible.target = v.as_bool()?;
    Some(())
}

static PROPERTIES: [Property<MilkyWay>; 1] = [Property::read_write(
    "visible",
    PropertyKind::Bool,
    get_visible,
    set_visible,
)];

impl SkyModule for MilkyWay {
    fn id(&self) -> &str {
        Self::CLASS
    }

    fn render_order(&self) -> f64 {
        5.0
    }

    fn update(&mut self, dt: f64) -> bool {
        if self.survey.is_none() {
            return false;
        }
        self.visible.update(dt)
    }

    fn render(
        &self,
        ctx: &FrameContext<'_>,
        draw: &mut dyn FnMut(DrawTile) -> ControlFlow<i32>,
    ) -> TraverseStatus {
        let Some(survey) = &self.survey else {
            return TraverseStatus::Complete;
        };
        if self.visible.value() == 0.0 {
            return TraverseStatus::Complete;
        }
        let alpha = self.frame_alpha(ctx);
        if alpha < 1.0 / 255.0 || !survey.is_ready() {
            return TraverseStatus::Complete;
        }

        survey.render_traverse(
            &ctx.view,
            TAU,
            SPLIT_ORDER,
            |addr| ctx.cull.is_some_and(|c| c.is_outside(addr)),
            |tile| {
                let texture = survey.get_tile_texture(tile.addr, SurveyFlags::NONE);
                let alpha = alpha * texture.fade;
                draw(DrawTile {
                    tile,
                    texture,
                    alpha,
                })
            },
        )
    }

    fn add_data_source(
        &mut self,
        engine: &Engine,
        url: &str,
        kind: &str,
        args: &BTreeMap<String, String>,
    ) -> DataSource {
        if self.survey.is_some() || kind != "hips" {
            return DataSource::Declined;
        }
        let is_milkyway = args
            .get("obs_title")
            .is_some_and(|t| t.eq_ignore_ascii_case("milkyway"));
        if !is_milkyway {
            return DataSource::Declined;
        }

        let release_date = args
            .get("hips_release_date")
            .map(|d| parse_date(d))
            .unwrap_or(0.0);
        info!(url = %url, release_date, "Milky Way survey attached");
        self.survey = Some(
            engine.create_survey(SurveyOptions::new(url).with_release_date(release_date)),
        );
        DataSource::Accepted
    }

    fn property_names(&self) -> Vec<&'static str> {
        Self::props().iter().map(|p| p.name).collect()
    }

    fn property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        get_property(Self::props(), self, name)
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), PropertyError> {
        set_property(Self::props(), self, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::fetch::MockFetcher;
    use crate::modules::ToneMapper;
    use crate::survey::RenderView;
    use std::sync::Arc;

    struct Linear;

    impl ToneMapper for Linear {
        fn map(&self, luminance: f64) -> f64 {
            luminance * 50.0
        }
    }

    fn args(title: &str) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        args.insert("obs_title".to_string(), title.to_string());
        args.insert("hips_release_date".to_string(), "2019-01-02T15:27Z".to_string());
        args
    }

    fn engine() -> (Arc<MockFetcher>, Engine) {
        let fetcher = Arc::new(MockFetcher::new());
        let engine = Engine::new(EngineConfig::default(), fetcher.clone()).unwrap();
        (fetcher, engine)
    }

    fn ctx(fov_deg: f64, tonemapper: &dyn ToneMapper) -> FrameContext<'_> {
        FrameContext {
            view: RenderView::new(1000.0, fov_deg.to_radians()),
            cull: None,
            alpha: 1.0,
            sky_luminance: 0.0001,
            tonemapper,
        }
    }

    #[test]
    fn test_accepts_only_milkyway_hips() {
        let (_fetcher, engine) = engine();
        let mut mw = MilkyWay::new();

        assert_eq!(
            mw.add_data_source(&engine, "mem://dss", "hips", &args("DSS")),
            DataSource::Declined
        );
        assert_eq!(
            mw.add_data_source(&engine, "mem://mw", "skyculture", &args("milkyway")),
            DataSource::Declined
        );
        assert_eq!(
            mw.add_data_source(&engine, "mem://mw", "hips", &args("MilkyWay")),
            DataSource::Accepted
        );
        let survey = mw.survey().unwrap();
        assert!((survey.release_date() - 58485.64375).abs() < 1e-9);

        // Only one survey per module.
        assert_eq!(
            mw.add_data_source(&engine, "mem://mw2", "hips", &args("milkyway")),
            DataSource::Declined
        );
    }

    #[test]
    fn test_visible_property_fades() {
        let (_fetcher, engine) = engine();
        let mut mw = MilkyWay::new();
        mw.add_data_source(&engine, "mem://mw", "hips", &args("milkyway"));

        assert_eq!(mw.property_names(), vec!["visible"]);
        mw.set_property("visible", PropertyValue::Bool(false)).unwrap();
        assert_eq!(mw.property("visible"), Ok(PropertyValue::Bool(false)));
        assert!(mw.update(0.5));
        assert!((mw.fade() - 0.5).abs() < 1e-12);
        assert!(mw.set_property("visible", PropertyValue::Number(1.0)).is_err());
    }

    #[test]
    fn test_frame_alpha_depends_on_fov() {
        let mw = MilkyWay::new();
        let tm = Linear;
        assert_eq!(mw.frame_alpha(&ctx(5.0, &tm)), 0.0);
        // 0.002 * 50 * 10 = 1.0, clamped, times 0.64.
        assert!((mw.frame_alpha(&ctx(60.0, &tm)) - 0.64).abs() < 1e-12);
        let mid = mw.frame_alpha(&ctx(15.0, &tm));
        assert!(mid > 0.0 && mid < 0.64);
    }

    #[test]
    fn test_render_draws_split_order_tiles() {
        let (fetcher, engine) = engine();
        fetcher.insert("mem://mw/properties", "hips_order = 3\nhips_tile_format = eph\n");
        let mut mw = MilkyWay::new();
        mw.add_data_source(&engine, "mem://mw", "hips", &args("milkyway"));

        let tm = Linear;
        let mut tiles = Vec::new();
        let status = mw.render(&ctx(90.0, &tm), &mut |tile| {
            tiles.push(tile);
            ControlFlow::Continue(())
        });
        assert_eq!(status, TraverseStatus::Complete);
        assert!(!tiles.is_empty());
        // No textures are loaded, so every tile is drawn fully faded.
        assert!(tiles.iter().all(|t| t.alpha == 0.0 && !t.texture.has_texture()));
    }

    #[test]
    fn test_render_without_survey_is_noop() {
        let mw = MilkyWay::new();
        let tm = Linear;
        let mut calls = 0;
        mw.render(&ctx(90.0, &tm), &mut |_| {
            calls += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(calls, 0);
    }
}
