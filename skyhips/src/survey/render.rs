//! Render-order selection and render traversal.

use std::f64::consts::SQRT_2;
use std::ops::ControlFlow;

use super::hips::Survey;
use crate::index::TileAddress;
use crate::traverse::{TraverseStatus, VisitAction};

/// Screen parameters that decide the render resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Framebuffer width in pixels.
    pub window_width: f64,
    /// Horizontal field of view in radians.
    pub fov: f64,
}

impl RenderView {
    pub fn new(window_width: f64, fov: f64) -> Self {
        Self { window_width, fov }
    }
}

/// One tile to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTile {
    pub addr: TileAddress,
    /// Quads per side when tessellating the tile.
    pub split: u32,
}

impl Survey {
    /// Deepest order at which the survey should be drawn.
    ///
    /// `angle` is the visible angle the survey spans (`2π` for full-sky
    /// surveys). The result keeps one tile pixel per screen pixel or
    /// coarser, clamped to the survey's order range. `0` until ready.
    pub fn render_order(&self, view: &RenderView, angle: f64) -> u8 {
        let Some(props) = self.ready_properties() else {
            return 0;
        };
        if !(view.fov > 0.0) || !(view.window_width > 0.0) {
            return props.min_order;
        }
        // Pixels spanned by the whole survey on screen.
        let px = view.window_width / view.fov * angle;
        let tile_width = props.tile_width.max(1) as f64;
        let order = (px / (4.0 * SQRT_2 * tile_width)).log2().ceil();
        order.clamp(props.min_order as f64, props.max_order as f64) as u8
    }

    /// Emit every visible tile at the render order.
    ///
    /// `cull` returns true for tiles outside the view; their subtrees are
    /// skipped. `emit` breaking aborts the traversal with its code. Each
    /// tile is split into `2^(split_order - render_order)` quads per side
    /// (at least one).
    pub fn render_traverse<C, E>(
        &self,
        view: &RenderView,
        angle: f64,
        split_order: u8,
        mut cull: C,
        mut emit: E,
    ) -> TraverseStatus
    where
        C: FnMut(TileAddress) -> bool,
        E: FnMut(RenderTile) -> ControlFlow<i32>,
    {
        let render_order = self.render_order(view, angle);
        let split = 1u32 << split_order.saturating_sub(render_order).min(31);

        self.traverse_to(render_order, |addr| {
            if cull(addr) {
                return VisitAction::StopHere;
            }
            if addr.order() < render_order {
                return VisitAction::Descend;
            }
            match emit(RenderTile { addr, split }) {
                ControlFlow::Continue(()) => VisitAction::StopHere,
                ControlFlow::Break(code) => VisitAction::Abort(code),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::fetch::MockFetcher;
    use crate::survey::SurveyOptions;
    use std::f64::consts::{FRAC_PI_2, TAU};
    use std::sync::Arc;

    fn survey(props: &str) -> (Engine, Survey) {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.insert("mem://r/properties", props.to_string());
        let engine = Engine::new(EngineConfig::default(), fetcher).unwrap();
        let survey = engine.create_survey(SurveyOptions::new("mem://r"));
        (engine, survey)
    }

    const PROPS: &str = "hips_order = 9\nhips_tile_width = 512\nhips_tile_format = eph\n";

    #[test]
    fn test_render_order() {
        let (_engine, survey) = survey(PROPS);
        // 1000 px over 90°: the full sky spans 4000 px.
        assert_eq!(survey.render_order(&RenderView::new(1000.0, FRAC_PI_2), TAU), 1);
        // Tiny field of view clamps to the max order.
        assert_eq!(survey.render_order(&RenderView::new(1000.0, 0.0001), TAU), 9);
    }

    #[test]
    fn test_render_order_respects_min_order() {
        let (_engine, survey) = survey("hips_order = 9\nhips_order_min = 3\nhips_tile_format = eph\n");
        assert_eq!(survey.render_order(&RenderView::new(1000.0, FRAC_PI_2), TAU), 3);
    }

    #[test]
    fn test_render_order_not_ready() {
        let fetcher = Arc::new(MockFetcher::new());
        let engine = Engine::new(EngineConfig::default(), fetcher).unwrap();
        let survey = engine.create_survey(SurveyOptions::new("mem://none"));
        assert_eq!(survey.render_order(&RenderView::new(1000.0, 0.01), TAU), 0);
    }

    #[test]
    fn test_render_traverse_emits_render_order_tiles() {
        let (_engine, survey) = survey(PROPS);
        let view = RenderView::new(1000.0, FRAC_PI_2);

        let mut tiles = Vec::new();
        let status = survey.render_traverse(&view, TAU, 3, |_| false, |tile| {
            tiles.push(tile);
            ControlFlow::Continue(())
        });

        assert_eq!(status, TraverseStatus::Complete);
        assert_eq!(tiles.len(), 48);
        assert!(tiles.iter().all(|t| t.addr.order() == 1 && t.split == 4));
    }

    #[test]
    fn test_render_traverse_cull_and_abort() {
        let (_engine, survey) = survey(PROPS);
        let view = RenderView::new(1000.0, FRAC_PI_2);

        let mut count = 0;
        survey.render_traverse(&view, TAU, 0, |addr| addr.order() == 0 && addr.pix() != 4, |tile| {
            assert_eq!(tile.split, 1);
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(count, 4);

        let status = survey.render_traverse(&view, TAU, 0, |_| false, |_| ControlFlow::Break(-3));
        assert_eq!(status, TraverseStatus::Aborted(-3));
    }
}
