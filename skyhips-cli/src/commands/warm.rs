//! `warm`: load every tile a view would need into the cache.
//!
//! Walks the survey the way a renderer would for the given visible angle,
//! then polls each tile until it is cached or has failed. Useful to check a
//! survey's availability and to measure cache behavior.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use skyhips::config::{format_size, ConfigFile};
use skyhips::index::{radec_to_direction, TileAddress};
use skyhips::survey::{Survey, SurveyOptions};
use skyhips::traverse::{ConeCull, VisitAction};
use skyhips::Engine;
use tokio::runtime::Handle;
use tracing::warn;

use super::common::{fetcher_for, wait_ready, POLL_INTERVAL};
use crate::error::CliError;

/// Options of the warm command.
#[derive(Debug, Clone)]
pub struct WarmOptions {
    /// Visible angle in degrees.
    pub angle_deg: f64,
    pub split_order: u8,
    /// View center as (RA, Dec) in degrees.
    pub center: Option<(f64, f64)>,
    pub timeout: Duration,
}

/// Tiles a renderer would request for this view, coarsest first per branch.
pub fn plan_tiles(survey: &Survey, options: &WarmOptions) -> Vec<TileAddress> {
    let angle = options.angle_deg.to_radians();
    let cull = options.center.map(|(ra, dec)| {
        ConeCull::new(
            radec_to_direction(ra.to_radians(), dec.to_radians()),
            angle / 2.0,
        )
    });
    let (min_order, max_order) = survey
        .properties()
        .map_or((0, 0), |p| (p.min_order, p.max_order));

    let mut tiles = Vec::new();
    survey.traverse(angle, options.split_order, |addr| {
        if cull.is_some_and(|c| c.is_outside(addr)) {
            return VisitAction::StopHere;
        }
        if addr.order() >= min_order {
            tiles.push(addr);
        }
        if addr.order() >= max_order {
            VisitAction::StopHere
        } else {
            VisitAction::Descend
        }
    });
    tiles
}

/// Run the warm command.
pub fn run(
    base: &str,
    options: &WarmOptions,
    runtime: &Handle,
    config: &ConfigFile,
) -> Result<(), CliError> {
    let fetcher = fetcher_for(base, runtime, config)?;
    let engine = Engine::new(config.engine.clone(), Arc::clone(&fetcher))?;
    let survey = engine.create_survey(SurveyOptions::new(base));
    wait_ready(&survey, config.engine.fetch_timeout)?;

    let mut pending = plan_tiles(&survey, options);
    println!(
        "Warming {} tiles of {}",
        pending.len(),
        style(survey.label()).bold()
    );

    let progress = ProgressBar::new(pending.len() as u64);
    if let Ok(bar_style) =
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} tiles ({elapsed}) {msg}")
    {
        progress.set_style(bar_style.progress_chars("=> "));
    }

    let start = Instant::now();
    let mut failed = 0usize;
    while !pending.is_empty() {
        pending.retain(|&addr| {
            if survey.get_tile(addr).is_some() {
                progress.inc(1);
                return false;
            }
            if let Some(err) = survey.tile_error(addr) {
                warn!(tile = %addr, error = %err, "tile failed");
                failed += 1;
                progress.inc(1);
                return false;
            }
            true
        });
        progress.set_message(format!("{} failed", failed));
        if pending.is_empty() {
            break;
        }
        if start.elapsed() >= options.timeout {
            progress.abandon();
            return Err(CliError::Timeout(
                options.timeout,
                format!("{} tiles", pending.len()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
    progress.finish();

    let cache = engine.cache_stats();
    let fetch = survey.fetch_stats();
    println!();
    println!("Cache:");
    println!("  Entries:  {}", cache.entry_count);
    println!(
        "  Resident: {} of {}",
        format_size(cache.resident_bytes),
        format_size(cache.budget_bytes)
    );
    println!("  Evicted:  {}", cache.evictions);
    println!("Fetch:");
    println!("  Requests: {}", fetch.requests);
    println!("  Loaded:   {}", fetch.materialized);
    println!("  Failed:   {}", fetch.failed);
    Ok(())
}
