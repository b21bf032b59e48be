//! `info`: load a survey and print its metadata.

use std::sync::Arc;

use console::style;
use skyhips::config::ConfigFile;
use skyhips::survey::SurveyOptions;
use skyhips::Engine;
use tokio::runtime::Handle;

use super::common::{fetcher_for, wait_ready};
use crate::error::CliError;

/// Run the info command.
pub fn run(base: &str, json: bool, runtime: &Handle, config: &ConfigFile) -> Result<(), CliError> {
    let fetcher = fetcher_for(base, runtime, config)?;
    let engine = Engine::new(config.engine.clone(), Arc::clone(&fetcher))?;
    let survey = engine.create_survey(SurveyOptions::new(base));
    wait_ready(&survey, config.engine.fetch_timeout)?;

    let Some(props) = survey.properties() else {
        return Err(CliError::InvalidArgument(format!("{} has no properties", base)));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(props.as_ref())?);
        return Ok(());
    }

    println!("{}", style(survey.label()).bold());
    println!("  Base:         {}", survey.base());
    println!("  Frame:        {}", survey.frame());
    println!("  Orders:       {}..={}", props.min_order, props.max_order);
    println!("  Tile format:  {} ({} px)", props.tile_format.ext(), props.tile_width);
    if let Some(kind) = &props.dataproduct_type {
        println!("  Product:      {}", kind);
    }
    if props.release_date > 0.0 {
        println!("  Released:     MJD {:.5}", props.release_date);
    }
    println!(
        "  Allsky:       {}",
        if survey.has_allsky() { "loaded" } else { "none" }
    );
    Ok(())
}
