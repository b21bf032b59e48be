//! `list`: print the surveys of a hipslist.

use std::ops::ControlFlow;

use console::style;
use skyhips::config::ConfigFile;
use skyhips::survey::{parse_hipslist, HipsListEntry};
use tokio::runtime::Handle;

use super::common::{fetch_blocking, fetcher_for};
use crate::error::CliError;

/// Run the list command.
pub fn run(
    locator: &str,
    json: bool,
    limit: Option<usize>,
    runtime: &Handle,
    config: &ConfigFile,
) -> Result<(), CliError> {
    let fetcher = fetcher_for(locator, runtime, config)?;
    let data = fetch_blocking(fetcher.as_ref(), locator, config.engine.fetch_timeout)?;
    let text = String::from_utf8_lossy(&data);

    let mut entries: Vec<HipsListEntry> = Vec::new();
    let parsed = parse_hipslist(&text, |entry| {
        entries.push(entry.clone());
        match limit {
            Some(n) if entries.len() >= n => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {}",
            style(entry.title().unwrap_or("(untitled)")).bold(),
            entry.url
        );
        if entry.release_date > 0.0 {
            println!("    released: MJD {:.5}", entry.release_date);
        }
    }
    println!();
    println!("{} surveys", parsed);
    Ok(())
}
