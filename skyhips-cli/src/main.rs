//! SkyHiPS CLI - Command-line interface
//!
//! Inspect hipslists and surveys, and warm the tile cache for a view.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use skyhips::logging::init_logging;

use commands::common::{load_config, parse_center};
use commands::warm::WarmOptions;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "skyhips", version, about = "HiPS sky survey tool")]
struct Cli {
    /// Config file (default: ~/.skyhips/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overriding the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the surveys of a hipslist (URL or file)
    List {
        locator: String,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
        /// Stop after this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Load a survey and print its metadata
    Info {
        /// Survey base URL or directory
        survey: String,
        /// Print properties as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch every tile a view needs into the cache
    Warm {
        /// Survey base URL or directory
        survey: String,
        /// Visible angle in degrees
        #[arg(long, default_value_t = 360.0)]
        angle: f64,
        /// Tessellation order for full-sky views
        #[arg(long, default_value_t = 3)]
        split_order: u8,
        /// View center as RA,DEC in degrees
        #[arg(long, allow_hyphen_values = true)]
        center: Option<String>,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
    /// Convert a HiPS date (e.g. 2019-01-02T15:27Z) to MJD
    Date { input: String },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    let _guard = init_logging(&config.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("skyhips-fetch")
        .build()?;
    let handle = runtime.handle().clone();

    match cli.command {
        Command::List {
            locator,
            json,
            limit,
        } => commands::list::run(&locator, json, limit, &handle, &config),
        Command::Info { survey, json } => commands::info::run(&survey, json, &handle, &config),
        Command::Warm {
            survey,
            angle,
            split_order,
            center,
            timeout,
        } => {
            let options = WarmOptions {
                angle_deg: angle,
                split_order,
                center: center.as_deref().map(parse_center).transpose()?,
                timeout: Duration::from_secs(timeout),
            };
            commands::warm::run(&survey, &options, &handle, &config)
        }
        Command::Date { input } => commands::date::run(&input),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
