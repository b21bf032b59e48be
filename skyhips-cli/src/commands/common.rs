//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use skyhips::config::ConfigFile;
use skyhips::fetch::{ByteFetcher, FetchPoll, FileFetcher, HttpFetcher};
use skyhips::survey::{MetadataState, Survey};
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::CliError;

/// Delay between polls of a pending fetch.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Load the config file, falling back to defaults when there is none.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load(path)?),
        None => match ConfigFile::default_path() {
            Some(path) => Ok(ConfigFile::load(&path)?),
            None => Ok(ConfigFile::default()),
        },
    }
}

pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Pick the fetcher for a locator: HTTP for URLs, the filesystem otherwise.
pub fn fetcher_for(
    locator: &str,
    runtime: &Handle,
    config: &ConfigFile,
) -> Result<Arc<dyn ByteFetcher>, CliError> {
    if is_remote(locator) {
        let fetcher = HttpFetcher::new(runtime.clone(), config.engine.fetch_timeout)?;
        Ok(Arc::new(fetcher))
    } else {
        Ok(Arc::new(FileFetcher::new()))
    }
}

/// Poll `locator` until it resolves or `timeout` elapses.
pub fn fetch_blocking(
    fetcher: &dyn ByteFetcher,
    locator: &str,
    timeout: Duration,
) -> Result<Bytes, CliError> {
    let start = Instant::now();
    loop {
        match fetcher.fetch(locator) {
            FetchPoll::Ready(data) => {
                debug!(locator = %locator, bytes = data.len(), "fetched");
                return Ok(data);
            }
            FetchPoll::Failed(e) => return Err(e.into()),
            FetchPoll::Pending if start.elapsed() >= timeout => {
                return Err(CliError::Timeout(timeout, locator.to_string()));
            }
            FetchPoll::Pending => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Poll survey metadata until it is ready or failed.
pub fn wait_ready(survey: &Survey, timeout: Duration) -> Result<(), CliError> {
    let start = Instant::now();
    loop {
        survey.update();
        match survey.metadata_state() {
            MetadataState::Ready => return Ok(()),
            MetadataState::Failed(e) => return Err(e.into()),
            _ if start.elapsed() >= timeout => {
                return Err(CliError::Timeout(timeout, survey.base()));
            }
            _ => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Parse `ra,dec` in degrees.
pub fn parse_center(s: &str) -> Result<(f64, f64), CliError> {
    let invalid = || CliError::InvalidArgument(format!("expected RA,DEC in degrees, got '{}'", s));
    let (ra, dec) = s.split_once(',').ok_or_else(invalid)?;
    let ra: f64 = ra.trim().parse().map_err(|_| invalid())?;
    let dec: f64 = dec.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&dec) {
        return Err(invalid());
    }
    Ok((ra, dec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_center() {
        assert_eq!(parse_center("83.6, -5.4").unwrap(), (83.6, -5.4));
        assert!(parse_center("83.6").is_err());
        assert!(parse_center("a,b").is_err());
        assert!(parse_center("0,91").is_err());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://alasky.cds.unistra.fr/DSS"));
        assert!(!is_remote("/data/hips/DSS"));
        assert!(!is_remote("file:///data/hips/DSS"));
    }

    #[test]
    fn test_fetch_blocking_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hips_order = 3\n").unwrap();
        let locator = file.path().to_str().unwrap().to_string();

        let data = fetch_blocking(&FileFetcher::new(), &locator, Duration::from_secs(1)).unwrap();
        assert_eq!(&data[..], b"hips_order = 3\n");
    }

    #[test]
    fn test_fetch_blocking_missing_file() {
        let err = fetch_blocking(
            &FileFetcher::new(),
            "/nonexistent/skyhips/properties",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Fetch(_)));
    }

    #[test]
    fn test_load_config_explicit_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("none.ini"))).unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}
