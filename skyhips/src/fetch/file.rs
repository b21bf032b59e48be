//! Local filesystem fetcher.

use std::io;
use std::path::PathBuf;

use bytes::Bytes;

use super::fetcher::{ByteFetcher, FetchError, FetchPoll};

/// Reads locators as file paths, optionally relative to a root directory.
///
/// Reads are synchronous. Use it for surveys stored on local disk, where a
/// read completes well within a frame.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    /// Fetcher resolving locators as given.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Fetcher resolving relative locators against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        // Release-date suffixes only matter to HTTP caches.
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl ByteFetcher for FileFetcher {
    fn fetch(&self, locator: &str) -> FetchPoll {
        let path = self.resolve(locator);
        match std::fs::read(&path) {
            Ok(data) => FetchPoll::Ready(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                FetchPoll::Failed(FetchError::NotFound(path.display().to_string()))
            }
            Err(e) => FetchPoll::Failed(FetchError::Io(format!("{}: {}", path.display(), e))),
        }
    }
}
