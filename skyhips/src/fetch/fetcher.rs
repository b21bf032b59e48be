//! Byte fetcher contract.

use bytes::Bytes;
use thiserror::Error;

/// Errors from retrieving raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The resource does not exist (404, missing file).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Local storage failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// The fetch did not complete in time.
    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Observed state of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPoll {
    /// Bytes are available.
    Ready(Bytes),
    /// Retrieval is in progress; poll again later.
    Pending,
    /// Retrieval failed.
    Failed(FetchError),
}

impl FetchPoll {
    pub fn is_pending(&self) -> bool {
        matches!(self, FetchPoll::Pending)
    }
}

/// Non-blocking retrieval of raw bytes keyed by a locator.
///
/// The first call for a locator starts the retrieval; later calls with the
/// same locator observe that same retrieval instead of starting another.
/// A terminal result (`Ready` or `Failed`) is handed out once, after which
/// the fetcher forgets the locator.
///
/// Implementations must tolerate many outstanding locators at once and must
/// never block the caller on network I/O.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> FetchPoll;
}
