//! HTTP byte fetcher backed by reqwest on a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashSet;
use moka::sync::Cache;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use super::fetcher::{ByteFetcher, FetchError, FetchPoll};

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// How long a finished response waits for its locator to be polled again.
pub const DEFAULT_RESULT_TTL_SECS: u64 = 30;

/// Upper bound on the bytes held by uncollected responses.
const MAX_UNCOLLECTED_BYTES: u64 = 64 * 1024 * 1024;

type Outcome = Result<Bytes, FetchError>;

/// Fetches locators over HTTP(S).
///
/// The first poll of a locator spawns the request onto the runtime; the
/// response is parked until a later poll collects it. Polling never blocks.
/// Responses nobody collects expire after a TTL and are bounded in total
/// size, so locators that drop out of view do not pin memory.
///
/// # Example
///
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let fetcher = HttpFetcher::new(runtime.handle().clone(), Duration::from_secs(30))?;
/// loop {
///     match fetcher.fetch("https://alasky.cds.unistra.fr/DSS/DSSColor/properties") {
///         FetchPoll::Pending => continue,
///         other => break other,
///     }
/// }
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    runtime: Handle,
    in_flight: Arc<DashSet<String>>,
    done: Cache<String, Outcome>,
}

impl HttpFetcher {
    /// Create a fetcher that spawns requests on `runtime`.
    pub fn new(runtime: Handle, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skyhips/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            runtime,
            in_flight: Arc::new(DashSet::new()),
            done: uncollected(Duration::from_secs(DEFAULT_RESULT_TTL_SECS)),
        })
    }

    /// Change how long finished responses wait to be collected.
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.done = uncollected(ttl);
        self
    }

    /// Number of locators currently in flight or awaiting collection.
    pub fn outstanding(&self) -> usize {
        self.done.run_pending_tasks();
        self.in_flight.len() + self.done.entry_count() as usize
    }

    fn spawn(&self, locator: &str) {
        let client = self.client.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let done = self.done.clone();
        let url = locator.to_string();
        self.runtime.spawn(async move {
            let result = get(&client, &url).await;
            trace!(url = %url, ok = result.is_ok(), "HTTP fetch complete");
            // Park the result before clearing the marker so a poll in between
            // never starts a second request.
            done.insert(url.clone(), result);
            in_flight.remove(&url);
        });
    }
}

fn uncollected(ttl: Duration) -> Cache<String, Outcome> {
    Cache::builder()
        .max_capacity(MAX_UNCOLLECTED_BYTES)
        .weigher(|_url: &String, outcome: &Outcome| match outcome {
            Ok(data) => u32::try_from(data.len()).unwrap_or(u32::MAX).max(1),
            Err(_) => 1,
        })
        .time_to_live(ttl)
        .build()
}

async fn get(client: &reqwest::Client, url: &str) -> Result<Bytes, FetchError> {
    let response = client.get(url).send().await.map_err(|e| map_error(url, e))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(FetchError::Http(format!("HTTP {} from {}", status, url)));
    }

    response.bytes().await.map_err(|e| map_error(url, e))
}

fn map_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Http(format!("Request to {} failed: {}", url, err))
    }
}

impl ByteFetcher for HttpFetcher {
    fn fetch(&self, locator: &str) -> FetchPoll {
        if let Some(outcome) = self.done.remove(locator) {
            return collect(outcome);
        }
        if !self.in_flight.insert(locator.to_string()) {
            return FetchPoll::Pending;
        }
        // The request may have finished between the two lookups.
        if let Some(outcome) = self.done.remove(locator) {
            self.in_flight.remove(locator);
            return collect(outcome);
        }
        debug!(url = %locator, "Starting HTTP fetch");
        self.spawn(locator);
        FetchPoll::Pending
    }
}

fn collect(outcome: Outcome) -> FetchPoll {
    match outcome {
        Ok(data) => FetchPoll::Ready(data),
        Err(e) => FetchPoll::Failed(e),
    }
}
