//! Fetching survey resources.
//!
//! Raw bytes come from a [`ByteFetcher`] (HTTP or local files). Each survey
//! owns a [`FetchPipeline`] that drives its tiles from request to cache
//! entry without blocking the render thread, and a [`NegativeCache`] that
//! keeps failed tiles from being requested again every frame.

mod fetcher;
mod file;
mod http;
mod locator;
mod negative;
mod pipeline;

pub use fetcher::{ByteFetcher, FetchError, FetchPoll};
pub use file::FileFetcher;
pub use http::{HttpFetcher, DEFAULT_HTTP_TIMEOUT_SECS};
pub use locator::SurveyLocator;
pub use negative::{NegativeCache, DEFAULT_NEGATIVE_TTL_SECS};
pub use pipeline::{FetchPipeline, FetchState, FetchStats, PipelineOptions};

#[cfg(test)]
pub use fetcher::tests::MockFetcher;
