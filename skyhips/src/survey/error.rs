use thiserror::Error;

use super::properties::PropertiesError;
use crate::fetch::FetchError;

/// Survey-level failures.
///
/// Metadata failures are permanent: the survey never becomes ready and
/// this is the one condition a host should surface to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurveyError {
    #[error("Properties unavailable: {0}")]
    PropertiesUnavailable(FetchError),

    #[error("Invalid properties: {0}")]
    InvalidProperties(#[from] PropertiesError),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}
