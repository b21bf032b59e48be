//! Error types for tile loading.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors raised by a materializer while converting raw bytes to a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeError {
    /// Bytes are present but cannot be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The payload kind is not handled by this materializer.
    #[error("Unsupported tile data: {0}")]
    Unsupported(String),
}

/// Outcome taxonomy for a tile request.
///
/// `NotReady` and `DepthLimited` are expected steady states, not failures.
/// The render-time query surface never returns these as errors; they are
/// exposed for diagnostics through [`crate::survey::Survey::tile_error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Tile has not been fetched yet.
    #[error("Tile not ready")]
    NotReady,

    /// Network or storage miss.
    #[error("Fetch failed: {0}")]
    FetchFailed(FetchError),

    /// Bytes were fetched but could not be materialized.
    #[error("Decode failed: {0}")]
    DecodeFailed(MaterializeError),

    /// Traversal aborted with a caller-supplied code.
    #[error("Budget exceeded (code {0})")]
    BudgetExceeded(i32),

    /// The resolution ceiling was reached.
    #[error("Depth limited")]
    DepthLimited,
}

impl From<FetchError> for TileError {
    fn from(err: FetchError) -> Self {
        TileError::FetchFailed(err)
    }
}

impl From<MaterializeError> for TileError {
    fn from(err: MaterializeError) -> Self {
        TileError::DecodeFailed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_error_display() {
        assert_eq!(TileError::NotReady.to_string(), "Tile not ready");
        assert_eq!(
            TileError::BudgetExceeded(-3).to_string(),
            "Budget exceeded (code -3)"
        );
        let err: TileError = MaterializeError::Decode("bad header".to_string()).into();
        assert_eq!(err.to_string(), "Decode failed: Decode failed: bad header");
    }

    #[test]
    fn test_tile_error_from_fetch() {
        let err: TileError = FetchError::NotFound("a/b".to_string()).into();
        assert!(matches!(err, TileError::FetchFailed(FetchError::NotFound(_))));
    }
}
