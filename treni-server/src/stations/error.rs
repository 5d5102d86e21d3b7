//! Station data error types.

use crate::viaggiatreno::ApiError;

/// Errors from a persisted station store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite query or connection failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A previous holder of the connection lock panicked
    #[error("store lock poisoned")]
    LockPoisoned,

    /// The store cannot currently answer
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The blocking task running the store call panicked or was cancelled
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors from station data sources and the composite provider.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// No source knows the requested station(s)
    #[error("station data not found")]
    NotFound,

    /// One source could not answer; the next one may
    #[error("data source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Network-level failure talking to the live API
    #[error("upstream API error: {0}")]
    Upstream(#[from] ApiError),

    /// Persisted store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StationError {
    pub fn unavailable(source_name: &str, reason: impl Into<String>) -> Self {
        StationError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StationError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(StationError::NotFound.to_string(), "station data not found");
        assert_eq!(
            StationError::unavailable("api", "timeout").to_string(),
            "data source api unavailable: timeout"
        );
        assert_eq!(
            StationError::from(StoreError::LockPoisoned).to_string(),
            "store lock poisoned"
        );
    }
}
