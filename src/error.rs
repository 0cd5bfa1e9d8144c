//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Each variant is one failure class; the HTTP layer maps classes to
//! status codes, so fetch problems stay distinguishable from storage or
//! embedding problems.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Content could not be fetched or extracted from the URL.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Fetched text was too short to be worth indexing.
    #[error("content too short: {got} chars (minimum {min})")]
    ContentTooShort { got: usize, min: usize },

    /// The embedding provider failed or returned malformed vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Database failure, including corrupt stored vectors.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration or chunking parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A network operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl Error {
    /// Classify a reqwest failure on the fetch path. Timeouts get their
    /// own variant so callers can map them to a distinct status code.
    pub fn fetch_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(format!("{context}: {err}"))
        } else {
            Error::Fetch(format!("{context}: {err}"))
        }
    }

    /// Same classification for the embedding providers.
    pub fn embed_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(format!("{context}: {err}"))
        } else {
            Error::Embedding(format!("{context}: {err}"))
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}
