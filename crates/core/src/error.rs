//! Unified error types for mirage.
//!
//! Internals propagate these typed errors; the HTTP adapters map them to
//! status codes exactly once, at the boundary.

/// Unified error type shared by the cache backends, renderer callers,
/// and the job orchestration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed request input.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Input could not be parsed as an absolute URL with a host.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Cache entry absent or zero-length. Used as a control signal, not a
    /// failure, except when surfaced by the status endpoint.
    #[error("CACHE_MISS: {0}")]
    CacheNotFound(String),

    /// Render queue or sitemap semaphore saturated.
    #[error("BUSY: {0}")]
    Busy(String),

    /// Browser render failed or timed out.
    #[error("RENDER_FAILED: {0}")]
    Render(String),

    /// The browser produced zero bytes of output.
    #[error("EMPTY_RENDER: {0}")]
    EmptyRender(String),

    /// Embedded store or object store I/O failure.
    #[error("BACKEND_ERROR: {0}")]
    Backend(String),

    /// Serialization failures and broken invariants.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error is the cache-miss control signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CacheNotFound(_))
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
