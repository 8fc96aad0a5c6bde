/// Errors produced while talking to the upstream host or the package store.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("digest mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FetchError>;
