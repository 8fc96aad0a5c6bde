//! Error types for pkgcache

use pkgcache_fetch::FetchError;
use pkgcache_manifest::ManifestError;
use thiserror::Error;

/// Result type alias using pkgcache Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pkgcache operations
#[derive(Error, Debug)]
pub enum Error {
    /// No manifest has been persisted for the requested pair yet
    #[error("Can not find the manifest file for '{project}' - '{channel}'")]
    MissingManifest { project: String, channel: String },

    /// A download or upstream request could not complete
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Package content does not hash to the digest the manifest declares
    #[error("Integrity mismatch for {url}: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    /// A package-name key is not a dotted numeric version
    #[error("Malformed version: {0}")]
    MalformedVersion(String),

    /// A persisted manifest lacks an expected field
    #[error("Structural error: {0}")]
    Structural(String),

    /// A package URL cannot be parsed, rewritten or mapped to a cache path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::DigestMismatch {
                url,
                expected,
                actual,
            } => Error::IntegrityMismatch {
                url,
                expected,
                actual,
            },
            FetchError::InvalidUrl { url, reason } => {
                Error::InvalidUrl(format!("{url}: {reason}"))
            }
            FetchError::Io(e) => Error::Io(e),
            FetchError::Json(e) => Error::Serde(e),
            other => Error::TransportFailure(other.to_string()),
        }
    }
}

impl From<ManifestError> for Error {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::MalformedVersion(v) => Error::MalformedVersion(v),
            ManifestError::Json(e) => Error::Serde(e),
        }
    }
}
