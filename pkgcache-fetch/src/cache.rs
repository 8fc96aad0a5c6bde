use crate::digest::{digests_match, file_digest};
use crate::error::{FetchError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Package files stored under `<package_dir>/<url path>`.
///
/// The directory tree is a projection of the upstream URL space, so a
/// package fetched from `https://host/stable/el/7/chef.rpm` lands at
/// `<package_dir>/stable/el/7/chef.rpm`.
pub struct PackageCache {
    package_dir: PathBuf,
}

/// State of the local copy of a package relative to its expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCheck {
    /// No file at the cache path.
    Missing,
    /// File present and its digest matches.
    Valid,
    /// File present with different content.
    Mismatch { actual: String },
}

impl PackageCache {
    pub fn new(package_dir: PathBuf) -> Self {
        Self { package_dir }
    }

    /// Local path for the package downloadable from `url`.
    pub fn cache_path(&self, url: &str) -> Result<PathBuf> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let invalid = |reason: &str| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = parsed
            .path_segments()
            .ok_or_else(|| invalid("URL has no path"))?
            .collect();

        match segments.last() {
            Some(last) if !last.is_empty() => {}
            _ => return Err(invalid("URL path does not name a file")),
        }

        let mut path = self.package_dir.clone();
        for seg in segments.into_iter().filter(|s| !s.is_empty()) {
            // Url::parse already resolves literal dot segments.
            if seg == "." || seg == ".." {
                return Err(invalid("URL path escapes the package directory"));
            }
            path.push(seg);
        }
        Ok(path)
    }

    /// Compare the file at `path` against `expected_sha256`.
    pub async fn check(&self, path: &Path, expected_sha256: &str) -> Result<CacheCheck> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(CacheCheck::Missing),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheCheck::Missing)
            }
            Err(e) => return Err(e.into()),
        }

        let actual = file_digest(path).await?;
        debug!(path = %path.display(), %actual, "hashed cached package");
        if digests_match(expected_sha256, &actual) {
            Ok(CacheCheck::Valid)
        } else {
            Ok(CacheCheck::Mismatch { actual })
        }
    }

    /// Sibling temp file a download is streamed into before it is renamed
    /// over `path`.
    pub fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
