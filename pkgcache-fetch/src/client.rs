use crate::cache::PackageCache;
use crate::digest::{digests_match, hex_encode};
use crate::error::{FetchError, Result};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Connection and request limits for [`UpstreamClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound for a whole request, body included. `None` waits forever.
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30 * 60)),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("pkgcache-fetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A completed, verified download.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: u64,
    pub sha256: String,
}

/// HTTP client for upstream manifests and package bodies.
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .connect_timeout(options.connect_timeout);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    // -- public API ---------------------------------------------------------

    /// GET `url` and decode the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "fetching JSON document");
        let resp = self.get_ok(url).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Stream `url` into `dest`, verifying the body against
    /// `expected_sha256` before it replaces whatever was at `dest`.
    ///
    /// The body is written to a sibling `.tmp` file and renamed into place
    /// only once it is complete and its digest matches. On any failure the
    /// temp file is removed and `dest` is left untouched.
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: &str,
    ) -> Result<Download> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = PackageCache::partial_path(dest);
        let result = self.stream_to_file(url, &tmp_path).await;

        let download = match result {
            Ok(download) => download,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };

        if !digests_match(expected_sha256, &download.sha256) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(FetchError::DigestMismatch {
                url: url.to_string(),
                expected: expected_sha256.to_string(),
                actual: download.sha256,
            });
        }

        tokio::fs::rename(&tmp_path, dest).await?;
        info!(path = %dest.display(), bytes = download.bytes, "package stored");
        Ok(download)
    }

    // -- internals ----------------------------------------------------------

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(resp)
    }

    async fn stream_to_file(&self, url: &str, path: &Path) -> Result<Download> {
        let resp = self.get_ok(url).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut bytes = 0u64;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(Download {
            bytes,
            sha256: hex_encode(&hasher.finalize()),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
