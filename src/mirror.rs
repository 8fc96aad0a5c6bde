//! Keep a verified local copy of each selected package.

use std::path::PathBuf;

use pkgcache_fetch::{CacheCheck, ClientOptions, PackageCache, UpstreamClient};
use pkgcache_manifest::PackageDescriptor;
use tracing::{info, warn};

use crate::Result;

/// What [`PackageMirror::mirror`] did for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Local copy already matched the digest; no network I/O.
    Cached,
    /// No local copy existed; it was downloaded.
    Downloaded,
    /// The local copy had the wrong digest and was downloaded again.
    Replaced,
}

/// Downloads packages into `<package_dir>/<url path>`.
pub struct PackageMirror {
    cache: PackageCache,
    client: UpstreamClient,
}

impl PackageMirror {
    pub fn new(package_dir: PathBuf, options: ClientOptions) -> Result<Self> {
        Ok(Self {
            cache: PackageCache::new(package_dir),
            client: UpstreamClient::with_options(options)?,
        })
    }

    pub fn cache_path(&self, descriptor: &PackageDescriptor) -> Result<PathBuf> {
        Ok(self.cache.cache_path(&descriptor.url)?)
    }

    /// Make sure the package behind `descriptor` is on disk with the declared
    /// digest, downloading it from `descriptor.url` when it is absent or
    /// corrupt.
    ///
    /// A fresh download is hashed while it streams and only replaces the
    /// cached file when the digest matches; otherwise the call fails with
    /// [`crate::Error::IntegrityMismatch`] and nothing is retried.
    pub async fn mirror(&self, descriptor: &PackageDescriptor) -> Result<MirrorOutcome> {
        let cache_path = self.cache_path(descriptor)?;

        let outcome = match self.cache.check(&cache_path, &descriptor.sha256).await? {
            CacheCheck::Valid => {
                info!(path = %cache_path.display(), "package is already in cache");
                return Ok(MirrorOutcome::Cached);
            }
            CacheCheck::Mismatch { actual } => {
                warn!(
                    path = %cache_path.display(),
                    expected = %descriptor.sha256,
                    %actual,
                    "cached package digest mismatch, downloading again"
                );
                MirrorOutcome::Replaced
            }
            CacheCheck::Missing => MirrorOutcome::Downloaded,
        };

        info!(url = %descriptor.url, "downloading package");
        self.client
            .download_verified(&descriptor.url, &cache_path, &descriptor.sha256)
            .await?;
        Ok(outcome)
    }
}
