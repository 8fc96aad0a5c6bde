//! Manifest providers: where the upstream catalog for a (project, channel)
//! pair comes from.
//!
//! Providers receive their [`ProviderConfig`] on every call instead of
//! reading process state, so two caches in one process can point at
//! different upstreams.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use pkgcache_fetch::{ClientOptions, UpstreamClient};
use pkgcache_manifest::Manifest;
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::{Error, Result};

#[async_trait]
pub trait ManifestProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce the current upstream manifest for the pair. The result always
    /// carries a `run_data.timestamp`.
    async fn generate(
        &self,
        project: &str,
        channel: &str,
        config: &ProviderConfig,
    ) -> Result<Manifest>;
}

/// Build the provider selected by `config.kind`. HTTP providers use
/// `options` for their requests.
pub fn provider_from_config(
    config: &ProviderConfig,
    options: ClientOptions,
) -> Result<Arc<dyn ManifestProvider>> {
    match config.kind {
        ProviderKind::Http => Ok(Arc::new(HttpManifestProvider::new(
            UpstreamClient::with_options(options)?,
        ))),
        ProviderKind::File => Ok(Arc::new(FileManifestProvider)),
    }
}

/// Current time in RFC 3339, second precision.
pub fn now_timestamp() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

fn expand_template(template: &str, project: &str, channel: &str) -> String {
    template
        .replace("{project}", project)
        .replace("{channel}", channel)
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Fetches manifest JSON from `url_template` with `{project}` and
/// `{channel}` filled in.
pub struct HttpManifestProvider {
    client: UpstreamClient,
}

impl HttpManifestProvider {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestProvider for HttpManifestProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate(
        &self,
        project: &str,
        channel: &str,
        config: &ProviderConfig,
    ) -> Result<Manifest> {
        let url = expand_template(&config.url_template, project, channel);
        debug!(%url, project, channel, "fetching upstream manifest");

        let mut manifest: Manifest = self.client.fetch_json(&url).await?;
        manifest.stamp_if_missing(now_timestamp());
        Ok(manifest)
    }
}

// ---------------------------------------------------------------------------
// File snapshot
// ---------------------------------------------------------------------------

/// Reads `<root>/<channel>/<project>-manifest.json` from a local snapshot of
/// upstream manifests.
pub struct FileManifestProvider;

impl FileManifestProvider {
    pub fn snapshot_path(root: &Path, project: &str, channel: &str) -> std::path::PathBuf {
        root.join(channel).join(format!("{project}-manifest.json"))
    }
}

#[async_trait]
impl ManifestProvider for FileManifestProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn generate(
        &self,
        project: &str,
        channel: &str,
        config: &ProviderConfig,
    ) -> Result<Manifest> {
        let root = config
            .root
            .as_deref()
            .ok_or_else(|| Error::Config("file provider requires provider.root".into()))?;
        let path = Self::snapshot_path(root, project, channel);
        debug!(path = %path.display(), "reading upstream manifest snapshot");

        let data = tokio::fs::read(&path).await.map_err(|e| {
            Error::Config(format!("failed reading snapshot {}: {e}", path.display()))
        })?;
        let mut manifest = Manifest::from_slice(&data)?;
        manifest.stamp_if_missing(now_timestamp());
        Ok(manifest)
    }
}
