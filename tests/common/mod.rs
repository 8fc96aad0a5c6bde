//! Shared fixtures for cache integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pkgcache::provider::ManifestProvider;
use pkgcache::{CacheConfig, Error, Manifest, PackageDescriptor, ProviderConfig, Result};

pub fn sha256_hex(data: &[u8]) -> String {
    pkgcache_fetch::digest::hex_digest(data)
}

/// Serves fixed manifests and records every pair it was asked for.
#[derive(Default)]
pub struct StaticProvider {
    manifests: HashMap<(String, String), Manifest>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, project: &str, channel: &str, manifest: Manifest) -> Self {
        self.manifests
            .insert((project.to_string(), channel.to_string()), manifest);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn generate(
        &self,
        project: &str,
        channel: &str,
        _config: &ProviderConfig,
    ) -> Result<Manifest> {
        self.calls
            .lock()
            .unwrap()
            .push((project.to_string(), channel.to_string()));
        self.manifests
            .get(&(project.to_string(), channel.to_string()))
            .cloned()
            .ok_or_else(|| Error::TransportFailure(format!("no manifest for {project}/{channel}")))
    }
}

pub fn shared(provider: StaticProvider) -> Arc<StaticProvider> {
    Arc::new(provider)
}

/// Config rooted in `root` with the default project/channel selection.
pub fn config_in(root: &Path) -> CacheConfig {
    CacheConfig {
        metadata_dir: root.join("metadata"),
        package_dir: root.join("public"),
        ..CacheConfig::default()
    }
}

pub fn descriptor(url: String, body: &[u8]) -> PackageDescriptor {
    PackageDescriptor::new(url, sha256_hex(body))
}
