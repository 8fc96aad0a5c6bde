//! Cache orchestration: turn upstream manifests into mirrored packages and
//! rewritten manifests.

use std::path::PathBuf;
use std::sync::Arc;

use pkgcache_manifest::{Manifest, PackageVersion};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{validate_config, validate_pair, CacheConfig};
use crate::filter::select_packages;
use crate::mirror::{MirrorOutcome, PackageMirror};
use crate::provider::{provider_from_config, ManifestProvider};
use crate::rewrite::{rewrite_manifest, MirrorTarget};
use crate::store::ManifestStore;
use crate::Result;

/// Counts for one completed (project, channel) update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub project: String,
    pub channel: String,
    /// Descriptors in the upstream manifest.
    pub packages: usize,
    /// Descriptors eligible for mirroring.
    pub selected: usize,
    pub cached: usize,
    pub downloaded: usize,
    pub replaced: usize,
    /// URLs pointed at the mirror host.
    pub rewritten: usize,
    pub manifest_path: PathBuf,
}

/// The package cache: configuration plus the components an update drives.
pub struct Cache {
    config: CacheConfig,
    provider: Arc<dyn ManifestProvider>,
    store: ManifestStore,
    mirror: PackageMirror,
    min_version: Option<PackageVersion>,
    target: Option<MirrorTarget>,
}

impl Cache {
    /// Validate `config` and create a metadata directory for every known
    /// channel.
    pub fn new(config: CacheConfig, provider: Arc<dyn ManifestProvider>) -> Result<Self> {
        validate_config(&config)?;

        let store = ManifestStore::new(config.metadata_dir.clone());
        store.ensure_channel_dirs(config.known_channels.as_slice())?;

        let mirror = PackageMirror::new(config.package_dir.clone(), config.client_options()?)?;

        Ok(Self {
            min_version: config.min_version()?,
            target: config.mirror_target(),
            config,
            provider,
            store,
            mirror,
        })
    }

    /// Build a cache whose provider is chosen by `config.provider.kind`.
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        let provider = provider_from_config(&config.provider, config.client_options()?)?;
        Self::new(config, provider)
    }

    /// Update every configured (project, channel) pair in order. The first
    /// failure aborts the run.
    pub async fn update(&self) -> Result<()> {
        for project in &self.config.known_projects {
            if !self.config.sync_projects.contains(project) {
                continue;
            }
            for channel in &self.config.known_channels {
                if !self.config.sync_channels.contains(channel) {
                    continue;
                }
                self.update_pair(project, channel).await?;
            }
        }
        Ok(())
    }

    /// Run one update cycle for a pair: fetch the upstream manifest, select
    /// packages, rewrite every URL, mirror the selection, persist.
    ///
    /// Nothing is written unless every step succeeds.
    pub async fn update_pair(&self, project: &str, channel: &str) -> Result<CycleSummary> {
        let span = info_span!("update", cycle = %Uuid::now_v7(), project, channel);
        self.run_cycle(project, channel).instrument(span).await
    }

    async fn run_cycle(&self, project: &str, channel: &str) -> Result<CycleSummary> {
        info!(provider = self.provider.name(), "generating manifest");
        let mut manifest = self
            .provider
            .generate(project, channel, &self.config.provider)
            .await?;

        let selected = select_packages(&manifest, self.min_version.as_ref())?;
        let rewritten = rewrite_manifest(&mut manifest, self.target.as_ref())?;

        let mut summary = CycleSummary {
            project: project.to_string(),
            channel: channel.to_string(),
            packages: manifest.package_count(),
            selected: selected.len(),
            rewritten,
            ..CycleSummary::default()
        };

        for pkg in &selected {
            let outcome = self.mirror.mirror(&pkg.descriptor).await?;
            match outcome {
                MirrorOutcome::Cached => summary.cached += 1,
                MirrorOutcome::Downloaded => summary.downloaded += 1,
                MirrorOutcome::Replaced => summary.replaced += 1,
            }
        }

        summary.manifest_path = self.store.write(project, channel, &manifest)?;

        info!(
            packages = summary.packages,
            selected = summary.selected,
            cached = summary.cached,
            downloaded = summary.downloaded,
            replaced = summary.replaced,
            "update complete"
        );
        Ok(summary)
    }

    pub fn manifest_path(&self, project: &str, channel: &str) -> PathBuf {
        self.store.path(project, channel)
    }

    /// The stored, rewritten manifest for the pair.
    pub fn manifest_for(&self, project: &str, channel: &str) -> Result<Manifest> {
        validate_pair(project, channel)?;
        self.store.read(project, channel)
    }

    /// `run_data.timestamp` of the stored manifest for the pair.
    pub fn last_modified_for(&self, project: &str, channel: &str) -> Result<String> {
        validate_pair(project, channel)?;
        self.store.last_modified(project, channel)
    }
}
