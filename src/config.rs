use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pkgcache_fetch::ClientOptions;
use pkgcache_manifest::PackageVersion;

use crate::rewrite::{rewrite_url, MirrorTarget};
use crate::{Error, Result};

/// Process-wide cache configuration, fixed when the [`crate::Cache`] is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root for persisted manifests, one subdirectory per channel.
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,
    /// Root for mirrored package bytes.
    #[serde(default = "default_package_dir")]
    pub package_dir: PathBuf,
    /// Only packages strictly newer than this are mirrored. Unset mirrors
    /// everything.
    #[serde(default)]
    pub sync_min_version: Option<String>,
    /// Host package URLs are rewritten to. Unset leaves upstream URLs alone.
    #[serde(default)]
    pub mirror_host: Option<String>,
    #[serde(default = "default_mirror_protocol")]
    pub mirror_protocol: String,
    #[serde(default = "default_mirror_port")]
    pub mirror_port: u16,
    #[serde(default = "default_known_projects")]
    pub known_projects: Vec<String>,
    #[serde(default = "default_known_channels")]
    pub known_channels: Vec<String>,
    /// Subset of `known_projects` that `update` processes.
    #[serde(default = "default_sync_projects")]
    pub sync_projects: Vec<String>,
    /// Subset of `known_channels` that `update` processes.
    #[serde(default = "default_sync_channels")]
    pub sync_channels: Vec<String>,
    /// Per-request download limit, e.g. "30m". "0s" disables it.
    #[serde(default = "default_download_timeout")]
    pub download_timeout: String,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Http,
    File,
}

/// Where upstream manifests come from. Handed to the provider on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    /// URL with `{project}` and `{channel}` placeholders (kind = http).
    #[serde(default = "default_url_template")]
    pub url_template: String,
    /// Snapshot directory laid out as `<root>/<channel>/<project>-manifest.json`
    /// (kind = file).
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            url_template: default_url_template(),
            root: None,
        }
    }
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("./metadata_dir")
}

fn default_package_dir() -> PathBuf {
    PathBuf::from("./public")
}

fn default_mirror_protocol() -> String {
    "http".to_string()
}

fn default_mirror_port() -> u16 {
    80
}

fn default_known_projects() -> Vec<String> {
    [
        "angrychef",
        "chef",
        "chef-server",
        "chefdk",
        "compliance",
        "delivery",
        "inspec",
        "manage",
        "push-jobs-client",
        "push-jobs-server",
        "supermarket",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_known_channels() -> Vec<String> {
    vec!["current".into(), "stable".into(), "unstable".into()]
}

fn default_sync_projects() -> Vec<String> {
    vec!["chef".into()]
}

fn default_sync_channels() -> Vec<String> {
    vec!["stable".into()]
}

fn default_download_timeout() -> String {
    "30m".to_string()
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Http
}

fn default_url_template() -> String {
    "https://packages.chef.io/manifests/{channel}/{project}.json".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_dir: default_metadata_dir(),
            package_dir: default_package_dir(),
            sync_min_version: None,
            mirror_host: None,
            mirror_protocol: default_mirror_protocol(),
            mirror_port: default_mirror_port(),
            known_projects: default_known_projects(),
            known_channels: default_known_channels(),
            sync_projects: default_sync_projects(),
            sync_channels: default_sync_channels(),
            download_timeout: default_download_timeout(),
            provider: ProviderConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Defaults with only the metadata directory chosen.
    pub fn with_metadata_dir(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
            ..Self::default()
        }
    }

    pub fn min_version(&self) -> Result<Option<PackageVersion>> {
        self.sync_min_version
            .as_deref()
            .map(|v| {
                PackageVersion::parse(v).map_err(|_| {
                    Error::Config(format!("sync_min_version '{}' is not a valid version", v))
                })
            })
            .transpose()
    }

    pub fn mirror_target(&self) -> Option<MirrorTarget> {
        self.mirror_host.as_ref().map(|host| MirrorTarget {
            host: host.clone(),
            protocol: self.mirror_protocol.clone(),
            port: self.mirror_port,
        })
    }

    /// `None` when the timeout is zero.
    pub fn download_timeout(&self) -> Result<Option<Duration>> {
        let d = humantime::parse_duration(self.download_timeout.trim()).map_err(|e| {
            Error::Config(format!(
                "download_timeout '{}' is not a duration: {}",
                self.download_timeout, e
            ))
        })?;
        Ok(if d.is_zero() { None } else { Some(d) })
    }

    /// HTTP settings shared by manifest and package requests.
    pub fn client_options(&self) -> Result<ClientOptions> {
        Ok(ClientOptions {
            timeout: self.download_timeout()?,
            ..ClientOptions::default()
        })
    }
}

/// Load a configuration file (YAML for `.yaml`/`.yml`, JSON otherwise) and
/// validate it.
pub fn load_config(path: &Path) -> Result<CacheConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let config: CacheConfig = if is_yaml {
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid YAML config {}: {}", path.display(), e)))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid JSON config {}: {}", path.display(), e)))?
    };

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &CacheConfig) -> Result<()> {
    match config.mirror_protocol.as_str() {
        "http" | "https" => {}
        other => {
            return Err(Error::Config(format!(
                "mirror_protocol '{}' must be 'http' or 'https'",
                other
            )))
        }
    }

    if let Some(target) = config.mirror_target() {
        rewrite_url("https://upstream.invalid/probe", Some(&target)).map_err(|e| {
            Error::Config(format!(
                "mirror_host '{}' is not usable: {}",
                target.host, e
            ))
        })?;
    }

    for (list, names) in [
        ("known_projects", &config.known_projects),
        ("known_channels", &config.known_channels),
    ] {
        for name in names.iter() {
            validate_name(list, name)?;
        }
    }

    for project in &config.sync_projects {
        if !config.known_projects.contains(project) {
            return Err(Error::Config(format!(
                "sync_projects entry '{}' is not in known_projects",
                project
            )));
        }
    }
    for channel in &config.sync_channels {
        if !config.known_channels.contains(channel) {
            return Err(Error::Config(format!(
                "sync_channels entry '{}' is not in known_channels",
                channel
            )));
        }
    }

    config.min_version()?;
    config.download_timeout()?;

    match config.provider.kind {
        ProviderKind::Http => {
            if !config.provider.url_template.contains("{project}") {
                return Err(Error::Config(
                    "provider.url_template must contain {project}".into(),
                ));
            }
        }
        ProviderKind::File => {
            if config.provider.root.is_none() {
                return Err(Error::Config("provider.kind=file requires provider.root".into()));
            }
        }
    }

    Ok(())
}

/// Project and channel names become path components.
/// Reject project or channel names that would escape the metadata directory
/// once joined into a path.
pub fn validate_pair(project: &str, channel: &str) -> Result<()> {
    validate_name("project", project)?;
    validate_name("channel", channel)
}

fn validate_name(list: &str, name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(Error::Config(format!(
            "{} entry '{}' is not a valid name",
            list, name
        )));
    }
    Ok(())
}
