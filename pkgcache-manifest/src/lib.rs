//! Product manifest data model for the pkgcache mirror.
//!
//! A manifest catalogs every package of one (project, channel) pair. It is
//! nested four levels deep and carries a `run_data` block next to the
//! platform keys:
//!
//! ```text
//! {
//!   "<platform>": {
//!     "<platform version>": {
//!       "<architecture>": {
//!         "<package version>": { "url": "...", "sha256": "..." }
//!       }
//!     }
//!   },
//!   "run_data": { "timestamp": "..." }
//! }
//! ```
//!
//! Each level is an `IndexMap`, so traversal and serialization follow the
//! key order of the upstream document. A stored manifest lists platforms and
//! versions exactly as upstream did.

mod version;

pub use version::PackageVersion;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use indexmap::IndexMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors produced while decoding manifests or package versions.
#[derive(Debug)]
pub enum ManifestError {
    /// A package-name key could not be read as a dotted numeric version.
    MalformedVersion(String),
    /// JSON (de)serialization failed.
    Json(serde_json::Error),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::MalformedVersion(v) => write!(f, "Malformed version: {}", v),
            ManifestError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for ManifestError {}

impl From<serde_json::Error> for ManifestError {
    fn from(e: serde_json::Error) -> Self {
        ManifestError::Json(e)
    }
}

// ---------------------------------------------------------------------------
// PackageDescriptor
// ---------------------------------------------------------------------------

/// One installable artifact.
///
/// Fields the mirror does not interpret (`sha1`, `version`, ...) are kept in
/// `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Fully-qualified download location.
    pub url: String,
    /// Expected SHA-256 of the package content, lowercase hex.
    pub sha256: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageDescriptor {
    pub fn new(url: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sha256: sha256.into(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunData
// ---------------------------------------------------------------------------

/// Generation metadata recorded by the manifest provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    /// Opaque generation/update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Package version -> descriptor.
pub type Packages = IndexMap<String, PackageDescriptor>;
/// Architecture -> packages.
pub type Architectures = IndexMap<String, Packages>;
/// Platform version -> architectures.
pub type PlatformVersions = IndexMap<String, Architectures>;
/// Platform -> platform versions.
pub type Platforms = IndexMap<String, PlatformVersions>;

/// The full catalog for one (project, channel) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub platforms: Platforms,
    /// Serialized after the platform keys.
    #[serde(default)]
    pub run_data: RunData,
}

/// Borrowed view of one descriptor together with the keys it was found under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageRef<'a> {
    pub platform: &'a str,
    pub platform_version: &'a str,
    pub arch: &'a str,
    /// Package-name key; for product manifests this is the package version.
    pub name: &'a str,
    pub descriptor: &'a PackageDescriptor,
}

impl fmt::Display for PackageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.platform, self.platform_version, self.arch, self.name
        )
    }
}

impl Manifest {
    /// An empty manifest stamped with `timestamp`.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            run_data: RunData {
                timestamp: Some(timestamp.into()),
                extra: Map::new(),
            },
            platforms: Platforms::new(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Pretty-printed JSON, terminated by a newline.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.run_data.timestamp.as_deref()
    }

    /// Set `run_data.timestamp` unless the provider already recorded one.
    pub fn stamp_if_missing(&mut self, timestamp: impl Into<String>) {
        if self.run_data.timestamp.is_none() {
            self.run_data.timestamp = Some(timestamp.into());
        }
    }

    /// Insert a descriptor, creating intermediate levels as needed.
    pub fn insert(
        &mut self,
        platform: &str,
        platform_version: &str,
        arch: &str,
        name: &str,
        descriptor: PackageDescriptor,
    ) -> Option<PackageDescriptor> {
        self.platforms
            .entry(platform.to_string())
            .or_default()
            .entry(platform_version.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default()
            .insert(name.to_string(), descriptor)
    }

    pub fn get(
        &self,
        platform: &str,
        platform_version: &str,
        arch: &str,
        name: &str,
    ) -> Option<&PackageDescriptor> {
        self.platforms
            .get(platform)?
            .get(platform_version)?
            .get(arch)?
            .get(name)
    }

    /// Every descriptor in traversal order.
    pub fn packages(&self) -> impl Iterator<Item = PackageRef<'_>> {
        self.platforms.iter().flat_map(|(platform, versions)| {
            versions.iter().flat_map(move |(platform_version, archs)| {
                archs.iter().flat_map(move |(arch, packages)| {
                    packages.iter().map(move |(name, descriptor)| PackageRef {
                        platform: platform.as_str(),
                        platform_version: platform_version.as_str(),
                        arch: arch.as_str(),
                        name: name.as_str(),
                        descriptor,
                    })
                })
            })
        })
    }

    /// Mutable access to every descriptor, in the same order as
    /// [`Manifest::packages`]. The key structure cannot change through it.
    pub fn descriptors_mut(&mut self) -> impl Iterator<Item = &mut PackageDescriptor> {
        self.platforms
            .values_mut()
            .flat_map(|versions| versions.values_mut())
            .flat_map(|archs| archs.values_mut())
            .flat_map(|packages| packages.values_mut())
    }

    pub fn package_count(&self) -> usize {
        self.packages().count()
    }

    pub fn is_empty(&self) -> bool {
        self.package_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "ubuntu": {
            "16.04": {
                "x86_64": {
                    "12.13.37": {
                        "url": "https://packages.example.com/stable/ubuntu/16.04/chef_12.13.37-1_amd64.deb",
                        "sha256": "aa11",
                        "sha1": "bb22",
                        "version": "12.13.37"
                    },
                    "12.14.60": {
                        "url": "https://packages.example.com/stable/ubuntu/16.04/chef_12.14.60-1_amd64.deb",
                        "sha256": "cc33"
                    }
                }
            }
        },
        "el": {
            "7": {
                "x86_64": {
                    "12.14.60": {
                        "url": "https://packages.example.com/stable/el/7/chef-12.14.60-1.el7.x86_64.rpm",
                        "sha256": "dd44"
                    }
                }
            }
        },
        "run_data": { "timestamp": "2016-09-20T17:03:12Z" }
    }"#;

    #[test]
    fn parse_nested_manifest() {
        let m = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(m.timestamp(), Some("2016-09-20T17:03:12Z"));
        assert_eq!(m.platforms.len(), 2);
        assert_eq!(m.package_count(), 3);

        let d = m.get("ubuntu", "16.04", "x86_64", "12.13.37").unwrap();
        assert_eq!(d.sha256, "aa11");
        assert_eq!(d.extra.get("sha1"), Some(&Value::from("bb22")));
    }

    #[test]
    fn run_data_is_not_a_platform() {
        let m = Manifest::from_json(SAMPLE).unwrap();
        assert!(!m.platforms.contains_key("run_data"));
    }

    #[test]
    fn packages_follow_document_order() {
        let m = Manifest::from_json(SAMPLE).unwrap();
        let keys: Vec<String> = m.packages().map(|p| p.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "ubuntu/16.04/x86_64/12.13.37",
                "ubuntu/16.04/x86_64/12.14.60",
                "el/7/x86_64/12.14.60",
            ]
        );
    }

    #[test]
    fn serialization_keeps_upstream_key_order() {
        let raw = r#"{"ubuntu":{"16.04":{"x86_64":{"12.9.38":{"url":"https://h/a.deb","sha256":"aa","version":"12.9.38","sha1":"11"},"12.10.24":{"url":"https://h/b.deb","sha256":"bb"}}}},"el":{},"run_data":{"timestamp":"t","build":"7"}}"#;
        let m = Manifest::from_json(raw).unwrap();
        let out: String = m.to_json_pretty().unwrap().split_whitespace().collect();
        assert_eq!(out, raw);
    }

    #[test]
    fn serialized_shape_keeps_extra_fields() {
        let m = Manifest::from_json(SAMPLE).unwrap();
        let value: Value = serde_json::from_str(&m.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["run_data"]["timestamp"], "2016-09-20T17:03:12Z");
        assert_eq!(
            value["ubuntu"]["16.04"]["x86_64"]["12.13.37"]["version"],
            "12.13.37"
        );
        assert_eq!(Manifest::from_json(&m.to_json_pretty().unwrap()).unwrap(), m);
    }

    #[test]
    fn empty_manifest_serializes_run_data_only() {
        let m = Manifest::new("2016-09-20T17:03:12Z");
        let value: Value = serde_json::from_str(&m.to_json_pretty().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["run_data"]["timestamp"], "2016-09-20T17:03:12Z");
        assert!(m.is_empty());
    }

    #[test]
    fn missing_run_data_defaults_and_stamps() {
        let mut m = Manifest::from_json(r#"{"mac_os_x": {}}"#).unwrap();
        assert_eq!(m.timestamp(), None);
        m.stamp_if_missing("now");
        assert_eq!(m.timestamp(), Some("now"));
        m.stamp_if_missing("later");
        assert_eq!(m.timestamp(), Some("now"));
    }

    #[test]
    fn descriptor_requires_url_and_sha256() {
        let err = Manifest::from_json(r#"{"el": {"7": {"x86_64": {"1.0": {"url": "x"}}}}}"#);
        assert!(matches!(err, Err(ManifestError::Json(_))));
    }

    #[test]
    fn descriptors_mut_visits_every_package() {
        let mut m = Manifest::from_json(SAMPLE).unwrap();
        for d in m.descriptors_mut() {
            d.url.push_str("?x=1");
        }
        assert!(m.packages().all(|p| p.descriptor.url.ends_with("?x=1")));
    }

    #[test]
    fn insert_creates_levels() {
        let mut m = Manifest::new("t");
        assert!(m
            .insert("el", "7", "x86_64", "1.0.0", PackageDescriptor::new("u", "s"))
            .is_none());
        assert_eq!(m.get("el", "7", "x86_64", "1.0.0").unwrap().url, "u");
        assert_eq!(m.package_count(), 1);
    }
}
