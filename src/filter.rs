//! Select which manifest packages are eligible for mirroring.

use std::fmt;

use pkgcache_manifest::{Manifest, PackageDescriptor, PackageVersion};

use crate::{Error, Result};

/// A package chosen for mirroring, with the coordinates it was found under.
///
/// The descriptor is a copy taken before URL rewriting, so it still points at
/// the upstream host the bytes are fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPackage {
    pub platform: String,
    pub platform_version: String,
    pub arch: String,
    pub name: String,
    pub descriptor: PackageDescriptor,
}

impl fmt::Display for SelectedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.platform, self.platform_version, self.arch, self.name
        )
    }
}

/// Packages of `manifest` newer than `min_version`, in traversal order.
///
/// With no threshold every package is selected. With one, each package-name
/// key must parse as a version; the first key that does not aborts selection
/// with [`Error::MalformedVersion`].
pub fn select_packages(
    manifest: &Manifest,
    min_version: Option<&PackageVersion>,
) -> Result<Vec<SelectedPackage>> {
    let mut selected = Vec::new();

    for pkg in manifest.packages() {
        if let Some(floor) = min_version {
            let version = PackageVersion::parse(pkg.name).map_err(|_| {
                Error::MalformedVersion(format!("package key '{}' at {}", pkg.name, pkg))
            })?;
            if version <= *floor {
                continue;
            }
        }

        selected.push(SelectedPackage {
            platform: pkg.platform.to_string(),
            platform_version: pkg.platform_version.to_string(),
            arch: pkg.arch.to_string(),
            name: pkg.name.to_string(),
            descriptor: pkg.descriptor.clone(),
        });
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(keys: &[&str]) -> Manifest {
        let mut m = Manifest::new("t");
        for (i, key) in keys.iter().enumerate() {
            m.insert(
                "ubuntu",
                "16.04",
                "x86_64",
                key,
                PackageDescriptor::new(format!("https://up/chef_{key}.deb"), format!("{i:02}")),
            );
        }
        m
    }

    fn names(selected: &[SelectedPackage]) -> Vec<&str> {
        selected.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn no_threshold_selects_everything() {
        let m = manifest(&["12.13", "12.14", "not-a-version"]);
        let selected = select_packages(&m, None).unwrap();
        assert_eq!(selected.len(), m.package_count());
    }

    #[test]
    fn threshold_is_strict() {
        let m = manifest(&["12.12.9", "12.13", "12.13.0", "12.13.1", "12.14"]);
        let floor = PackageVersion::parse("12.13").unwrap();
        let selected = select_packages(&m, Some(&floor)).unwrap();
        assert_eq!(names(&selected), vec!["12.13.1", "12.14"]);
    }

    #[test]
    fn preserves_traversal_order_across_platforms() {
        let mut m = Manifest::new("t");
        m.insert("ubuntu", "16.04", "x86_64", "12.14", PackageDescriptor::new("https://up/u.deb", "a"));
        m.insert("el", "7", "x86_64", "12.15", PackageDescriptor::new("https://up/e.rpm", "b"));
        m.insert("el", "6", "i386", "12.14", PackageDescriptor::new("https://up/e6.rpm", "c"));

        let selected = select_packages(&m, None).unwrap();
        let order: Vec<String> = selected.iter().map(|p| p.to_string()).collect();
        let expected: Vec<String> = m.packages().map(|p| p.to_string()).collect();
        assert_eq!(order, expected);
        assert_eq!(order[0], "ubuntu/16.04/x86_64/12.14");
    }

    #[test]
    fn malformed_key_is_fatal_with_threshold() {
        let m = manifest(&["12.14", "latest"]);
        let floor = PackageVersion::parse("12.13").unwrap();
        let err = select_packages(&m, Some(&floor)).unwrap_err();
        match err {
            Error::MalformedVersion(msg) => assert!(msg.contains("latest"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn selected_descriptor_is_a_snapshot() {
        let mut m = manifest(&["12.14"]);
        let selected = select_packages(&m, None).unwrap();
        for d in m.descriptors_mut() {
            d.url = "http://mirror/changed".into();
        }
        assert_eq!(selected[0].descriptor.url, "https://up/chef_12.14.deb");
    }

    #[test]
    fn empty_manifest_selects_nothing() {
        let m = Manifest::new("t");
        let floor = PackageVersion::parse("1").unwrap();
        assert!(select_packages(&m, Some(&floor)).unwrap().is_empty());
        assert!(select_packages(&m, None).unwrap().is_empty());
    }
}
