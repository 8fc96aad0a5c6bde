//! Point package URLs at the local mirror.

use pkgcache_manifest::Manifest;
use url::Url;

use crate::{Error, Result};

/// Scheme, host and port that rewritten URLs use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTarget {
    pub host: String,
    pub protocol: String,
    pub port: u16,
}

impl MirrorTarget {
    pub fn new(host: impl Into<String>, protocol: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            protocol: protocol.into(),
            port,
        }
    }
}

/// Replace scheme, host and port of `url` with `target`, keeping path, query
/// and fragment. Without a target the URL is returned unchanged.
///
/// Ports that are the default for the new scheme are omitted from the output.
pub fn rewrite_url(url: &str, target: Option<&MirrorTarget>) -> Result<String> {
    let Some(target) = target else {
        return Ok(url.to_string());
    };

    let mut parsed =
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

    parsed.set_scheme(&target.protocol).map_err(|_| {
        Error::InvalidUrl(format!(
            "{url}: cannot switch scheme to '{}'",
            target.protocol
        ))
    })?;
    parsed
        .set_host(Some(&target.host))
        .map_err(|e| Error::InvalidUrl(format!("{url}: host '{}': {e}", target.host)))?;
    parsed
        .set_port(Some(target.port))
        .map_err(|_| Error::InvalidUrl(format!("{url}: cannot set port {}", target.port)))?;

    Ok(parsed.into())
}

/// Rewrite every descriptor URL in `manifest`, whether or not the package is
/// selected for mirroring. Returns how many URLs changed.
pub fn rewrite_manifest(manifest: &mut Manifest, target: Option<&MirrorTarget>) -> Result<usize> {
    if target.is_none() {
        return Ok(0);
    }

    let mut changed = 0;
    for descriptor in manifest.descriptors_mut() {
        let rewritten = rewrite_url(&descriptor.url, target)?;
        if rewritten != descriptor.url {
            descriptor.url = rewritten;
            changed += 1;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgcache_manifest::PackageDescriptor;

    fn path_of(url: &str) -> String {
        Url::parse(url).unwrap().path().to_string()
    }

    #[test]
    fn no_target_leaves_url_untouched() {
        let url = "https://packages.example.com/stable/el/7/chef.rpm";
        assert_eq!(rewrite_url(url, None).unwrap(), url);
    }

    #[test]
    fn default_port_is_elided() {
        let target = MirrorTarget::new("mirror.internal", "http", 80);
        assert_eq!(
            rewrite_url("https://packages.example.com/stable/el/7/chef.rpm", Some(&target))
                .unwrap(),
            "http://mirror.internal/stable/el/7/chef.rpm"
        );
    }

    #[test]
    fn custom_port_is_kept() {
        let target = MirrorTarget::new("10.0.0.5", "http", 8080);
        assert_eq!(
            rewrite_url("https://packages.example.com/a/b.deb", Some(&target)).unwrap(),
            "http://10.0.0.5:8080/a/b.deb"
        );
    }

    #[test]
    fn existing_port_is_replaced() {
        let target = MirrorTarget::new("mirror", "https", 443);
        assert_eq!(
            rewrite_url("http://upstream:9000/x/y.msi", Some(&target)).unwrap(),
            "https://mirror/x/y.msi"
        );
    }

    #[test]
    fn path_query_and_fragment_survive() {
        let target = MirrorTarget::new("mirror.internal", "http", 8081);
        let urls = [
            "https://packages.example.com/stable/mac_os_x/10.11/chef-12.14.60-1.dmg",
            "https://packages.example.com/files/a%20b/pkg.deb?X-Sig=abc&e=1#frag",
            "http://packages.example.com:8443/windows/2012r2/chef-client-12.14.60-1-x86.msi",
        ];
        for url in urls {
            let out = rewrite_url(url, Some(&target)).unwrap();
            assert_eq!(path_of(&out), path_of(url), "{url}");
            let (a, b) = (Url::parse(url).unwrap(), Url::parse(&out).unwrap());
            assert_eq!(a.query(), b.query());
            assert_eq!(a.fragment(), b.fragment());
            assert_eq!(b.host_str(), Some("mirror.internal"));
            assert_eq!(b.port_or_known_default(), Some(8081));
        }
    }

    #[test]
    fn unparsable_url_is_invalid() {
        let target = MirrorTarget::new("mirror", "http", 80);
        assert!(matches!(
            rewrite_url("not a url", Some(&target)),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn manifest_rewrite_touches_every_descriptor() {
        let mut m = Manifest::new("t");
        m.insert(
            "el",
            "7",
            "x86_64",
            "12.13.37",
            PackageDescriptor::new("https://up/el/7/old.rpm", "aa"),
        );
        m.insert(
            "el",
            "7",
            "x86_64",
            "12.14.60",
            PackageDescriptor::new("https://up/el/7/new.rpm", "bb"),
        );

        let target = MirrorTarget::new("mirror", "http", 80);
        assert_eq!(rewrite_manifest(&mut m, Some(&target)).unwrap(), 2);
        assert_eq!(
            m.get("el", "7", "x86_64", "12.13.37").unwrap().url,
            "http://mirror/el/7/old.rpm"
        );
        assert_eq!(
            m.get("el", "7", "x86_64", "12.14.60").unwrap().url,
            "http://mirror/el/7/new.rpm"
        );
    }

    #[test]
    fn manifest_rewrite_without_target_is_noop() {
        let mut m = Manifest::new("t");
        m.insert("el", "7", "x86_64", "1.0", PackageDescriptor::new("https://up/a.rpm", "aa"));
        let before = m.clone();
        assert_eq!(rewrite_manifest(&mut m, None).unwrap(), 0);
        assert_eq!(m, before);
    }
}
