use std::fs;
use std::io::Write;
use std::path::PathBuf;

use pkgcache_manifest::Manifest;
use serde_json::Value;
use tracing::{debug, info};

use crate::{Error, Result};

#[cfg(unix)]
const MANIFEST_MODE: u32 = 0o644;

/// Rewritten manifests on disk at `<metadata_dir>/<channel>/<project>-manifest.json`.
pub struct ManifestStore {
    metadata_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(metadata_dir: PathBuf) -> Self {
        Self { metadata_dir }
    }

    /// Create `<metadata_dir>/<channel>/` for every channel.
    pub fn ensure_channel_dirs<S: AsRef<str>>(&self, channels: &[S]) -> Result<()> {
        for channel in channels {
            let dir = self.metadata_dir.join(channel.as_ref());
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    pub fn path(&self, project: &str, channel: &str) -> PathBuf {
        self.metadata_dir
            .join(channel)
            .join(format!("{project}-manifest.json"))
    }

    /// Replace the stored manifest for the pair. The new content is written
    /// to a temp file in the same directory and renamed over the old one, so
    /// readers see either the previous or the new manifest in full.
    pub fn write(&self, project: &str, channel: &str, manifest: &Manifest) -> Result<PathBuf> {
        let path = self.path(project, channel);
        let dir = path
            .parent()
            .ok_or_else(|| Error::Config(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let data = manifest.to_json_pretty()?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        // Temp files start out 0600; consumers of the manifest run as other users.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(MANIFEST_MODE))?;
        }
        tmp.write_all(data.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        info!(
            path = %path.display(),
            packages = manifest.package_count(),
            "manifest written"
        );
        Ok(path)
    }

    pub fn read(&self, project: &str, channel: &str) -> Result<Manifest> {
        let data = self.read_raw(project, channel)?;
        Ok(Manifest::from_slice(&data)?)
    }

    /// `run_data.timestamp` of the stored manifest.
    pub fn last_modified(&self, project: &str, channel: &str) -> Result<String> {
        let data = self.read_raw(project, channel)?;
        let value: Value = serde_json::from_slice(&data)?;

        value
            .get("run_data")
            .and_then(|run_data| run_data.get("timestamp"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Structural(format!(
                    "manifest {} has no string run_data.timestamp",
                    self.path(project, channel).display()
                ))
            })
    }

    fn read_raw(&self, project: &str, channel: &str) -> Result<Vec<u8>> {
        let path = self.path(project, channel);
        debug!(path = %path.display(), "reading manifest");
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::MissingManifest {
                project: project.to_string(),
                channel: channel.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
