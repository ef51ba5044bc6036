// Reconciliation runs
pub mod reset;

// Inspection
pub mod baseline;
pub mod order;

use crate::config::Config;
use anyhow::Result;
use reconcile::{BaselineManifest, BaselineResolver, Error, Release};
use std::path::Path;

/// Where the release is read from, in order.
const OS_RELEASE_FILES: &[&str] = &["etc/os-release", "usr/lib/os-release"];

/// Detect the release of the host mounted at `root`.
pub fn detect_release(root: &Path) -> Result<Release> {
    for file in OS_RELEASE_FILES {
        let path = root.join(file);
        if !path.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::ReleaseUndetectable(format!("{}: {e}", path.display())))?;
        let release = Release::from_os_release(&content)?;
        log::debug!("Detected {release} from {}", path.display());
        return Ok(release);
    }
    Err(Error::ReleaseUndetectable(format!("no os-release under {}", root.display())).into())
}

/// Resolve the baseline for `release` from the configured sources.
pub fn resolve_baseline(config: &Config, release: Release) -> Result<BaselineManifest> {
    let resolver = BaselineResolver::new(config.snapshot_path(), config.manifest_dir());
    Ok(resolver.resolve(release)?)
}
