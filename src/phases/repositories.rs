//! Third-party package repositories, pinning files and their signing keys.

use super::classify::{self, Site};
use super::remove_paths;
use crate::host::Host;
use anyhow::Result;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext};
use std::path::Path;

const SOURCES_DIR: &str = "/etc/apt/sources.list.d";
const TRUSTED_DIR: &str = "/etc/apt/trusted.gpg.d";
const KEYRINGS_DIR: &str = "/etc/apt/keyrings";
const PREFERENCES_DIR: &str = "/etc/apt/preferences.d";
const SHARED_KEYRINGS_DIR: &str = "/usr/share/keyrings";

/// Removes apt sources and keys added after provisioning, then refreshes lists.
#[derive(Debug)]
pub struct RepositoriesPhase<'a> {
    host: &'a Host,
}

impl<'a> RepositoriesPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

impl Phase for RepositoriesPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Repositories
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let release = ctx.release;
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        for path in self.host.children(SOURCES_DIR)? {
            if !release.default_apt_sources().contains(&file_name(&path)) {
                builder.push(path);
            }
        }
        for path in self.host.children(TRUSTED_DIR)? {
            if !release.default_apt_keyrings().contains(&file_name(&path)) {
                builder.push(path);
            }
        }
        // neither directory ships anything on a fresh install
        builder.extend(self.host.children(KEYRINGS_DIR)?);
        builder.extend(self.host.children(PREFERENCES_DIR)?);

        // keyrings dropped here by hand rather than by a package
        let apt = self.host.tools().apt();
        for path in self.host.children(SHARED_KEYRINGS_DIR)? {
            match apt.owner_of(&path)? {
                Some(owner) => log::debug!("{path} belongs to {owner}"),
                None => {
                    builder.push(path);
                }
            }
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let mut outcome = remove_paths(self.host, candidates);

        if outcome.removed_count() > 0 {
            if let Err(e) = self.host.tools().apt().update() {
                classify::record(&mut outcome, Site::Refresh, "apt-get update", &e);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{Fixture, touch};
    use tempfile::TempDir;

    fn seed(root: &Path) {
        touch(root, "/etc/apt/sources.list.d/docker.list", "deb https://download.docker.com/linux/ubuntu jammy stable");
        touch(root, "/etc/apt/sources.list.d/ondrej-ubuntu-php-jammy.list", "deb https://ppa.launchpadcontent.net/ondrej/php/ubuntu jammy main");
        touch(root, "/etc/apt/trusted.gpg.d/ubuntu-keyring-2018-archive.gpg", "");
        touch(root, "/etc/apt/trusted.gpg.d/ondrej-ubuntu-php.gpg", "");
        touch(root, "/etc/apt/keyrings/docker.asc", "");
        touch(root, "/usr/share/keyrings/ubuntu-archive-keyring.gpg", "");
        touch(root, "/usr/share/keyrings/hashicorp-archive-keyring.gpg", "");
    }

    #[test]
    fn test_scan_finds_added_sources_and_keys() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner
            .ok(
                "dpkg-query -S /usr/share/keyrings/ubuntu-archive-keyring.gpg",
                "ubuntu-keyring: /usr/share/keyrings/ubuntu-archive-keyring.gpg\n",
            )
            .fail(
                "dpkg-query -S /usr/share/keyrings/hashicorp-archive-keyring.gpg",
                "dpkg-query: no path found matching pattern",
            );

        let found = RepositoriesPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert_eq!(
            found.items(),
            [
                "/etc/apt/sources.list.d/docker.list",
                "/etc/apt/sources.list.d/ondrej-ubuntu-php-jammy.list",
                "/etc/apt/trusted.gpg.d/ondrej-ubuntu-php.gpg",
                "/etc/apt/keyrings/docker.asc",
                "/usr/share/keyrings/hashicorp-archive-keyring.gpg",
            ]
        );
    }

    #[test]
    fn test_clean_removes_files_and_refreshes() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner.ok("dpkg-query -S", "ubuntu-keyring: /usr/share/keyrings/x\n");

        let phase = RepositoriesPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed_count(), found.len());
        assert!(!dir.path().join("etc/apt/sources.list.d/docker.list").exists());
        assert!(dir.path().join("etc/apt/trusted.gpg.d/ubuntu-keyring-2018-archive.gpg").exists());
        assert_eq!(fx.runner.calls_matching("apt-get update").len(), 1);
    }

    #[test]
    fn test_failed_refresh_is_reported() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "/etc/apt/sources.list.d/docker.list", "");
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner.fail("apt-get update", "E: The repository is not signed.");

        let phase = RepositoriesPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed_count(), 1);
        assert_eq!(outcome.errors[0].item, "apt-get update");
        assert!(outcome.unresolved.is_empty());
    }
}
