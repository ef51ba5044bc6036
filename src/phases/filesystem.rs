//! Operator-created trees under the configured filesystem roots.
//!
//! Every direct child of a root is a candidate, except under `/usr/local`,
//! whose standard hierarchy stays and only its contents are considered.
//! Anything dpkg knows about and belongs to a baseline package is left alone.

use super::remove_paths;
use crate::host::Host;
use anyhow::Result;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext};

const USR_LOCAL: &str = "/usr/local";

/// Directories a fresh install creates under `/usr/local`.
const USR_LOCAL_HIERARCHY: &[&str] = &[
    "bin", "etc", "games", "include", "lib", "man", "sbin", "share", "src",
];

/// Deletes what operators put under `/opt`, `/srv`, `/var/www` and `/usr/local`.
#[derive(Debug)]
pub struct FilesystemPhase<'a> {
    host: &'a Host,
}

impl<'a> FilesystemPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }

    /// Entries directly below `root` worth considering.
    fn entries(&self, root: &str) -> hostkit::Result<Vec<String>> {
        if root != USR_LOCAL {
            return self.host.children(root);
        }

        let mut entries = Vec::new();
        for child in self.host.children(root)? {
            let name = child.rsplit('/').next().unwrap_or_default();
            if !USR_LOCAL_HIERARCHY.contains(&name) {
                entries.push(child);
                continue;
            }
            // /usr/local/man is a symlink into share
            let is_link = self
                .host
                .path(&child)
                .symlink_metadata()
                .is_ok_and(|m| m.file_type().is_symlink());
            if !is_link {
                entries.extend(self.host.children(&child)?);
            }
        }
        Ok(entries)
    }
}

impl Phase for FilesystemPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Filesystem
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let apt = self.host.tools().apt();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        for root in self.host.filesystem_roots() {
            for path in self.entries(root)? {
                if self.host.is_kept(&path) {
                    builder.note(format!("{path}: kept by configuration"));
                    continue;
                }
                if let Some(owner) = apt.owner_of(&path)? {
                    if ctx.baseline.contains(&owner) {
                        builder.note(format!("{path}: shipped by {owner}"));
                        continue;
                    }
                }
                builder.push(path);
            }
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        Ok(remove_paths(self.host, candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FILESYSTEM_ROOTS;
    use crate::phases::testing::{Fixture, touch};
    use tempfile::TempDir;

    fn roots() -> Vec<String> {
        DEFAULT_FILESYSTEM_ROOTS.iter().map(|r| (*r).to_string()).collect()
    }

    fn populate(dir: &TempDir) {
        touch(dir.path(), "/opt/app/bin/server", "");
        touch(dir.path(), "/opt/vendor-agent/agent", "");
        touch(dir.path(), "/srv/data/blob", "");
        touch(dir.path(), "/var/www/html/index.html", "");
        touch(dir.path(), "/usr/local/bin/kubectl", "");
        touch(dir.path(), "/usr/local/share/ca-certificates/.keep", "");
        touch(dir.path(), "/usr/local/go/VERSION", "go1.22");
        std::fs::create_dir_all(dir.path().join("usr/local/lib")).unwrap();
    }

    #[test]
    fn test_scan_lists_operator_trees() {
        let dir = TempDir::new().unwrap();
        populate(&dir);
        let fx = Fixture::new(dir.path(), &["bash", "ca-certificates"])
            .with_host(|h| h.with_filesystem(roots(), vec!["/opt/vendor-agent".into()]));
        fx.runner
            .fail("dpkg-query -S", "dpkg-query: no path found matching pattern")
            .ok(
                "dpkg-query -S /usr/local/share/ca-certificates",
                "ca-certificates: /usr/local/share/ca-certificates\n",
            );

        let found = FilesystemPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert_eq!(
            found.items(),
            [
                "/opt/app",
                "/srv/data",
                "/var/www/html",
                "/usr/local/bin/kubectl",
                "/usr/local/go",
            ]
        );
        assert!(found.notes().iter().any(|n| n == "/opt/vendor-agent: kept by configuration"));
        assert!(found.notes().iter().any(|n| n.contains("shipped by ca-certificates")));
    }

    #[test]
    fn test_protected_root_children_are_excluded() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "/home/deploy/.profile", "");
        touch(dir.path(), "/home/deploy/app.tar", "");
        let fx = Fixture::new(dir.path(), &["bash"])
            .with_host(|h| h.with_filesystem(vec!["/home".into()], Vec::new()));
        fx.runner.fail("dpkg-query -S", "dpkg-query: no path found matching pattern");

        let found = FilesystemPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert!(found.is_empty());
        assert_eq!(found.excluded(), ["/home/deploy"]);
    }

    #[test]
    fn test_clean_deletes_trees() {
        let dir = TempDir::new().unwrap();
        populate(&dir);
        let fx = Fixture::new(dir.path(), &["bash"])
            .with_host(|h| h.with_filesystem(roots(), Vec::new()));
        fx.runner.fail("dpkg-query -S", "dpkg-query: no path found matching pattern");

        let phase = FilesystemPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert!(outcome.is_success());
        assert!(!dir.path().join("opt/app").exists());
        assert!(!dir.path().join("usr/local/go").exists());
        assert!(dir.path().join("usr/local/bin").exists());
        assert!(dir.path().join("usr/local/lib").exists());
    }
}
