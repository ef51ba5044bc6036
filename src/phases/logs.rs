//! Rotated logs and archived journal files.
//!
//! Active log files stay so running daemons keep a valid handle. The
//! installer's logs are part of the provisioning record and are kept too.

use super::classify::{self, Site};
use super::databases;
use crate::host::Host;
use anyhow::Result;
use regex::Regex;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext, Severity};
use std::path::Path;
use std::sync::LazyLock;

const LOG_DIR: &str = "/var/log";
const INSTALLER_LOGS: &str = "/var/log/installer";
const JOURNAL_DIR: &str = "/var/log/journal";

/// Pseudo-candidate standing for every archived journal file.
pub(crate) const ARCHIVED_JOURNAL: &str = "journal:archived";

/// `syslog.1`, `auth.log.2.gz`, `dpkg.log.old`, `app.log-20240101`
static ROTATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\.\d+|\.old|-\d{8})(?:\.(?:gz|xz|bz2|zst))?$|\.(?:gz|xz|bz2|zst)$")
        .expect("rotation pattern is valid")
});

fn is_rotated(path: &str) -> bool {
    ROTATED.is_match(path)
}

/// Deletes rotated logs and vacuums the journal.
#[derive(Debug)]
pub struct LogsPhase<'a> {
    host: &'a Host,
}

impl<'a> LogsPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl Phase for LogsPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Logs
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        for path in self.host.files_below(LOG_DIR)? {
            if Path::new(&path).starts_with(INSTALLER_LOGS) || Path::new(&path).starts_with(JOURNAL_DIR) {
                continue;
            }
            if databases::claims(&path) {
                continue;
            }
            if is_rotated(&path) {
                builder.push(path);
            }
        }

        if self.host.exists(JOURNAL_DIR) {
            builder.push(ARCHIVED_JOURNAL);
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::new();

        for id in candidates.items() {
            let (site, result) = if id == ARCHIVED_JOURNAL {
                (Site::Cleanup, self.host.tools().systemd().vacuum_journal())
            } else {
                (Site::ItemRemove, self.host.remove(id))
            };
            match result {
                Ok(()) => outcome.record_removed(id.as_str()),
                Err(e) => {
                    if classify::record(&mut outcome, site, id, &e) == Severity::Ignorable {
                        outcome.record_removed(id.as_str());
                    }
                }
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

    #[test]
    fn test_rotation_pattern() {
        assert!(is_rotated("/var/log/syslog.1"));
        assert!(is_rotated("/var/log/auth.log.2.gz"));
        assert!(is_rotated("/var/log/dpkg.log.old"));
        assert!(is_rotated("/var/log/app/app.log-20240101"));
        assert!(is_rotated("/var/log/nginx/access.log.14.gz"));
        assert!(!is_rotated("/var/log/syslog"));
        assert!(!is_rotated("/var/log/nginx/access.log"));
        assert!(!is_rotated("/var/log/ubuntu-advantage.log"));
    }

    fn populate(dir: &TempDir) {
        touch(dir.path(), "/var/log/syslog", "");
        touch(dir.path(), "/var/log/syslog.1", "");
        touch(dir.path(), "/var/log/auth.log.2.gz", "");
        touch(dir.path(), "/var/log/installer/subiquity-server-debug.log.1", "");
        touch(dir.path(), "/var/log/mysql/error.log.1.gz", "");
        touch(dir.path(), "/var/log/journal/abc/system@1.journal", "");
    }

    #[test]
    fn test_scan_selects_rotated_files_and_journal() {
        let dir = TempDir::new().unwrap();
        populate(&dir);
        let fx = Fixture::new(dir.path(), &["bash"]);

        let found = LogsPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert_eq!(
            found.items(),
            ["/var/log/auth.log.2.gz", "/var/log/syslog.1", ARCHIVED_JOURNAL]
        );
    }

    #[test]
    fn test_clean_deletes_and_vacuums() {
        let dir = TempDir::new().unwrap();
        populate(&dir);
        let fx = Fixture::new(dir.path(), &["bash"]);

        let phase = LogsPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed_count(), 3);
        assert!(dir.path().join("var/log/syslog").exists());
        assert!(!dir.path().join("var/log/syslog.1").exists());
        assert_eq!(
            fx.runner.calls_matching("journalctl"),
            vec!["journalctl --rotate", "journalctl --vacuum-time=1s"]
        );
    }

    #[test]
    fn test_journal_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        populate(&dir);
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner.fail("journalctl --rotate", "Failed to rotate journal files: Access denied");

        let phase = LogsPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed_count(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].item, ARCHIVED_JOURNAL);
        assert!(outcome.unresolved.is_empty());
    }
}
