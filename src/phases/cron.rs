//! Scheduled jobs: user crontabs and job files added after provisioning.

use super::remove_paths;
use crate::host::Host;
use anyhow::Result;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext};

const CRON_D: &str = "/etc/cron.d";
const USER_CRONTABS: &str = "/var/spool/cron/crontabs";
const PERIODIC_DIRS: &[&str] = &[
    "/etc/cron.hourly",
    "/etc/cron.daily",
    "/etc/cron.weekly",
    "/etc/cron.monthly",
];

/// Deletes crontabs and job files that no baseline package ships.
#[derive(Debug)]
pub struct CronPhase<'a> {
    host: &'a Host,
}

impl<'a> CronPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }

    /// Whether a job file is unowned or owned by a package outside the baseline.
    fn is_foreign(&self, path: &str, ctx: &ScanContext<'_>) -> hostkit::Result<bool> {
        Ok(match self.host.tools().apt().owner_of(path)? {
            Some(owner) => !ctx.baseline.contains(&owner),
            None => true,
        })
    }
}

impl Phase for CronPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Cron
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);
        let defaults = ctx.release.default_cron_entries();

        for path in self.host.children(CRON_D)? {
            let name = path.rsplit('/').next().unwrap_or_default();
            if defaults.contains(&name) {
                continue;
            }
            if self.is_foreign(&path, ctx)? {
                builder.push(path);
            }
        }

        // every user crontab was written after provisioning
        builder.extend(self.host.children(USER_CRONTABS)?);

        for dir in PERIODIC_DIRS {
            for path in self.host.children(dir)? {
                if path.ends_with("/.placeholder") {
                    continue;
                }
                if self.is_foreign(&path, ctx)? {
                    builder.push(path);
                }
            }
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        Ok(remove_paths(self.host, candidates))
    }
}
