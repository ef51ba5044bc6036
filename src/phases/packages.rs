//! Operator-installed system packages.
//!
//! Candidates are the packages apt marks as manually installed minus the
//! baseline. Scan previews the purge with `apt-get -s` so the report shows
//! the fallout before anything is touched. Clean purges in batches, then
//! reinstalls any baseline package that disappeared along the way.

use super::classify::{self, Site, inventory};
use super::kernels::is_versioned_kernel;
use super::ToolRemoval;
use crate::host::Host;
use anyhow::Result;
use hostkit::Apt;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext, remove_batched};
use std::collections::HashSet;

/// Purges manually installed packages that are not in the baseline.
#[derive(Debug)]
pub struct PackagesPhase<'a> {
    host: &'a Host,
}

impl<'a> PackagesPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }

    /// Installed baseline packages, or `None` when dpkg cannot be queried.
    fn installed_baseline(
        &self,
        apt: &Apt,
        ctx: &ScanContext<'_>,
        outcome: &mut ExecutionOutcome,
    ) -> Option<Vec<String>> {
        match apt.list_installed() {
            Ok(installed) => Some(
                installed
                    .into_iter()
                    .filter(|p| ctx.baseline.contains(p))
                    .collect(),
            ),
            Err(e) => {
                classify::record(outcome, Site::Inventory, "dpkg-query", &e);
                outcome.note("collateral restoration skipped: installed packages unknown");
                None
            }
        }
    }

    /// Reinstall baseline packages lost as dependency fallout.
    fn restore(&self, apt: &Apt, lost: &[String], ctx: &ScanContext<'_>, outcome: &mut ExecutionOutcome) {
        for name in lost.iter().filter(|n| ctx.protected.contains(n)) {
            log::warn!("protected package {name} was removed as a dependency, reinstalling");
            outcome.note(format!("{name}: protected package lost during removal"));
        }

        log::info!("Reinstalling {} baseline package(s)", lost.len());
        match apt.install(lost) {
            Ok(()) => outcome.note(format!("reinstalled baseline packages: {}", lost.join(", "))),
            Err(e) => {
                classify::record(
                    outcome,
                    Site::Restore,
                    &format!("reinstall {}", lost.join(" ")),
                    &e,
                );
            }
        }
    }
}

impl Phase for PackagesPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Packages
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let apt = self.host.tools().apt();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        let Some(manual) = inventory(apt.list_manual())? else {
            builder.note("apt-mark not available");
            return Ok(builder.build());
        };

        for name in manual {
            if ctx.baseline.contains(&name) {
                continue;
            }
            if is_versioned_kernel(&name) {
                builder.note(format!("{name}: left to the kernels phase"));
                continue;
            }
            builder.push(name);
        }

        if builder.items().is_empty() {
            return Ok(builder.build());
        }

        let targets = builder.items().to_vec();
        match apt.simulate_purge(&targets) {
            Ok(removed) => {
                let (collateral, extra): (Vec<String>, Vec<String>) = removed
                    .into_iter()
                    .filter(|p| !targets.contains(p))
                    .partition(|p| ctx.baseline.contains(p));
                if !extra.is_empty() {
                    builder.note(format!("purge would also remove: {}", extra.join(", ")));
                }
                if !collateral.is_empty() {
                    builder.note(format!(
                        "purge would also remove baseline packages (reinstalled afterwards): {}",
                        collateral.join(", ")
                    ));
                }
            }
            // advisory only
            Err(e) => {
                log::warn!("purge simulation failed: {e}");
                builder.note(format!("purge simulation failed: {e}"));
            }
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let apt = self.host.tools().apt();
        let mut precheck = ExecutionOutcome::new();
        let before = self.installed_baseline(&apt, ctx, &mut precheck);

        let removal = ToolRemoval::new(
            |names: &[String]| apt.purge(names),
            |name: &str| apt.is_installed(name),
        );
        let mut outcome = remove_batched(candidates.items(), self.host.batch(), &removal);
        outcome.merge(precheck);

        let Some(before) = before else {
            return Ok(outcome);
        };
        match apt.list_installed() {
            Ok(after) => {
                let after: HashSet<String> = after.into_iter().collect();
                let lost: Vec<String> = before.into_iter().filter(|p| !after.contains(p)).collect();
                if !lost.is_empty() {
                    self.restore(&apt, &lost, ctx, &mut outcome);
                }
            }
            Err(e) => {
                classify::record(&mut outcome, Site::Inventory, "dpkg-query", &e);
                outcome.note("collateral restoration skipped: installed packages unknown");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::Fixture;
    use reconcile::BatchConfig;
    use tempfile::TempDir;

    const BASELINE: &[&str] = &["bash", "coreutils", "curl", "libcurl4", "openssh-server"];

    fn fixture(dir: &TempDir) -> Fixture {
        let fx = Fixture::new(dir.path(), BASELINE);
        fx.runner.ok(
            "apt-mark showmanual",
            "bash\ncoreutils\ncurl\nnginx\nredis-server\nopenssh-server\nsudo\nlinux-image-6.8.0-45-generic\n",
        );
        fx
    }

    #[test]
    fn test_scan_diffs_against_baseline_and_protected() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        fx.runner.ok(
            "apt-get -s purge",
            "Purg nginx [1.24.0]\nPurg nginx-common [1.24.0]\nPurg redis-server [7.0]\n",
        );

        let found = PackagesPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert_eq!(found.items(), ["nginx", "redis-server"]);
        assert_eq!(found.excluded(), ["sudo"]);
        assert!(found.notes().iter().any(|n| n.contains("left to the kernels phase")));
        assert!(found.notes().iter().any(|n| n == "purge would also remove: nginx-common"));
    }

    #[test]
    fn test_scan_notes_collateral_baseline_packages() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        fx.runner
            .ok("apt-get -s purge", "Purg nginx\nRemv libcurl4\nPurg redis-server\n");

        let found = PackagesPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert!(found.notes().iter().any(|n| n.contains("baseline packages") && n.contains("libcurl4")));
    }

    #[test]
    fn test_simulation_failure_does_not_block_scan() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        fx.runner.fail("apt-get -s purge", "E: Unmet dependencies.");

        let found = PackagesPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.notes().iter().any(|n| n.starts_with("purge simulation failed")));
    }

    #[test]
    fn test_scan_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        let phase = PackagesPhase::new(&fx.host);
        let first = phase.scan(&fx.ctx()).unwrap();
        let second = phase.scan(&fx.ctx()).unwrap();
        assert_eq!(first.items(), second.items());
        assert_eq!(first.notes(), second.notes());
    }

    #[test]
    fn test_clean_purges_and_restores_collateral() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        let status = "bash\tinstalled\ncoreutils\tinstalled\ncurl\tinstalled\nlibcurl4\tinstalled\n";
        fx.runner
            .ok("dpkg-query -W -f=${Package}", status)
            .ok("dpkg-query -W -f=${Package}", "bash\tinstalled\ncoreutils\tinstalled\n")
            .ok("dpkg-query -W -f=${Package}", "bash\tinstalled\ncoreutils\tinstalled\ncurl\tinstalled\nlibcurl4\tinstalled\n");

        let phase = PackagesPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed, vec!["nginx", "redis-server"]);
        assert_eq!(
            fx.runner.calls_matching("apt-get -y"),
            vec![
                "apt-get -y purge -- nginx redis-server",
                "apt-get -y install -- curl libcurl4",
            ]
        );
        assert!(outcome.notes.iter().any(|n| n == "reinstalled baseline packages: curl, libcurl4"));
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_failed_restoration_is_soft() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        fx.runner
            .ok("dpkg-query -W -f=${Package}", "curl\tinstalled\n")
            .ok("dpkg-query -W -f=${Package}", "")
            .fail("apt-get -y install", "E: Unable to locate package curl");

        let phase = PackagesPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed_count(), 2);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].item, "reinstall curl");
    }

    #[test]
    fn test_single_poisoned_package() {
        let dir = TempDir::new().unwrap();
        let fx = Fixture::new(dir.path(), &["bash"])
            .with_host(|h| h.with_batch(BatchConfig::new(20, 5)));
        fx.runner
            .ok("apt-mark showmanual", "bash\nalpha\nbeta\nheld-pkg\n")
            .fail("apt-get -y purge -- alpha beta held-pkg", "E: Held packages were changed")
            .fail("apt-get -y purge -- held-pkg", "E: Held packages were changed")
            .ok("dpkg-query -W -f=${db:Status-Status} held-pkg", "installed");

        let phase = PackagesPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed, vec!["alpha", "beta"]);
        assert_eq!(outcome.unresolved, vec!["held-pkg"]);
        // a pass that removes nothing ends the run
        assert_eq!(outcome.passes.len(), 2);
    }

    #[test]
    fn test_missing_apt_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner.missing("apt-mark");
        let found = PackagesPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert!(found.is_empty());
        assert_eq!(found.notes(), ["apt-mark not available"]);
    }
}
