//! Catch-all pass: orphaned dependencies and package caches.

use super::classify::{self, Site};
use crate::host::Host;
use anyhow::Result;
use reconcile::{ExecutionOutcome, FinalPass, ItemError, ScanContext};

/// Runs `apt-get autoremove --purge` and `apt-get clean` after every phase.
///
/// Installed protected packages are marked manual first so autoremove cannot
/// take them as orphans. If marking fails the autoremove is skipped.
#[derive(Debug)]
pub struct Sweep<'a> {
    host: &'a Host,
}

impl<'a> Sweep<'a> {
    /// Create the pass.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl FinalPass for Sweep<'_> {
    fn label(&self) -> &'static str {
        "autoremove"
    }

    fn run(&self, ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let apt = self.host.tools().apt();
        let mut outcome = ExecutionOutcome::new();

        if !pin_protected(self.host, ctx, &mut outcome) {
            outcome.note("autoremove skipped: protected packages could not be marked manual");
        } else {
            autoremove(self.host, ctx, &mut outcome);
        }

        if let Err(e) = apt.clean() {
            classify::record(&mut outcome, Site::Cleanup, "apt-get clean", &e);
        }
        Ok(outcome)
    }
}

/// Mark every installed protected package manual. False when that failed.
fn pin_protected(host: &Host, ctx: &ScanContext<'_>, outcome: &mut ExecutionOutcome) -> bool {
    let apt = host.tools().apt();
    let pinned: Vec<String> = match apt.list_installed() {
        Ok(installed) => installed
            .into_iter()
            .filter(|p| ctx.protected.contains(p))
            .collect(),
        Err(e) => {
            classify::record(outcome, Site::Cleanup, "dpkg-query -W", &e);
            return false;
        }
    };

    match apt.mark_manual(&pinned) {
        Ok(()) => {
            if !pinned.is_empty() {
                log::debug!("Marked manual before autoremove: {}", pinned.join(", "));
            }
            true
        }
        Err(e) => {
            classify::record(outcome, Site::Cleanup, "apt-mark manual", &e);
            false
        }
    }
}

fn autoremove(host: &Host, ctx: &ScanContext<'_>, outcome: &mut ExecutionOutcome) {
    match host.tools().apt().autoremove() {
        Ok(removed) => {
            let baseline: Vec<&str> = removed
                .iter()
                .filter(|p| ctx.baseline.contains(p))
                .map(String::as_str)
                .collect();
            if !baseline.is_empty() {
                log::warn!("autoremove took baseline packages: {}", baseline.join(", "));
                outcome.note(format!("autoremove took baseline packages: {}", baseline.join(", ")));
            }
            for package in removed {
                if ctx.protected.contains(package_name(&package)) {
                    log::error!("autoremove removed protected package {package}");
                    outcome.push_error(ItemError::new(
                        package.clone(),
                        "protected package removed by autoremove",
                    ));
                }
                outcome.record_removed(package);
            }
        }
        Err(e) => {
            classify::record(outcome, Site::Cleanup, "apt-get autoremove", &e);
        }
    }
}

/// Package name without its `:arch` qualifier.
fn package_name(package: &str) -> &str {
    package.split_once(':').map_or(package, |(name, _)| name)
}
