//! Service units added locally or shipped by packages outside the baseline.
//!
//! Units are stopped and disabled before their packages are purged so nothing
//! keeps running against files that are about to disappear. Unit files
//! written by hand under the local unit directories are deleted as well.

use super::classify::{self, Site, inventory};
use crate::host::Host;
use anyhow::Result;
use hostkit::{Apt, Systemd};
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext, Severity};
use std::path::Path;

/// Directories where administrators put their own unit files.
const LOCAL_UNIT_DIRS: &[&str] = &["/etc/systemd/system", "/usr/local/lib/systemd/system"];

/// Unit file states that never denote a separate service to stop.
const IGNORED_STATES: &[&str] = &["alias", "masked", "generated", "transient", "bad"];

fn is_local(fragment: &Path) -> bool {
    LOCAL_UNIT_DIRS.iter().any(|dir| fragment.starts_with(dir))
}

/// Package owning a unit file, trying both sides of the /usr merge.
fn owning_package(apt: &Apt, fragment: &Path) -> hostkit::Result<Option<String>> {
    let path = fragment.to_string_lossy();
    if let Some(owner) = apt.owner_of(&path)? {
        return Ok(Some(owner));
    }
    let alternate = match path.strip_prefix("/usr") {
        Some(rest) => rest.to_string(),
        None => format!("/usr{path}"),
    };
    apt.owner_of(&alternate)
}

/// Stops, disables and (for local units) deletes non-baseline services.
#[derive(Debug)]
pub struct ServicesPhase<'a> {
    host: &'a Host,
}

impl<'a> ServicesPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }

    fn retire(&self, systemd: &Systemd, unit: &str, outcome: &mut ExecutionOutcome) -> bool {
        let mut ok = true;
        for result in [systemd.stop(unit), systemd.disable(unit)] {
            if let Err(e) = result {
                ok &= classify::record(outcome, Site::ItemRemove, unit, &e) == Severity::Ignorable;
            }
        }
        if !ok {
            return false;
        }

        let fragment = match systemd.fragment_path(unit) {
            Ok(fragment) => fragment,
            Err(e) => {
                classify::record(outcome, Site::Inventory, unit, &e);
                return false;
            }
        };
        let Some(fragment) = fragment.filter(|f| is_local(f)) else {
            return true;
        };

        let fragment = fragment.to_string_lossy();
        let drop_ins = format!("{fragment}.d");
        for path in [fragment.as_ref(), drop_ins.as_str()] {
            if let Err(e) = self.host.remove(path) {
                classify::record(outcome, Site::ItemRemove, unit, &e);
                return false;
            }
        }
        true
    }
}

impl Phase for ServicesPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Services
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let systemd = self.host.tools().systemd();
        let apt = self.host.tools().apt();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        let Some(units) = inventory(systemd.list_service_units())? else {
            builder.note("systemctl not available");
            return Ok(builder.build());
        };

        for unit in units {
            if unit.is_template() || IGNORED_STATES.contains(&unit.state.as_str()) {
                continue;
            }
            let Some(fragment) = systemd.fragment_path(&unit.name)? else {
                continue;
            };

            match owning_package(&apt, &fragment)? {
                Some(owner) if ctx.baseline.contains(&owner) => {}
                Some(owner) => {
                    log::debug!("{} belongs to non-baseline package {owner}", unit.name);
                    builder.push(unit.name);
                }
                None if is_local(&fragment) => {
                    builder.push(unit.name);
                }
                None => {
                    builder.note(format!(
                        "{}: owner of {} unknown, kept",
                        unit.name,
                        fragment.display()
                    ));
                }
            }
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let systemd = self.host.tools().systemd();
        let mut outcome = ExecutionOutcome::new();

        for unit in candidates.items() {
            if self.retire(&systemd, unit, &mut outcome) {
                outcome.record_removed(unit.as_str());
            }
        }

        if outcome.removed_count() > 0 {
            if let Err(e) = systemd.daemon_reload() {
                classify::record(&mut outcome, Site::Refresh, "systemctl daemon-reload", &e);
            }
        }
        Ok(outcome)
    }
}
