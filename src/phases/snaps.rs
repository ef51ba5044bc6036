//! Snap packages installed after provisioning.

use super::classify::inventory;
use super::{ToolRemoval, in_baseline};
use crate::host::Host;
use anyhow::Result;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext, remove_batched};

/// Removes snaps the baseline does not list, applications before bases.
#[derive(Debug)]
pub struct SnapsPhase<'a> {
    host: &'a Host,
}

impl<'a> SnapsPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl Phase for SnapsPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Snaps
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let snap = self.host.tools().snap();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        let Some(snaps) = inventory(snap.list())? else {
            builder.note("snapd not installed");
            return Ok(builder.build());
        };

        let (bases, apps): (Vec<_>, Vec<_>) = snaps
            .into_iter()
            .filter(|s| !in_baseline(ctx.baseline, "snap", &s.name))
            .partition(hostkit::SnapInfo::is_runtime);

        builder.extend(apps.into_iter().map(|s| s.name));
        for base in bases {
            // the snapd snap carries the daemon every other snap needs
            if base.name == "snapd" {
                builder.note("snapd: kept, it runs the snap daemon");
                continue;
            }
            builder.push(base.name);
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let snap = self.host.tools().snap();
        let removal = ToolRemoval::new(
            |names: &[String]| snap.remove(names),
            |name: &str| snap.is_installed(name),
        );
        Ok(remove_batched(candidates.items(), self.host.batch(), &removal))
    }
}
