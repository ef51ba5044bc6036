//! User-added ufw rules. Rules admitting SSH are protected and stay.

use super::classify::{self, Site, inventory};
use crate::host::Host;
use anyhow::Result;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext, Severity};

/// Deletes every added firewall rule except the protected SSH ones.
#[derive(Debug)]
pub struct FirewallPhase<'a> {
    host: &'a Host,
}

impl<'a> FirewallPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl Phase for FirewallPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Firewall
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let ufw = self.host.tools().ufw();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        if !ufw.is_available() {
            builder.note("ufw not installed");
            return Ok(builder.build());
        }
        if let Some(rules) = inventory(ufw.added_rules())? {
            builder.extend(rules);
        }
        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let ufw = self.host.tools().ufw();
        let mut outcome = ExecutionOutcome::new();

        for rule in candidates.items() {
            match ufw.delete_rule(rule) {
                Ok(()) => outcome.record_removed(rule.as_str()),
                Err(e) => {
                    if classify::record(&mut outcome, Site::ItemRemove, rule, &e) == Severity::Ignorable {
                        outcome.record_removed(rule.as_str());
                    }
                }
            }
        }
        Ok(outcome)
    }
}
