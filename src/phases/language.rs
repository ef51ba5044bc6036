//! Packages installed through pip, npm and gem outside dpkg.
//!
//! Candidate ids carry their manager (`pip:requests`, `npm:pm2`,
//! `gem:rails`). Components that ship with the interpreter itself are never
//! candidates, since removing them breaks the manager.

use super::{ToolRemoval, in_baseline};
use super::classify::inventory;
use crate::host::Host;
use anyhow::Result;
use hostkit::{LangKind, LangManager};
use reconcile::{
    CandidateSet, ExecutionOutcome, Phase, PhaseKind, Release, ScanContext, remove_batched,
};

/// Marker in gem's refusal to uninstall a gem bundled with Ruby.
const DEFAULT_GEM: &str = "is a default gem";

/// Uninstalls ecosystem packages the baseline does not list.
#[derive(Debug)]
pub struct LanguagePhase<'a> {
    host: &'a Host,
}

impl<'a> LanguagePhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }

    fn manager(&self, kind: LangKind, release: Release) -> LangManager {
        let manager = self.host.tools().lang(kind);
        match kind {
            LangKind::Pip => manager
                .with_pip_path(release.pip_site_dir())
                .with_break_system_packages(release == Release::Noble),
            _ => manager,
        }
    }
}

fn prefix(kind: LangKind) -> String {
    format!("{kind}:")
}

fn strip<'s>(kind: LangKind, id: &'s str) -> &'s str {
    id.strip_prefix(&prefix(kind)).unwrap_or(id)
}

impl Phase for LanguagePhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::LanguagePackages
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let runtime = ctx.release.runtime_components();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        for kind in LangKind::ALL {
            let manager = self.manager(kind, ctx.release);
            if !manager.is_available() {
                log::debug!("{kind}: not installed");
                continue;
            }
            let Some(names) = inventory(manager.list())? else {
                continue;
            };
            let label = kind.to_string();
            builder.extend(
                names
                    .into_iter()
                    .filter(|n| !runtime.contains(&n.as_str()))
                    .filter(|n| !in_baseline(ctx.baseline, &label, n))
                    .map(|n| format!("{label}:{n}")),
            );
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let mut outcome = ExecutionOutcome::new();

        for kind in LangKind::ALL {
            let ids: Vec<String> = candidates
                .items()
                .iter()
                .filter(|id| id.starts_with(&prefix(kind)))
                .cloned()
                .collect();
            if ids.is_empty() {
                continue;
            }

            let manager = self.manager(kind, ctx.release);
            let removal = ToolRemoval::new(
                |batch: &[String]| {
                    let names: Vec<String> =
                        batch.iter().map(|id| strip(kind, id).to_string()).collect();
                    manager.uninstall(&names)
                },
                |id: &str| manager.is_installed(strip(kind, id)),
            );
            let mut step = remove_batched(&ids, self.host.batch(), &removal);
            if kind == LangKind::Gem {
                release_default_gems(&mut step);
            }
            outcome.merge(step);
        }

        Ok(outcome)
    }
}

/// Default gems cannot be uninstalled; they go when Ruby does.
fn release_default_gems(outcome: &mut ExecutionOutcome) {
    let bundled: Vec<String> = outcome
        .errors
        .iter()
        .filter(|e| e.message.contains(DEFAULT_GEM))
        .map(|e| e.item.clone())
        .collect();
    for item in bundled {
        outcome.unresolved.retain(|u| *u != item);
        outcome.errors.retain(|e| e.item != item);
        outcome.record_skipped(item, "bundled with ruby");
    }
}
