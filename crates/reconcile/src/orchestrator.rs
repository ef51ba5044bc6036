//! Orchestrator - scan every phase, then clean in execute order
//!
//! 1. Scan stage - every registered, non-skipped phase in numeric order
//! 2. Execute stage - only in execute mode, after confirmation, in the
//!    validated execute order, followed by the final pass
//! 3. Self-heal - verify the remote-access service and restart it if needed

use crate::baseline::BaselineManifest;
use crate::candidate::CandidateSet;
use crate::context::{ConfirmCallback, ProgressCallback, Stage};
use crate::error::{Error, Result};
use crate::order::ExecuteOrder;
use crate::phase::{FinalPass, Phase, PhaseKind, PhaseLedger, PhaseState, RemoteAccess, ScanContext};
use crate::protected::ProtectedSet;
use crate::release::Release;
use crate::report::{AlertLevel, ErrorOrigin, ReconciliationReport};
use crate::types::{ExecutionOutcome, RunOptions};
use std::collections::BTreeMap;

/// Owns the phase registry and runs reconciliations.
pub struct Orchestrator<'a> {
    release: Release,
    baseline: BaselineManifest,
    protected: ProtectedSet,
    order: ExecuteOrder,
    phases: Vec<Box<dyn Phase + 'a>>,
    final_pass: Option<Box<dyn FinalPass + 'a>>,
    remote_access: Box<dyn RemoteAccess + 'a>,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator with the standard protected set and execute order.
    pub fn new(
        release: Release,
        baseline: BaselineManifest,
        remote_access: Box<dyn RemoteAccess + 'a>,
    ) -> Result<Self> {
        Ok(Self {
            release,
            baseline,
            protected: ProtectedSet::standard(),
            order: ExecuteOrder::standard()?,
            phases: Vec::new(),
            final_pass: None,
            remote_access,
        })
    }

    /// Register a phase. Each kind may be registered once.
    pub fn register(&mut self, phase: Box<dyn Phase + 'a>) -> Result<()> {
        let kind = phase.kind();
        if self.phases.iter().any(|p| p.kind() == kind) {
            return Err(Error::DuplicatePhase(kind.to_string()));
        }
        self.phases.push(phase);
        self.phases.sort_by_key(|p| p.kind().index());
        Ok(())
    }

    /// Set the catch-all pass that runs after every ordered phase.
    pub fn set_final_pass(&mut self, pass: Box<dyn FinalPass + 'a>) {
        self.final_pass = Some(pass);
    }

    /// Shared read-only context handed to phases.
    pub fn context(&self) -> ScanContext<'_> {
        ScanContext {
            release: self.release,
            baseline: &self.baseline,
            protected: &self.protected,
        }
    }

    /// Registered kinds in scan order.
    pub fn scan_order(&self) -> Vec<PhaseKind> {
        self.phases.iter().map(|p| p.kind()).collect()
    }

    /// The execute order.
    pub fn execute_order(&self) -> &ExecuteOrder {
        &self.order
    }

    /// The baseline in use.
    pub fn baseline(&self) -> &BaselineManifest {
        &self.baseline
    }

    /// The protected set in use.
    pub fn protected(&self) -> &ProtectedSet {
        &self.protected
    }

    fn phase(&self, kind: PhaseKind) -> Option<&(dyn Phase + 'a)> {
        self.phases
            .iter()
            .find(|p| p.kind() == kind)
            .map(Box::as_ref)
    }

    /// Run one reconciliation.
    ///
    /// Never fails: every non-fatal problem ends up in the report.
    pub fn run<P, C>(
        &self,
        opts: &RunOptions,
        progress: &mut P,
        confirm: &mut C,
    ) -> ReconciliationReport
    where
        P: ProgressCallback,
        C: ConfirmCallback,
    {
        let ctx = self.context();
        let mut report = ReconciliationReport::new(self.release, opts.mode);
        let mut ledger = PhaseLedger::new(self.scan_order());

        let scanned = self.scan_stage(&ctx, opts, &mut ledger, &mut report, progress);

        if !opts.mode.is_execute() {
            log::info!("Dry run: {} candidate(s), nothing removed", report.total_candidates());
            report.finish();
            return report;
        }

        let total = report.total_candidates();
        match confirm.confirm("Remove everything outside the baseline?", total) {
            Ok(true) => {}
            Ok(false) => {
                report.push_alert(AlertLevel::Info, "Execution declined, nothing was removed");
                report.finish();
                return report;
            }
            Err(e) => {
                report.push_alert(
                    AlertLevel::Warning,
                    format!("Confirmation failed ({e:#}), nothing was removed"),
                );
                report.finish();
                return report;
            }
        }

        self.execute_stage(&ctx, &scanned, &mut ledger, &mut report, progress);
        self.run_final_pass(&ctx, &mut report);
        self.verify_remote_access(&mut report);

        report.finish();
        report
    }

    fn scan_stage<P: ProgressCallback>(
        &self,
        ctx: &ScanContext<'_>,
        opts: &RunOptions,
        ledger: &mut PhaseLedger,
        report: &mut ReconciliationReport,
        progress: &mut P,
    ) -> BTreeMap<PhaseKind, CandidateSet> {
        let mut scanned = BTreeMap::new();
        progress.on_stage_start(Stage::Scan, self.phases.len());

        for phase in &self.phases {
            let kind = phase.kind();

            if opts.skip.contains(&kind) {
                log::info!("Skipping {kind}");
                advance(ledger, kind, PhaseState::Skipped);
                report.push_skipped(kind);
                continue;
            }

            progress.on_phase_start(Stage::Scan, kind);
            match phase.scan(ctx) {
                Ok(candidates) if candidates.phase() != kind => {
                    let message = format!("scan returned candidates for {}", candidates.phase());
                    progress.on_phase_error(Stage::Scan, kind, &message);
                    report.push_error(Some(kind), ErrorOrigin::Scan, message);
                }
                Ok(candidates) => {
                    log::info!(
                        "{kind}: {} candidate(s), {} protected",
                        candidates.len(),
                        candidates.excluded().len()
                    );
                    advance(ledger, kind, PhaseState::Scanned);
                    progress.on_scanned(kind, &candidates);
                    report.push_finding(
                        kind,
                        candidates.items().to_vec(),
                        candidates.excluded().to_vec(),
                        candidates.notes().to_vec(),
                    );
                    scanned.insert(kind, candidates);
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    log::warn!("{kind}: scan failed: {message}");
                    progress.on_phase_error(Stage::Scan, kind, &message);
                    report.push_error(Some(kind), ErrorOrigin::Scan, message);
                }
            }
        }

        progress.on_stage_complete(Stage::Scan);
        scanned
    }

    fn execute_stage<P: ProgressCallback>(
        &self,
        ctx: &ScanContext<'_>,
        scanned: &BTreeMap<PhaseKind, CandidateSet>,
        ledger: &mut PhaseLedger,
        report: &mut ReconciliationReport,
        progress: &mut P,
    ) {
        progress.on_stage_start(Stage::Clean, scanned.len());

        for kind in self.order.sequence() {
            let kind = *kind;
            let (Some(candidates), Some(phase)) = (scanned.get(&kind), self.phase(kind)) else {
                continue;
            };

            progress.on_phase_start(Stage::Clean, kind);
            let result = if candidates.is_empty() {
                Ok(ExecutionOutcome::new())
            } else {
                log::info!("Cleaning {kind} ({} target(s))", candidates.len());
                phase.clean(candidates, ctx)
            };
            advance(ledger, kind, PhaseState::Cleaned);

            match result {
                Ok(outcome) => {
                    log::info!(
                        "{kind}: removed {}, failed {}, skipped {}",
                        outcome.removed_count(),
                        outcome.failed_count(),
                        outcome.skipped_count()
                    );
                    progress.on_cleaned(kind, &outcome);
                    report.push_outcome(kind, outcome);
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    log::warn!("{kind}: clean failed: {message}");
                    progress.on_phase_error(Stage::Clean, kind, &message);
                    report.push_error(Some(kind), ErrorOrigin::Clean, message);
                }
            }
        }

        progress.on_stage_complete(Stage::Clean);
    }

    fn run_final_pass(&self, ctx: &ScanContext<'_>, report: &mut ReconciliationReport) {
        let Some(pass) = &self.final_pass else {
            return;
        };
        log::info!("Running final pass: {}", pass.label());
        match pass.run(ctx) {
            Ok(outcome) => {
                for item in &outcome.removed {
                    let name = item.split_once(':').map_or(item.as_str(), |(name, _)| name);
                    if self.protected.contains(item) || self.protected.contains(name) {
                        log::error!("{}: removed protected {item}", pass.label());
                        report.push_alert(
                            AlertLevel::Critical,
                            format!("{} removed protected {item}", pass.label()),
                        );
                    }
                }
                report.push_final_pass(pass.label(), outcome);
            }
            Err(e) => {
                let message = format!("{}: {e:#}", pass.label());
                log::warn!("Final pass failed: {message}");
                report.push_error(None, ErrorOrigin::FinalPass, message);
            }
        }
    }

    fn verify_remote_access(&self, report: &mut ReconciliationReport) {
        let service = self.remote_access.service();

        let active = match self.remote_access.is_active() {
            Ok(active) => active,
            Err(e) => {
                report.push_error(
                    None,
                    ErrorOrigin::HealthCheck,
                    format!("could not query {service}: {e:#}"),
                );
                false
            }
        };

        if active {
            report.push_alert(AlertLevel::Info, format!("{service} is active"));
            return;
        }

        log::warn!("{service} is not active after execution, restarting");
        report.push_alert(
            AlertLevel::Critical,
            format!("{service} was not active after execution, restart attempted"),
        );

        match self.remote_access.restart() {
            Ok(()) => match self.remote_access.is_active() {
                Ok(true) => report.push_alert(AlertLevel::Warning, format!("{service} restarted")),
                _ => report.push_alert(
                    AlertLevel::Critical,
                    format!("{service} still not active after restart, host may be unreachable"),
                ),
            },
            Err(e) => {
                let message = format!("{service} restart failed: {e:#}");
                log::error!("{message}");
                report.push_alert(
                    AlertLevel::Critical,
                    format!("{message}, host may be unreachable"),
                );
                report.push_error(None, ErrorOrigin::HealthCheck, message);
            }
        }
    }
}

fn advance(ledger: &mut PhaseLedger, kind: PhaseKind, next: PhaseState) {
    if let Err(e) = ledger.transition(kind, next) {
        log::error!("{e}");
    }
}
