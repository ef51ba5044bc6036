//! Callback traits for progress and confirmation
//!
//! These let the engine run without depending on a particular terminal UI.

use crate::candidate::CandidateSet;
use crate::phase::PhaseKind;
use crate::types::ExecutionOutcome;
use anyhow::Result;

/// Which half of a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Read-only discovery
    Scan,
    /// Destructive removal
    Clean,
}

/// Progress callback for orchestrated runs
pub trait ProgressCallback {
    /// Called when a stage starts with the number of phases it will visit
    fn on_stage_start(&mut self, stage: Stage, phases: usize);

    /// Called before a phase's scan or clean
    fn on_phase_start(&mut self, stage: Stage, kind: PhaseKind);

    /// Called after a successful scan
    fn on_scanned(&mut self, kind: PhaseKind, candidates: &CandidateSet);

    /// Called after a clean returned an outcome
    fn on_cleaned(&mut self, kind: PhaseKind, outcome: &ExecutionOutcome);

    /// Called when a phase's scan or clean failed
    fn on_phase_error(&mut self, stage: Stage, kind: PhaseKind, error: &str);

    /// Called when a stage completes
    fn on_stage_complete(&mut self, stage: Stage);
}

/// Confirmation callback for the point of no return
pub trait ConfirmCallback {
    /// Ask whether to proceed
    ///
    /// # Arguments
    /// * `prompt` - The confirmation prompt to show
    /// * `candidates` - Total number of removal targets found by the scan
    fn confirm(&mut self, prompt: &str, candidates: usize) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_stage_start(&mut self, _stage: Stage, _phases: usize) {}
    fn on_phase_start(&mut self, _stage: Stage, _kind: PhaseKind) {}
    fn on_scanned(&mut self, _kind: PhaseKind, _candidates: &CandidateSet) {}
    fn on_cleaned(&mut self, _kind: PhaseKind, _outcome: &ExecutionOutcome) {}
    fn on_phase_error(&mut self, _stage: Stage, _kind: PhaseKind, _error: &str) {}
    fn on_stage_complete(&mut self, _stage: Stage) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str, _candidates: usize) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str, _candidates: usize) -> Result<bool> {
        Ok(false)
    }
}
