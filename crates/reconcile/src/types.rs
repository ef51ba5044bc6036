//! Core types for reconciliation runs

use crate::phase::PhaseKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a run may change the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Scan only, no `clean` is ever invoked
    #[default]
    DryRun,
    /// Scan, then clean in execute order
    Execute,
}

impl RunMode {
    /// Whether cleaning is allowed.
    pub fn is_execute(&self) -> bool {
        matches!(self, Self::Execute)
    }
}

/// Options for one orchestrated run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Global run mode
    pub mode: RunMode,
    /// Phases disabled for this run
    pub skip: BTreeSet<PhaseKind>,
}

impl RunOptions {
    /// Dry run with nothing skipped.
    pub fn dry_run() -> Self {
        Self::default()
    }

    /// Execute with nothing skipped.
    pub fn execute() -> Self {
        Self {
            mode: RunMode::Execute,
            ..Default::default()
        }
    }

    /// Skip a phase.
    pub fn skipping(mut self, kind: PhaseKind) -> Self {
        self.skip.insert(kind);
        self
    }
}

/// A removal target that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Target identifier
    pub item: String,
    /// Last error seen for it
    pub message: String,
}

impl ItemError {
    /// Create an item error.
    pub fn new(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            message: message.into(),
        }
    }
}

/// What happened during one pass of the batched executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    /// Items submitted in this pass
    pub attempted: Vec<String>,
    /// Items removed in this pass
    pub removed: Vec<String>,
    /// Items that failed and were carried towards the next pass
    pub deferred: Vec<String>,
}

/// Result of one phase's `clean` (or the final pass).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Targets confirmed gone
    pub removed: Vec<String>,
    /// Targets deliberately left alone
    pub skipped: Vec<String>,
    /// Targets still present after every retry
    pub unresolved: Vec<String>,
    /// Non-fatal per-item errors, most recent per item
    pub errors: Vec<ItemError>,
    /// Observations for the report
    pub notes: Vec<String>,
    /// Executor passes, empty for phases that do not batch
    pub passes: Vec<PassRecord>,
}

impl ExecutionOutcome {
    /// Empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of removed targets.
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Number of targets that failed for good.
    pub fn failed_count(&self) -> usize {
        self.unresolved.len()
    }

    /// Number of skipped targets.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Whether every target was dealt with.
    pub fn is_success(&self) -> bool {
        self.unresolved.is_empty() && self.errors.is_empty()
    }

    /// Record a removed target.
    pub fn record_removed(&mut self, item: impl Into<String>) {
        self.removed.push(item.into());
    }

    /// Record a skipped target with the reason as a note.
    pub fn record_skipped(&mut self, item: impl Into<String>, reason: &str) {
        let item = item.into();
        self.notes.push(format!("{item}: {reason}"));
        self.skipped.push(item);
    }

    /// Record a target that could not be removed.
    pub fn record_failed(&mut self, item: impl Into<String>, message: impl Into<String>) {
        let item = item.into();
        self.push_error(ItemError::new(item.clone(), message));
        if !self.unresolved.contains(&item) {
            self.unresolved.push(item);
        }
    }

    /// Record an error without marking the item unresolved.
    pub fn push_error(&mut self, error: ItemError) {
        // Keep only the latest message per item
        self.errors.retain(|e| e.item != error.item);
        self.errors.push(error);
    }

    /// Add a report note.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Merge another outcome into this one.
    pub fn merge(&mut self, other: ExecutionOutcome) {
        self.removed.extend(other.removed);
        self.skipped.extend(other.skipped);
        for item in other.unresolved {
            if !self.unresolved.contains(&item) {
                self.unresolved.push(item);
            }
        }
        for error in other.errors {
            self.push_error(error);
        }
        self.notes.extend(other.notes);
        self.passes.extend(other.passes);
    }
}
