//! Reconciliation report - append-only record of one run
//!
//! Rendering is left to the caller; the report only orders and classifies.

use crate::context::Stage;
use crate::phase::PhaseKind;
use crate::release::Release;
use crate::types::{ExecutionOutcome, RunMode};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Visibility of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational
    Info,
    /// Needs operator attention
    Warning,
    /// The host may be unreachable or unusable
    Critical,
}

/// One report entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case", tag = "entry")]
pub enum ReportEntry {
    /// Scan result for a phase
    Finding {
        /// Phase scanned
        phase: PhaseKind,
        /// Removal targets
        candidates: Vec<String>,
        /// Protected identifiers kept
        excluded: Vec<String>,
        /// Scan notes
        notes: Vec<String>,
    },
    /// Clean result for a phase
    Outcome {
        /// Phase cleaned
        phase: PhaseKind,
        /// What happened
        outcome: ExecutionOutcome,
    },
    /// Result of the catch-all pass
    FinalPass {
        /// Pass label
        label: String,
        /// What happened
        outcome: ExecutionOutcome,
    },
    /// Phase disabled for this run
    Skipped {
        /// Phase skipped
        phase: PhaseKind,
    },
    /// Run-level alert
    Alert {
        /// Visibility
        level: AlertLevel,
        /// Message
        message: String,
    },
}

/// Where a reported error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorOrigin {
    /// A phase's scan
    Scan,
    /// A phase's clean
    Clean,
    /// The catch-all pass
    FinalPass,
    /// The remote-access health check
    HealthCheck,
}

impl From<Stage> for ErrorOrigin {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Scan => Self::Scan,
            Stage::Clean => Self::Clean,
        }
    }
}

/// A non-fatal error collected during the run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedError {
    /// Phase involved, if any
    pub phase: Option<PhaseKind>,
    /// Where it happened
    pub origin: ErrorOrigin,
    /// Message
    pub message: String,
}

/// The structured record of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    release: Release,
    mode: RunMode,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    entries: Vec<ReportEntry>,
    errors: Vec<ReportedError>,
}

impl ReconciliationReport {
    /// Start a report.
    pub fn new(release: Release, mode: RunMode) -> Self {
        Self {
            release,
            mode,
            started_at: Utc::now(),
            finished_at: None,
            entries: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Append a scan finding.
    pub fn push_finding(
        &mut self,
        phase: PhaseKind,
        candidates: Vec<String>,
        excluded: Vec<String>,
        notes: Vec<String>,
    ) {
        self.entries.push(ReportEntry::Finding {
            phase,
            candidates,
            excluded,
            notes,
        });
    }

    /// Append a clean outcome, lifting its item errors into the error list.
    pub fn push_outcome(&mut self, phase: PhaseKind, outcome: ExecutionOutcome) {
        for e in &outcome.errors {
            self.push_error(Some(phase), ErrorOrigin::Clean, format!("{}: {}", e.item, e.message));
        }
        self.entries.push(ReportEntry::Outcome { phase, outcome });
    }

    /// Append the final pass outcome.
    pub fn push_final_pass(&mut self, label: &str, outcome: ExecutionOutcome) {
        for e in &outcome.errors {
            self.push_error(None, ErrorOrigin::FinalPass, format!("{}: {}", e.item, e.message));
        }
        self.entries.push(ReportEntry::FinalPass {
            label: label.to_string(),
            outcome,
        });
    }

    /// Append a skipped phase.
    pub fn push_skipped(&mut self, phase: PhaseKind) {
        self.entries.push(ReportEntry::Skipped { phase });
    }

    /// Append an alert.
    pub fn push_alert(&mut self, level: AlertLevel, message: impl Into<String>) {
        self.entries.push(ReportEntry::Alert {
            level,
            message: message.into(),
        });
    }

    /// Append a non-fatal error.
    pub fn push_error(
        &mut self,
        phase: Option<PhaseKind>,
        origin: ErrorOrigin,
        message: impl Into<String>,
    ) {
        self.errors.push(ReportedError {
            phase,
            origin,
            message: message.into(),
        });
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Release the run targeted.
    pub fn release(&self) -> Release {
        self.release
    }

    /// Mode of the run.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Finish time, once finished.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Entries in the order they were recorded.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Collected non-fatal errors.
    pub fn errors(&self) -> &[ReportedError] {
        &self.errors
    }

    /// Alerts, most severe first, recording order kept within a level.
    pub fn alerts(&self) -> Vec<(AlertLevel, &str)> {
        let mut alerts: Vec<(AlertLevel, &str)> = self
            .entries
            .iter()
            .filter_map(|e| match e {
                ReportEntry::Alert { level, message } => Some((*level, message.as_str())),
                _ => None,
            })
            .collect();
        alerts.sort_by(|a, b| b.0.cmp(&a.0));
        alerts
    }

    /// Whether a critical alert was raised.
    pub fn has_critical(&self) -> bool {
        self.alerts().iter().any(|(level, _)| *level == AlertLevel::Critical)
    }

    /// Scan finding for a phase.
    pub fn finding(&self, phase: PhaseKind) -> Option<&[String]> {
        self.entries.iter().find_map(|e| match e {
            ReportEntry::Finding {
                phase: p,
                candidates,
                ..
            } if *p == phase => Some(candidates.as_slice()),
            _ => None,
        })
    }

    /// Clean outcome for a phase.
    pub fn outcome(&self, phase: PhaseKind) -> Option<&ExecutionOutcome> {
        self.entries.iter().find_map(|e| match e {
            ReportEntry::Outcome { phase: p, outcome } if *p == phase => Some(outcome),
            _ => None,
        })
    }

    /// Total candidates across all findings.
    pub fn total_candidates(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e {
                ReportEntry::Finding { candidates, .. } => candidates.len(),
                _ => 0,
            })
            .sum()
    }

    /// Total removals across all outcomes.
    pub fn total_removed(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e {
                ReportEntry::Outcome { outcome, .. } | ReportEntry::FinalPass { outcome, .. } => {
                    outcome.removed_count()
                }
                _ => 0,
            })
            .sum()
    }

    /// Zero errors, no critical alert, and something was removed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.has_critical() && self.total_removed() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerts_sorted_by_severity() {
        let mut report = ReconciliationReport::new(Release::Jammy, RunMode::Execute);
        report.push_alert(AlertLevel::Info, "first");
        report.push_alert(AlertLevel::Critical, "ssh down");
        report.push_alert(AlertLevel::Warning, "restored");

        let alerts = report.alerts();
        assert_eq!(alerts[0], (AlertLevel::Critical, "ssh down"));
        assert_eq!(alerts[2], (AlertLevel::Info, "first"));
        assert!(report.has_critical());
    }

    #[test]
    fn test_outcome_errors_lifted() {
        let mut report = ReconciliationReport::new(Release::Noble, RunMode::Execute);
        let mut outcome = ExecutionOutcome::new();
        outcome.record_removed("nginx");
        outcome.record_failed("docker-ce", "held");
        report.push_outcome(PhaseKind::Packages, outcome);

        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.errors()[0].phase, Some(PhaseKind::Packages));
        assert_eq!(report.total_removed(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_success_requires_removals() {
        let mut report = ReconciliationReport::new(Release::Focal, RunMode::Execute);
        assert!(!report.is_success());

        let mut outcome = ExecutionOutcome::new();
        outcome.record_removed("nginx");
        report.push_outcome(PhaseKind::Packages, outcome);
        assert!(report.is_success());
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = ReconciliationReport::new(Release::Jammy, RunMode::DryRun);
        report.push_finding(PhaseKind::Packages, vec!["pkgC".into()], vec![], vec![]);
        report.push_skipped(PhaseKind::Logs);
        report.finish();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "dry-run");
        assert_eq!(json["entries"][0]["entry"], "finding");
        assert_eq!(json["entries"][1]["phase"], "logs");
    }
}
