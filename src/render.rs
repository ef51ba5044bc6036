//! Human and JSON rendering of a reconciliation report.

use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use reconcile::{AlertLevel, ExecutionOutcome, ReconciliationReport, ReportEntry, RunMode};
use std::process::ExitCode;

/// Items listed per phase before the rest is summarised.
const ITEM_LIMIT: usize = 25;

/// Print the report for a terminal. `verbose` lists every item and note.
pub fn human(report: &ReconciliationReport, verbose: bool) {
    ui::header("Reconciliation report");
    ui::kv("Release", &report.release().to_string());
    ui::kv(
        "Mode",
        match report.mode() {
            RunMode::DryRun => "dry run",
            RunMode::Execute => "execute",
        },
    );
    if let Some(elapsed) = duration(report) {
        ui::kv("Duration", &elapsed);
    }

    let alerts = report.alerts();
    if !alerts.is_empty() {
        ui::section("Alerts");
        for (level, message) in alerts {
            match level {
                AlertLevel::Critical => println!("{} {}", "‼".red().bold(), message.red().bold()),
                AlertLevel::Warning => ui::warn(message),
                AlertLevel::Info => ui::info(message),
            }
        }
    }

    ui::section("Findings");
    for entry in report.entries() {
        match entry {
            ReportEntry::Finding {
                phase,
                candidates,
                excluded,
                notes,
            } => {
                println!("  {} ({})", phase.title().bold(), candidates.len());
                list(candidates, verbose);
                if !excluded.is_empty() {
                    ui::dim(&format!("    protected, kept: {}", excluded.join(", ")));
                }
                if verbose {
                    for note in notes {
                        ui::dim(&format!("    {note}"));
                    }
                }
            }
            ReportEntry::Skipped { phase } => {
                ui::dim(&format!("{}: skipped", phase.title()));
            }
            _ => {}
        }
    }

    let cleaned: Vec<&ReportEntry> = report
        .entries()
        .iter()
        .filter(|e| matches!(e, ReportEntry::Outcome { .. } | ReportEntry::FinalPass { .. }))
        .collect();
    if !cleaned.is_empty() {
        ui::section("Removals");
        for entry in cleaned {
            let (title, outcome) = match entry {
                ReportEntry::Outcome { phase, outcome } => (phase.title().to_string(), outcome),
                ReportEntry::FinalPass { label, outcome } => (label.clone(), outcome),
                _ => continue,
            };
            println!("  {}: {}", title.bold(), summarize(outcome));
            for item in &outcome.unresolved {
                println!("    {} {}", "✗".red(), item);
            }
            if verbose {
                for note in &outcome.notes {
                    ui::dim(&format!("    {note}"));
                }
            }
        }
    }

    if !report.errors().is_empty() {
        ui::section("Errors");
        for error in report.errors() {
            let scope = error
                .phase
                .map_or_else(|| format!("{:?}", error.origin), |p| p.label().to_string());
            println!("  {} [{}] {}", "✗".red(), scope.dimmed(), error.message);
        }
    }

    println!();
    let summary = match report.mode() {
        RunMode::DryRun => format!("{} candidate(s) found, nothing removed", report.total_candidates()),
        RunMode::Execute => format!(
            "{} of {} candidate(s) removed",
            report.total_removed(),
            report.total_candidates()
        ),
    };
    if report.has_critical() {
        ui::error(&summary);
    } else if report.errors().is_empty() {
        ui::success(&summary);
    } else {
        ui::warn(&format!("{summary}, {} error(s)", report.errors().len()));
    }
}

/// Pretty JSON, for machines.
pub fn json(report: &ReconciliationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Process exit code for a finished run.
pub fn exit_code(report: &ReconciliationReport) -> ExitCode {
    ExitCode::from(exit_status(report))
}

/// 2 when a critical alert was raised, 1 when errors were recorded, else 0.
fn exit_status(report: &ReconciliationReport) -> u8 {
    if report.has_critical() {
        2
    } else if report.errors().is_empty() {
        0
    } else {
        1
    }
}

fn list(items: &[String], verbose: bool) {
    let shown = if verbose { items.len() } else { ITEM_LIMIT };
    for item in items.iter().take(shown) {
        ui::item(item);
    }
    if items.len() > shown {
        ui::dim(&format!("    ... and {} more", items.len() - shown));
    }
}

fn summarize(outcome: &ExecutionOutcome) -> String {
    let mut parts = vec![format!("{} removed", outcome.removed_count())];
    if outcome.skipped_count() > 0 {
        parts.push(format!("{} skipped", outcome.skipped_count()));
    }
    if outcome.failed_count() > 0 {
        parts.push(format!("{} unresolved", outcome.failed_count()));
    }
    if outcome.passes.len() > 1 {
        parts.push(format!("{} passes", outcome.passes.len()));
    }
    parts.join(", ")
}

fn duration(report: &ReconciliationReport) -> Option<String> {
    let elapsed = report.finished_at()? - report.started_at();
    Some(format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0))
}
