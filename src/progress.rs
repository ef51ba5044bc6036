//! Terminal progress and confirmation for orchestrated runs.

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{CandidateSet, ConfirmCallback, ExecutionOutcome, PhaseKind, ProgressCallback, Stage};
use std::time::Duration;

/// Spinner with the braille tick set.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// One spinner line per phase, finished with a summary of what it found or did.
pub struct PhaseProgress {
    quiet: bool,
    current: Option<ProgressBar>,
    position: usize,
    total: usize,
}

impl PhaseProgress {
    /// Create a reporter. A quiet one draws nothing.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            current: None,
            position: 0,
            total: 0,
        }
    }

    fn finish(&mut self, line: String) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        if !self.quiet {
            println!("{line}");
        }
    }

    fn counter(&self) -> String {
        format!("[{}/{}]", self.position, self.total).blue().bold().to_string()
    }
}

impl ProgressCallback for PhaseProgress {
    fn on_stage_start(&mut self, stage: Stage, phases: usize) {
        self.position = 0;
        self.total = phases;
        if !self.quiet {
            let title = match stage {
                Stage::Scan => "Scanning",
                Stage::Clean => "Cleaning",
            };
            println!();
            println!("{}", title.cyan().bold());
        }
    }

    fn on_phase_start(&mut self, stage: Stage, kind: PhaseKind) {
        self.position += 1;
        if self.quiet {
            return;
        }
        let verb = match stage {
            Stage::Scan => "Scanning",
            Stage::Clean => "Cleaning",
        };
        let pb = spinner(&format!("{} {verb} {}", self.counter(), kind.title()));
        self.current = Some(pb);
    }

    fn on_scanned(&mut self, kind: PhaseKind, candidates: &CandidateSet) {
        let status = if candidates.is_empty() {
            "✓".green()
        } else {
            "→".cyan()
        };
        let line = format!(
            "{} {} {}: {} candidate(s)",
            self.counter(),
            status,
            kind.title(),
            candidates.len()
        );
        self.finish(line);
    }

    fn on_cleaned(&mut self, kind: PhaseKind, outcome: &ExecutionOutcome) {
        let status = if outcome.is_success() {
            "✓".green()
        } else {
            "⚠".yellow()
        };
        let mut line = format!(
            "{} {} {}: {} removed",
            self.counter(),
            status,
            kind.title(),
            outcome.removed_count()
        );
        if outcome.failed_count() > 0 {
            line.push_str(&format!(", {} unresolved", outcome.failed_count()));
        }
        self.finish(line);
    }

    fn on_phase_error(&mut self, _stage: Stage, kind: PhaseKind, error: &str) {
        let line = format!("{} {} {}: {error}", self.counter(), "✗".red(), kind.title());
        self.finish(line);
    }

    fn on_stage_complete(&mut self, _stage: Stage) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

/// Asks on the terminal before the clean stage starts.
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str, candidates: usize) -> Result<bool> {
        println!();
        if candidates == 0 {
            println!("{} Nothing outside the baseline was found", "ℹ".blue());
        } else {
            println!(
                "{} {candidates} item(s) will be removed. This cannot be undone.",
                "⚠".yellow()
            );
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}
