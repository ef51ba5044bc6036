//! Candidate sets - removal targets produced by a phase's scan

use crate::phase::PhaseKind;
use crate::protected::ProtectedSet;
use serde::Serialize;
use std::collections::HashSet;

/// Ordered, deduplicated removal targets for one phase.
///
/// Only constructible through [`CandidateSet::builder`], which drops every
/// protected identifier before the set exists. There is no mutation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSet {
    phase: PhaseKind,
    items: Vec<String>,
    excluded: Vec<String>,
    notes: Vec<String>,
}

impl CandidateSet {
    /// Start building a candidate set guarded by `protected`.
    pub fn builder(phase: PhaseKind, protected: &ProtectedSet) -> CandidateSetBuilder<'_> {
        CandidateSetBuilder {
            phase,
            protected,
            seen: HashSet::new(),
            items: Vec::new(),
            excluded: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Phase this set belongs to.
    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    /// Removal targets in scan order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Protected identifiers the scan encountered and dropped.
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Scan-time observations (simulation output, skipped sources).
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Whether a target is in the set.
    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i == id)
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there is nothing to remove.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Builder that enforces the protected-set exclusion at insertion time.
pub struct CandidateSetBuilder<'a> {
    phase: PhaseKind,
    protected: &'a ProtectedSet,
    seen: HashSet<String>,
    items: Vec<String>,
    excluded: Vec<String>,
    notes: Vec<String>,
}

impl CandidateSetBuilder<'_> {
    /// Offer a target. Protected identifiers are diverted to `excluded`.
    pub fn push(&mut self, id: impl Into<String>) -> &mut Self {
        let id = id.into();
        if id.is_empty() || !self.seen.insert(id.clone()) {
            return self;
        }
        if self.protected.contains(&id) {
            log::debug!("{}: keeping protected {}", self.phase, id);
            self.excluded.push(id);
        } else {
            self.items.push(id);
        }
        self
    }

    /// Offer several targets.
    pub fn extend<I, S>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.push(id);
        }
        self
    }

    /// Targets accepted so far.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Attach a note for the report.
    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    /// Finish the set.
    pub fn build(&mut self) -> CandidateSet {
        CandidateSet {
            phase: self.phase,
            items: std::mem::take(&mut self.items),
            excluded: std::mem::take(&mut self.excluded),
            notes: std::mem::take(&mut self.notes),
        }
    }
}
