//! Phase contract - one unit of reconciliation per subsystem category
//!
//! A phase exposes a side-effect-free `scan` that produces a
//! [`CandidateSet`], and a destructive `clean` that consumes it.

use crate::baseline::BaselineManifest;
use crate::candidate::CandidateSet;
use crate::protected::ProtectedSet;
use crate::release::Release;
use crate::types::ExecutionOutcome;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Subsystem category a phase reconciles.
///
/// The discriminant is the stable scan index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseKind {
    /// Third-party package repositories and their keys
    Repositories = 1,
    /// Operator-installed system packages
    Packages = 2,
    /// Snap packages
    Snaps = 3,
    /// Locally added or non-baseline service units
    Services = 4,
    /// Container runtime objects
    Containers = 5,
    /// Database engine data and configuration trees
    Databases = 6,
    /// Scheduled jobs
    Cron = 7,
    /// Firewall rules
    Firewall = 8,
    /// Application trees under /opt, /srv, /var/www, /usr/local
    Filesystem = 9,
    /// pip/npm/gem global packages
    LanguagePackages = 10,
    /// Rotated logs and the journal
    Logs = 11,
    /// Kernels other than the running and newest one
    Kernels = 12,
}

impl PhaseKind {
    /// Every kind in scan order.
    pub const ALL: [PhaseKind; 12] = [
        PhaseKind::Repositories,
        PhaseKind::Packages,
        PhaseKind::Snaps,
        PhaseKind::Services,
        PhaseKind::Containers,
        PhaseKind::Databases,
        PhaseKind::Cron,
        PhaseKind::Firewall,
        PhaseKind::Filesystem,
        PhaseKind::LanguagePackages,
        PhaseKind::Logs,
        PhaseKind::Kernels,
    ];

    /// Stable numeric index.
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Stable label, also used in configuration.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Repositories => "repositories",
            Self::Packages => "packages",
            Self::Snaps => "snaps",
            Self::Services => "services",
            Self::Containers => "containers",
            Self::Databases => "databases",
            Self::Cron => "cron",
            Self::Firewall => "firewall",
            Self::Filesystem => "filesystem",
            Self::LanguagePackages => "language-packages",
            Self::Logs => "logs",
            Self::Kernels => "kernels",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Repositories => "Package repositories",
            Self::Packages => "System packages",
            Self::Snaps => "Snap packages",
            Self::Services => "Services",
            Self::Containers => "Container runtime",
            Self::Databases => "Database data",
            Self::Cron => "Scheduled jobs",
            Self::Firewall => "Firewall rules",
            Self::Filesystem => "Filesystem trees",
            Self::LanguagePackages => "Language packages",
            Self::Logs => "Logs",
            Self::Kernels => "Obsolete kernels",
        }
    }

    /// Kinds whose `clean` must complete before this kind's `clean` starts.
    pub fn runs_after(&self) -> &'static [PhaseKind] {
        match self {
            // Nothing may spawn new consumers once draining starts
            Self::Cron | Self::Services | Self::Containers => &[],
            Self::LanguagePackages | Self::Repositories => &[],
            Self::Databases => &[Self::Services, Self::Containers],
            Self::Snaps => &[Self::Services, Self::Containers, Self::LanguagePackages],
            Self::Packages => &[
                Self::Repositories,
                Self::Services,
                Self::Containers,
                Self::Cron,
                Self::LanguagePackages,
            ],
            Self::Kernels => &[Self::Repositories, Self::Packages],
            Self::Firewall => &[Self::Packages, Self::Snaps, Self::Kernels],
            Self::Filesystem => &[
                Self::Packages,
                Self::Snaps,
                Self::Kernels,
                Self::Services,
                Self::Containers,
            ],
            Self::Logs => &[Self::Firewall, Self::Filesystem],
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PhaseKind {
    type Err = String;

    /// Accepts a label (`language-packages`) or a scan index (`10`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<u8>() {
            return Self::ALL
                .into_iter()
                .find(|k| k.index() == index)
                .ok_or_else(|| format!("no phase with index {index}"));
        }
        Self::ALL
            .into_iter()
            .find(|k| k.label() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

/// Read-only inputs shared by every phase.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// Resolved platform release
    pub release: Release,
    /// Identifiers present at provisioning
    pub baseline: &'a BaselineManifest,
    /// Identifiers that must never be removed
    pub protected: &'a ProtectedSet,
}

/// A reconciliation phase.
///
/// `scan` must be free of side effects and deterministic for an unchanged
/// host. `clean` should be idempotent where the underlying tools allow it.
pub trait Phase: fmt::Debug {
    /// Category this phase reconciles.
    fn kind(&self) -> PhaseKind;

    /// Discover removal targets.
    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet>;

    /// Remove the targets found by `scan`.
    fn clean(&self, candidates: &CandidateSet, ctx: &ScanContext<'_>)
    -> Result<ExecutionOutcome>;
}

/// Catch-all pass run after every ordered phase has been cleaned.
pub trait FinalPass: fmt::Debug {
    /// Short label for the report.
    fn label(&self) -> &'static str;

    /// Remove whatever is now orphaned and clear caches.
    fn run(&self, ctx: &ScanContext<'_>) -> Result<ExecutionOutcome>;
}

/// The remote-access service whose health is verified after execution.
pub trait RemoteAccess: fmt::Debug {
    /// Service name for messages.
    fn service(&self) -> String;

    /// Whether the service is running.
    fn is_active(&self) -> Result<bool>;

    /// Attempt to bring the service back.
    fn restart(&self) -> Result<()>;
}

/// Lifecycle of a phase within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseState {
    /// Registered, not yet scanned
    Pending,
    /// Scan produced a candidate set
    Scanned,
    /// Clean was attempted
    Cleaned,
    /// Disabled for this run
    Skipped,
}

impl PhaseState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_become(&self, next: PhaseState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Scanned)
                | (Self::Pending, Self::Skipped)
                | (Self::Scanned, Self::Cleaned)
        )
    }
}

/// Per-run record of each phase's state.
#[derive(Debug, Clone, Default)]
pub struct PhaseLedger {
    states: BTreeMap<PhaseKind, PhaseState>,
}

impl PhaseLedger {
    /// Ledger with every given kind pending.
    pub fn new(kinds: impl IntoIterator<Item = PhaseKind>) -> Self {
        Self {
            states: kinds.into_iter().map(|k| (k, PhaseState::Pending)).collect(),
        }
    }

    /// Current state, `None` for unregistered kinds.
    pub fn state(&self, kind: PhaseKind) -> Option<PhaseState> {
        self.states.get(&kind).copied()
    }

    /// Move a phase to `next`, rejecting illegal transitions.
    pub fn transition(
        &mut self,
        kind: PhaseKind,
        next: PhaseState,
    ) -> std::result::Result<(), String> {
        let current = self
            .states
            .get_mut(&kind)
            .ok_or_else(|| format!("phase {kind} is not registered"))?;
        if !current.can_become(next) {
            return Err(format!("phase {kind}: illegal transition {current:?} -> {next:?}"));
        }
        *current = next;
        Ok(())
    }
}
