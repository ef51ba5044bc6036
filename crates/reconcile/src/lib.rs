//! # Reconcile
//!
//! An engine for returning a host to its provisioning baseline.
//!
//! This crate provides the core abstractions for discovering everything a
//! host gained after provisioning and removing it in a dependency-safe order,
//! without ever touching the identifiers that keep the host reachable.
//!
//! ## Core Concepts
//!
//! - **Phase**: One subsystem category (packages, services, firewall, ...)
//!   with a read-only `scan` and a destructive `clean`
//! - **BaselineManifest**: What was present at provisioning
//! - **ProtectedSet**: What must never be removed
//! - **CandidateSet**: Removal targets, protected entries already dropped
//! - **ExecuteOrder**: The validated sequence used for cleaning
//! - **Orchestrator**: Scans every phase, then cleans in execute order
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{
//!     AutoConfirm, BaselineManifest, CandidateSet, ExecutionOutcome, NoProgress,
//!     Orchestrator, Phase, PhaseKind, Release, RunOptions, ScanContext,
//! };
//!
//! #[derive(Debug)]
//! struct Packages;
//!
//! impl Phase for Packages {
//!     fn kind(&self) -> PhaseKind { PhaseKind::Packages }
//!
//!     fn scan(&self, ctx: &ScanContext<'_>) -> anyhow::Result<CandidateSet> {
//!         let installed = ["bash", "nginx"];
//!         Ok(CandidateSet::builder(PhaseKind::Packages, ctx.protected)
//!             .extend(installed.into_iter().filter(|p| !ctx.baseline.contains(p)))
//!             .build())
//!     }
//!
//!     fn clean(
//!         &self,
//!         candidates: &CandidateSet,
//!         _ctx: &ScanContext<'_>,
//!     ) -> anyhow::Result<ExecutionOutcome> {
//!         let mut outcome = ExecutionOutcome::new();
//!         for item in candidates.items() {
//!             outcome.record_removed(item.clone());
//!         }
//!         Ok(outcome)
//!     }
//! }
//!
//! let mut orch = Orchestrator::new(
//!     Release::Jammy,
//!     BaselineManifest::from_entries(["bash"]),
//!     Box::new(my_ssh_check),
//! )?;
//! orch.register(Box::new(Packages))?;
//!
//! let report = orch.run(&RunOptions::dry_run(), &mut NoProgress, &mut AutoConfirm);
//! assert_eq!(report.finding(PhaseKind::Packages), Some(&["nginx".to_string()][..]));
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Phase`]: A subsystem's scan and clean
//! - [`FinalPass`]: The catch-all cleanup after ordered phases
//! - [`RemoteAccess`]: Health of the service that keeps the host reachable
//! - [`RemovalPrimitive`]: A list-removal tool driven by [`remove_batched`]
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles the confirmation before execution
//!
//! This allows the crate to be used without hard dependencies on
//! specific package managers, UI frameworks, etc.

pub mod baseline;
pub mod candidate;
pub mod context;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod order;
pub mod phase;
pub mod protected;
pub mod release;
pub mod report;
pub mod types;

// Re-export main types at crate root
pub use baseline::{BaselineManifest, BaselineResolver, BaselineSource};
pub use candidate::{CandidateSet, CandidateSetBuilder};
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback, Stage};
pub use error::{Error, Result, Severity};
pub use executor::{
    BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_PASSES, RemovalPrimitive, remove_batched,
};
pub use orchestrator::Orchestrator;
pub use order::{ExecuteOrder, Precedence, precedences};
pub use phase::{FinalPass, Phase, PhaseKind, PhaseLedger, PhaseState, RemoteAccess, ScanContext};
pub use protected::ProtectedSet;
pub use release::Release;
pub use report::{AlertLevel, ErrorOrigin, ReconciliationReport, ReportEntry, ReportedError};
pub use types::{ExecutionOutcome, ItemError, PassRecord, RunMode, RunOptions};
