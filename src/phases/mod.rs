//! Concrete reconciliation phases for an Ubuntu host
//!
//! Each phase lists one category of host state, subtracts the baseline, and
//! removes what is left. Phases never talk to the protected set directly:
//! candidate sets are built through [`CandidateSet::builder`], which filters it.

pub mod classify;
mod containers;
mod cron;
mod databases;
mod filesystem;
mod firewall;
mod kernels;
mod language;
mod logs;
mod packages;
mod remote_access;
mod repositories;
mod services;
mod snaps;
mod sweep;

pub use containers::ContainersPhase;
pub use cron::CronPhase;
pub use databases::DatabasesPhase;
pub use filesystem::FilesystemPhase;
pub use firewall::FirewallPhase;
pub use kernels::KernelsPhase;
pub use language::LanguagePhase;
pub use logs::LogsPhase;
pub use packages::PackagesPhase;
pub use remote_access::SshService;
pub use repositories::RepositoriesPhase;
pub use services::ServicesPhase;
pub use snaps::SnapsPhase;
pub use sweep::Sweep;

use crate::host::Host;
use classify::{Site, classify, removal_site, tolerate};
use reconcile::{
    CandidateSet, ExecutionOutcome, Orchestrator, Phase, RemovalPrimitive, Severity,
};

/// One instance of every phase, in scan order.
pub fn standard(host: &Host) -> Vec<Box<dyn Phase + '_>> {
    vec![
        Box::new(RepositoriesPhase::new(host)),
        Box::new(PackagesPhase::new(host)),
        Box::new(SnapsPhase::new(host)),
        Box::new(ServicesPhase::new(host)),
        Box::new(ContainersPhase::new(host)),
        Box::new(DatabasesPhase::new(host)),
        Box::new(CronPhase::new(host)),
        Box::new(FirewallPhase::new(host)),
        Box::new(FilesystemPhase::new(host)),
        Box::new(LanguagePhase::new(host)),
        Box::new(LogsPhase::new(host)),
        Box::new(KernelsPhase::new(host)),
    ]
}

/// Register every phase and the final sweep with `orchestrator`.
pub fn register_all<'a>(orchestrator: &mut Orchestrator<'a>, host: &'a Host) -> reconcile::Result<()> {
    for phase in standard(host) {
        orchestrator.register(phase)?;
    }
    orchestrator.set_final_pass(Box::new(Sweep::new(host)));
    Ok(())
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Adapts a tool's list removal and presence query to the batched executor.
pub(crate) struct ToolRemoval<R, P>
where
    R: Fn(&[String]) -> hostkit::Result<()>,
    P: Fn(&str) -> hostkit::Result<bool>,
{
    remove: R,
    present: P,
}

impl<R, P> ToolRemoval<R, P>
where
    R: Fn(&[String]) -> hostkit::Result<()>,
    P: Fn(&str) -> hostkit::Result<bool>,
{
    pub(crate) fn new(remove: R, present: P) -> Self {
        Self { remove, present }
    }
}

impl<R, P> RemovalPrimitive for ToolRemoval<R, P>
where
    R: Fn(&[String]) -> hostkit::Result<()>,
    P: Fn(&str) -> hostkit::Result<bool>,
{
    fn remove(&self, items: &[String]) -> anyhow::Result<()> {
        Ok(tolerate(removal_site(items), (self.remove)(items))?)
    }

    fn is_present(&self, item: &str) -> anyhow::Result<bool> {
        match (self.present)(item) {
            Ok(present) => Ok(present),
            Err(e) if classify(Site::Presence, &e) == Severity::Ignorable => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Delete every candidate path under the host root.
pub(crate) fn remove_paths(host: &Host, candidates: &CandidateSet) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::new();
    for path in candidates.items() {
        match host.remove(path) {
            Ok(()) => outcome.record_removed(path.as_str()),
            Err(e) => {
                if classify::record(&mut outcome, Site::ItemRemove, path, &e) == Severity::Ignorable
                {
                    outcome.record_removed(path.as_str());
                }
            }
        }
    }
    outcome
}

/// Whether the baseline lists `name` on its own or as `<prefix>:<name>`.
pub(crate) fn in_baseline(baseline: &reconcile::BaselineManifest, prefix: &str, name: &str) -> bool {
    baseline.contains(name) || baseline.contains(&format!("{prefix}:{name}"))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the phase tests.

    use crate::host::Host;
    use hostkit::{ScriptedRunner, Toolbox};
    use reconcile::{BaselineManifest, ProtectedSet, Release, ScanContext};
    use std::path::Path;
    use std::sync::Arc;

    pub(crate) struct Fixture {
        pub runner: Arc<ScriptedRunner>,
        pub host: Host,
        pub baseline: BaselineManifest,
        pub protected: ProtectedSet,
    }

    impl Fixture {
        pub(crate) fn new(root: &Path, baseline: &[&str]) -> Self {
            let runner = Arc::new(ScriptedRunner::new());
            let tools = Toolbox::with_runner(runner.clone()).with_retry(hostkit::RetryConfig::no_retry());
            Self {
                runner,
                host: Host::new(tools, root),
                baseline: BaselineManifest::from_entries(baseline.iter().copied()),
                protected: ProtectedSet::standard(),
            }
        }

        pub(crate) fn with_host(mut self, configure: impl FnOnce(Host) -> Host) -> Self {
            self.host = configure(self.host);
            self
        }

        pub(crate) fn ctx(&self) -> ScanContext<'_> {
            ScanContext {
                release: Release::Jammy,
                baseline: &self.baseline,
                protected: &self.protected,
            }
        }
    }

    /// Write a file under `root`, creating parents.
    pub(crate) fn touch(root: &Path, host_path: &str, content: &str) {
        let path = root.join(host_path.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}
