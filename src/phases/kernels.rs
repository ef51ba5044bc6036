//! Kernels other than the running one and the newest installed one.

use super::ToolRemoval;
use super::classify::inventory;
use crate::host::Host;
use anyhow::{Result, anyhow};
use regex::Regex;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext, remove_batched};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `linux-<part>-<abi>[-<flavour>]`, capturing the ABI (`6.8.0-45`).
static KERNEL_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^linux-(?:image|image-unsigned|modules|modules-extra|headers|tools|cloud-tools|buildinfo)-(\d+\.\d+\.\d+-\d+)(?:-[a-z0-9]+)*$",
    )
    .expect("kernel package pattern is valid")
});

/// ABI of a versioned kernel package, if it is one.
fn kernel_abi(package: &str) -> Option<&str> {
    KERNEL_PACKAGE
        .captures(package)?
        .get(1)
        .map(|m| m.as_str())
}

/// Whether a package belongs to one specific kernel build.
pub(crate) fn is_versioned_kernel(package: &str) -> bool {
    kernel_abi(package).is_some()
}

/// ABI part of a `uname -r` release (`6.8.0-45-generic` → `6.8.0-45`).
fn release_abi(release: &str) -> Option<String> {
    let mut parts = release.splitn(3, '-');
    let version = parts.next()?;
    let build = parts.next()?;
    (version.split('.').count() == 3 && build.chars().all(|c| c.is_ascii_digit()))
        .then(|| format!("{version}-{build}"))
}

/// Compare ABIs numerically, `6.8.0-100` after `6.8.0-45`.
fn compare_abi(a: &str, b: &str) -> Ordering {
    let numbers = |s: &str| -> Vec<u64> {
        s.split(['.', '-'])
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    };
    numbers(a).cmp(&numbers(b))
}

/// Purges every package of obsolete kernel builds.
#[derive(Debug)]
pub struct KernelsPhase<'a> {
    host: &'a Host,
}

impl<'a> KernelsPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl Phase for KernelsPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Kernels
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let apt = self.host.tools().apt();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        let Some(installed) = inventory(apt.list_installed())? else {
            builder.note("dpkg not available");
            return Ok(builder.build());
        };
        let running = apt.running_kernel()?;
        let running_abi =
            release_abi(&running).ok_or_else(|| anyhow!("unrecognised kernel release {running}"))?;

        let mut by_abi: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut images = Vec::new();
        for package in installed {
            let Some(abi) = kernel_abi(&package).map(str::to_string) else {
                continue;
            };
            if package.starts_with("linux-image-") {
                images.push(abi.clone());
            }
            by_abi.entry(abi).or_default().push(package);
        }

        let newest = images.iter().max_by(|a, b| compare_abi(a, b)).cloned();
        let mut abis: Vec<String> = by_abi.keys().cloned().collect();
        abis.sort_by(|a, b| compare_abi(a, b));

        for abi in abis {
            if abi == running_abi {
                builder.note(format!("keeping {abi}: running kernel"));
                continue;
            }
            if newest.as_deref() == Some(abi.as_str()) {
                builder.note(format!("keeping {abi}: newest installed kernel"));
                continue;
            }
            if let Some(packages) = by_abi.remove(&abi) {
                builder.extend(packages);
            }
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let apt = self.host.tools().apt();
        let removal = ToolRemoval::new(
            |names: &[String]| apt.purge(names),
            |name: &str| apt.is_installed(name),
        );
        Ok(remove_batched(candidates.items(), self.host.batch(), &removal))
    }
}
