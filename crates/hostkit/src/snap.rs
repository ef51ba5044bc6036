//! snapd wrapper.

use crate::command::{Runner, run_checked};
use crate::error::{Error, Result};
use std::sync::Arc;

/// An installed snap as listed by `snap list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapInfo {
    /// Snap name
    pub name: String,
    /// Installed version
    pub version: String,
    /// Notes column (`base`, `core`, `snapd`, `-`)
    pub notes: String,
}

impl SnapInfo {
    /// Whether the snap is a base or the snapd runtime itself.
    pub fn is_runtime(&self) -> bool {
        self.notes
            .split(',')
            .any(|n| matches!(n.trim(), "base" | "core" | "snapd"))
    }
}

/// Snap operations via the `snap` CLI.
#[derive(Debug, Clone)]
pub struct Snap {
    runner: Arc<dyn Runner>,
}

impl Snap {
    /// Create a wrapper.
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// Whether snapd is installed at all.
    pub fn is_available(&self) -> bool {
        self.runner.exists("snap")
    }

    /// Installed snaps.
    pub fn list(&self) -> Result<Vec<SnapInfo>> {
        let output = self.runner.run("snap", &["list"])?;
        if output.success() {
            return Ok(parse_list(&output.stdout));
        }
        if output.stderr.contains("No snaps are installed") {
            return Ok(Vec::new());
        }
        Err(Error::from_tool_output("snap list", &output.stderr, None))
    }

    /// Whether a snap is installed.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        let output = self.runner.run("snap", &["list", name])?;
        Ok(output.success())
    }

    /// Remove snaps without keeping a snapshot.
    pub fn remove(&self, names: &[String]) -> Result<()> {
        let mut args = vec!["remove", "--purge"];
        args.extend(names.iter().map(String::as_str));
        let item = match names {
            [one] => Some(one.as_str()),
            _ => None,
        };
        run_checked(self.runner.as_ref(), "snap", &args, item).map(|_| ())
    }
}

/// Parse the table printed by `snap list`.
fn parse_list(stdout: &str) -> Vec<SnapInfo> {
    stdout
        .lines()
        .skip_while(|line| !line.starts_with("Name"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let name = (*cols.first()?).to_string();
            Some(SnapInfo {
                name,
                version: cols.get(1).copied().unwrap_or_default().to_string(),
                notes: cols.last().copied().unwrap_or("-").to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ScriptedRunner;

    const LIST: &str = "\
Name    Version        Rev    Tracking       Publisher   Notes
core22  20240408       1380   latest/stable  canonical** base
lxd     5.21.1         28460  5.21/stable    canonical** -
snapd   2.63           21759  latest/stable  canonical** snapd
";

    #[test]
    fn test_list_parses_table() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("snap list", LIST);
        let snaps = Snap::new(runner).list().unwrap();
        let names: Vec<&str> = snaps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["core22", "lxd", "snapd"]);
        assert!(snaps[0].is_runtime());
        assert!(!snaps[1].is_runtime());
        assert!(snaps[2].is_runtime());
    }

    #[test]
    fn test_list_empty() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail("snap list", "No snaps are installed yet.");
        assert!(Snap::new(runner).list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_purges_all_names() {
        let runner = Arc::new(ScriptedRunner::new());
        Snap::new(runner.clone())
            .remove(&["lxd".to_string(), "microk8s".to_string()])
            .unwrap();
        assert_eq!(runner.calls(), vec!["snap remove --purge lxd microk8s"]);
    }

    #[test]
    fn test_is_installed() {
        let runner = Arc::new(ScriptedRunner::new());
        runner
            .ok("snap list lxd", LIST)
            .fail("snap list gone", "error: no matching snaps installed");
        let snap = Snap::new(runner);
        assert!(snap.is_installed("lxd").unwrap());
        assert!(!snap.is_installed("gone").unwrap());
    }
}
