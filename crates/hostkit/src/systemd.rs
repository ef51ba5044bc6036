//! systemd wrapper.

use crate::command::{Runner, run_checked};
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// A service unit file known to systemd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFile {
    /// Unit name, e.g. `nginx.service`
    pub name: String,
    /// Enablement state (`enabled`, `disabled`, `static`, `masked`, ...)
    pub state: String,
}

impl UnitFile {
    /// Whether this is a template (`foo@.service`).
    pub fn is_template(&self) -> bool {
        self.name.contains("@.")
    }
}

/// Service manager operations via `systemctl` and `journalctl`.
#[derive(Debug, Clone)]
pub struct Systemd {
    runner: Arc<dyn Runner>,
}

impl Systemd {
    /// Create a wrapper.
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// Every service unit file.
    pub fn list_service_units(&self) -> Result<Vec<UnitFile>> {
        let stdout = run_checked(
            self.runner.as_ref(),
            "systemctl",
            &[
                "list-unit-files",
                "--type=service",
                "--no-legend",
                "--no-pager",
            ],
            None,
        )?;
        Ok(parse_unit_files(&stdout))
    }

    /// Path of the file defining a unit, if it has one.
    pub fn fragment_path(&self, unit: &str) -> Result<Option<PathBuf>> {
        let stdout = run_checked(
            self.runner.as_ref(),
            "systemctl",
            &["show", "-p", "FragmentPath", "--value", unit],
            Some(unit),
        )?;
        let path = stdout.trim();
        Ok((!path.is_empty()).then(|| PathBuf::from(path)))
    }

    /// Whether a unit is active. Inactive, failed and unknown are all `false`.
    pub fn is_active(&self, unit: &str) -> Result<bool> {
        let output = self.runner.run("systemctl", &["is-active", unit])?;
        Ok(output.success() && output.stdout.trim() == "active")
    }

    /// Stop a unit.
    pub fn stop(&self, unit: &str) -> Result<()> {
        self.systemctl(&["stop", unit], unit)
    }

    /// Disable a unit.
    pub fn disable(&self, unit: &str) -> Result<()> {
        self.systemctl(&["disable", unit], unit)
    }

    /// Restart a unit.
    pub fn restart(&self, unit: &str) -> Result<()> {
        self.systemctl(&["restart", unit], unit)
    }

    /// Reload unit files and forget failed units.
    pub fn daemon_reload(&self) -> Result<()> {
        run_checked(self.runner.as_ref(), "systemctl", &["daemon-reload"], None)?;
        run_checked(self.runner.as_ref(), "systemctl", &["reset-failed"], None).map(|_| ())
    }

    /// Rotate the journal and drop every archived file.
    pub fn vacuum_journal(&self) -> Result<()> {
        run_checked(self.runner.as_ref(), "journalctl", &["--rotate"], None)?;
        run_checked(self.runner.as_ref(), "journalctl", &["--vacuum-time=1s"], None).map(|_| ())
    }

    fn systemctl(&self, args: &[&str], unit: &str) -> Result<()> {
        run_checked(self.runner.as_ref(), "systemctl", args, Some(unit)).map(|_| ())
    }
}

/// Parse `name state [preset]` lines of `systemctl list-unit-files`.
fn parse_unit_files(stdout: &str) -> Vec<UnitFile> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let name = cols.next()?;
            let state = cols.next()?;
            name.ends_with(".service").then(|| UnitFile {
                name: name.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ScriptedRunner};

    #[test]
    fn test_list_service_units() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok(
            "systemctl list-unit-files",
            "cron.service enabled enabled\n\
             getty@.service enabled enabled\n\
             nginx.service enabled enabled\n\
             ssh.socket disabled enabled\n",
        );
        let units = Systemd::new(runner).list_service_units().unwrap();
        assert_eq!(units.len(), 3);
        assert!(units[1].is_template());
        assert_eq!(units[2].name, "nginx.service");
    }

    #[test]
    fn test_fragment_path() {
        let runner = Arc::new(ScriptedRunner::new());
        runner
            .ok(
                "systemctl show -p FragmentPath --value app.service",
                "/etc/systemd/system/app.service\n",
            )
            .ok("systemctl show -p FragmentPath --value ghost.service", "\n");
        let systemd = Systemd::new(runner);
        assert_eq!(
            systemd.fragment_path("app.service").unwrap(),
            Some(PathBuf::from("/etc/systemd/system/app.service"))
        );
        assert_eq!(systemd.fragment_path("ghost.service").unwrap(), None);
    }

    #[test]
    fn test_is_active_treats_nonzero_as_inactive() {
        let runner = Arc::new(ScriptedRunner::new());
        runner
            .ok("systemctl is-active ssh.service", "active\n")
            .on(
                "systemctl is-active nginx.service",
                CommandOutput {
                    code: Some(3),
                    stdout: "inactive\n".into(),
                    stderr: String::new(),
                },
            );
        let systemd = Systemd::new(runner);
        assert!(systemd.is_active("ssh.service").unwrap());
        assert!(!systemd.is_active("nginx.service").unwrap());
    }

    #[test]
    fn test_stop_unknown_unit_is_ignorable() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail(
            "systemctl stop",
            "Failed to stop gone.service: Unit gone.service not loaded.",
        );
        let err = Systemd::new(runner).stop("gone.service").unwrap_err();
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_vacuum_journal() {
        let runner = Arc::new(ScriptedRunner::new());
        Systemd::new(runner.clone()).vacuum_journal().unwrap();
        assert_eq!(
            runner.calls(),
            vec!["journalctl --rotate", "journalctl --vacuum-time=1s"]
        );
    }
}
