//! apt / dpkg wrapper.

use crate::command::{Runner, run_checked};
use crate::error::{Error, Result};
use crate::retry::{RetryConfig, with_retry};
use std::sync::Arc;

/// Debian package operations via `apt-get`, `apt-mark` and `dpkg-query`.
#[derive(Debug, Clone)]
pub struct Apt {
    runner: Arc<dyn Runner>,
    retry: RetryConfig,
}

impl Apt {
    /// Create a wrapper with the default lock-wait policy.
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self {
            runner,
            retry: RetryConfig::default(),
        }
    }

    /// Override the lock-wait policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Packages marked as manually installed.
    pub fn list_manual(&self) -> Result<Vec<String>> {
        let stdout = run_checked(self.runner.as_ref(), "apt-mark", &["showmanual"], None)?;
        Ok(non_empty_lines(&stdout))
    }

    /// Every package dpkg considers installed.
    pub fn list_installed(&self) -> Result<Vec<String>> {
        let stdout = run_checked(
            self.runner.as_ref(),
            "dpkg-query",
            &["-W", "-f=${Package}\t${db:Status-Status}\n"],
            None,
        )?;
        Ok(parse_status_lines(&stdout))
    }

    /// Whether a package is installed (config-files only counts as absent).
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        let output = self
            .runner
            .run("dpkg-query", &["-W", "-f=${db:Status-Status}", name])?;
        if !output.success() {
            // dpkg-query exits 1 for unknown packages
            return Ok(false);
        }
        Ok(output.stdout.trim() == "installed")
    }

    /// Purge packages with their configuration.
    pub fn purge(&self, names: &[String]) -> Result<()> {
        let mut args = vec!["-y", "purge", "--"];
        args.extend(names.iter().map(String::as_str));
        self.apt_get(&args, single(names))
    }

    /// Simulate a purge and return every package it would remove.
    pub fn simulate_purge(&self, names: &[String]) -> Result<Vec<String>> {
        let mut args = vec!["-s", "purge", "--"];
        args.extend(names.iter().map(String::as_str));
        let stdout = run_checked(self.runner.as_ref(), "apt-get", &args, single(names))?;
        Ok(parse_simulation(&stdout))
    }

    /// Install packages.
    pub fn install(&self, names: &[String]) -> Result<()> {
        let mut args = vec!["-y", "install", "--"];
        args.extend(names.iter().map(String::as_str));
        self.apt_get(&args, single(names))
    }

    /// Mark packages as manually installed so autoremove keeps them.
    pub fn mark_manual(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["manual", "--"];
        args.extend(names.iter().map(String::as_str));
        with_retry(&self.retry, || {
            run_checked(self.runner.as_ref(), "apt-mark", &args, single(names)).map(|_| ())
        })
    }

    /// Remove orphaned dependencies, returning what was removed.
    pub fn autoremove(&self) -> Result<Vec<String>> {
        let stdout = with_retry(&self.retry, || {
            run_checked(
                self.runner.as_ref(),
                "apt-get",
                &["-y", "autoremove", "--purge"],
                None,
            )
        })?;
        Ok(parse_removing(&stdout))
    }

    /// Clear the package cache.
    pub fn clean(&self) -> Result<()> {
        self.apt_get(&["clean"], None)
    }

    /// Refresh package lists.
    pub fn update(&self) -> Result<()> {
        self.apt_get(&["update"], None)
    }

    /// Package owning a path, if any.
    pub fn owner_of(&self, path: &str) -> Result<Option<String>> {
        let output = self.runner.run("dpkg-query", &["-S", path])?;
        if !output.success() {
            return Ok(None);
        }
        Ok(parse_owner(&output.stdout, path))
    }

    /// Release string of the running kernel (`uname -r`).
    pub fn running_kernel(&self) -> Result<String> {
        let stdout = run_checked(self.runner.as_ref(), "uname", &["-r"], None)?;
        let release = stdout.trim();
        if release.is_empty() {
            return Err(Error::Parse {
                command: "uname -r".into(),
                message: "empty output".into(),
            });
        }
        Ok(release.to_string())
    }

    fn apt_get(&self, args: &[&str], item: Option<&str>) -> Result<()> {
        with_retry(&self.retry, || {
            run_checked(self.runner.as_ref(), "apt-get", args, item).map(|_| ())
        })
    }
}

fn single(names: &[String]) -> Option<&str> {
    match names {
        [one] => Some(one.as_str()),
        _ => None,
    }
}

fn non_empty_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `name<TAB>status` lines, keeping installed packages.
fn parse_status_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(_, status)| status.trim() == "installed")
        .map(|(name, _)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse `Purg`/`Remv` lines of `apt-get -s` output.
fn parse_simulation(stdout: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.split_whitespace();
        let (Some(action), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        if matches!(action, "Purg" | "Remv") && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Parse `Removing name (version) ...` lines of a real removal.
fn parse_removing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Removing "))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Parse `pkg1, pkg2: /path` lines of `dpkg-query -S`.
fn parse_owner(stdout: &str, path: &str) -> Option<String> {
    stdout
        .lines()
        .filter(|line| !line.starts_with("diversion by"))
        .filter_map(|line| line.rsplit_once(": "))
        .find(|(_, owned)| owned.trim() == path)
        .and_then(|(owners, _)| owners.split(',').next())
        .map(|owner| {
            // strip the architecture qualifier
            owner.trim().split(':').next().unwrap_or_default().to_string()
        })
        .filter(|owner| !owner.is_empty())
}
