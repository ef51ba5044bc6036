//! Uncomplicated Firewall wrapper.

use crate::command::{Runner, run_checked};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Firewall rule operations via the `ufw` CLI.
#[derive(Debug, Clone)]
pub struct Ufw {
    runner: Arc<dyn Runner>,
}

impl Ufw {
    /// Create a wrapper.
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// Whether ufw is installed.
    pub fn is_available(&self) -> bool {
        self.runner.exists("ufw")
    }

    /// User-added rule specs, e.g. `allow 80/tcp`, in the order ufw lists them.
    pub fn added_rules(&self) -> Result<Vec<String>> {
        let stdout = run_checked(self.runner.as_ref(), "ufw", &["show", "added"], None)?;
        Ok(parse_added(&stdout))
    }

    /// Delete a rule by its spec. Quoted words (comments, app profiles with
    /// spaces) stay one argument.
    pub fn delete_rule(&self, spec: &str) -> Result<()> {
        let words = shell_words::split(spec).map_err(|e| Error::Parse {
            command: "ufw delete".to_string(),
            message: format!("{spec}: {e}"),
        })?;
        let mut args = vec!["--force", "delete"];
        args.extend(words.iter().map(String::as_str));
        run_checked(self.runner.as_ref(), "ufw", &args, Some(spec)).map(|_| ())
    }
}

/// Parse `ufw show added` output into rule specs without the `ufw ` prefix.
fn parse_added(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ufw "))
        .map(|spec| spec.trim().to_string())
        .collect()
}
