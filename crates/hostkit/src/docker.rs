//! Docker engine wrapper.

use crate::command::{Runner, run_checked};
use crate::error::Result;
use std::sync::Arc;

/// Networks every engine creates on its own.
pub const BUILTIN_NETWORKS: [&str; 3] = ["bridge", "host", "none"];

/// Container runtime operations via the `docker` CLI.
#[derive(Debug, Clone)]
pub struct Docker {
    runner: Arc<dyn Runner>,
}

impl Docker {
    /// Create a wrapper.
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// Whether the docker CLI is installed.
    pub fn is_available(&self) -> bool {
        self.runner.exists("docker")
    }

    /// IDs of every container, running or not.
    pub fn containers(&self) -> Result<Vec<String>> {
        self.ids(&["ps", "-aq", "--no-trunc"])
    }

    /// IDs of every image.
    pub fn images(&self) -> Result<Vec<String>> {
        let mut ids = self.ids(&["images", "-aq", "--no-trunc"])?;
        // tagged images appear once per tag
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        Ok(ids)
    }

    /// Names of every volume.
    pub fn volumes(&self) -> Result<Vec<String>> {
        self.ids(&["volume", "ls", "-q"])
    }

    /// Names of user-defined networks.
    pub fn networks(&self) -> Result<Vec<String>> {
        let mut names = self.ids(&["network", "ls", "--format", "{{.Name}}"])?;
        names.retain(|n| !BUILTIN_NETWORKS.contains(&n.as_str()));
        Ok(names)
    }

    /// Force-remove containers with their anonymous volumes.
    pub fn remove_containers(&self, ids: &[String]) -> Result<()> {
        self.remove(&["rm", "-f", "-v"], ids)
    }

    /// Force-remove images.
    pub fn remove_images(&self, ids: &[String]) -> Result<()> {
        self.remove(&["rmi", "-f"], ids)
    }

    /// Remove volumes.
    pub fn remove_volumes(&self, names: &[String]) -> Result<()> {
        self.remove(&["volume", "rm", "-f"], names)
    }

    /// Remove networks.
    pub fn remove_networks(&self, names: &[String]) -> Result<()> {
        self.remove(&["network", "rm"], names)
    }

    fn ids(&self, args: &[&str]) -> Result<Vec<String>> {
        let stdout = run_checked(self.runner.as_ref(), "docker", args, None)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn remove(&self, command: &[&str], targets: &[String]) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }
        let mut args = command.to_vec();
        args.extend(targets.iter().map(String::as_str));
        let item = match targets {
            [one] => Some(one.as_str()),
            _ => None,
        };
        run_checked(self.runner.as_ref(), "docker", &args, item).map(|_| ())
    }
}
