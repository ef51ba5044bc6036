//! Configuration for pristine
//!
//! Read from `/etc/pristine/config.toml`, or from the file given by
//! `--config` / `PRISTINE_CONFIG`. A missing default file means defaults.
//!
//! ```toml
//! [run]
//! skip = ["logs"]
//!
//! [executor]
//! batch_size = 20
//! max_passes = 5
//!
//! [baseline]
//! snapshot = "/var/lib/pristine/installer.snapshot"
//! manifest_dir = "/usr/share/pristine/manifests"
//!
//! [filesystem]
//! roots = ["/opt", "/srv", "/var/www", "/usr/local"]
//! keep = ["/opt/monitoring-agent"]
//! ```

use anyhow::{Context, Result};
use reconcile::{BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_PASSES, PhaseKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Config file used when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pristine/config.toml";

/// Installer-time snapshot written by `pristine baseline --capture`.
pub const DEFAULT_SNAPSHOT: &str = "/var/lib/pristine/installer.snapshot";

/// Where the per-release manifests are installed.
pub const DEFAULT_MANIFEST_DIR: &str = "/usr/share/pristine/manifests";

/// Application trees the filesystem phase empties.
pub const DEFAULT_FILESYSTEM_ROOTS: &[&str] = &["/opt", "/srv", "/var/www", "/usr/local"];

// ============================================================================
// Schema
// ============================================================================

/// The pristine configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Run-wide settings
    pub run: RunConfig,

    /// Batched executor limits
    pub executor: ExecutorConfig,

    /// Baseline sources
    pub baseline: BaselineConfig,

    /// Filesystem phase scope
    pub filesystem: FilesystemConfig,
}

/// `[run]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Phase labels to skip on every run
    pub skip: Vec<String>,

    /// Host root the filesystem phases operate under
    pub root: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            root: "/".to_string(),
        }
    }
}

/// `[executor]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Items submitted per removal call
    pub batch_size: usize,

    /// Maximum sweeps over failed items
    pub max_passes: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// `[baseline]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineConfig {
    /// Installer-time snapshot, preferred when present
    pub snapshot: String,

    /// Directory of `ubuntu-<version>.manifest` files
    pub manifest_dir: String,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            snapshot: DEFAULT_SNAPSHOT.to_string(),
            manifest_dir: DEFAULT_MANIFEST_DIR.to_string(),
        }
    }
}

/// `[filesystem]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesystemConfig {
    /// Directories whose contents are removed
    pub roots: Vec<String>,

    /// Absolute paths inside the roots to leave alone
    pub keep: Vec<String>,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            roots: DEFAULT_FILESYSTEM_ROOTS.iter().map(ToString::to_string).collect(),
            keep: Vec::new(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load and validate the configuration.
    ///
    /// An explicitly named file must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (expand_path(&p.to_string_lossy()), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format in pristine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.batch().validate()?;

        for label in &self.run.skip {
            parse_phase(label)?;
        }

        if self.run.root.is_empty() {
            anyhow::bail!("run.root cannot be empty");
        }
        if self.baseline.manifest_dir.is_empty() {
            anyhow::bail!("baseline.manifest_dir cannot be empty");
        }

        for root in &self.filesystem.roots {
            if !root.starts_with('/') {
                anyhow::bail!("filesystem root must be absolute: {root}");
            }
            if root == "/" {
                anyhow::bail!("filesystem root cannot be / itself");
            }
        }
        for keep in &self.filesystem.keep {
            if !keep.starts_with('/') {
                anyhow::bail!("filesystem keep path must be absolute: {keep}");
            }
        }

        Ok(())
    }

    /// Phases to skip: config skips merged with `extra` (CLI) labels.
    pub fn skipped_phases(&self, extra: &[String]) -> Result<BTreeSet<PhaseKind>> {
        self.run
            .skip
            .iter()
            .chain(extra)
            .map(String::as_str)
            .map(parse_phase)
            .collect()
    }

    /// Executor limits.
    pub fn batch(&self) -> BatchConfig {
        BatchConfig::new(self.executor.batch_size, self.executor.max_passes)
    }

    /// Expanded snapshot path.
    pub fn snapshot_path(&self) -> PathBuf {
        expand_path(&self.baseline.snapshot)
    }

    /// Expanded manifest directory.
    pub fn manifest_dir(&self) -> PathBuf {
        expand_path(&self.baseline.manifest_dir)
    }

    /// Expanded host root.
    pub fn root(&self) -> PathBuf {
        expand_path(&self.run.root)
    }
}

fn parse_phase(label: &str) -> Result<PhaseKind> {
    label
        .parse::<PhaseKind>()
        .map_err(|e| reconcile::Error::Config(e).into())
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.executor.batch_size, 20);
        assert_eq!(config.executor.max_passes, 5);
        assert_eq!(config.root(), PathBuf::from("/"));
        assert_eq!(config.filesystem.roots.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [run]
            skip = ["logs", "kernels"]

            [executor]
            batch_size = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.executor.batch_size, 5);
        assert_eq!(config.executor.max_passes, 5);
        let skipped = config.skipped_phases(&["firewall".into()]).unwrap();
        assert_eq!(
            skipped.into_iter().collect::<Vec<_>>(),
            vec![PhaseKind::Firewall, PhaseKind::Logs, PhaseKind::Kernels]
        );
    }

    #[test]
    fn test_rejects_zero_limits() {
        let err = Config::parse("[executor]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
        assert!(Config::parse("[executor]\nmax_passes = 0\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_phase_label() {
        let err = Config::parse("[run]\nskip = [\"docker\"]\n").unwrap_err();
        assert!(err.to_string().contains("docker"));
    }

    #[test]
    fn test_rejects_unknown_cli_skip() {
        let config = Config::default();
        assert!(config.skipped_phases(&["nope".into()]).is_err());
    }

    #[test]
    fn test_rejects_relative_and_root_filesystem_roots() {
        assert!(Config::parse("[filesystem]\nroots = [\"opt\"]\n").is_err());
        assert!(Config::parse("[filesystem]\nroots = [\"/\"]\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(Config::parse("[executor]\nbatch = 3\n").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[baseline]\nsnapshot = \"/tmp/snap\"\n\n[filesystem]\nkeep = [\"/opt/agent\"]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.snapshot_path(), PathBuf::from("/tmp/snap"));
        assert_eq!(config.manifest_dir(), PathBuf::from(DEFAULT_MANIFEST_DIR));
        assert_eq!(config.filesystem.keep, vec!["/opt/agent"]);
    }
}
