//! Language ecosystem package managers: pip, npm and gem.

use crate::command::{Runner, run_checked};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Supported ecosystem managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LangKind {
    /// Python packages installed with pip outside dpkg
    Pip,
    /// Global npm packages
    Npm,
    /// Ruby gems
    Gem,
}

impl LangKind {
    /// Every manager, in removal order.
    pub const ALL: [LangKind; 3] = [LangKind::Pip, LangKind::Npm, LangKind::Gem];

    /// Program invoked for this manager.
    pub fn program(&self) -> &'static str {
        match self {
            Self::Pip => "pip3",
            Self::Npm => "npm",
            Self::Gem => "gem",
        }
    }
}

impl fmt::Display for LangKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pip => "pip",
            Self::Npm => "npm",
            Self::Gem => "gem",
        })
    }
}

#[derive(Deserialize)]
struct PipEntry {
    name: String,
}

#[derive(Deserialize)]
struct NpmTree {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

/// One ecosystem manager bound to a runner.
#[derive(Debug, Clone)]
pub struct LangManager {
    kind: LangKind,
    runner: Arc<dyn Runner>,
    pip_path: Option<String>,
    break_system_packages: bool,
}

impl LangManager {
    /// Create a manager.
    pub fn new(kind: LangKind, runner: Arc<dyn Runner>) -> Self {
        Self {
            kind,
            runner,
            pip_path: None,
            break_system_packages: false,
        }
    }

    /// Restrict pip listings to one site directory.
    pub fn with_pip_path(mut self, path: impl Into<String>) -> Self {
        self.pip_path = Some(path.into());
        self
    }

    /// Pass `--break-system-packages` to pip (externally managed interpreters).
    pub fn with_break_system_packages(mut self, enabled: bool) -> Self {
        self.break_system_packages = enabled;
        self
    }

    /// Which manager this is.
    pub fn kind(&self) -> LangKind {
        self.kind
    }

    /// Whether the manager's program is installed.
    pub fn is_available(&self) -> bool {
        self.runner.exists(self.kind.program())
    }

    /// Installed package names.
    pub fn list(&self) -> Result<Vec<String>> {
        let program = self.kind.program();
        match self.kind {
            LangKind::Pip => {
                let mut args = vec!["list", "--format=json"];
                if let Some(path) = &self.pip_path {
                    args.extend(["--path", path.as_str()]);
                }
                let stdout = run_checked(self.runner.as_ref(), program, &args, None)?;
                parse_pip(&stdout)
            }
            LangKind::Npm => {
                // npm exits non-zero on extraneous or invalid trees but still prints JSON
                let output = self
                    .runner
                    .run(program, &["ls", "-g", "--depth=0", "--json"])?;
                if output.stdout.trim().is_empty() {
                    return Err(Error::from_tool_output("npm ls", &output.stderr, None));
                }
                parse_npm(&output.stdout)
            }
            LangKind::Gem => {
                let stdout = run_checked(
                    self.runner.as_ref(),
                    program,
                    &["list", "--no-versions"],
                    None,
                )?;
                Ok(parse_gem(&stdout))
            }
        }
    }

    /// Whether a package is still installed.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|n| n == name))
    }

    /// Uninstall packages.
    pub fn uninstall(&self, names: &[String]) -> Result<()> {
        let mut args: Vec<&str> = match self.kind {
            LangKind::Pip if self.break_system_packages => {
                vec!["uninstall", "-y", "--break-system-packages"]
            }
            LangKind::Pip => vec!["uninstall", "-y"],
            LangKind::Npm => vec!["uninstall", "-g"],
            LangKind::Gem => vec!["uninstall", "-a", "-x", "-I"],
        };
        args.extend(names.iter().map(String::as_str));
        let item = match names {
            [one] => Some(one.as_str()),
            _ => None,
        };
        run_checked(self.runner.as_ref(), self.kind.program(), &args, item).map(|_| ())
    }
}

fn parse_pip(stdout: &str) -> Result<Vec<String>> {
    let entries: Vec<PipEntry> = serde_json::from_str(stdout.trim())?;
    Ok(entries.into_iter().map(|e| e.name).collect())
}

fn parse_npm(stdout: &str) -> Result<Vec<String>> {
    let tree: NpmTree = serde_json::from_str(stdout.trim())?;
    Ok(tree.dependencies.into_keys().collect())
}

fn parse_gem(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("***"))
        .map(|l| l.split_whitespace().next().unwrap_or_default().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, ScriptedRunner};

    #[test]
    fn test_pip_list_with_path() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok(
            "pip3 list --format=json --path /usr/local/lib/python3.12/dist-packages",
            r#"[{"name": "requests", "version": "2.31.0"}, {"name": "pip", "version": "24.0"}]"#,
        );
        let pip = LangManager::new(LangKind::Pip, runner)
            .with_pip_path("/usr/local/lib/python3.12/dist-packages");
        assert_eq!(pip.list().unwrap(), vec!["requests", "pip"]);
    }

    #[test]
    fn test_npm_list_tolerates_nonzero_exit() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on(
            "npm ls -g",
            CommandOutput {
                code: Some(1),
                stdout: r#"{"dependencies": {"npm": {"version": "10.2.4"}, "pm2": {"version": "5.3.1"}}}"#
                    .into(),
                stderr: "npm ERR! extraneous".into(),
            },
        );
        let npm = LangManager::new(LangKind::Npm, runner);
        assert_eq!(npm.list().unwrap(), vec!["npm", "pm2"]);
    }

    #[test]
    fn test_npm_empty_tree() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("npm ls -g", "{}");
        assert!(LangManager::new(LangKind::Npm, runner).list().unwrap().is_empty());
    }

    #[test]
    fn test_gem_list() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("gem list", "\n*** LOCAL GEMS ***\n\nbundler\nrails\nrake\n");
        let gem = LangManager::new(LangKind::Gem, runner);
        assert_eq!(gem.list().unwrap(), vec!["bundler", "rails", "rake"]);
        assert!(gem.is_installed("rails").unwrap());
    }

    #[test]
    fn test_pip_uninstall_flags() {
        let runner = Arc::new(ScriptedRunner::new());
        LangManager::new(LangKind::Pip, runner.clone())
            .with_break_system_packages(true)
            .uninstall(&["requests".into()])
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec!["pip3 uninstall -y --break-system-packages requests"]
        );
    }

    #[test]
    fn test_gem_uninstall_flags() {
        let runner = Arc::new(ScriptedRunner::new());
        LangManager::new(LangKind::Gem, runner.clone())
            .uninstall(&["rails".into(), "puma".into()])
            .unwrap();
        assert_eq!(runner.calls(), vec!["gem uninstall -a -x -I rails puma"]);
    }
}
