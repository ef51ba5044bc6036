//! Command execution seam.
//!
//! Every wrapper in this crate talks to the host through a [`Runner`], so
//! the same code can drive real tools or a scripted fake in tests.

use crate::error::{Error, Result};
use std::fmt;
use std::io::ErrorKind;
use std::process::Command;

/// Captured result of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful invocation with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed invocation with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes host commands.
///
/// Implementations must capture output and never inherit stdio: the
/// terminal belongs to the progress display.
pub trait Runner: Send + Sync + fmt::Debug {
    /// Run `program` with `args` to completion.
    ///
    /// A non-zero exit is not an error here; only failing to spawn is.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Whether `program` can be found.
    fn exists(&self, program: &str) -> bool;
}

/// Runner backed by `std::process::Command`.
///
/// Forces the C locale so stderr classification sees untranslated
/// messages, and keeps apt from prompting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        log::trace!("exec: {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::ToolMissing {
                    tool: program.to_string(),
                },
                _ => Error::Io(e),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Run a command and return stdout, categorizing any failure.
pub fn run_checked(
    runner: &dyn Runner,
    program: &str,
    args: &[&str],
    item: Option<&str>,
) -> Result<String> {
    let output = runner.run(program, args)?;
    if output.success() {
        return Ok(output.stdout);
    }

    let command = format!("{program} {}", args.first().copied().unwrap_or_default());
    let stderr = if output.stderr.trim().is_empty() {
        // some tools report errors on stdout
        output.stdout.as_str()
    } else {
        output.stderr.as_str()
    };
    Err(Error::from_tool_output(command.trim_end(), stderr, item))
}

#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedRunner;

#[cfg(any(test, feature = "testing"))]
mod scripted {
    use super::{CommandOutput, Runner};
    use crate::error::{Error, Result};
    use std::collections::{HashSet, VecDeque};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    #[derive(Debug)]
    struct Rule {
        prefix: String,
        responses: VecDeque<CommandOutput>,
    }

    #[derive(Debug, Default)]
    struct State {
        rules: Vec<Rule>,
        missing: HashSet<String>,
        calls: Vec<String>,
    }

    /// Runner that replays scripted outputs and records every call.
    ///
    /// A call matches the rule with the longest prefix of its full command
    /// line. Each rule replays its responses in order and repeats the last
    /// one. Unmatched calls succeed with empty output.
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        state: Mutex<State>,
    }

    impl ScriptedRunner {
        /// Create an empty script.
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Queue a response for command lines starting with `prefix`.
        pub fn on(&self, prefix: &str, output: CommandOutput) -> &Self {
            let mut state = self.lock();
            if let Some(rule) = state.rules.iter_mut().find(|r| r.prefix == prefix) {
                rule.responses.push_back(output);
            } else {
                state.rules.push(Rule {
                    prefix: prefix.to_string(),
                    responses: VecDeque::from([output]),
                });
            }
            self
        }

        /// Shorthand for a successful response.
        pub fn ok(&self, prefix: &str, stdout: &str) -> &Self {
            self.on(prefix, CommandOutput::ok(stdout))
        }

        /// Shorthand for a failed response.
        pub fn fail(&self, prefix: &str, stderr: &str) -> &Self {
            self.on(prefix, CommandOutput::failed(1, stderr))
        }

        /// Treat `program` as not installed.
        pub fn missing(&self, program: &str) -> &Self {
            self.lock().missing.insert(program.to_string());
            self
        }

        /// Every command line run so far.
        pub fn calls(&self) -> Vec<String> {
            self.lock().calls.clone()
        }

        /// Command lines run so far that start with `prefix`.
        pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
            self.lock()
                .calls
                .iter()
                .filter(|c| c.starts_with(prefix))
                .cloned()
                .collect()
        }
    }

    impl Runner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");

            let mut state = self.lock();
            state.calls.push(line.clone());

            if state.missing.contains(program) {
                return Err(Error::ToolMissing {
                    tool: program.to_string(),
                });
            }

            let rule = state
                .rules
                .iter_mut()
                .filter(|r| line.starts_with(&r.prefix))
                .max_by_key(|r| r.prefix.len());

            let Some(rule) = rule else {
                return Ok(CommandOutput::ok(""));
            };
            let output = if rule.responses.len() > 1 {
                rule.responses.pop_front().unwrap_or_default()
            } else {
                rule.responses.front().cloned().unwrap_or_default()
            };
            Ok(output)
        }

        fn exists(&self, program: &str) -> bool {
            !self.lock().missing.contains(program)
        }
    }
}
