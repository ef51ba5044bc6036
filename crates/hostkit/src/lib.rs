//! # hostkit
//!
//! Pure Rust wrappers over the host tools of an Ubuntu server.
//!
//! This crate provides functionality for:
//! - Querying and removing Debian packages, snaps, service units,
//!   container objects, firewall rules and ecosystem packages
//! - Categorizing tool failures from their stderr
//! - Waiting out package database locks with backoff
//!
//! Every wrapper runs through a [`Runner`], so tests can script tool
//! output instead of touching a real host.
//!
//! ## Example
//!
//! ```no_run
//! use hostkit::Toolbox;
//!
//! let tools = Toolbox::system();
//!
//! for name in tools.apt().list_manual().expect("apt-mark failed") {
//!     println!("manual: {name}");
//! }
//!
//! if tools.systemd().is_active("ssh.service").unwrap_or(false) {
//!     println!("ssh is up");
//! }
//! ```
//!
//! ## Retry Logic
//!
//! apt operations that hit the dpkg lock are retried with exponential
//! backoff. Configure the policy with [`RetryConfig`].
//!
//! ```no_run
//! use hostkit::{RetryConfig, Toolbox};
//! use std::time::Duration;
//!
//! let tools = Toolbox::system().with_retry(RetryConfig::new(6, Duration::from_secs(10), 2.0));
//! tools.apt().update().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apt;
pub mod command;
pub mod docker;
pub mod error;
pub mod lang;
pub mod retry;
pub mod snap;
pub mod systemd;
pub mod ufw;

pub use apt::Apt;
#[cfg(any(test, feature = "testing"))]
pub use command::ScriptedRunner;
pub use command::{CommandOutput, Runner, SystemRunner};
pub use docker::Docker;
pub use error::{Error, ErrorCategory, Result};
pub use lang::{LangKind, LangManager};
pub use retry::RetryConfig;
pub use snap::{Snap, SnapInfo};
pub use systemd::{Systemd, UnitFile};
pub use ufw::Ufw;

use std::sync::Arc;

/// Entry point handing out tool wrappers that share one runner.
#[derive(Debug, Clone)]
pub struct Toolbox {
    runner: Arc<dyn Runner>,
    retry: RetryConfig,
}

impl Toolbox {
    /// Create a toolbox that runs real commands.
    pub fn system() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    /// Create a toolbox with a custom runner (useful for testing).
    pub fn with_runner(runner: Arc<dyn Runner>) -> Self {
        Self {
            runner,
            retry: RetryConfig::default(),
        }
    }

    /// Override the lock-wait policy used by apt operations.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The shared runner.
    pub fn runner(&self) -> Arc<dyn Runner> {
        Arc::clone(&self.runner)
    }

    /// Whether a program is installed.
    pub fn has(&self, program: &str) -> bool {
        self.runner.exists(program)
    }

    // =========================================================================
    // Wrappers
    // =========================================================================

    /// apt / dpkg.
    pub fn apt(&self) -> Apt {
        Apt::new(self.runner()).with_retry(self.retry)
    }

    /// snapd.
    pub fn snap(&self) -> Snap {
        Snap::new(self.runner())
    }

    /// systemd.
    pub fn systemd(&self) -> Systemd {
        Systemd::new(self.runner())
    }

    /// Docker engine.
    pub fn docker(&self) -> Docker {
        Docker::new(self.runner())
    }

    /// Uncomplicated Firewall.
    pub fn ufw(&self) -> Ufw {
        Ufw::new(self.runner())
    }

    /// An ecosystem package manager.
    pub fn lang(&self, kind: LangKind) -> LangManager {
        LangManager::new(kind, self.runner())
    }
}
