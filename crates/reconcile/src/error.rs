//! Error types for the reconciliation engine.
//!
//! Only conditions that must abort a run before any scan are represented as
//! [`Error`]. Everything that can go wrong inside a phase is captured in the
//! phase's outcome or the report, classified with a [`Severity`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// How a failed external call affects the run.
///
/// Every external call site picks one of these explicitly; there is no
/// implicit "ignore failure" default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Abort the run before any scan, no partial state change
    Fatal,
    /// A single removal target failed; recorded, run continues
    SoftItem,
    /// A whole phase could not do its work; recorded, other phases unaffected
    SoftPhase,
    /// The failure carries no information worth surfacing (already absent)
    Ignorable,
}

impl Severity {
    /// Whether the condition must stop the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Whether the condition should appear in the report.
    pub fn is_reported(&self) -> bool {
        !matches!(self, Self::Ignorable)
    }
}

/// Fatal, pre-run errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The host runs a release the engine has no baseline constants for
    #[error("unsupported platform release: {0}")]
    UnsupportedRelease(String),

    /// The release could not be read or parsed at all
    #[error("could not determine platform release: {0}")]
    ReleaseUndetectable(String),

    /// Neither the installer snapshot nor the static manifest exists
    #[error(
        "no baseline available: snapshot {} and manifest {} are both missing",
        snapshot.display(),
        manifest.display()
    )]
    BaselineUnavailable {
        /// Installer snapshot location that was tried
        snapshot: PathBuf,
        /// Static manifest location that was tried
        manifest: PathBuf,
    },

    /// A baseline source exists but could not be read
    #[error("failed to read baseline {}: {source}", path.display())]
    BaselineRead {
        /// Path of the unreadable source
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The baseline source parsed to nothing
    #[error("baseline {} contains no identifiers", path.display())]
    BaselineEmpty {
        /// Path of the empty source
        path: PathBuf,
    },

    /// The process lacks the privilege needed to inspect or change the host
    #[error("insufficient privilege: {0}")]
    Privilege(String),

    /// Configuration rejected before the run
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Two phases registered for the same kind
    #[error("phase '{0}' registered twice")]
    DuplicatePhase(String),

    /// The hand-specified execute order violates a declared precedence
    #[error("execute order invalid: {0}")]
    InvalidOrder(String),
}

impl Error {
    /// All engine errors are fatal by construction.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

/// Result type for engine setup.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_reporting() {
        assert!(Severity::Fatal.is_fatal());
        assert!(!Severity::SoftPhase.is_fatal());
        assert!(Severity::SoftItem.is_reported());
        assert!(!Severity::Ignorable.is_reported());
    }

    #[test]
    fn test_baseline_unavailable_message() {
        let err = Error::BaselineUnavailable {
            snapshot: PathBuf::from("/var/lib/pristine/installer.snapshot"),
            manifest: PathBuf::from("/usr/share/pristine/manifests/ubuntu-22.04.manifest"),
        };
        let msg = err.to_string();
        assert!(msg.contains("installer.snapshot"));
        assert!(msg.contains("ubuntu-22.04.manifest"));
        assert_eq!(err.severity(), Severity::Fatal);
    }
}
