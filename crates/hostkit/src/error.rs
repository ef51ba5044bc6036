//! Error types for host tool operations.
//!
//! Errors are categorized from the tool's stderr so callers can decide,
//! per call site, whether a failure is fatal, soft, or ignorable. Each
//! variant keeps enough context to explain what went wrong.

use thiserror::Error;

/// Categories of tool errors for classification and retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The tool itself is not installed
    ToolMissing,
    /// The tool does not know the item at all
    NotFound,
    /// The item was already removed
    AlreadyAbsent,
    /// Permission denied (not running as root)
    Permission,
    /// Another process holds the package database lock
    Locked,
    /// A held package blocks the operation
    Held,
    /// Dependency or in-use conflict
    Conflict,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Whether this error can be safely ignored (operation already done).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyAbsent)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ToolMissing => "Tool not installed",
            Self::NotFound => "Item not found",
            Self::AlreadyAbsent => "Already removed",
            Self::Permission => "Permission denied",
            Self::Locked => "Package database locked",
            Self::Held => "Held package",
            Self::Conflict => "Dependency conflict",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::ToolMissing => "Nothing to reconcile for this subsystem",
            Self::NotFound => "Verify the identifier is still known to the tool",
            Self::AlreadyAbsent => "No action needed - item is already gone",
            Self::Permission => "Run as root",
            Self::Locked => "Wait for unattended-upgrades or other apt processes to finish",
            Self::Held => "Release the hold with `apt-mark unhold` and retry",
            Self::Conflict => "Remove the dependent items first",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while running host tools.
#[derive(Debug, Error)]
pub enum Error {
    /// The tool is not installed or not in PATH
    #[error("{tool} not found in PATH")]
    ToolMissing {
        /// Program name
        tool: String,
    },

    /// The tool does not know the item
    #[error("not found: {name}")]
    NotFound {
        /// Identifier the tool rejected
        name: String,
    },

    /// The item is already absent
    #[error("already absent: {name}")]
    AlreadyAbsent {
        /// Identifier that was already gone
        name: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// Package database lock is held by another process
    #[error("package database locked: {message}")]
    Locked {
        /// Lock message from the tool
        message: String,
    },

    /// A held package blocks the operation
    #[error("held package: {message}")]
    Held {
        /// Message naming the hold
        message: String,
    },

    /// Dependency or in-use conflict
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Command ran and failed without a recognized cause
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Command output could not be parsed
    #[error("unexpected output from {command}: {message}")]
    Parse {
        /// Command whose output was malformed
        command: String,
        /// What was wrong
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ToolMissing { .. } => ErrorCategory::ToolMissing,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::AlreadyAbsent { .. } => ErrorCategory::AlreadyAbsent,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::Held { .. } => ErrorCategory::Held,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Create an error from a failed command's stderr.
    ///
    /// Analyzes stderr to categorize the error appropriately. `item` names
    /// the target, when the command acted on a single one.
    pub fn from_tool_output(command: &str, stderr: &str, item: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let name = || item.unwrap_or("unknown").to_string();

        // dpkg / apt lock contention
        if stderr_lower.contains("could not get lock")
            || stderr_lower.contains("unable to acquire the dpkg frontend lock")
            || stderr_lower.contains("unable to lock the administration directory")
            || stderr_lower.contains("is locked by another process")
        {
            return Error::Locked {
                message: stderr.trim().to_string(),
            };
        }

        // Holds
        if stderr_lower.contains("held packages")
            || stderr_lower.contains("held broken packages")
            || stderr_lower.contains("allow-change-held-packages")
        {
            return Error::Held {
                message: stderr.trim().to_string(),
            };
        }

        // Already gone
        if stderr_lower.contains("is not installed")
            || stderr_lower.contains("no such container")
            || stderr_lower.contains("no such image")
            || stderr_lower.contains("no such volume")
            || stderr_lower.contains("not loaded")
            || stderr_lower.contains("could not delete non-existent rule")
            || stderr_lower.contains("no matching snaps installed")
            || stderr_lower.contains("as it is not installed")
            || (stderr_lower.contains("network") && stderr_lower.contains("not found"))
        {
            return Error::AlreadyAbsent { name: name() };
        }

        // Unknown to the tool
        if stderr_lower.contains("unable to locate package")
            || stderr_lower.contains("no packages found matching")
            || stderr_lower.contains("does not exist")
            || stderr_lower.contains("not found")
        {
            return Error::NotFound { name: name() };
        }

        // Permission errors
        if stderr_lower.contains("permission denied")
            || stderr_lower.contains("operation not permitted")
            || stderr_lower.contains("are you root")
            || stderr_lower.contains("need to be root")
            || stderr_lower.contains("must be root")
            || stderr_lower.contains("access denied")
        {
            return Error::Permission {
                message: stderr.trim().to_string(),
            };
        }

        // Conflicts
        if stderr_lower.contains("unmet dependencies")
            || stderr_lower.contains("dependency problems")
            || stderr_lower.contains("depends on")
            || stderr_lower.contains("conflict")
            || stderr_lower.contains("is being used")
            || stderr_lower.contains("is in use")
            || stderr_lower.contains("has active endpoints")
        {
            return Error::Conflict {
                message: stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            command: command.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Result type for host tool operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Locked.is_retryable());
        assert!(!ErrorCategory::Held.is_retryable());
        assert!(!ErrorCategory::AlreadyAbsent.is_retryable());
    }

    #[test]
    fn test_error_category_ignorable() {
        assert!(ErrorCategory::AlreadyAbsent.is_ignorable());
        assert!(!ErrorCategory::NotFound.is_ignorable());
        assert!(!ErrorCategory::Permission.is_ignorable());
    }

    #[test]
    fn test_from_tool_output_locked() {
        let err = Error::from_tool_output(
            "apt-get purge",
            "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 1234 (unattended-upgr)",
            None,
        );
        assert_eq!(err.category(), ErrorCategory::Locked);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_tool_output_held() {
        let err = Error::from_tool_output(
            "apt-get purge",
            "E: Held packages were changed and -y was used without --allow-change-held-packages.",
            None,
        );
        assert_eq!(err.category(), ErrorCategory::Held);
    }

    #[test]
    fn test_from_tool_output_already_absent() {
        let err = Error::from_tool_output(
            "docker rm",
            "Error response from daemon: No such container: 3f2a",
            Some("3f2a"),
        );
        assert_eq!(err.category(), ErrorCategory::AlreadyAbsent);
        assert!(err.is_ignorable());

        let err = Error::from_tool_output("ufw delete", "Could not delete non-existent rule", None);
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_from_tool_output_not_found() {
        let err = Error::from_tool_output(
            "apt-get install",
            "E: Unable to locate package nosuchpkg",
            Some("nosuchpkg"),
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(!err.is_ignorable());
    }

    #[test]
    fn test_from_tool_output_permission() {
        let err = Error::from_tool_output(
            "apt-get purge",
            "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)",
            None,
        );
        // the lock message wins only when the lock is actually held
        assert_eq!(err.category(), ErrorCategory::Permission);
    }

    #[test]
    fn test_from_tool_output_conflict() {
        let err = Error::from_tool_output(
            "docker rmi",
            "Error response from daemon: conflict: unable to delete 9c7a (cannot be forced) - image is being used by running container",
            Some("9c7a"),
        );
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_from_tool_output_other() {
        let err = Error::from_tool_output("snap remove", "error: cannot communicate with server", None);
        assert_eq!(err.category(), ErrorCategory::Other);
        assert!(err.to_string().contains("snap remove failed"));
    }
}
