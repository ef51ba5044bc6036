//! Root privilege check
//!
//! Scanning reads package databases, container state and firewall rules that
//! are only visible to root, so both `scan` and `reset` require it up front.
//! Nothing is escalated on demand.

use reconcile::Error;

/// Effective user id of this process.
#[cfg(unix)]
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
pub fn effective_uid() -> u32 {
    u32::MAX
}

/// Fail unless running as root.
pub fn require_root() -> Result<(), Error> {
    check(effective_uid())
}

fn check(euid: u32) -> Result<(), Error> {
    if euid == 0 {
        return Ok(());
    }
    Err(Error::Privilege(format!(
        "running as uid {euid}; run pristine as root (e.g. with sudo)"
    )))
}
