//! Health of the SSH daemon after a run.

use anyhow::{Context, Result};
use hostkit::Systemd;
use reconcile::RemoteAccess;

/// Socket unit that starts sshd on demand (default on 24.04).
const SSH_SOCKET: &str = "ssh.socket";

/// The SSH service as seen through systemd.
///
/// With socket activation `ssh.service` is idle until someone connects, so an
/// active `ssh.socket` counts as reachable.
#[derive(Debug)]
pub struct SshService {
    systemd: Systemd,
    unit: String,
}

impl SshService {
    /// Watch `unit` (normally `ssh.service`).
    pub fn new(systemd: Systemd, unit: impl Into<String>) -> Self {
        Self {
            systemd,
            unit: unit.into(),
        }
    }
}

impl RemoteAccess for SshService {
    fn service(&self) -> String {
        self.unit.clone()
    }

    fn is_active(&self) -> Result<bool> {
        if self.systemd.is_active(&self.unit)? {
            return Ok(true);
        }
        Ok(self.systemd.is_active(SSH_SOCKET)?)
    }

    fn restart(&self) -> Result<()> {
        self.systemd
            .restart(&self.unit)
            .with_context(|| format!("systemctl restart {}", self.unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostkit::ScriptedRunner;
    use std::sync::Arc;

    fn service(runner: &Arc<ScriptedRunner>) -> SshService {
        SshService::new(Systemd::new(runner.clone()), "ssh.service")
    }

    #[test]
    fn test_active_service() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("systemctl is-active ssh.service", "active\n");
        assert!(service(&runner).is_active().unwrap());
    }

    #[test]
    fn test_socket_activation_counts_as_active() {
        let runner = Arc::new(ScriptedRunner::new());
        runner
            .fail("systemctl is-active ssh.service", "inactive")
            .ok("systemctl is-active ssh.socket", "active\n");
        assert!(service(&runner).is_active().unwrap());
    }

    #[test]
    fn test_inactive_and_restart() {
        let runner = Arc::new(ScriptedRunner::new());
        runner
            .fail("systemctl is-active", "inactive")
            .fail("systemctl restart ssh.service", "Job for ssh.service failed.");

        let ssh = service(&runner);
        assert!(!ssh.is_active().unwrap());
        let err = ssh.restart().unwrap_err();
        assert!(format!("{err:#}").contains("systemctl restart ssh.service"));
    }
}
