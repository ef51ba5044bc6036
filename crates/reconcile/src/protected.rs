//! The fixed set of identifiers that keep a host reachable and administrable.

use std::collections::BTreeSet;
use std::path::Path;

/// Packages that provide remote access, identity and privilege escalation.
const PACKAGES: &[&str] = &[
    "openssh-server",
    "openssh-client",
    "openssh-sftp-server",
    "ssh",
    "ssh-import-id",
    "sudo",
    "passwd",
    "login",
    "adduser",
];

/// Service units of the remote-access daemon.
const UNITS: &[&str] = &["ssh.service", "sshd.service", "ssh.socket"];

/// Words a ufw rule spec (`ufw show added`, minus the `ufw ` prefix) starts with.
const RULE_KEYWORDS: &[&str] = &[
    "allow", "limit", "deny", "reject", "insert", "prepend", "route",
];

/// Port sshd listens on.
const SSH_PORT: u16 = 22;

/// Service and app-profile names for SSH, lowercased.
const SSH_NAMES: &[&str] = &["ssh", "openssh"];

/// Paths holding host keys, authorized keys, accounts and sudo policy.
const PATHS: &[&str] = &[
    "/etc/ssh",
    "/root/.ssh",
    "/home",
    "/etc/sudoers",
    "/etc/sudoers.d",
    "/etc/passwd",
    "/etc/shadow",
    "/etc/group",
    "/etc/gshadow",
];

/// Identifiers that must never be removal candidates.
///
/// The set is not configurable and never empty. Plain identifiers match
/// exactly. Absolute paths are protected when a candidate equals one, lies
/// inside one, or would contain one. Firewall rule specs are protected when
/// they admit SSH (see [`admits_ssh`]).
#[derive(Debug, Clone)]
pub struct ProtectedSet {
    names: BTreeSet<&'static str>,
    paths: Vec<&'static Path>,
}

impl ProtectedSet {
    /// The engine's protected set.
    pub fn standard() -> Self {
        let names = PACKAGES
            .iter()
            .chain(UNITS)
            .copied()
            .collect();
        let paths = PATHS.iter().map(Path::new).collect();
        Self { names, paths }
    }

    /// Name of the remote-access service whose health is checked after a run.
    pub fn remote_access_unit(&self) -> &'static str {
        "ssh.service"
    }

    /// Whether an identifier is protected.
    ///
    /// Firewall rule specs are matched by what they admit, not by text: any
    /// rule letting SSH in is protected whatever its qualifiers.
    pub fn contains(&self, id: &str) -> bool {
        if self.names.contains(id) {
            return true;
        }
        if is_rule_spec(id) {
            return admits_ssh(id);
        }
        if id.starts_with('/') {
            return self.guards_path(Path::new(id));
        }
        false
    }

    /// Whether removing `path` would touch a protected path.
    pub fn guards_path(&self, path: &Path) -> bool {
        self.paths
            .iter()
            .any(|protected| path.starts_with(protected) || protected.starts_with(path))
    }

    /// Protected plain identifiers, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().copied()
    }

    /// Protected paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().copied()
    }

    /// Total number of protected entries.
    pub fn len(&self) -> usize {
        self.names.len() + self.paths.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `id` is a ufw rule spec rather than a package or unit name.
fn is_rule_spec(id: &str) -> bool {
    id.contains(' ')
        && id
            .split_whitespace()
            .next()
            .is_some_and(|word| RULE_KEYWORDS.contains(&word))
}

/// Whether a ufw rule spec lets inbound SSH through.
///
/// Follows `ufw [insert N] [prepend] allow|limit [in [on IFACE]] [log|log-all]
/// <port | full form> [comment C]`. A spec that cannot be tokenised counts as
/// admitting SSH.
pub fn admits_ssh(spec: &str) -> bool {
    let Ok(tokens) = shell_words::split(spec) else {
        return true;
    };
    let mut tokens = tokens.iter().map(String::as_str).peekable();

    let action = loop {
        match tokens.next() {
            Some("insert") => {
                tokens.next();
            }
            Some("prepend") => {}
            Some(word) => break word,
            None => return false,
        }
    };
    if !matches!(action, "allow" | "limit") {
        return false;
    }

    match tokens.peek().copied() {
        Some("out") => return false,
        Some("in") => {
            tokens.next();
        }
        _ => {}
    }
    if tokens.peek() == Some(&"on") {
        tokens.next();
        tokens.next();
    }
    if matches!(tokens.peek().copied(), Some("log" | "log-all")) {
        tokens.next();
    }

    let mut rest = Vec::new();
    while let Some(token) = tokens.next() {
        if token == "comment" {
            tokens.next();
            continue;
        }
        rest.push(token);
    }

    match rest.first().copied() {
        None => false,
        Some("from" | "to" | "proto") => full_form_admits_ssh(&rest),
        Some(port) => port_admits_ssh(port),
    }
}

/// `[proto P] [from ADDR [port P | app A]] [to ADDR [port P | app A]]`.
///
/// Only the destination side matters; no destination restriction admits
/// every port.
fn full_form_admits_ssh(tokens: &[&str]) -> bool {
    let mut to_side = false;
    let mut restricted = false;
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match *token {
            "from" => to_side = false,
            "to" => to_side = true,
            "port" | "app" if to_side => {
                restricted = true;
                if iter.next().is_some_and(|value| port_admits_ssh(value)) {
                    return true;
                }
            }
            _ => {}
        }
    }
    !restricted
}

/// `22`, `22/tcp`, `20:30/tcp`, `22,80/tcp`, `ssh`, `OpenSSH`.
fn port_admits_ssh(spec: &str) -> bool {
    if is_ssh_name(spec) {
        return true;
    }
    let ports = spec.split_once('/').map_or(spec, |(ports, _)| ports);
    ports.split(',').any(|part| match part.split_once(':') {
        Some((low, high)) => match (low.parse::<u16>(), high.parse::<u16>()) {
            (Ok(low), Ok(high)) => (low..=high).contains(&SSH_PORT),
            _ => false,
        },
        None => part.parse::<u16>() == Ok(SSH_PORT) || is_ssh_name(part),
    })
}

fn is_ssh_name(name: &str) -> bool {
    SSH_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

impl Default for ProtectedSet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_is_never_empty() {
        let set = ProtectedSet::standard();
        assert!(!set.is_empty());
        assert!(set.contains("openssh-server"));
        assert!(set.contains(set.remote_access_unit()));
    }

    #[test]
    fn test_exact_match_for_names() {
        let set = ProtectedSet::standard();
        assert!(set.contains("sudo"));
        assert!(!set.contains("sudo-ldap"));
        assert!(!set.contains("openssh"));
        assert!(!set.contains("OPENSSH-SERVER"));
    }

    #[test]
    fn test_paths_inside_and_above_protected() {
        let set = ProtectedSet::standard();
        assert!(set.contains("/etc/ssh"));
        assert!(set.contains("/etc/ssh/sshd_config.d/50-cloud-init.conf"));
        assert!(set.contains("/etc"));
        assert!(set.contains("/"));
        assert!(set.contains("/home/deploy/app"));
        assert!(!set.contains("/etc/nginx"));
        assert!(!set.contains("/opt/app"));
    }

    #[test]
    fn test_path_prefix_is_component_wise() {
        let set = ProtectedSet::standard();
        assert!(!set.contains("/etc/sshguard"));
        assert!(!set.contains("/homework"));
    }

    #[test]
    fn test_ssh_firewall_rules() {
        let set = ProtectedSet::standard();
        assert!(set.contains("allow 22/tcp"));
        assert!(set.contains("limit OpenSSH"));
        assert!(set.contains("allow ssh"));
        assert!(!set.contains("allow 80/tcp"));
    }

    #[test]
    fn test_source_restricted_ssh_rule() {
        let set = ProtectedSet::standard();
        assert!(set.contains("allow from 203.0.113.5 to any port 22 proto tcp"));
        assert!(set.contains("allow proto tcp from 10.0.0.0/8 to any port 22"));
        assert!(set.contains("allow from 10.0.0.0/8 to any app OpenSSH"));
        assert!(!set.contains("allow from 10.0.0.0/8 to any port 5432"));
    }

    #[test]
    fn test_commented_ssh_rule() {
        let set = ProtectedSet::standard();
        assert!(set.contains("allow 22/tcp comment 'ssh'"));
        assert!(set.contains("limit OpenSSH comment 'admin access, do not remove'"));
        assert!(!set.contains("allow 80/tcp comment 'port 22 is elsewhere'"));
    }

    #[test]
    fn test_interface_bound_ssh_rule() {
        let set = ProtectedSet::standard();
        assert!(set.contains("allow in on eth0 to any port 22"));
        assert!(set.contains("allow in on eth0 22/tcp"));
        assert!(set.contains("limit in log 22"));
        assert!(!set.contains("allow in on eth0 to any port 443"));
    }

    #[test]
    fn test_ranges_lists_and_open_rules() {
        let set = ProtectedSet::standard();
        assert!(set.contains("allow 20:30/tcp"));
        assert!(set.contains("allow 22,80,443/tcp"));
        assert!(set.contains("insert 1 allow 22"));
        // no destination restriction admits every port
        assert!(set.contains("allow from 192.168.1.0/24"));
        assert!(!set.contains("allow 8000:9000/tcp"));
    }

    #[test]
    fn test_rules_that_do_not_admit_ssh() {
        let set = ProtectedSet::standard();
        assert!(!set.contains("deny 22/tcp"));
        assert!(!set.contains("reject from 10.0.0.5 to any port 22"));
        assert!(!set.contains("allow out 22/tcp"));
        assert!(!set.contains("route allow in on eth0 out on eth1 to any port 22"));
        assert!(!set.contains("allow from any port 22 to any port 8080"));
    }

    #[test]
    fn test_untokenisable_rule_is_kept() {
        assert!(ProtectedSet::standard().contains("allow 80/tcp comment 'unterminated"));
    }
}
