//! Execute order - the dependency-safe sequence used when cleaning
//!
//! Scan order is the numeric phase index. Execute order is a fixed,
//! hand-specified sequence that must satisfy every `PhaseKind::runs_after`
//! declaration; it is validated when constructed.

use crate::error::{Error, Result};
use crate::phase::PhaseKind;
use std::collections::HashMap;

/// The hand-specified execute sequence.
const STANDARD_SEQUENCE: [PhaseKind; 12] = [
    PhaseKind::Cron,
    PhaseKind::Services,
    PhaseKind::Containers,
    PhaseKind::Databases,
    PhaseKind::LanguagePackages,
    PhaseKind::Repositories,
    PhaseKind::Snaps,
    PhaseKind::Packages,
    PhaseKind::Kernels,
    PhaseKind::Firewall,
    PhaseKind::Filesystem,
    PhaseKind::Logs,
];

/// A `before` kind that must finish cleaning before `after` starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precedence {
    /// Kind that runs first
    pub before: PhaseKind,
    /// Kind that depends on it
    pub after: PhaseKind,
}

/// Validated execute order.
#[derive(Debug, Clone)]
pub struct ExecuteOrder {
    sequence: Vec<PhaseKind>,
}

impl ExecuteOrder {
    /// The engine's execute order.
    pub fn standard() -> Result<Self> {
        Self::from_sequence(STANDARD_SEQUENCE.to_vec())
    }

    /// Validate an arbitrary sequence against the declared precedences.
    ///
    /// Every kind must appear exactly once.
    pub fn from_sequence(sequence: Vec<PhaseKind>) -> Result<Self> {
        let mut position = HashMap::new();
        for (i, kind) in sequence.iter().enumerate() {
            if position.insert(*kind, i).is_some() {
                return Err(Error::InvalidOrder(format!("{kind} appears twice")));
            }
        }

        for kind in PhaseKind::ALL {
            if !position.contains_key(&kind) {
                return Err(Error::InvalidOrder(format!("{kind} missing")));
            }
        }

        for edge in precedences() {
            if position[&edge.before] > position[&edge.after] {
                return Err(Error::InvalidOrder(format!(
                    "{} must run before {}",
                    edge.before, edge.after
                )));
            }
        }

        Ok(Self { sequence })
    }

    /// Kinds in execute order.
    pub fn sequence(&self) -> &[PhaseKind] {
        &self.sequence
    }

    /// Position of a kind in the sequence.
    pub fn position(&self, kind: PhaseKind) -> Option<usize> {
        self.sequence.iter().position(|k| *k == kind)
    }
}

/// Every declared precedence edge.
pub fn precedences() -> impl Iterator<Item = Precedence> {
    PhaseKind::ALL.into_iter().flat_map(|after| {
        after
            .runs_after()
            .iter()
            .map(move |before| Precedence { before: *before, after })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order_is_valid() {
        let order = ExecuteOrder::standard().unwrap();
        assert_eq!(order.sequence().len(), PhaseKind::ALL.len());
    }

    #[test]
    fn test_standard_order_differs_from_scan_order() {
        let order = ExecuteOrder::standard().unwrap();
        assert_ne!(order.sequence(), &PhaseKind::ALL);
    }

    #[test]
    fn test_required_precedences_hold() {
        let order = ExecuteOrder::standard().unwrap();
        let before = |a: PhaseKind, b: PhaseKind| {
            order.position(a).unwrap() < order.position(b).unwrap()
        };

        // Drain consumers before owning packages and data
        assert!(before(PhaseKind::Services, PhaseKind::Packages));
        assert!(before(PhaseKind::Containers, PhaseKind::Packages));
        assert!(before(PhaseKind::Services, PhaseKind::Databases));
        // Broken repositories before bulk package removal
        assert!(before(PhaseKind::Repositories, PhaseKind::Packages));
        // Ecosystem packages before their interpreters
        assert!(before(PhaseKind::LanguagePackages, PhaseKind::Packages));
        // Filesystem and firewall once the package layer is stable
        assert!(before(PhaseKind::Packages, PhaseKind::Filesystem));
        assert!(before(PhaseKind::Packages, PhaseKind::Firewall));
    }

    #[test]
    fn test_rejects_violating_sequence() {
        let mut sequence = STANDARD_SEQUENCE.to_vec();
        let packages = sequence.iter().position(|k| *k == PhaseKind::Packages).unwrap();
        let repos = sequence.iter().position(|k| *k == PhaseKind::Repositories).unwrap();
        sequence.swap(packages, repos);

        let err = ExecuteOrder::from_sequence(sequence).unwrap_err();
        assert!(err.to_string().contains("repositories must run before packages"));
    }

    #[test]
    fn test_rejects_incomplete_or_duplicated_sequence() {
        let mut short = STANDARD_SEQUENCE.to_vec();
        short.pop();
        assert!(ExecuteOrder::from_sequence(short).is_err());

        let mut dup = STANDARD_SEQUENCE.to_vec();
        dup[0] = PhaseKind::Logs;
        assert!(ExecuteOrder::from_sequence(dup).is_err());
    }

    #[test]
    fn test_scan_order_violates_precedence() {
        // Sanity: the numeric order alone would not be safe
        assert!(ExecuteOrder::from_sequence(PhaseKind::ALL.to_vec()).is_err());
    }
}
