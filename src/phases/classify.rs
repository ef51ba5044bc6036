//! The single place where tool failures are turned into severities.
//!
//! Every external call a phase makes names its [`Site`]; the same tool error
//! can be harmless at one site and worth reporting at another.

use hostkit::ErrorCategory;
use reconcile::{ExecutionOutcome, ItemError, Severity};

/// Kind of external call being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// Listing what is installed or configured
    Inventory,
    /// Removing several items with one call
    BulkRemove,
    /// Removing a single item
    ItemRemove,
    /// Checking whether an item is still present
    Presence,
    /// Reinstalling baseline items lost as collateral
    Restore,
    /// Reloading a subsystem after changes (apt lists, unit files)
    Refresh,
    /// Housekeeping after removal (caches, journal, orphans)
    Cleanup,
}

/// Severity of `err` at `site`.
pub fn classify(site: Site, err: &hostkit::Error) -> Severity {
    use ErrorCategory as C;

    let category = err.category();
    match site {
        Site::Inventory => match category {
            C::ToolMissing => Severity::Ignorable,
            _ => Severity::SoftPhase,
        },
        Site::BulkRemove => match category {
            C::ToolMissing => Severity::SoftPhase,
            // one absent item fails the whole call, so fall back per item
            _ => Severity::SoftItem,
        },
        Site::ItemRemove => match category {
            C::AlreadyAbsent => Severity::Ignorable,
            C::ToolMissing => Severity::SoftPhase,
            _ => Severity::SoftItem,
        },
        Site::Presence => match category {
            C::NotFound | C::AlreadyAbsent => Severity::Ignorable,
            _ => Severity::SoftItem,
        },
        Site::Restore => Severity::SoftPhase,
        Site::Refresh => match category {
            C::ToolMissing => Severity::Ignorable,
            _ => Severity::SoftPhase,
        },
        Site::Cleanup => match category {
            C::ToolMissing | C::AlreadyAbsent => Severity::Ignorable,
            _ => Severity::SoftPhase,
        },
    }
}

/// Pass `result` through, turning an ignorable failure into success.
pub fn tolerate<T: Default>(site: Site, result: hostkit::Result<T>) -> hostkit::Result<T> {
    match result {
        Err(e) if classify(site, &e) == Severity::Ignorable => {
            log::debug!("ignoring {site:?} failure: {e}");
            Ok(T::default())
        }
        other => other,
    }
}

/// Run an inventory call. A missing tool means the subsystem is not there,
/// which yields `None`; any other failure fails the scan.
pub fn inventory<T>(result: hostkit::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if classify(Site::Inventory, &e) == Severity::Ignorable => {
            log::debug!("nothing to inventory: {e}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Site of a removal call over `items`.
pub fn removal_site(items: &[String]) -> Site {
    if items.len() == 1 {
        Site::ItemRemove
    } else {
        Site::BulkRemove
    }
}

/// Record a failure for `item` in `outcome` according to its severity.
///
/// Per-item failures leave the item unresolved; phase-level failures become
/// plain errors; ignorable ones are only logged.
pub fn record(
    outcome: &mut ExecutionOutcome,
    site: Site,
    item: &str,
    err: &hostkit::Error,
) -> Severity {
    let severity = classify(site, err);
    match severity {
        Severity::Ignorable => log::debug!("{item}: ignoring {site:?} failure: {err}"),
        Severity::SoftItem => {
            log::warn!("{item}: {err}");
            outcome.record_failed(item, err.to_string());
        }
        Severity::SoftPhase | Severity::Fatal => {
            log::warn!("{item}: {err}");
            outcome.push_error(ItemError::new(item, err.to_string()));
        }
    }
    severity
}
