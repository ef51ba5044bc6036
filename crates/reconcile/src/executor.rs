//! Batched remediation executor - batch-then-individual removal with re-query
//!
//! Whole-batch failures in package tools are usually caused by a single
//! poisoned item. Each pass tries contiguous batches, falls back to one item
//! at a time inside a failed batch, then re-queries what is still present
//! before the next pass.

use crate::error::{Error, Result};
use crate::types::{ExecutionOutcome, PassRecord};
use std::collections::{HashMap, HashSet};
use std::slice;

/// Default number of items per batch.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default maximum number of passes.
pub const DEFAULT_MAX_PASSES: u32 = 5;

/// Batch and pass limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Items submitted per removal call
    pub batch_size: usize,
    /// Maximum number of full sweeps
    pub max_passes: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl BatchConfig {
    /// Create a config with custom limits.
    pub fn new(batch_size: usize, max_passes: u32) -> Self {
        Self {
            batch_size,
            max_passes,
        }
    }

    /// Reject limits that would make no progress.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.max_passes == 0 {
            return Err(Error::Config("max_passes must be at least 1".into()));
        }
        Ok(())
    }
}

/// A removal tool that takes a list and may fail for the whole list.
pub trait RemovalPrimitive {
    /// Remove every item, or fail.
    fn remove(&self, items: &[String]) -> anyhow::Result<()>;

    /// Whether the item is still present on the host.
    fn is_present(&self, item: &str) -> anyhow::Result<bool>;
}

/// Remove `items` with batching, per-item fallback and bounded retries.
///
/// Never fails: whatever cannot be removed ends up in
/// [`ExecutionOutcome::unresolved`] with its last error.
pub fn remove_batched(
    items: &[String],
    config: &BatchConfig,
    primitive: &dyn RemovalPrimitive,
) -> ExecutionOutcome {
    let batch_size = config.batch_size.max(1);
    let mut outcome = ExecutionOutcome::new();
    let mut last_error: HashMap<String, String> = HashMap::new();

    let mut seen = HashSet::new();
    let mut pending: Vec<String> = items
        .iter()
        .filter(|i| seen.insert(i.as_str()))
        .cloned()
        .collect();

    for pass in 1..=config.max_passes {
        if pending.is_empty() {
            break;
        }
        log::debug!("pass {pass}: {} item(s)", pending.len());

        let mut record = PassRecord {
            attempted: pending.clone(),
            ..Default::default()
        };
        let mut failed = Vec::new();

        for batch in pending.chunks(batch_size) {
            match primitive.remove(batch) {
                Ok(()) => record.removed.extend_from_slice(batch),
                Err(e) if batch.len() == 1 => {
                    last_error.insert(batch[0].clone(), e.to_string());
                    failed.push(batch[0].clone());
                }
                Err(e) => {
                    log::debug!("batch of {} failed ({e}), retrying individually", batch.len());
                    for item in batch {
                        match primitive.remove(slice::from_ref(item)) {
                            Ok(()) => record.removed.push(item.clone()),
                            Err(e) => {
                                last_error.insert(item.clone(), e.to_string());
                                failed.push(item.clone());
                            }
                        }
                    }
                }
            }
        }

        // Earlier removals may have taken failed items with them
        for item in failed {
            match primitive.is_present(&item) {
                Ok(false) => {
                    log::debug!("{item} already gone");
                    outcome.note(format!("{item}: removed as a side effect"));
                    record.removed.push(item);
                }
                Ok(true) => record.deferred.push(item),
                Err(e) => {
                    log::debug!("presence check for {item} failed ({e}), assuming present");
                    record.deferred.push(item);
                }
            }
        }

        let progressed = !record.removed.is_empty();
        outcome.removed.extend(record.removed.iter().cloned());
        pending = record.deferred.clone();
        outcome.passes.push(record);

        if !progressed {
            log::debug!("pass {pass} removed nothing, stopping");
            break;
        }
    }

    for item in pending {
        let message = last_error
            .remove(&item)
            .unwrap_or_else(|| "not removed".to_string());
        outcome.record_failed(item, message);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Fake host: a set of installed items, some of which refuse removal.
    struct FakeTool {
        installed: RefCell<HashSet<String>>,
        poisoned: HashSet<String>,
        calls: RefCell<Vec<Vec<String>>>,
        /// Removing the key also removes the value
        cascades: HashMap<String, String>,
    }

    impl FakeTool {
        fn new(items: &[&str], poisoned: &[&str]) -> Self {
            Self {
                installed: RefCell::new(items.iter().map(|s| s.to_string()).collect()),
                poisoned: poisoned.iter().map(|s| s.to_string()).collect(),
                calls: RefCell::new(Vec::new()),
                cascades: HashMap::new(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl RemovalPrimitive for FakeTool {
        fn remove(&self, items: &[String]) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(items.to_vec());
            if let Some(bad) = items.iter().find(|i| self.poisoned.contains(*i)) {
                anyhow::bail!("{bad} is held");
            }
            let mut installed = self.installed.borrow_mut();
            for item in items {
                installed.remove(item);
                if let Some(dep) = self.cascades.get(item) {
                    installed.remove(dep);
                }
            }
            Ok(())
        }

        fn is_present(&self, item: &str) -> anyhow::Result<bool> {
            Ok(self.installed.borrow().contains(item))
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_succeed_in_batches() {
        let tool = FakeTool::new(&["a", "b", "c", "d", "e"], &[]);
        let outcome = remove_batched(
            &names(&["a", "b", "c", "d", "e"]),
            &BatchConfig::new(2, 5),
            &tool,
        );
        assert_eq!(outcome.removed, names(&["a", "b", "c", "d", "e"]));
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(tool.call_count(), 3);
    }

    #[test]
    fn test_scenario_batch_fallback_and_retry() {
        // batch [x1, x2] fails, x1 alone succeeds, x2 alone fails, [x3] succeeds
        let tool = FakeTool::new(&["x1", "x2", "x3"], &["x2"]);
        let outcome = remove_batched(&names(&["x1", "x2", "x3"]), &BatchConfig::new(2, 5), &tool);

        let first = &outcome.passes[0];
        assert_eq!(first.removed, names(&["x1", "x3"]));
        assert_eq!(first.deferred, names(&["x2"]));

        // x2 is still present, so pass 2 retries it
        let second = &outcome.passes[1];
        assert_eq!(second.attempted, names(&["x2"]));
        assert_eq!(outcome.unresolved, names(&["x2"]));
        assert!(outcome.errors[0].message.contains("x2 is held"));
    }

    #[test]
    fn test_single_poisoned_item_is_the_only_unresolved() {
        let all: Vec<String> = (0..45).map(|i| format!("pkg{i}")).collect();
        let refs: Vec<&str> = all.iter().map(String::as_str).collect();
        let tool = FakeTool::new(&refs, &["pkg17"]);

        let outcome = remove_batched(&all, &BatchConfig::default(), &tool);

        assert_eq!(outcome.removed.len(), 44);
        assert!(!outcome.removed.contains(&"pkg17".to_string()));
        assert_eq!(outcome.unresolved, names(&["pkg17"]));
    }

    #[test]
    fn test_zero_progress_stops_after_one_pass() {
        let tool = FakeTool::new(&["bad1", "bad2", "bad3"], &["bad1", "bad2", "bad3"]);
        let outcome = remove_batched(
            &names(&["bad1", "bad2", "bad3"]),
            &BatchConfig::new(20, 5),
            &tool,
        );

        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(outcome.unresolved, names(&["bad1", "bad2", "bad3"]));
        // one batch call plus three individual fallbacks
        assert_eq!(tool.call_count(), 4);
    }

    #[test]
    fn test_deferred_item_gone_by_side_effect_is_not_retried() {
        let mut tool = FakeTool::new(&["app", "lib", "other"], &["lib"]);
        // removing "other" also takes "lib" away
        tool.cascades.insert("other".into(), "lib".into());

        let outcome = remove_batched(&names(&["lib", "app", "other"]), &BatchConfig::new(1, 5), &tool);

        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.passes.len(), 1);
        assert!(outcome.removed.contains(&"lib".to_string()));
        assert!(outcome.notes.iter().any(|n| n.contains("side effect")));
    }

    #[test]
    fn test_respects_max_passes() {
        // Each pass makes progress, but the poisoned item never clears
        let tool = FakeTool::new(&["a", "b", "held"], &["held"]);
        let outcome = remove_batched(&names(&["a", "b", "held"]), &BatchConfig::new(3, 1), &tool);
        assert_eq!(outcome.passes.len(), 1);
        assert_eq!(outcome.unresolved, names(&["held"]));
    }

    #[test]
    fn test_duplicates_submitted_once() {
        let tool = FakeTool::new(&["a"], &[]);
        let outcome = remove_batched(&names(&["a", "a"]), &BatchConfig::default(), &tool);
        assert_eq!(outcome.removed, names(&["a"]));
    }

    #[test]
    fn test_validate() {
        assert!(BatchConfig::default().validate().is_ok());
        assert!(BatchConfig::new(0, 5).validate().is_err());
        assert!(BatchConfig::new(20, 0).validate().is_err());
    }

    #[test]
    fn test_empty_input() {
        let tool = FakeTool::new(&[], &[]);
        let outcome = remove_batched(&[], &BatchConfig::default(), &tool);
        assert!(outcome.passes.is_empty());
        assert_eq!(tool.call_count(), 0);
    }
}
