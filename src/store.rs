//! The failure buffer shared by a reporter tree.

use alloc::{string::String, vec::Vec};
use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use spin::RwLock;
use triomphe::Arc;

use crate::{Failure, label};

/// The append-only list of failures recorded by one reporter tree.
///
/// Every reporter derived from the same root holds a handle to the same store.
/// Failures are kept in the order they were recorded and are never reordered
/// or deduplicated.
#[derive(Clone)]
pub struct FailureStore(Arc<StoreData>);

struct StoreData {
    failures: RwLock<Vec<Failure>>,
    /// Labels of the handled scopes currently running over this tree.
    handled_runs: RwLock<Vec<(u64, String)>>,
    next_run: AtomicU64,
}

impl FailureStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(StoreData {
            failures: RwLock::new(Vec::new()),
            handled_runs: RwLock::new(Vec::new()),
            next_run: AtomicU64::new(0),
        }))
    }

    /// Appends a failure.
    pub fn push(&self, failure: Failure) {
        self.0.failures.write().push(failure);
    }

    /// Appends several failures, keeping their order.
    pub fn extend(&self, failures: impl IntoIterator<Item = Failure>) {
        self.0.failures.write().extend(failures);
    }

    /// Copies the recorded failures out of the store.
    pub fn snapshot(&self) -> Vec<Failure> {
        self.0.failures.read().clone()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.0.failures.read().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.failures.read().is_empty()
    }

    /// Registers a running handled scope labeled `label`. Returns the id of
    /// the run and whether no enclosing handled run was active.
    pub(crate) fn begin_handled_run(&self, label: &str) -> (u64, bool) {
        let id = self.0.next_run.fetch_add(1, Ordering::Relaxed);
        let mut runs = self.0.handled_runs.write();
        let outermost = !runs
            .iter()
            .any(|(_, active)| label::is_within(label, active));
        runs.push((id, label.into()));
        (id, outermost)
    }

    pub(crate) fn end_handled_run(&self, id: u64) {
        self.0.handled_runs.write().retain(|(run, _)| *run != id);
    }

    /// Returns `true` if both handles refer to the same store.
    pub fn ptr_eq(a: &FailureStore, b: &FailureStore) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl Default for FailureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FailureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.failures.read().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Details;

    #[test]
    fn test_shared_between_clones() {
        let store = FailureStore::new();
        let other = store.clone();
        assert!(FailureStore::ptr_eq(&store, &other));
        assert!(!FailureStore::ptr_eq(&store, &FailureStore::new()));

        store.push(Failure::new("a", "first", Details::new()));
        other.extend([
            Failure::new("b", "second", Details::new()),
            Failure::new("a", "third", Details::new()),
        ]);

        let sources: Vec<_> = store
            .snapshot()
            .iter()
            .map(|failure| failure.source().to_owned())
            .collect();
        assert_eq!(sources, ["a", "b", "a"]);
        assert_eq!(other.len(), 3);
    }

    #[test]
    fn test_handled_runs_nest_by_label() {
        let store = FailureStore::new();

        let (outer, outermost) = store.begin_handled_run("batch");
        assert!(outermost);
        let (inner, outermost) = store.begin_handled_run("batch.row[1]");
        assert!(!outermost);
        let (sibling, outermost) = store.begin_handled_run("batches");
        assert!(outermost);

        store.end_handled_run(outer);
        let (again, outermost) = store.begin_handled_run("batch.row[2]");
        assert!(outermost);

        for id in [inner, sibling, again] {
            store.end_handled_run(id);
        }
        assert!(store.0.handled_runs.read().is_empty());
    }
}
