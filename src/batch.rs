//! Write budgeting shared by the deleter and the duplicator.
//!
//! A logical operation larger than one store batch is split into consecutive
//! batches of at most [`WriteBudget::ops_per_batch`] operations and committed
//! strictly in order. Only a single batch is atomic; a failure after the first
//! batch leaves the earlier batches committed and is reported as
//! [`CascadeError::PartialCommit`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::error::CascadeError;
use crate::model::DocRef;
use crate::store::{HierarchyStore, WriteBatch, WriteOp, DEFAULT_MAX_BATCH_OPS};

/// Headroom kept below the store ceiling for writes the store may add itself.
pub const DEFAULT_SAFETY_MARGIN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteBudget {
    hard_limit: usize,
    margin: usize,
}

impl Default for WriteBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_OPS, DEFAULT_SAFETY_MARGIN)
    }
}

impl WriteBudget {
    /// The margin is at least one so the budget stays strictly below the
    /// ceiling. A margin that would consume the whole ceiling shrinks to a
    /// tenth of it.
    pub fn new(hard_limit: usize, margin: usize) -> Self {
        let hard_limit = hard_limit.max(1);
        let margin = if margin >= hard_limit {
            hard_limit / 10
        } else {
            margin
        };
        Self {
            hard_limit,
            margin: margin.max(1),
        }
    }

    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    pub fn ops_per_batch(&self) -> usize {
        self.hard_limit.saturating_sub(self.margin).max(1)
    }

    /// This budget, tightened to a store whose published ceiling is lower.
    /// The margin then shrinks to at most a tenth of that ceiling.
    pub fn within(self, store_limit: usize) -> Self {
        if store_limit >= self.hard_limit {
            return self;
        }
        Self::new(store_limit, self.margin.min(store_limit / 10))
    }

    pub fn batches_needed(&self, ops: usize) -> usize {
        ops.div_ceil(self.ops_per_batch())
    }
}

/// Split `ops` into consecutive batches, preserving order.
pub fn partition(ops: Vec<WriteOp>, budget: WriteBudget) -> Vec<WriteBatch> {
    let per_batch = budget.ops_per_batch();
    let mut batches = Vec::with_capacity(budget.batches_needed(ops.len()));
    let mut current = WriteBatch::new();
    for op in ops {
        if current.len() == per_batch {
            batches.push(std::mem::take(&mut current));
        }
        current.stage(op);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeProgress {
    pub operation: &'static str,
    pub root: String,
    /// 1-based index of the batch just committed.
    pub batch_index: usize,
    pub batches_total: usize,
    pub ops_committed: usize,
    pub ops_total: usize,
}

pub type CascadeProgressObserver = Arc<dyn Fn(CascadeProgress) + Send + Sync>;

#[derive(Clone, Default)]
pub struct CascadeOptions {
    pub budget: WriteBudget,
    pub progress: Option<CascadeProgressObserver>,
}

impl fmt::Debug for CascadeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeOptions")
            .field("budget", &self.budget)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CommitReport {
    pub batches: usize,
    pub ops: usize,
}

/// Commit `ops` as budgeted batches, each only after the previous one succeeded.
pub async fn commit_in_order<S: HierarchyStore>(
    store: &S,
    operation: &'static str,
    root: &DocRef,
    ops: Vec<WriteOp>,
    options: &CascadeOptions,
) -> Result<CommitReport, CascadeError> {
    let budget = options.budget.within(store.max_batch_ops());
    let ops_total = ops.len();
    let batches = partition(ops, budget);
    let batches_total = batches.len();
    let mut ops_committed = 0;

    for (index, batch) in batches.into_iter().enumerate() {
        let size = batch.len();
        if let Err(source) = store.commit(batch).await {
            error!(
                target: "trainlog",
                event = "cascade_batch_failed",
                operation,
                root = %root,
                batch_index = index + 1,
                batches_total,
                ops_committed,
                error = %source
            );
            if index == 0 {
                return Err(CascadeError::store(operation, source));
            }
            return Err(CascadeError::PartialCommit {
                operation,
                root: root.clone(),
                committed_batches: index,
                total_batches: batches_total,
                committed_ops: ops_committed,
                source,
            });
        }
        ops_committed += size;
        info!(
            target: "trainlog",
            event = "cascade_batch_commit",
            operation,
            root = %root,
            batch_index = index + 1,
            batches_total,
            batch_ops = size,
            ops_committed,
            ops_total
        );
        if let Some(observer) = &options.progress {
            observer(CascadeProgress {
                operation,
                root: root.path(),
                batch_index: index + 1,
                batches_total,
                ops_committed,
                ops_total,
            });
        }
    }

    Ok(CommitReport {
        batches: batches_total,
        ops: ops_committed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WeekKey;
    use crate::store::memory::MemoryStore;
    use proptest::prelude::*;
    use std::sync::Mutex;

    fn deletes(n: usize) -> Vec<WriteOp> {
        (0..n)
            .map(|i| WriteOp::Delete(DocRef::Week(WeekKey::new("p", format!("w{i}")))))
            .collect()
    }

    #[test]
    fn default_budget_keeps_fifty_below_ceiling() {
        let budget = WriteBudget::default();
        assert_eq!(budget.ops_per_batch(), 450);
        assert_eq!(budget.batches_needed(0), 0);
        assert_eq!(budget.batches_needed(450), 1);
        assert_eq!(budget.batches_needed(451), 2);
    }

    #[test]
    fn zero_margin_is_raised_to_stay_below_ceiling() {
        assert_eq!(WriteBudget::new(10, 0).ops_per_batch(), 9);
        assert_eq!(WriteBudget::new(1, 5).ops_per_batch(), 1);
    }

    #[test]
    fn oversized_margin_shrinks_to_a_tenth_of_the_ceiling() {
        let budget = WriteBudget::new(40, 40);
        assert_eq!(budget.margin(), 4);
        assert_eq!(budget.ops_per_batch(), 36);
        assert_eq!(WriteBudget::new(12, 50).ops_per_batch(), 11);
        assert_eq!(WriteBudget::new(5, 9).ops_per_batch(), 4);
        assert_eq!(WriteBudget::new(12, 11).ops_per_batch(), 1);
    }

    #[test]
    fn budget_tightens_to_lower_store_limit() {
        let budget = WriteBudget::default().within(20);
        assert_eq!(budget.hard_limit(), 20);
        assert_eq!(budget.margin(), 2);
        assert_eq!(budget.ops_per_batch(), 18);
        assert_eq!(WriteBudget::default().within(12).ops_per_batch(), 11);
        assert_eq!(WriteBudget::default().within(51).ops_per_batch(), 46);
        assert_eq!(WriteBudget::default().within(1).ops_per_batch(), 1);
        assert_eq!(WriteBudget::new(12, 2).within(500).ops_per_batch(), 10);
    }

    #[test]
    fn partition_preserves_order_across_batches() {
        let batches = partition(deletes(5), WriteBudget::new(3, 1));
        let sizes: Vec<_> = batches.iter().map(WriteBatch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let ids: Vec<String> = batches
            .iter()
            .flat_map(|b| b.ops().iter().map(|op| op.target().id().to_string()))
            .collect();
        assert_eq!(ids, vec!["w0", "w1", "w2", "w3", "w4"]);
    }

    proptest! {
        #[test]
        fn partition_issues_ceil_n_over_b_batches(
            n in 0usize..2000,
            limit in 2usize..600,
            margin in 1usize..50,
        ) {
            let budget = WriteBudget::new(limit, margin);
            let per = budget.ops_per_batch();
            let batches = partition(deletes(n), budget);
            prop_assert_eq!(batches.len(), n.div_ceil(per));
            prop_assert!(batches.iter().all(|b| b.len() <= per && !b.is_empty()));
            prop_assert_eq!(batches.iter().map(WriteBatch::len).sum::<usize>(), n);
        }
    }

    #[tokio::test]
    async fn reports_progress_after_each_batch() {
        let store = MemoryStore::new();
        let seen: Arc<Mutex<Vec<CascadeProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = CascadeOptions {
            budget: WriteBudget::new(3, 1),
            progress: Some(Arc::new(move |p| sink.lock().unwrap().push(p))),
        };
        let root = DocRef::Week(WeekKey::new("p", "root"));
        let report = commit_in_order(&store, "delete", &root, deletes(5), &options)
            .await
            .expect("commit");
        assert_eq!(report, CommitReport { batches: 3, ops: 5 });
        let seen = seen.lock().unwrap();
        let committed: Vec<_> = seen.iter().map(|p| p.ops_committed).collect();
        assert_eq!(committed, vec![2, 4, 5]);
        assert!(seen.iter().all(|p| p.batches_total == 3 && p.ops_total == 5));
        assert_eq!(store.committed_batches(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn first_batch_failure_means_nothing_happened() {
        let store = MemoryStore::new();
        store.fail_commit_at(1);
        let options = CascadeOptions {
            budget: WriteBudget::new(3, 1),
            progress: None,
        };
        let root = DocRef::Week(WeekKey::new("p", "root"));
        let err = commit_in_order(&store, "delete", &root, deletes(5), &options)
            .await
            .expect_err("first batch fails");
        assert!(matches!(err, CascadeError::Store { operation: "delete", .. }));
        assert!(store.committed_batches().is_empty());
    }

    #[tokio::test]
    async fn later_batch_failure_is_partial_and_stops() {
        let store = MemoryStore::new();
        store.fail_commit_at(2);
        let options = CascadeOptions {
            budget: WriteBudget::new(3, 1),
            progress: None,
        };
        let root = DocRef::Week(WeekKey::new("p", "root"));
        let err = commit_in_order(&store, "delete", &root, deletes(5), &options)
            .await
            .expect_err("second batch fails");
        match err {
            CascadeError::PartialCommit {
                committed_batches,
                total_batches,
                committed_ops,
                ..
            } => {
                assert_eq!(committed_batches, 1);
                assert_eq!(total_batches, 3);
                assert_eq!(committed_ops, 2);
            }
            other => panic!("expected partial commit, got {other:?}"),
        }
        assert_eq!(store.committed_batches(), vec![2]);
    }
}
