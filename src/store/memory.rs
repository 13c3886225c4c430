use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{HierarchyStore, StoreError, StoreResult, WriteBatch, WriteOp, DEFAULT_MAX_BATCH_OPS};
use crate::model::{ChildCollection, DocRef, Document};

const PROGRAMS: &str = "programs";

#[derive(Default)]
struct State {
    /// collection path -> id -> document
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    committed: Vec<usize>,
    commits_attempted: usize,
    fail_commit_at: Option<usize>,
    reads_attempted: usize,
    fail_read_at: Option<usize>,
    fail_reads: bool,
}

/// In-process store. Batches apply under one lock, so they are atomic.
///
/// Failure injection lets callers exercise the partial-commit and fail-open
/// paths: [`MemoryStore::fail_commit_at`] makes the n-th commit (1-based,
/// counted from store creation) fail without applying,
/// [`MemoryStore::fail_read_at`] does the same for a single read, and
/// [`MemoryStore::fail_reads`] makes every read return `Unavailable`.
pub struct MemoryStore {
    max_batch_ops: usize,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn collection_path(doc: &DocRef) -> String {
    doc.collection()
        .map(|collection| collection.path())
        .unwrap_or_else(|| PROGRAMS.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch_ops(DEFAULT_MAX_BATCH_OPS)
    }

    pub fn with_max_batch_ops(max_batch_ops: usize) -> Self {
        Self {
            max_batch_ops: max_batch_ops.max(1),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write a document directly, bypassing batching.
    pub fn insert(&self, doc: Document) {
        let mut state = self.state();
        apply(&mut state, WriteOp::Put(doc));
    }

    pub fn contains(&self, doc: &DocRef) -> bool {
        let state = self.state();
        state
            .collections
            .get(&collection_path(doc))
            .is_some_and(|members| members.contains_key(doc.id()))
    }

    /// Total number of stored documents of every kind.
    pub fn len(&self) -> usize {
        self.state().collections.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_commit_at(&self, nth: usize) {
        self.state().fail_commit_at = Some(nth);
    }

    /// Fail only the n-th read (1-based, counted from this call).
    pub fn fail_read_at(&self, nth: usize) {
        let mut state = self.state();
        state.reads_attempted = 0;
        state.fail_read_at = Some(nth);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_commit_at = None;
        state.fail_read_at = None;
        state.fail_reads = false;
    }

    /// Sizes of the batches committed so far, in commit order.
    pub fn committed_batches(&self) -> Vec<usize> {
        self.state().committed.clone()
    }

    fn check_reads(state: &mut State) -> StoreResult<()> {
        state.reads_attempted += 1;
        if state.fail_reads || state.fail_read_at == Some(state.reads_attempted) {
            Err(StoreError::Unavailable(format!(
                "injected failure on read {}",
                state.reads_attempted
            )))
        } else {
            Ok(())
        }
    }
}

fn apply(state: &mut State, op: WriteOp) {
    match op {
        WriteOp::Put(doc) => {
            let path = collection_path(&doc.doc_ref());
            state
                .collections
                .entry(path)
                .or_default()
                .insert(doc.id().to_string(), doc);
        }
        WriteOp::Delete(doc_ref) => {
            let path = collection_path(&doc_ref);
            if let Some(members) = state.collections.get_mut(&path) {
                members.remove(doc_ref.id());
                if members.is_empty() {
                    state.collections.remove(&path);
                }
            }
        }
    }
}

impl HierarchyStore for MemoryStore {
    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    async fn get(&self, doc: &DocRef) -> StoreResult<Option<Document>> {
        let mut state = self.state();
        Self::check_reads(&mut state)?;
        Ok(state
            .collections
            .get(&collection_path(doc))
            .and_then(|members| members.get(doc.id()))
            .cloned())
    }

    async fn list_children(&self, collection: &ChildCollection) -> StoreResult<Vec<Document>> {
        let mut state = self.state();
        Self::check_reads(&mut state)?;
        let mut docs: Vec<Document> = state
            .collections
            .get(&collection.path())
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(docs)
    }

    async fn count_children(&self, collection: &ChildCollection) -> StoreResult<u64> {
        let mut state = self.state();
        Self::check_reads(&mut state)?;
        Ok(state
            .collections
            .get(&collection.path())
            .map_or(0, |members| members.len() as u64))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut state = self.state();
        if batch.len() > self.max_batch_ops {
            return Err(StoreError::BatchTooLarge {
                staged: batch.len(),
                limit: self.max_batch_ops,
            });
        }
        state.commits_attempted += 1;
        if state.fail_commit_at == Some(state.commits_attempted) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on commit {}",
                state.commits_attempted
            )));
        }
        let size = batch.len();
        for op in batch.into_ops() {
            apply(&mut state, op);
        }
        state.committed.push(size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Week, WeekKey};

    fn week(id: &str, order_index: i64) -> Document {
        Document::Week(Week {
            id: id.into(),
            program_id: "p1".into(),
            name: format!("Week {id}"),
            order_index,
            notes: String::new(),
            owner_id: "u1".into(),
            created_at: 0,
            updated_at: 0,
        })
    }

    #[tokio::test]
    async fn lists_children_in_sibling_order() {
        let store = MemoryStore::new();
        store.insert(week("b", 2));
        store.insert(week("a", 1));
        let collection = ChildCollection::Weeks {
            program_id: "p1".into(),
        };
        let ids: Vec<_> = store
            .list_children(&collection)
            .await
            .expect("list")
            .iter()
            .map(|doc| doc.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.count_children(&collection).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_without_applying() {
        let store = MemoryStore::with_max_batch_ops(1);
        let batch: WriteBatch = vec![WriteOp::Put(week("a", 1)), WriteOp::Put(week("b", 2))]
            .into_iter()
            .collect();
        let err = store.commit(batch).await.expect_err("too large");
        assert!(matches!(err, StoreError::BatchTooLarge { staged: 2, limit: 1 }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn injected_commit_failure_applies_nothing() {
        let store = MemoryStore::new();
        store.fail_commit_at(1);
        let mut batch = WriteBatch::new();
        batch.put(week("a", 1));
        assert!(store.commit(batch.clone()).await.is_err());
        assert!(store.is_empty());
        store.commit(batch).await.expect("second commit succeeds");
        assert!(store.contains(&DocRef::Week(WeekKey::new("p1", "a"))));
        assert_eq!(store.committed_batches(), vec![1]);
    }

    #[tokio::test]
    async fn single_read_failure_hits_only_that_read() {
        let store = MemoryStore::new();
        store.insert(week("a", 1));
        let doc = DocRef::Week(WeekKey::new("p1", "a"));
        store.fail_read_at(2);
        assert!(store.get(&doc).await.expect("first read").is_some());
        assert!(matches!(
            store.get(&doc).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.get(&doc).await.expect("third read").is_some());
    }

    #[tokio::test]
    async fn deleting_missing_document_is_a_no_op() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.delete(DocRef::Week(WeekKey::new("p1", "ghost")));
        store.commit(batch).await.expect("no-op delete");
        assert!(store.is_empty());
    }
}
