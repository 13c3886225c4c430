//! Contract of the hierarchical document store the cascade engine runs against.
//!
//! The engine only needs point reads, child listing, server-side child counts and
//! an atomic write batch with a published operation ceiling. Two implementations
//! ship with the crate: [`sqlite::SqliteStore`] and [`memory::MemoryStore`].

use std::future::Future;

use thiserror::Error;

use crate::error::{
    STORE_BATCH_TOO_LARGE_CODE, STORE_DECODE_CODE, STORE_REJECTED_CODE, STORE_UNAVAILABLE_CODE,
};
use crate::model::{ChildCollection, DocRef, Document};

pub mod memory;
pub mod sqlite;

/// Hard per-batch ceiling published by the stores in this crate.
pub const DEFAULT_MAX_BATCH_OPS: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or availability failure; the same call may succeed later.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Quota, validation or constraint failure; retrying will not help.
    #[error("store rejected the operation: {0}")]
    Rejected(String),
    #[error("batch of {staged} operations exceeds the store limit of {limit}")]
    BatchTooLarge { staged: usize, limit: usize },
    #[error("stored document could not be decoded: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => STORE_UNAVAILABLE_CODE,
            StoreError::Rejected(_) => STORE_REJECTED_CODE,
            StoreError::BatchTooLarge { .. } => STORE_BATCH_TOO_LARGE_CODE,
            StoreError::Decode(_) => STORE_DECODE_CODE,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_) => StoreError::Decode(error.to_string()),
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create the document, or overwrite it if its id already exists.
    Put(Document),
    /// Remove the document; removing a missing document is a no-op.
    Delete(DocRef),
}

impl WriteOp {
    pub fn target(&self) -> DocRef {
        match self {
            WriteOp::Put(doc) => doc.doc_ref(),
            WriteOp::Delete(doc_ref) => doc_ref.clone(),
        }
    }
}

/// Operations committed atomically: all land or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn put(&mut self, doc: Document) {
        self.stage(WriteOp::Put(doc));
    }

    pub fn delete(&mut self, doc_ref: DocRef) {
        self.stage(WriteOp::Delete(doc_ref));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Hierarchical document store.
///
/// Every call may suspend on I/O. Implementations must reject a batch larger
/// than [`HierarchyStore::max_batch_ops`] without applying any of it.
pub trait HierarchyStore: Send + Sync {
    /// Maximum number of operations the store accepts in one batch.
    fn max_batch_ops(&self) -> usize;

    fn get(&self, doc: &DocRef) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Members of a collection in sibling order (`order_index`, or `set_number` for sets).
    fn list_children(
        &self,
        collection: &ChildCollection,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// Aggregate member count, computed without fetching the documents.
    fn count_children(
        &self,
        collection: &ChildCollection,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn commit(&self, batch: WriteBatch) -> impl Future<Output = StoreResult<()>> + Send;
}
