//! Cascading physical delete of a Week, Workout or Exercise subtree.
//!
//! Deletes are staged bottom-up (sets, exercises, workouts, then the scope root)
//! and committed in budgeted batches. If a later batch fails, what remains is
//! still a well-formed subtree under the original root, so re-running the
//! delete finishes the job.

use serde::Serialize;
use tracing::info;

use crate::batch::{commit_in_order, CascadeOptions};
use crate::error::CascadeError;
use crate::guard::ensure_owner;
use crate::model::{Scope, UserId};
use crate::store::{HierarchyStore, WriteOp};
use crate::traversal::{bottom_up, walk_subtree};

const OPERATION: &str = "delete";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Documents removed by this call, the scope root included.
    pub documents_deleted: usize,
    pub batches: usize,
    /// The scope root was already gone; nothing was done.
    pub already_absent: bool,
}

pub async fn delete_cascade<S: HierarchyStore>(
    store: &S,
    caller: &UserId,
    scope: &Scope,
    options: &CascadeOptions,
) -> Result<DeleteOutcome, CascadeError> {
    let root = scope.root();
    let owned = match ensure_owner(store, &root, caller).await {
        Ok(owned) => owned,
        Err(CascadeError::NotFound { .. }) => {
            info!(
                target: "trainlog",
                event = "cascade_delete_noop",
                scope = %scope,
                reason = "root_absent"
            );
            return Ok(DeleteOutcome {
                already_absent: true,
                ..DeleteOutcome::default()
            });
        }
        Err(err) => return Err(err),
    };

    let visits = walk_subtree(store, owned.into_document())
        .await
        .map_err(|source| CascadeError::store(OPERATION, source))?;
    let ops: Vec<WriteOp> = bottom_up(&visits)
        .into_iter()
        .map(WriteOp::Delete)
        .collect();

    let report = commit_in_order(store, OPERATION, &root, ops, options).await?;
    info!(
        target: "trainlog",
        event = "cascade_delete_complete",
        scope = %scope,
        documents_deleted = report.ops,
        batches = report.batches
    );
    Ok(DeleteOutcome {
        documents_deleted: report.ops,
        batches: report.batches,
        already_absent: false,
    })
}
