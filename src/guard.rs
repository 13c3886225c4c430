//! Ownership guard run before every cascade operation.
//!
//! The guard performs exactly one read: the subtree root. When it rejects the
//! caller, no other read or write of the operation happens.

use tracing::warn;

use crate::error::CascadeError;
use crate::model::{DocRef, Document, UserId};
use crate::store::HierarchyStore;

/// Proof that the caller owns `root`. Carries the root document so callers do
/// not have to read it again.
#[must_use = "ownership must be checked before executing a mutation"]
#[derive(Debug)]
pub struct OwnedRoot {
    document: Document,
}

impl OwnedRoot {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Fetch `root` and compare its stored `owner_id` with `caller`.
pub async fn ensure_owner<S: HierarchyStore>(
    store: &S,
    root: &DocRef,
    caller: &UserId,
) -> Result<OwnedRoot, CascadeError> {
    let document = store
        .get(root)
        .await
        .map_err(|source| CascadeError::store("ownership_check", source))?
        .ok_or_else(|| CascadeError::NotFound { root: root.clone() })?;

    if document.owner_id() != caller.as_str() {
        warn!(
            target: "trainlog",
            event = "ownership_denied",
            root = %root,
            caller = %caller
        );
        return Err(CascadeError::PermissionDenied {
            root: root.clone(),
            caller: caller.clone(),
        });
    }

    Ok(OwnedRoot { document })
}
