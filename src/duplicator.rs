//! Deep copy of a Week, Workout or Exercise subtree next to its source.
//!
//! The copy gets a new root id and a collision-free "Copy N" name, fresh
//! timestamps on every node, ancestor ids rewritten to the new parents, and
//! every set reset to unchecked. Descendant ids are derived from the new root id
//! and the source id, so a duplicate interrupted between batches can be resumed
//! with [`resume_duplicate`] and the same target id without creating a second
//! copy.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use crate::batch::{commit_in_order, CascadeOptions};
use crate::copy_name::{base_name, generate_copy_name};
use crate::error::CascadeError;
use crate::guard::ensure_owner;
use crate::id::{derived_id, new_uuid_v7};
use crate::model::{
    DocRef, Document, Exercise, ExerciseSet, Program, Scope, UserId, Week, WeekKey, Workout,
};
use crate::store::{HierarchyStore, StoreResult, WriteOp};
use crate::time::now_ms;
use crate::traversal::walk_subtree;

const OPERATION: &str = "duplicate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateOutcome {
    /// Root of the new subtree.
    pub root: DocRef,
    pub name: String,
    pub documents_created: usize,
    pub batches: usize,
    pub resumed: bool,
}

impl DuplicateOutcome {
    pub fn week_key(&self) -> Option<WeekKey> {
        match &self.root {
            DocRef::Week(key) => Some(key.clone()),
            _ => None,
        }
    }
}

/// Copy `source` under a freshly allocated id.
pub async fn duplicate<S: HierarchyStore>(
    store: &S,
    caller: &UserId,
    source: &Scope,
    options: &CascadeOptions,
) -> Result<DuplicateOutcome, CascadeError> {
    duplicate_into(store, caller, source, new_uuid_v7(), false, options).await
}

/// Finish a duplicate whose new root id is `target_id`, typically taken from a
/// [`CascadeError::PartialCommit`] of an earlier attempt. Documents that already
/// landed are overwritten with identical content; the name the partial copy
/// already carries is kept.
///
/// Fails with [`CascadeError::ResumeMismatch`] when `target_id` is the source
/// itself or names an existing sibling that is not a copy of the source.
pub async fn resume_duplicate<S: HierarchyStore>(
    store: &S,
    caller: &UserId,
    source: &Scope,
    target_id: &str,
    options: &CascadeOptions,
) -> Result<DuplicateOutcome, CascadeError> {
    duplicate_into(store, caller, source, target_id.to_string(), true, options).await
}

async fn duplicate_into<S: HierarchyStore>(
    store: &S,
    caller: &UserId,
    source: &Scope,
    target_id: String,
    resume: bool,
    options: &CascadeOptions,
) -> Result<DuplicateOutcome, CascadeError> {
    let source_root = source.root();
    let owned = ensure_owner(store, &source_root, caller).await?;
    let siblings = source_root
        .collection()
        .ok_or_else(|| CascadeError::NotFound {
            root: source_root.clone(),
        })?;
    let target_root = siblings.member(target_id.clone());
    let mismatch = || CascadeError::ResumeMismatch {
        original: source_root.clone(),
        target: target_root.clone(),
    };

    let existing = if resume {
        if target_id == source_root.id() {
            return Err(mismatch());
        }
        store
            .get(&target_root)
            .await
            .map_err(|source| CascadeError::store(OPERATION, source))?
    } else {
        None
    };
    if let Some(doc) = &existing {
        if doc.owner_id() != caller.as_str() {
            return Err(CascadeError::PermissionDenied {
                root: target_root.clone(),
                caller: caller.clone(),
            });
        }
        let is_copy = is_partial_copy(store, owned.document(), doc)
            .await
            .map_err(|source| CascadeError::store(OPERATION, source))?;
        if !is_copy {
            return Err(mismatch());
        }
    }

    let name = match existing.as_ref().and_then(Document::name) {
        Some(name) => name.to_string(),
        None => {
            let names: Vec<String> = store
                .list_children(&siblings)
                .await
                .map_err(|source| CascadeError::store(OPERATION, source))?
                .iter()
                .filter_map(|doc| doc.name().map(str::to_string))
                .collect();
            generate_copy_name(owned.document().name().unwrap_or_default(), &names)
        }
    };

    let visits = walk_subtree(store, owned.into_document())
        .await
        .map_err(|source| CascadeError::store(OPERATION, source))?;

    let now = now_ms();
    let mut new_ids: HashMap<String, String> = HashMap::with_capacity(visits.len());
    let mut ops = Vec::with_capacity(visits.len());
    for visit in &visits {
        let source_doc = &visit.document;
        let new_id = if visit.depth == 0 {
            target_id.clone()
        } else {
            derived_id(&target_id, source_doc.id())
        };
        new_ids.insert(source_doc.id().to_string(), new_id.clone());
        let root_name = (visit.depth == 0).then_some(name.as_str());
        ops.push(WriteOp::Put(copy_document(
            source_doc, new_id, root_name, &new_ids, now,
        )));
    }

    let report = commit_in_order(store, OPERATION, &target_root, ops, options).await?;
    info!(
        target: "trainlog",
        event = "duplicate_complete",
        source = %source_root,
        target = %target_root,
        name = %name,
        documents_created = report.ops,
        batches = report.batches,
        resumed = resume
    );
    Ok(DuplicateOutcome {
        root: target_root,
        name,
        documents_created: report.ops,
        batches: report.batches,
        resumed: resume,
    })
}

/// Whether `target` can be an earlier, possibly interrupted, copy of `source`:
/// its name is a "Copy N" of the source's base name and every child it already
/// has carries an id derived from one of the source's children.
async fn is_partial_copy<S: HierarchyStore>(
    store: &S,
    source: &Document,
    target: &Document,
) -> StoreResult<bool> {
    let (Some(source_name), Some(target_name)) = (source.name(), target.name()) else {
        return Ok(false);
    };
    let target_base = base_name(target_name);
    if target_name == source_name
        || target_base == target_name
        || target_base != base_name(source_name)
    {
        return Ok(false);
    }

    let (Some(source_children), Some(target_children)) =
        (source.doc_ref().children(), target.doc_ref().children())
    else {
        return Ok(true);
    };
    let expected: HashSet<String> = store
        .list_children(&source_children)
        .await?
        .iter()
        .map(|child| derived_id(target.id(), child.id()))
        .collect();
    Ok(store
        .list_children(&target_children)
        .await?
        .iter()
        .all(|child| expected.contains(child.id())))
}

/// New id for an ancestor: remapped when it lies inside the copied subtree,
/// unchanged when it lies above the copy root.
fn ancestor(new_ids: &HashMap<String, String>, id: &str) -> String {
    new_ids.get(id).cloned().unwrap_or_else(|| id.to_string())
}

fn copy_document(
    source: &Document,
    id: String,
    name: Option<&str>,
    new_ids: &HashMap<String, String>,
    now: i64,
) -> Document {
    let rename = |original: &str| name.unwrap_or(original).to_string();
    match source {
        Document::Program(p) => Document::Program(Program {
            id,
            name: rename(&p.name),
            owner_id: p.owner_id.clone(),
            created_at: now,
            updated_at: now,
        }),
        Document::Week(w) => Document::Week(Week {
            id,
            program_id: w.program_id.clone(),
            name: rename(&w.name),
            order_index: w.order_index,
            notes: w.notes.clone(),
            owner_id: w.owner_id.clone(),
            created_at: now,
            updated_at: now,
        }),
        Document::Workout(w) => Document::Workout(Workout {
            id,
            program_id: w.program_id.clone(),
            week_id: ancestor(new_ids, &w.week_id),
            name: rename(&w.name),
            day_of_week: w.day_of_week,
            order_index: w.order_index,
            owner_id: w.owner_id.clone(),
            created_at: now,
            updated_at: now,
        }),
        Document::Exercise(e) => Document::Exercise(Exercise {
            id,
            program_id: e.program_id.clone(),
            week_id: ancestor(new_ids, &e.week_id),
            workout_id: ancestor(new_ids, &e.workout_id),
            name: rename(&e.name),
            exercise_type: e.exercise_type.clone(),
            order_index: e.order_index,
            owner_id: e.owner_id.clone(),
            created_at: now,
            updated_at: now,
        }),
        Document::Set(s) => Document::Set(ExerciseSet {
            id,
            program_id: s.program_id.clone(),
            week_id: ancestor(new_ids, &s.week_id),
            workout_id: ancestor(new_ids, &s.workout_id),
            exercise_id: ancestor(new_ids, &s.exercise_id),
            set_number: s.set_number,
            reps: s.reps,
            weight: s.weight,
            duration: s.duration,
            checked: false,
            completed_at: None,
            notes: s.notes.clone(),
            owner_id: s.owner_id.clone(),
            created_at: now,
            updated_at: now,
        }),
    }
}
