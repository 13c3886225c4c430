use crate::batch::CascadeOptions;
use crate::copy_name;
use crate::counter::{self, DescendantCounts};
use crate::deleter::{self, DeleteOutcome};
use crate::duplicator::{self, DuplicateOutcome};
use crate::error::CascadeError;
use crate::model::{Scope, UserId, WeekKey};
use crate::store::HierarchyStore;

/// Entry point for the count, delete and duplicate operations over one store.
///
/// Every call takes the caller identity explicitly; the engine holds no
/// per-user state and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct CascadeEngine<S> {
    store: S,
    options: CascadeOptions,
}

impl<S: HierarchyStore> CascadeEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, CascadeOptions::default())
    }

    pub fn with_options(store: S, options: CascadeOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &CascadeOptions {
        &self.options
    }

    /// Preview of what [`Self::delete_cascade`] would remove. Zero on any failure.
    pub async fn get_cascade_delete_counts(
        &self,
        caller: &UserId,
        scope: &Scope,
    ) -> DescendantCounts {
        counter::count_descendants(&self.store, caller, scope).await
    }

    pub async fn delete_cascade(
        &self,
        caller: &UserId,
        scope: &Scope,
    ) -> Result<DeleteOutcome, CascadeError> {
        deleter::delete_cascade(&self.store, caller, scope, &self.options).await
    }

    /// Copy a Week and everything under it; returns the new Week.
    pub async fn duplicate_week(
        &self,
        caller: &UserId,
        week: &WeekKey,
    ) -> Result<WeekKey, CascadeError> {
        let outcome = self.duplicate_scope(caller, &Scope::Week(week.clone())).await?;
        Ok(week_of(outcome, week))
    }

    /// Complete a Week duplicate that stopped part-way, reusing `target_week_id`.
    pub async fn resume_duplicate_week(
        &self,
        caller: &UserId,
        source: &WeekKey,
        target_week_id: &str,
    ) -> Result<WeekKey, CascadeError> {
        let outcome = self
            .resume_duplicate_scope(caller, &Scope::Week(source.clone()), target_week_id)
            .await?;
        Ok(week_of(outcome, source))
    }

    pub async fn duplicate_scope(
        &self,
        caller: &UserId,
        source: &Scope,
    ) -> Result<DuplicateOutcome, CascadeError> {
        duplicator::duplicate(&self.store, caller, source, &self.options).await
    }

    pub async fn resume_duplicate_scope(
        &self,
        caller: &UserId,
        source: &Scope,
        target_id: &str,
    ) -> Result<DuplicateOutcome, CascadeError> {
        duplicator::resume_duplicate(&self.store, caller, source, target_id, &self.options).await
    }

    pub fn generate_copy_name<N: AsRef<str>>(
        &self,
        source_name: &str,
        sibling_names: &[N],
    ) -> String {
        copy_name::generate_copy_name(source_name, sibling_names)
    }
}

// A week copy always lands in the source week's program.
fn week_of(outcome: DuplicateOutcome, source: &WeekKey) -> WeekKey {
    outcome.week_key().unwrap_or_else(|| {
        WeekKey::new(source.program_id.clone(), outcome.root.id().to_string())
    })
}
