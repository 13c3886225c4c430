//! Descendant counts used to preview what a cascading delete will remove.
//!
//! Counting is advisory: any failure, ownership rejection included, yields a
//! zero count and a warning instead of an error, so the preview never stands in
//! the way of the delete itself.

use std::fmt;

use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::CascadeError;
use crate::guard::ensure_owner;
use crate::model::{ChildCollection, ExerciseKey, Scope, UserId, WeekKey, WorkoutKey};
use crate::store::{HierarchyStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DescendantCounts {
    pub workouts: u64,
    pub exercises: u64,
    pub sets: u64,
}

impl DescendantCounts {
    pub fn total_items(&self) -> u64 {
        self.workouts + self.exercises + self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

fn plural(count: u64, singular: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {singular}s")
    }
}

/// "2 workouts, 6 exercises, 24 sets"; kinds with a zero count are left out.
impl fmt::Display for DescendantCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.workouts, "workout"),
            (self.exercises, "exercise"),
            (self.sets, "set"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, noun)| plural(count, noun))
        .collect();
        if parts.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

#[derive(Debug, Error)]
enum CountUnavailable {
    #[error(transparent)]
    Guard(#[from] CascadeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Count the descendants of `scope`. Never fails; see the module docs.
pub async fn count_descendants<S: HierarchyStore>(
    store: &S,
    caller: &UserId,
    scope: &Scope,
) -> DescendantCounts {
    match try_count(store, caller, scope).await {
        Ok(counts) => {
            debug!(
                target: "trainlog",
                event = "cascade_count",
                scope = %scope,
                workouts = counts.workouts,
                exercises = counts.exercises,
                sets = counts.sets
            );
            counts
        }
        Err(err) => {
            warn!(
                target: "trainlog",
                event = "cascade_count_unavailable",
                scope = %scope,
                error = %err
            );
            DescendantCounts::default()
        }
    }
}

async fn try_count<S: HierarchyStore>(
    store: &S,
    caller: &UserId,
    scope: &Scope,
) -> Result<DescendantCounts, CountUnavailable> {
    let _owned = ensure_owner(store, &scope.root(), caller).await?;
    let counts = match scope {
        Scope::Week(key) => count_week(store, key).await?,
        Scope::Workout(key) => {
            let (exercises, sets) = count_workout(store, key.clone()).await?;
            DescendantCounts {
                workouts: 0,
                exercises,
                sets,
            }
        }
        Scope::Exercise(key) => DescendantCounts {
            workouts: 0,
            exercises: 0,
            sets: count_sets(store, key).await?,
        },
    };
    Ok(counts)
}

async fn count_week<S: HierarchyStore>(
    store: &S,
    key: &WeekKey,
) -> Result<DescendantCounts, StoreError> {
    let workouts = store
        .list_children(&ChildCollection::Workouts(key.clone()))
        .await?;
    let per_workout = try_join_all(
        workouts
            .iter()
            .map(|workout| count_workout(store, key.workout(workout.id()))),
    )
    .await?;
    Ok(DescendantCounts {
        workouts: workouts.len() as u64,
        exercises: per_workout.iter().map(|(exercises, _)| exercises).sum(),
        sets: per_workout.iter().map(|(_, sets)| sets).sum(),
    })
}

/// (exercises, sets) under one workout. Exercises are listed because their ids
/// address the set collections; sets are counted server-side.
async fn count_workout<S: HierarchyStore>(
    store: &S,
    key: WorkoutKey,
) -> Result<(u64, u64), StoreError> {
    let exercises = store
        .list_children(&ChildCollection::Exercises(key.clone()))
        .await?;
    let collections: Vec<ChildCollection> = exercises
        .iter()
        .map(|exercise| ChildCollection::Sets(key.exercise(exercise.id())))
        .collect();
    let sets = try_join_all(
        collections
            .iter()
            .map(|collection| store.count_children(collection)),
    )
    .await?;
    Ok((exercises.len() as u64, sets.into_iter().sum()))
}

async fn count_sets<S: HierarchyStore>(store: &S, key: &ExerciseKey) -> Result<u64, StoreError> {
    store
        .count_children(&ChildCollection::Sets(key.clone()))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_non_zero_kinds() {
        let counts = DescendantCounts {
            workouts: 2,
            exercises: 6,
            sets: 24,
        };
        assert_eq!(counts.to_string(), "2 workouts, 6 exercises, 24 sets");
        assert_eq!(counts.total_items(), 32);
    }

    #[test]
    fn summary_uses_singular_and_skips_zero() {
        let counts = DescendantCounts {
            workouts: 0,
            exercises: 1,
            sets: 1,
        };
        assert_eq!(counts.to_string(), "1 exercise, 1 set");
        assert_eq!(DescendantCounts::default().to_string(), "nothing");
        assert!(DescendantCounts::default().is_empty());
    }
}
