#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use trainlog_lib::model::{Exercise, ExerciseSet, Program, Week, Workout};
use trainlog_lib::store::WriteBatch;
use trainlog_lib::{
    CascadeProgress, CascadeProgressObserver, Document, HierarchyStore, MemoryStore, SqliteStore,
    UserId, WeekKey,
};

pub const OWNER: &str = "athlete-1";
pub const INTRUDER: &str = "athlete-2";
pub const PROGRAM: &str = "prog-1";

pub fn owner() -> UserId {
    UserId::new(OWNER)
}

pub fn intruder() -> UserId {
    UserId::new(INTRUDER)
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    trainlog_lib::migrate::apply_migrations(&pool)
        .await
        .expect("apply migrations");
    pool
}

pub async fn sqlite_store() -> SqliteStore {
    SqliteStore::new(memory_pool().await)
}

pub async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar(&sql).fetch_one(pool).await.unwrap()
}

pub fn program(id: &str) -> Document {
    Document::Program(Program {
        id: id.into(),
        name: "Strength Block".into(),
        owner_id: OWNER.into(),
        created_at: 1,
        updated_at: 1,
    })
}

/// Shape of a seeded week: how many children each level gets.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    pub workouts: usize,
    pub exercises: usize,
    pub sets: usize,
}

pub const LEG_DAY: Shape = Shape {
    workouts: 2,
    exercises: 3,
    sets: 4,
};

/// A week and its whole subtree, parents before children. Every set is
/// completed so copies can be checked for the reset.
pub fn week_tree(week_id: &str, name: &str, order_index: i64, shape: Shape) -> Vec<Document> {
    let mut docs = vec![Document::Week(Week {
        id: week_id.into(),
        program_id: PROGRAM.into(),
        name: name.into(),
        order_index,
        notes: format!("{name} notes"),
        owner_id: OWNER.into(),
        created_at: 2,
        updated_at: 2,
    })];
    for w in 0..shape.workouts {
        let workout_id = format!("{week_id}-wo{w}");
        docs.push(Document::Workout(Workout {
            id: workout_id.clone(),
            program_id: PROGRAM.into(),
            week_id: week_id.into(),
            name: format!("Workout {w}"),
            day_of_week: Some(w as i64),
            order_index: w as i64,
            owner_id: OWNER.into(),
            created_at: 3,
            updated_at: 3,
        }));
        for e in 0..shape.exercises {
            let exercise_id = format!("{workout_id}-ex{e}");
            docs.push(Document::Exercise(Exercise {
                id: exercise_id.clone(),
                program_id: PROGRAM.into(),
                week_id: week_id.into(),
                workout_id: workout_id.clone(),
                name: format!("Exercise {e}"),
                exercise_type: if e % 2 == 0 { "strength" } else { "cardio" }.into(),
                order_index: e as i64,
                owner_id: OWNER.into(),
                created_at: 4,
                updated_at: 4,
            }));
            for s in 0..shape.sets {
                docs.push(Document::Set(ExerciseSet {
                    id: format!("{exercise_id}-set{s}"),
                    program_id: PROGRAM.into(),
                    week_id: week_id.into(),
                    workout_id: workout_id.clone(),
                    exercise_id: exercise_id.clone(),
                    set_number: s as i64 + 1,
                    reps: Some(8 + s as i64),
                    weight: Some(60.0 + 2.5 * s as f64),
                    duration: (e % 2 == 1).then_some(90),
                    checked: true,
                    completed_at: Some(1_700_000_000_000 + s as i64),
                    notes: Some(format!("set {s} of {exercise_id}")),
                    owner_id: OWNER.into(),
                    created_at: 5,
                    updated_at: 5,
                }));
            }
        }
    }
    docs
}

/// Commit `docs` in order through the store's own batches.
pub async fn seed<S: HierarchyStore>(store: &S, docs: Vec<Document>) {
    let limit = store.max_batch_ops();
    let mut batch = WriteBatch::new();
    for doc in docs {
        if batch.len() == limit {
            store.commit(std::mem::take(&mut batch)).await.expect("seed batch");
        }
        batch.put(doc);
    }
    if !batch.is_empty() {
        store.commit(batch).await.expect("seed batch");
    }
}

/// Program with the "Leg Day" week (2 workouts x 3 exercises x 4 sets) and a
/// small neighbouring week that must never be touched.
pub fn leg_day_docs() -> Vec<Document> {
    let mut docs = vec![program(PROGRAM)];
    docs.extend(week_tree("leg-day", "Leg Day", 0, LEG_DAY));
    docs.extend(week_tree(
        "week-2",
        "Week 2",
        1,
        Shape {
            workouts: 1,
            exercises: 1,
            sets: 2,
        },
    ));
    docs
}

pub fn leg_day_key() -> WeekKey {
    WeekKey::new(PROGRAM, "leg-day")
}

pub fn neighbour_key() -> WeekKey {
    WeekKey::new(PROGRAM, "week-2")
}

/// Memory store seeded without going through commits, so injected commit
/// failures count from the first cascade batch.
pub fn memory_store_with(docs: Vec<Document>, max_batch_ops: usize) -> MemoryStore {
    let store = MemoryStore::with_max_batch_ops(max_batch_ops);
    for doc in docs {
        store.insert(doc);
    }
    store
}

pub fn progress_collector() -> (CascadeProgressObserver, Arc<Mutex<Vec<CascadeProgress>>>) {
    let records: Arc<Mutex<Vec<CascadeProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let observer_records = records.clone();
    let observer: CascadeProgressObserver = Arc::new(move |progress: CascadeProgress| {
        observer_records.lock().unwrap().push(progress);
    });
    (observer, records)
}
