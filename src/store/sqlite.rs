use futures::FutureExt;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

use super::{HierarchyStore, StoreError, StoreResult, WriteBatch, WriteOp, DEFAULT_MAX_BATCH_OPS};
use crate::db::run_in_tx;
use crate::model::{
    ChildCollection, DocRef, Document, EntityKind, Exercise, ExerciseSet, Program, Week, Workout,
};

/// Store backed by the migrated SQLite schema. One batch is one transaction.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_batch_ops: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_max_batch_ops(pool, DEFAULT_MAX_BATCH_OPS)
    }

    pub fn with_max_batch_ops(pool: SqlitePool, max_batch_ops: usize) -> Self {
        Self {
            pool,
            max_batch_ops: max_batch_ops.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Program => "programs",
        EntityKind::Week => "weeks",
        EntityKind::Workout => "workouts",
        EntityKind::Exercise => "exercises",
        EntityKind::Set => "exercise_sets",
    }
}

/// WHERE clause and bind values selecting the members of `collection`.
fn collection_filter(collection: &ChildCollection) -> (String, Vec<String>) {
    match collection {
        ChildCollection::Weeks { program_id } => {
            ("program_id = ?1".to_string(), vec![program_id.clone()])
        }
        ChildCollection::Workouts(k) => (
            "program_id = ?1 AND week_id = ?2".to_string(),
            vec![k.program_id.clone(), k.week_id.clone()],
        ),
        ChildCollection::Exercises(k) => (
            "program_id = ?1 AND week_id = ?2 AND workout_id = ?3".to_string(),
            vec![
                k.program_id.clone(),
                k.week_id.clone(),
                k.workout_id.clone(),
            ],
        ),
        ChildCollection::Sets(k) => (
            "program_id = ?1 AND week_id = ?2 AND workout_id = ?3 AND exercise_id = ?4"
                .to_string(),
            vec![
                k.program_id.clone(),
                k.week_id.clone(),
                k.workout_id.clone(),
                k.exercise_id.clone(),
            ],
        ),
    }
}

fn doc_filter(doc: &DocRef) -> (String, Vec<String>) {
    match doc.collection() {
        Some(collection) => {
            let (filter, mut binds) = collection_filter(&collection);
            binds.push(doc.id().to_string());
            (format!("{filter} AND id = ?{}", binds.len()), binds)
        }
        None => ("id = ?1".to_string(), vec![doc.id().to_string()]),
    }
}

fn sibling_order(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Program => "created_at",
        EntityKind::Set => "set_number",
        _ => "order_index",
    }
}

fn decode(kind: EntityKind, row: &SqliteRow) -> Result<Document, sqlx::Error> {
    Ok(match kind {
        EntityKind::Program => Document::Program(Program {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }),
        EntityKind::Week => Document::Week(Week {
            id: row.try_get("id")?,
            program_id: row.try_get("program_id")?,
            name: row.try_get("name")?,
            order_index: row.try_get("order_index")?,
            notes: row.try_get("notes")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }),
        EntityKind::Workout => Document::Workout(Workout {
            id: row.try_get("id")?,
            program_id: row.try_get("program_id")?,
            week_id: row.try_get("week_id")?,
            name: row.try_get("name")?,
            day_of_week: row.try_get::<Option<i64>, _>("day_of_week")?,
            order_index: row.try_get("order_index")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }),
        EntityKind::Exercise => Document::Exercise(Exercise {
            id: row.try_get("id")?,
            program_id: row.try_get("program_id")?,
            week_id: row.try_get("week_id")?,
            workout_id: row.try_get("workout_id")?,
            name: row.try_get("name")?,
            exercise_type: row.try_get("exercise_type")?,
            order_index: row.try_get("order_index")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }),
        EntityKind::Set => Document::Set(ExerciseSet {
            id: row.try_get("id")?,
            program_id: row.try_get("program_id")?,
            week_id: row.try_get("week_id")?,
            workout_id: row.try_get("workout_id")?,
            exercise_id: row.try_get("exercise_id")?,
            set_number: row.try_get("set_number")?,
            reps: row.try_get::<Option<i64>, _>("reps")?,
            weight: row.try_get::<Option<f64>, _>("weight")?,
            duration: row.try_get::<Option<i64>, _>("duration")?,
            checked: row.try_get::<i64, _>("checked").map(|value| value != 0)?,
            completed_at: row.try_get::<Option<i64>, _>("completed_at")?,
            notes: row.try_get::<Option<String>, _>("notes")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }),
    })
}

async fn put_doc(conn: &mut SqliteConnection, doc: &Document) -> Result<(), sqlx::Error> {
    match doc {
        Document::Program(p) => {
            sqlx::query(
                "INSERT INTO programs (id, name, owner_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, \
                 owner_id = excluded.owner_id, updated_at = excluded.updated_at",
            )
            .bind(&p.id)
            .bind(&p.name)
            .bind(&p.owner_id)
            .bind(p.created_at)
            .bind(p.updated_at)
            .execute(conn)
            .await?;
        }
        Document::Week(w) => {
            sqlx::query(
                "INSERT INTO weeks (id, program_id, name, order_index, notes, owner_id, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(id) DO UPDATE SET program_id = excluded.program_id, \
                 name = excluded.name, order_index = excluded.order_index, notes = excluded.notes, \
                 owner_id = excluded.owner_id, updated_at = excluded.updated_at",
            )
            .bind(&w.id)
            .bind(&w.program_id)
            .bind(&w.name)
            .bind(w.order_index)
            .bind(&w.notes)
            .bind(&w.owner_id)
            .bind(w.created_at)
            .bind(w.updated_at)
            .execute(conn)
            .await?;
        }
        Document::Workout(w) => {
            sqlx::query(
                "INSERT INTO workouts (id, program_id, week_id, name, day_of_week, order_index, \
                 owner_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(id) DO UPDATE SET program_id = excluded.program_id, \
                 week_id = excluded.week_id, name = excluded.name, \
                 day_of_week = excluded.day_of_week, \
                 order_index = excluded.order_index, owner_id = excluded.owner_id, \
                 updated_at = excluded.updated_at",
            )
            .bind(&w.id)
            .bind(&w.program_id)
            .bind(&w.week_id)
            .bind(&w.name)
            .bind(w.day_of_week)
            .bind(w.order_index)
            .bind(&w.owner_id)
            .bind(w.created_at)
            .bind(w.updated_at)
            .execute(conn)
            .await?;
        }
        Document::Exercise(e) => {
            sqlx::query(
                "INSERT INTO exercises (id, program_id, week_id, workout_id, name, exercise_type, \
                 order_index, owner_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(id) DO UPDATE SET program_id = excluded.program_id, \
                 week_id = excluded.week_id, workout_id = excluded.workout_id, \
                 name = excluded.name, \
                 exercise_type = excluded.exercise_type, order_index = excluded.order_index, \
                 owner_id = excluded.owner_id, updated_at = excluded.updated_at",
            )
            .bind(&e.id)
            .bind(&e.program_id)
            .bind(&e.week_id)
            .bind(&e.workout_id)
            .bind(&e.name)
            .bind(&e.exercise_type)
            .bind(e.order_index)
            .bind(&e.owner_id)
            .bind(e.created_at)
            .bind(e.updated_at)
            .execute(conn)
            .await?;
        }
        Document::Set(s) => {
            sqlx::query(
                "INSERT INTO exercise_sets (id, program_id, week_id, workout_id, exercise_id, \
                 set_number, reps, weight, duration, checked, completed_at, notes, owner_id, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                 ?15) \
                 ON CONFLICT(id) DO UPDATE SET program_id = excluded.program_id, \
                 week_id = excluded.week_id, workout_id = excluded.workout_id, \
                 exercise_id = excluded.exercise_id, set_number = excluded.set_number, \
                 reps = excluded.reps, weight = excluded.weight, duration = excluded.duration, \
                 checked = excluded.checked, completed_at = excluded.completed_at, \
                 notes = excluded.notes, owner_id = excluded.owner_id, \
                 updated_at = excluded.updated_at",
            )
            .bind(&s.id)
            .bind(&s.program_id)
            .bind(&s.week_id)
            .bind(&s.workout_id)
            .bind(&s.exercise_id)
            .bind(s.set_number)
            .bind(s.reps)
            .bind(s.weight)
            .bind(s.duration)
            .bind(i64::from(s.checked))
            .bind(s.completed_at)
            .bind(s.notes.as_deref())
            .bind(&s.owner_id)
            .bind(s.created_at)
            .bind(s.updated_at)
            .execute(conn)
            .await?;
        }
    }
    Ok(())
}

async fn delete_doc(conn: &mut SqliteConnection, doc: &DocRef) -> Result<(), sqlx::Error> {
    let (filter, binds) = doc_filter(doc);
    let sql = format!("DELETE FROM {} WHERE {filter}", table(doc.kind()));
    let mut query = sqlx::query(&sql);
    for value in binds {
        query = query.bind(value);
    }
    query.execute(conn).await?;
    Ok(())
}

impl HierarchyStore for SqliteStore {
    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    async fn get(&self, doc: &DocRef) -> StoreResult<Option<Document>> {
        let kind = doc.kind();
        let (filter, binds) = doc_filter(doc);
        let sql = format!("SELECT * FROM {} WHERE {filter}", table(kind));
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|row| decode(kind, &row))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn list_children(&self, collection: &ChildCollection) -> StoreResult<Vec<Document>> {
        let kind = collection.kind();
        let (filter, binds) = collection_filter(collection);
        let sql = format!(
            "SELECT * FROM {} WHERE {filter} ORDER BY {}, id",
            table(kind),
            sibling_order(kind)
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode(kind, row).map_err(StoreError::from))
            .collect()
    }

    async fn count_children(&self, collection: &ChildCollection) -> StoreResult<u64> {
        let (filter, binds) = collection_filter(collection);
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {filter}",
            table(collection.kind())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.len() > self.max_batch_ops {
            return Err(StoreError::BatchTooLarge {
                staged: batch.len(),
                limit: self.max_batch_ops,
            });
        }
        let ops = batch.into_ops();
        run_in_tx(&self.pool, |tx| {
            async move {
                for op in &ops {
                    match op {
                        WriteOp::Put(doc) => put_doc(&mut **tx, doc).await?,
                        WriteOp::Delete(doc_ref) => delete_doc(&mut **tx, doc_ref).await?,
                    }
                }
                Ok::<_, StoreError>(())
            }
            .boxed()
        })
        .await
    }
}
