//! Entities of the training hierarchy and the composite keys that address them.
//!
//! Every non-root entity carries its full ancestor id chain. The keys below make
//! that chain explicit so a child collection can be addressed directly without
//! re-resolving any ancestor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the authenticated caller. Compared against `owner_id` on every
/// subtree root before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Program,
    Week,
    Workout,
    Exercise,
    Set,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Program => "program",
            EntityKind::Week => "week",
            EntityKind::Workout => "workout",
            EntityKind::Exercise => "exercise",
            EntityKind::Set => "set",
        }
    }

    /// Depth below the program root.
    pub fn depth(self) -> usize {
        match self {
            EntityKind::Program => 0,
            EntityKind::Week => 1,
            EntityKind::Workout => 2,
            EntityKind::Exercise => 3,
            EntityKind::Set => 4,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub program_id: String,
    pub week_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkoutKey {
    pub program_id: String,
    pub week_id: String,
    pub workout_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExerciseKey {
    pub program_id: String,
    pub week_id: String,
    pub workout_id: String,
    pub exercise_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetKey {
    pub program_id: String,
    pub week_id: String,
    pub workout_id: String,
    pub exercise_id: String,
    pub set_id: String,
}

impl WeekKey {
    pub fn new(program_id: impl Into<String>, week_id: impl Into<String>) -> Self {
        Self {
            program_id: program_id.into(),
            week_id: week_id.into(),
        }
    }

    pub fn workout(&self, workout_id: impl Into<String>) -> WorkoutKey {
        WorkoutKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: workout_id.into(),
        }
    }
}

impl WorkoutKey {
    pub fn week(&self) -> WeekKey {
        WeekKey::new(self.program_id.clone(), self.week_id.clone())
    }

    pub fn exercise(&self, exercise_id: impl Into<String>) -> ExerciseKey {
        ExerciseKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.workout_id.clone(),
            exercise_id: exercise_id.into(),
        }
    }
}

impl ExerciseKey {
    pub fn workout(&self) -> WorkoutKey {
        WorkoutKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.workout_id.clone(),
        }
    }

    pub fn set(&self, set_id: impl Into<String>) -> SetKey {
        SetKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.workout_id.clone(),
            exercise_id: self.exercise_id.clone(),
            set_id: set_id.into(),
        }
    }
}

impl SetKey {
    pub fn exercise(&self) -> ExerciseKey {
        ExerciseKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.workout_id.clone(),
            exercise_id: self.exercise_id.clone(),
        }
    }
}

/// Address of a single document anywhere in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocRef {
    Program { program_id: String },
    Week(WeekKey),
    Workout(WorkoutKey),
    Exercise(ExerciseKey),
    Set(SetKey),
}

impl DocRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            DocRef::Program { .. } => EntityKind::Program,
            DocRef::Week(_) => EntityKind::Week,
            DocRef::Workout(_) => EntityKind::Workout,
            DocRef::Exercise(_) => EntityKind::Exercise,
            DocRef::Set(_) => EntityKind::Set,
        }
    }

    /// Id of the addressed document itself.
    pub fn id(&self) -> &str {
        match self {
            DocRef::Program { program_id } => program_id,
            DocRef::Week(k) => &k.week_id,
            DocRef::Workout(k) => &k.workout_id,
            DocRef::Exercise(k) => &k.exercise_id,
            DocRef::Set(k) => &k.set_id,
        }
    }

    /// Collection holding this document.
    pub fn collection(&self) -> Option<ChildCollection> {
        match self {
            DocRef::Program { .. } => None,
            DocRef::Week(k) => Some(ChildCollection::Weeks {
                program_id: k.program_id.clone(),
            }),
            DocRef::Workout(k) => Some(ChildCollection::Workouts(k.week())),
            DocRef::Exercise(k) => Some(ChildCollection::Exercises(k.workout())),
            DocRef::Set(k) => Some(ChildCollection::Sets(k.exercise())),
        }
    }

    /// The collection of this document's children, if its kind has any.
    pub fn children(&self) -> Option<ChildCollection> {
        match self {
            DocRef::Program { program_id } => Some(ChildCollection::Weeks {
                program_id: program_id.clone(),
            }),
            DocRef::Week(k) => Some(ChildCollection::Workouts(k.clone())),
            DocRef::Workout(k) => Some(ChildCollection::Exercises(k.clone())),
            DocRef::Exercise(k) => Some(ChildCollection::Sets(k.clone())),
            DocRef::Set(_) => None,
        }
    }

    /// Slash separated document path, e.g. `programs/p1/weeks/w1`.
    pub fn path(&self) -> String {
        match self {
            DocRef::Program { program_id } => format!("programs/{program_id}"),
            other => match other.collection() {
                Some(collection) => format!("{}/{}", collection.path(), other.id()),
                None => other.id().to_string(),
            },
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Address of a child collection under a fully specified parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum ChildCollection {
    Weeks { program_id: String },
    Workouts(WeekKey),
    Exercises(WorkoutKey),
    Sets(ExerciseKey),
}

impl ChildCollection {
    pub fn kind(&self) -> EntityKind {
        match self {
            ChildCollection::Weeks { .. } => EntityKind::Week,
            ChildCollection::Workouts(_) => EntityKind::Workout,
            ChildCollection::Exercises(_) => EntityKind::Exercise,
            ChildCollection::Sets(_) => EntityKind::Set,
        }
    }

    pub fn parent(&self) -> DocRef {
        match self {
            ChildCollection::Weeks { program_id } => DocRef::Program {
                program_id: program_id.clone(),
            },
            ChildCollection::Workouts(k) => DocRef::Week(k.clone()),
            ChildCollection::Exercises(k) => DocRef::Workout(k.clone()),
            ChildCollection::Sets(k) => DocRef::Exercise(k.clone()),
        }
    }

    /// Reference to the member of this collection with the given id.
    pub fn member(&self, id: impl Into<String>) -> DocRef {
        match self {
            ChildCollection::Weeks { program_id } => {
                DocRef::Week(WeekKey::new(program_id.clone(), id))
            }
            ChildCollection::Workouts(k) => DocRef::Workout(k.workout(id)),
            ChildCollection::Exercises(k) => DocRef::Exercise(k.exercise(id)),
            ChildCollection::Sets(k) => DocRef::Set(k.set(id)),
        }
    }

    pub fn path(&self) -> String {
        let segment = match self {
            ChildCollection::Weeks { .. } => "weeks",
            ChildCollection::Workouts(_) => "workouts",
            ChildCollection::Exercises(_) => "exercises",
            ChildCollection::Sets(_) => "sets",
        };
        format!("{}/{segment}", self.parent().path())
    }
}

impl fmt::Display for ChildCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub id: String,
    pub program_id: String,
    pub name: String,
    pub order_index: i64,
    #[serde(default)]
    pub notes: String,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Week {
    pub fn key(&self) -> WeekKey {
        WeekKey::new(self.program_id.clone(), self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub program_id: String,
    pub week_id: String,
    pub name: String,
    /// 0 = Monday .. 6 = Sunday; unscheduled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<i64>,
    pub order_index: i64,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Workout {
    pub fn key(&self) -> WorkoutKey {
        WorkoutKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub program_id: String,
    pub week_id: String,
    pub workout_id: String,
    pub name: String,
    pub exercise_type: String,
    pub order_index: i64,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Exercise {
    pub fn key(&self) -> ExerciseKey {
        ExerciseKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.workout_id.clone(),
            exercise_id: self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub id: String,
    pub program_id: String,
    pub week_id: String,
    pub workout_id: String,
    pub exercise_id: String,
    pub set_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ExerciseSet {
    pub fn key(&self) -> SetKey {
        SetKey {
            program_id: self.program_id.clone(),
            week_id: self.week_id.clone(),
            workout_id: self.workout_id.clone(),
            exercise_id: self.exercise_id.clone(),
            set_id: self.id.clone(),
        }
    }
}

/// A stored document of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Document {
    Program(Program),
    Week(Week),
    Workout(Workout),
    Exercise(Exercise),
    Set(ExerciseSet),
}

impl Document {
    pub fn kind(&self) -> EntityKind {
        match self {
            Document::Program(_) => EntityKind::Program,
            Document::Week(_) => EntityKind::Week,
            Document::Workout(_) => EntityKind::Workout,
            Document::Exercise(_) => EntityKind::Exercise,
            Document::Set(_) => EntityKind::Set,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Document::Program(p) => &p.id,
            Document::Week(w) => &w.id,
            Document::Workout(w) => &w.id,
            Document::Exercise(e) => &e.id,
            Document::Set(s) => &s.id,
        }
    }

    pub fn doc_ref(&self) -> DocRef {
        match self {
            Document::Program(p) => DocRef::Program {
                program_id: p.id.clone(),
            },
            Document::Week(w) => DocRef::Week(w.key()),
            Document::Workout(w) => DocRef::Workout(w.key()),
            Document::Exercise(e) => DocRef::Exercise(e.key()),
            Document::Set(s) => DocRef::Set(s.key()),
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Document::Program(p) => &p.owner_id,
            Document::Week(w) => &w.owner_id,
            Document::Workout(w) => &w.owner_id,
            Document::Exercise(e) => &e.owner_id,
            Document::Set(s) => &s.owner_id,
        }
    }

    /// Display name; sets have none.
    pub fn name(&self) -> Option<&str> {
        match self {
            Document::Program(p) => Some(&p.name),
            Document::Week(w) => Some(&w.name),
            Document::Workout(w) => Some(&w.name),
            Document::Exercise(e) => Some(&e.name),
            Document::Set(_) => None,
        }
    }

    /// Sibling ordering used when listing a collection.
    pub fn sort_key(&self) -> (i64, &str) {
        match self {
            Document::Program(p) => (p.created_at, &p.id),
            Document::Week(w) => (w.order_index, &w.id),
            Document::Workout(w) => (w.order_index, &w.id),
            Document::Exercise(e) => (e.order_index, &e.id),
            Document::Set(s) => (s.set_number, &s.id),
        }
    }
}

/// Root of a count, delete or duplicate operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    Week(WeekKey),
    Workout(WorkoutKey),
    Exercise(ExerciseKey),
}

impl Scope {
    pub fn root(&self) -> DocRef {
        match self {
            Scope::Week(k) => DocRef::Week(k.clone()),
            Scope::Workout(k) => DocRef::Workout(k.clone()),
            Scope::Exercise(k) => DocRef::Exercise(k.clone()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.root().kind()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root())
    }
}
