//! Cascading delete, descendant counting and subtree duplication over a
//! Program → Week → Workout → Exercise → Set hierarchy.

pub mod batch;
pub mod config;
pub mod copy_name;
pub mod counter;
pub mod db;
pub mod deleter;
pub mod duplicator;
pub mod engine;
pub mod error;
pub mod guard;
pub mod id;
pub mod migrate;
pub mod model;
pub mod store;
pub mod time;
pub mod traversal;

pub use batch::{CascadeOptions, CascadeProgress, CascadeProgressObserver, WriteBudget};
pub use counter::DescendantCounts;
pub use deleter::DeleteOutcome;
pub use duplicator::DuplicateOutcome;
pub use engine::CascadeEngine;
pub use error::{AppError, AppResult, CascadeError};
pub use model::{DocRef, Document, ExerciseKey, Scope, SetKey, UserId, WeekKey, WorkoutKey};
pub use store::{memory::MemoryStore, sqlite::SqliteStore, HierarchyStore, StoreError};

/// Install the JSON tracing subscriber with `filter` as the `EnvFilter`
/// directive (normally `TRAINLOG_LOG`, see [`config::Config`]). Calling this
/// more than once is harmless.
pub fn init_logging(filter: &str) {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .json()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
