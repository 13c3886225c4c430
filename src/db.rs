use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Sqlite, SqlitePool, Transaction};
use tracing::{error, info, warn};

/// Open (creating if needed) the database at `db_path` with WAL, full sync and
/// foreign keys enforced on every connection.
pub async fn open_sqlite_pool(db_path: &Path) -> AnyResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            error!(
                target: "trainlog",
                event = "db_dir_create_failed",
                error = %e,
                path = %parent.display()
            );
            e
        })?;
    }
    info!(target: "trainlog", event = "db_path", path = %db_path.display());

    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_millis(5000))
        .log_statements(log::LevelFilter::Off);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(opts)
        .await
        .with_context(|| format!("open database {}", db_path.display()))?;

    log_effective_pragmas(&pool).await;
    Ok(pool)
}

async fn log_effective_pragmas(pool: &SqlitePool) {
    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let fks: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    info!(
        target: "trainlog",
        event = "db_open",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0,
        foreign_keys = %fks.0
    );

    if !jm.0.eq_ignore_ascii_case("wal") {
        warn!(
            target: "trainlog",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
}

/// Run work inside a transaction. Commits on success, rolls back on error.
pub async fn run_in_tx<R, E, F>(pool: &SqlitePool, f: F) -> Result<R, E>
where
    E: From<sqlx::Error>,
    F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<R, E>>,
{
    let mut tx = pool.begin().await.map_err(E::from)?;
    info!(target: "trainlog", event = "db_tx_begin");
    match f(&mut tx).await {
        Ok(val) => {
            tx.commit().await.map_err(E::from)?;
            info!(target: "trainlog", event = "db_tx_commit");
            Ok(val)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                error!(target: "trainlog", event = "db_tx_rollback_failed", error = %rb);
            } else {
                warn!(target: "trainlog", event = "db_tx_rollback");
            }
            Err(e)
        }
    }
}
