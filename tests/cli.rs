#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::tempdir;
use trainlog_lib::SqliteStore;

#[path = "util.rs"]
mod util;

use util::{leg_day_docs, seed, INTRUDER, OWNER, PROGRAM};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_trainlog")
}

fn trainlog(db: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .arg("--db")
        .arg(db)
        .arg("--json")
        .args(args)
        .env("TRAINLOG_LOG", "off")
        .output()
        .expect("run trainlog")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("json on stdout")
}

async fn seeded_db(db: &Path) {
    let status = trainlog(db, &["migrate"]);
    assert!(status.status.success());
    let url = format!("sqlite://{}", db.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("open seeded db");
    seed(&SqliteStore::new(pool.clone()), leg_day_docs()).await;
    pool.close().await;
}

fn week_args<'a>(command: &'a str, user: &'a str) -> Vec<&'a str> {
    vec![command, "--user", user, "week", "--program", PROGRAM, "--week", "leg-day"]
}

#[tokio::test]
async fn migrate_creates_schema() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("trainlog.sqlite3");
    let output = trainlog(&db, &["migrate"]);
    assert!(output.status.success());
    assert!(db.exists());
    let report = stdout_json(&output);
    assert_eq!(report["status"], "ok");
    assert_eq!(report["migrations"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn counts_duplicate_and_delete_round() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("trainlog.sqlite3");
    seeded_db(&db).await;

    let output = trainlog(&db, &week_args("counts", OWNER));
    assert_eq!(output.status.code(), Some(0));
    let counts = stdout_json(&output);
    assert_eq!(counts["counts"]["workouts"], 2);
    assert_eq!(counts["counts"]["exercises"], 6);
    assert_eq!(counts["counts"]["sets"], 24);

    let output = trainlog(&db, &week_args("duplicate", OWNER));
    assert_eq!(output.status.code(), Some(0));
    let copy = stdout_json(&output);
    assert_eq!(copy["name"], "Leg Day Copy 1");
    assert_eq!(copy["documents_created"], 33);

    let output = trainlog(&db, &week_args("delete", OWNER));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["documents_deleted"], 33);

    let output = trainlog(&db, &week_args("delete", OWNER));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["already_absent"], true);
}

#[tokio::test]
async fn permission_denied_exits_with_two() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("trainlog.sqlite3");
    seeded_db(&db).await;

    let output = trainlog(&db, &week_args("delete", INTRUDER));
    assert_eq!(output.status.code(), Some(2));
    let error = stdout_json(&output);
    assert_eq!(error["code"], "CASCADE/PERMISSION_DENIED");

    // Counting never fails; an intruder just sees nothing.
    let output = trainlog(&db, &week_args("counts", INTRUDER));
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["counts"]["sets"], 0);
}
