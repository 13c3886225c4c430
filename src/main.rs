use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use trainlog_lib::config::Config;
use trainlog_lib::db::open_sqlite_pool;
use trainlog_lib::migrate::{apply_migrations, migration_names};
use trainlog_lib::model::{ExerciseKey, Scope, UserId, WeekKey, WorkoutKey};
use trainlog_lib::{AppError, CascadeEngine, CascadeError, CascadeOptions, SqliteStore};

const EXIT_OK: i32 = 0;
const EXIT_STORE_FAILURE: i32 = 1;
const EXIT_PERMISSION_DENIED: i32 = 2;
const EXIT_PARTIAL: i32 = 3;

#[derive(Debug, Parser)]
#[command(name = "trainlog", about = "Training program maintenance", version)]
struct Cli {
    /// Database path; overrides TRAINLOG_DB.
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,
    /// Show what a cascading delete would remove.
    Counts(TargetArgs),
    /// Delete a week, workout or exercise and everything under it.
    Delete(TargetArgs),
    /// Copy a week, workout or exercise next to the original.
    Duplicate(DuplicateArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Identity of the caller; must own the target.
    #[arg(long)]
    user: String,

    #[command(subcommand)]
    scope: ScopeArg,
}

#[derive(Debug, Args)]
struct DuplicateArgs {
    #[arg(long)]
    user: String,

    /// Finish an interrupted duplicate whose new root has this id.
    #[arg(long, value_name = "ID")]
    resume: Option<String>,

    #[command(subcommand)]
    scope: ScopeArg,
}

#[derive(Debug, Subcommand)]
enum ScopeArg {
    Week {
        #[arg(long)]
        program: String,
        #[arg(long)]
        week: String,
    },
    Workout {
        #[arg(long)]
        program: String,
        #[arg(long)]
        week: String,
        #[arg(long)]
        workout: String,
    },
    Exercise {
        #[arg(long)]
        program: String,
        #[arg(long)]
        week: String,
        #[arg(long)]
        workout: String,
        #[arg(long)]
        exercise: String,
    },
}

impl ScopeArg {
    fn into_scope(self) -> Scope {
        match self {
            ScopeArg::Week { program, week } => Scope::Week(WeekKey::new(program, week)),
            ScopeArg::Workout {
                program,
                week,
                workout,
            } => Scope::Workout(WorkoutKey {
                program_id: program,
                week_id: week,
                workout_id: workout,
            }),
            ScopeArg::Exercise {
                program,
                week,
                workout,
                exercise,
            } => Scope::Exercise(ExerciseKey {
                program_id: program,
                week_id: week,
                workout_id: workout,
                exercise_id: exercise,
            }),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            EXIT_STORE_FAILURE
        }
    };
    process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::from_env().context("load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    trainlog_lib::init_logging(&config.log_filter);

    let pool = open_sqlite_pool(&config.db_path).await?;
    apply_migrations(&pool).await.context("apply migrations")?;

    let store = SqliteStore::with_max_batch_ops(pool.clone(), config.batch_limit);
    let engine = CascadeEngine::with_options(
        store,
        CascadeOptions {
            budget: config.budget(),
            progress: None,
        },
    );

    let code = match cli.command {
        Commands::Migrate => {
            let applied: Vec<&str> = migration_names().collect();
            if cli.json {
                print_json(&json!({ "status": "ok", "migrations": applied }))?;
            } else {
                println!("schema up to date ({} migrations)", applied.len());
            }
            EXIT_OK
        }
        Commands::Counts(args) => {
            let scope = args.scope.into_scope();
            let counts = engine
                .get_cascade_delete_counts(&UserId::new(args.user), &scope)
                .await;
            if cli.json {
                print_json(&json!({ "scope": scope, "counts": counts }))?;
            } else {
                println!("{scope}: {counts}");
            }
            EXIT_OK
        }
        Commands::Delete(args) => {
            let scope = args.scope.into_scope();
            match engine.delete_cascade(&UserId::new(args.user), &scope).await {
                Ok(outcome) => {
                    if cli.json {
                        print_json(&outcome)?;
                    } else if outcome.already_absent {
                        println!("{scope}: already deleted");
                    } else {
                        println!(
                            "{scope}: deleted {} documents in {} batches",
                            outcome.documents_deleted, outcome.batches
                        );
                    }
                    EXIT_OK
                }
                Err(err) => report_failure(err, cli.json)?,
            }
        }
        Commands::Duplicate(args) => {
            let scope = args.scope.into_scope();
            let caller = UserId::new(args.user);
            let result = match args.resume.as_deref() {
                Some(target) => engine.resume_duplicate_scope(&caller, &scope, target).await,
                None => engine.duplicate_scope(&caller, &scope).await,
            };
            match result {
                Ok(outcome) => {
                    if cli.json {
                        print_json(&outcome)?;
                    } else {
                        println!(
                            "{scope}: copied to {} as \"{}\" ({} documents)",
                            outcome.root, outcome.name, outcome.documents_created
                        );
                    }
                    EXIT_OK
                }
                Err(err) => report_failure(err, cli.json)?,
            }
        }
    };

    pool.close().await;
    Ok(code)
}

fn exit_code(err: &CascadeError) -> i32 {
    match err {
        CascadeError::PermissionDenied { .. } => EXIT_PERMISSION_DENIED,
        CascadeError::PartialCommit { .. } => EXIT_PARTIAL,
        CascadeError::NotFound { .. }
        | CascadeError::ResumeMismatch { .. }
        | CascadeError::Store { .. } => EXIT_STORE_FAILURE,
    }
}

fn report_failure(err: CascadeError, json: bool) -> Result<i32> {
    let code = exit_code(&err);
    let app_error = AppError::from(err);
    if json {
        print_json(&app_error)?;
    } else {
        eprintln!("Error: {app_error}");
    }
    Ok(code)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{rendered}");
    Ok(())
}
