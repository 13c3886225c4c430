use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::batch::{WriteBudget, DEFAULT_SAFETY_MARGIN};
use crate::store::DEFAULT_MAX_BATCH_OPS;

pub const DB_ENV: &str = "TRAINLOG_DB";
pub const BATCH_LIMIT_ENV: &str = "TRAINLOG_BATCH_LIMIT";
pub const BATCH_MARGIN_ENV: &str = "TRAINLOG_BATCH_MARGIN";
pub const LOG_ENV: &str = "TRAINLOG_LOG";

pub const DEFAULT_LOG_FILTER: &str = "trainlog=info,sqlx=warn";
const DB_FILE_NAME: &str = "trainlog.sqlite3";
const APP_DIR: &str = "trainlog";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub batch_limit: usize,
    pub batch_margin: usize,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable or non-positive
    /// numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match lookup(DB_ENV).filter(|value| !value.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let batch_limit = positive(lookup(BATCH_LIMIT_ENV)).unwrap_or(DEFAULT_MAX_BATCH_OPS);
        let batch_margin = positive(lookup(BATCH_MARGIN_ENV)).unwrap_or(DEFAULT_SAFETY_MARGIN);

        let log_filter = lookup(LOG_ENV)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            db_path,
            batch_limit,
            batch_margin,
            log_filter,
        })
    }

    pub fn budget(&self) -> WriteBudget {
        WriteBudget::new(self.batch_limit, self.batch_margin)
    }
}

fn positive(raw: Option<String>) -> Option<usize> {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
}

pub fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| env::current_dir().ok())
        .ok_or_else(|| anyhow!("failed to resolve application data directory"))?;
    Ok(base.join(APP_DIR).join(DB_FILE_NAME))
}
