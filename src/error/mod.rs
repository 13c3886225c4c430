use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DocRef, UserId};
use crate::store::StoreError;

pub const PERMISSION_DENIED_CODE: &str = "CASCADE/PERMISSION_DENIED";
pub const NOT_FOUND_CODE: &str = "CASCADE/NOT_FOUND";
pub const RESUME_MISMATCH_CODE: &str = "CASCADE/RESUME_MISMATCH";
pub const PARTIAL_CODE: &str = "CASCADE/PARTIAL";
pub const STORE_UNAVAILABLE_CODE: &str = "STORE/UNAVAILABLE";
pub const STORE_REJECTED_CODE: &str = "STORE/REJECTED";
pub const STORE_BATCH_TOO_LARGE_CODE: &str = "STORE/BATCH_TOO_LARGE";
pub const STORE_DECODE_CODE: &str = "STORE/DECODE";

/// Failure of a delete or duplicate operation.
///
/// `Store` means nothing was written: the failing call was a read or the first
/// batch. `PartialCommit` means earlier batches of the same invocation already
/// landed and were not undone.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("{caller} does not own {root}")]
    PermissionDenied { root: DocRef, caller: UserId },
    #[error("{root} does not exist")]
    NotFound { root: DocRef },
    #[error("{target} is not an interrupted copy of {original}")]
    ResumeMismatch { original: DocRef, target: DocRef },
    #[error("{operation} failed before any write landed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(
        "{operation} on {root} stopped after {committed_batches} of {total_batches} batches \
         ({committed_ops} operations committed): {source}"
    )]
    PartialCommit {
        operation: &'static str,
        root: DocRef,
        committed_batches: usize,
        total_batches: usize,
        committed_ops: usize,
        #[source]
        source: StoreError,
    },
}

impl CascadeError {
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        CascadeError::Store { operation, source }
    }

    /// True when some, but not all, of the operation's writes are committed.
    pub fn is_partial(&self) -> bool {
        matches!(self, CascadeError::PartialCommit { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            CascadeError::PermissionDenied { .. } => PERMISSION_DENIED_CODE,
            CascadeError::NotFound { .. } => NOT_FOUND_CODE,
            CascadeError::ResumeMismatch { .. } => RESUME_MISMATCH_CODE,
            CascadeError::PartialCommit { .. } => PARTIAL_CODE,
            CascadeError::Store { source, .. } => source.code(),
        }
    }
}

/// A structured error that can be serialized and surfaced to the UI or the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Human friendly message that can be shown directly to the user.
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Default code used when an upstream error does not expose a specific code.
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";
    pub const GENERIC_CODE: &'static str = "APP/GENERIC";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            let mut keys: Vec<_> = self.context.iter().collect();
            keys.sort();
            write!(f, "[{}] {} ({:?})", self.code, self.message, keys)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        let mut app_error = AppError::new(error.code(), error.to_string());
        if error.is_transient() {
            app_error = app_error.with_context("retryable", "true");
        }
        app_error
    }
}

impl From<CascadeError> for AppError {
    fn from(error: CascadeError) -> Self {
        let code = error.code();
        let message = error.to_string();
        match error {
            CascadeError::PermissionDenied { root, caller } => AppError::new(code, message)
                .with_context("root", root.path())
                .with_context("caller", caller.to_string()),
            CascadeError::NotFound { root } => {
                AppError::new(code, message).with_context("root", root.path())
            }
            CascadeError::ResumeMismatch { original, target } => AppError::new(code, message)
                .with_context("original", original.path())
                .with_context("target", target.path()),
            CascadeError::Store { operation, source } => AppError::new(code, message)
                .with_context("operation", operation)
                .with_context("completed", "none")
                .with_cause(source),
            CascadeError::PartialCommit {
                operation,
                root,
                committed_batches,
                total_batches,
                committed_ops,
                source,
            } => AppError::new(code, message)
                .with_context("operation", operation)
                .with_context("completed", "partial")
                .with_context("root", root.path())
                .with_context("committed_batches", committed_batches.to_string())
                .with_context("total_batches", total_batches.to_string())
                .with_context("committed_ops", committed_ops.to_string())
                .with_cause(source),
        }
    }
}
