//! Top-level error hierarchy (A3, section 7).
//!
//! Per-module errors are `thiserror`-derived and aggregated here into one `PgCompareError` at
//! the CLI boundary, where [`PgCompareError::exit_code`] maps each kind to the process exit
//! code in section 6. A panicking worker task is never allowed to unwind across the spawn
//! boundary: its `JoinHandle` join error is converted into `PgCompareError::Extract`/`Load`.

use thiserror::Error;

use crate::cast::CastError;
use crate::colmap::ColMapError;
use crate::config::{ConnectionError, SettingsError};

pub type Result<T> = std::result::Result<T, PgCompareError>;

#[derive(Error, Debug)]
pub enum PgCompareError {
    /// Missing mandatory option, unknown dialect. Surfaced before any worker starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection failure to repo/source/target. Fatal to the table.
    #[error("connection error ({side}): {message}")]
    Connect { side: String, message: String },

    /// SQL failure during shard read. Fails that shard; no findings are written.
    #[error("extract error on tid={tid} shard={shard}: {message}")]
    Extract {
        tid: i64,
        shard: u32,
        message: String,
    },

    /// SQL failure on a staging insert batch. The batch is rolled back; loading continues.
    #[error("load error on tid={tid}: {message}")]
    Load { tid: i64, message: String },

    /// Column-map compiler could not align required primary keys across sides.
    #[error("column map error: {0}")]
    Map(#[from] ColMapError),

    /// Column type classified as UNSUPPORTED; the column is excluded from hashing, not fatal.
    #[error("unsupported column {column}: {reason}")]
    UnsupportedColumn { column: String, reason: String },

    /// Cast compilation failure.
    #[error("cast error: {0}")]
    Cast(#[from] CastError),

    /// Shutdown signal received; workers drained with no findings written for the in-flight
    /// table (staging rows remain for inspection).
    #[error("operation cancelled")]
    Cancel,

    /// Repository query failure (compare SQL, DDL, discovery, report).
    #[error("repository error: {0}")]
    Repo(String),

    #[error("database driver error ({engine}): {message}")]
    Driver { engine: String, message: String },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("report rendering error: {0}")]
    Report(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PgCompareError {
    /// Exit code mapping from section 6: 0 success is the absence of an error; 1 is any
    /// configuration or connection failure that prevented work from starting at all; 2 is
    /// reserved for "reconciliation reported out-of-sync rows" and is computed by the CLI
    /// from `RunHistory`, not from an error variant.
    pub fn exit_code(&self) -> i32 {
        match self {
            PgCompareError::Config(_) | PgCompareError::Connect { .. } | PgCompareError::Settings(_)
            | PgCompareError::Connection(_) | PgCompareError::Driver { .. } => 1,
            _ => 1,
        }
    }

    /// Whether this error represents a fatal, process-wide failure (section 7: "Fatal
    /// (non-recoverable per-process) errors are only those that prevent any work: unreadable
    /// config, repo connect failure"), as opposed to a per-table failure the Reconciler
    /// records and continues past.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PgCompareError::Config(_) | PgCompareError::Settings(_) | PgCompareError::Connection(_)
        ) || matches!(self, PgCompareError::Connect { side, .. } if side == "repo")
    }
}

/// Convert a panicking worker task's join error into the appropriate per-table error variant,
/// keeping panics from unwinding across the spawn boundary.
pub fn join_error_to_extract(tid: i64, shard: u32, err: tokio::task::JoinError) -> PgCompareError {
    PgCompareError::Extract {
        tid,
        shard,
        message: format!("extractor task panicked: {err}"),
    }
}

pub fn join_error_to_load(tid: i64, err: tokio::task::JoinError) -> PgCompareError {
    PgCompareError::Load {
        tid,
        message: format!("loader task panicked: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_connect_is_fatal() {
        let err = PgCompareError::Connect {
            side: "repo".to_string(),
            message: "timed out".to_string(),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn test_source_connect_is_not_fatal() {
        let err = PgCompareError::Connect {
            side: "source".to_string(),
            message: "timed out".to_string(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_error_exit_code() {
        let err = PgCompareError::Config("missing repo-host".to_string());
        assert_eq!(err.exit_code(), 1);
    }
}
