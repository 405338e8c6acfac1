//! # pgcompare
//!
//! Cross-dialect row-level database reconciliation: two tables in different engines are
//! compared by streaming their rows through a shared, dialect-normalized fingerprint and
//! diffing the resulting sets in a Postgres repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐
//! │ source engine│      │ target engine│
//! └──────┬───────┘      └───────┬──────┘
//!        │ Extractor            │ Extractor
//!        ▼                      ▼
//!   bounded queue           bounded queue
//!        │                      │
//!        ▼                      ▼
//!      Loader                 Loader
//!        │                      │
//!        ▼                      ▼
//! ┌─────────────────────────────────────┐
//! │   staging tables (repository, pg)    │
//! └──────────────────┬────────────────────┘
//!                     ▼
//!               Reconciler (compare)
//!                     │
//!                     ▼
//!                Rechecker (recheck)
//!                     │
//!                     ▼
//!               findings + report
//! ```

pub mod cast;
pub mod cli;
pub mod colmap;
pub mod config;
pub mod dialect;
pub mod discover;
pub mod engine;
pub mod error;
pub mod extract;
pub mod load;
pub mod model;
pub mod observer;
pub mod recheck;
pub mod reconcile;
pub mod repo;
pub mod report;
pub mod sync;

mod queue;
pub use queue::{BoundedQueue, QueueError};

/// Re-exports for convenient usage from the binary and integration tests.
pub mod prelude {
    pub use crate::cast::{CastCompiler, DataClass};
    pub use crate::colmap::{ColumnMap, ColumnMapEntry};
    pub use crate::config::{ConnectionConfig, Engine, Settings, SslMode};
    pub use crate::dialect::Dialect;
    pub use crate::error::PgCompareError;
    pub use crate::model::{FindingStatus, RowFingerprint, Side, StagingRow, TableEntry, TableMap};
    pub use crate::reconcile::{Reconciler, RunMode, RunOutcome};
}

pub use error::PgCompareError;
