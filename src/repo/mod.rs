//! Repository (Postgres) connection pool and schema layer (A2 repository half, A5).
//!
//! The repository is the only component that needs a connection pool — Extractors and
//! Loaders each hold one dedicated connection per side (section 5). Built once at startup
//! and shared read-only (clone of the pool handle) across the process.

pub mod catalog;
pub mod ddl;
pub mod staging;

use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::config::ConnectionConfig;
use crate::error::PgCompareError;

/// Build a `deadpool-postgres` pool for the repository connection.
pub fn build_pool(conn: &ConnectionConfig) -> Result<Pool, PgCompareError> {
    let mut cfg = PoolConfig::new();
    cfg.host = Some(conn.host.clone());
    cfg.port = Some(conn.port);
    cfg.dbname = Some(conn.database.clone());
    cfg.user = conn.username.clone();
    cfg.password = conn.password.clone();
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
        PgCompareError::Connect {
            side: "repo".to_string(),
            message: e.to_string(),
        }
    })
}
