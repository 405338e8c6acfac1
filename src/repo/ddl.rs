//! Repository DDL / init (A5).
//!
//! `pgcompare init` creates the nine `dc_*` tables (project/table/table_map/column_map,
//! source/target staging, source/target findings, table_history) from embedded SQL text if
//! they do not already exist. Idempotent, narrow, and outside the reconciliation hot path.

use deadpool_postgres::Pool;

use crate::error::PgCompareError;

const DDL_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS dc_project (
        pid SERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table (
        tid SERIAL PRIMARY KEY,
        pid INTEGER NOT NULL REFERENCES dc_project(pid),
        alias TEXT NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT true,
        batch_nbr BIGINT NOT NULL DEFAULT 1,
        parallel_degree INTEGER NOT NULL DEFAULT 1,
        UNIQUE (pid, alias)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table_map (
        tid INTEGER NOT NULL REFERENCES dc_table(tid),
        dest_type TEXT NOT NULL CHECK (dest_type IN ('source', 'target')),
        schema_name TEXT NOT NULL,
        table_name TEXT NOT NULL,
        mod_column TEXT,
        table_filter TEXT,
        preserve_case_schema BOOLEAN NOT NULL DEFAULT false,
        preserve_case_table BOOLEAN NOT NULL DEFAULT false,
        PRIMARY KEY (tid, dest_type)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table_column_map (
        tid INTEGER NOT NULL REFERENCES dc_table(tid),
        column_alias TEXT NOT NULL,
        dest_type TEXT NOT NULL CHECK (dest_type IN ('source', 'target')),
        column_name TEXT,
        data_type TEXT,
        data_length BIGINT,
        data_precision BIGINT,
        data_scale BIGINT,
        nullable BOOLEAN,
        pk BOOLEAN NOT NULL DEFAULT false,
        data_class TEXT,
        preserve_case BOOLEAN NOT NULL DEFAULT false,
        value_expression TEXT,
        supported BOOLEAN NOT NULL DEFAULT true,
        PRIMARY KEY (tid, column_alias, dest_type)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_source (
        tid INTEGER NOT NULL,
        batch_nbr BIGINT NOT NULL,
        pk_hash CHAR(32) NOT NULL,
        column_hash CHAR(32) NOT NULL,
        pk JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_target (
        tid INTEGER NOT NULL,
        batch_nbr BIGINT NOT NULL,
        pk_hash CHAR(32) NOT NULL,
        column_hash CHAR(32) NOT NULL,
        pk JSONB NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS dc_source_pk_hash_idx ON dc_source (tid, batch_nbr, pk_hash)"#,
    r#"CREATE INDEX IF NOT EXISTS dc_target_pk_hash_idx ON dc_target (tid, batch_nbr, pk_hash)"#,
    r#"CREATE TABLE IF NOT EXISTS dc_source_findings (
        tid INTEGER NOT NULL,
        batch_nbr BIGINT NOT NULL,
        pk JSONB NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('missing', 'not_equal'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_target_findings (
        tid INTEGER NOT NULL,
        batch_nbr BIGINT NOT NULL,
        pk JSONB NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('missing', 'not_equal'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dc_table_history (
        tid INTEGER NOT NULL REFERENCES dc_table(tid),
        action TEXT NOT NULL CHECK (action IN ('compare', 'check')),
        batch_nbr BIGINT NOT NULL,
        start_ts TIMESTAMPTZ NOT NULL,
        end_ts TIMESTAMPTZ,
        result JSONB
    )"#,
];

/// Create every `dc_*` table that does not already exist.
pub async fn init(pool: &Pool) -> Result<(), PgCompareError> {
    let client = pool
        .get()
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    for stmt in DDL_STATEMENTS {
        client
            .batch_execute(stmt)
            .await
            .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_statements_are_idempotent_create_if_not_exists() {
        for stmt in DDL_STATEMENTS {
            let normalized = stmt.to_uppercase();
            assert!(
                normalized.contains("IF NOT EXISTS"),
                "statement missing IF NOT EXISTS guard: {stmt}"
            );
        }
    }

    #[test]
    fn test_nine_core_tables_present() {
        let joined = DDL_STATEMENTS.join("\n");
        for table in [
            "dc_project",
            "dc_table",
            "dc_table_map",
            "dc_table_column_map",
            "dc_source",
            "dc_target",
            "dc_source_findings",
            "dc_target_findings",
            "dc_table_history",
        ] {
            assert!(joined.contains(table), "missing DDL for {table}");
        }
    }
}
