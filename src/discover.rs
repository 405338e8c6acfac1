//! Discovery (A6).
//!
//! `pgcompare discover --project P --alias A` scans both sides' information_schema-equivalent
//! catalogs through the dialect adapter (C1), creates or updates the `dc_table`/`dc_table_map`
//! rows, and compiles a `ColumnMap` with the same compiler (C3) the Reconciler uses — so
//! discovery and reconciliation never disagree about a column's canonical cast. Does not start
//! any Extractor/Loader/Observer.

use std::collections::HashMap;

use deadpool_postgres::Pool;
use futures::StreamExt;

use crate::cast::CastCompiler;
use crate::colmap::compile_column_map;
use crate::config::{ConnectionConfig, Settings};
use crate::dialect::ColumnInfo;
use crate::engine::{self, EngineConnector};
use crate::error::PgCompareError;
use crate::model::{Side, TableMap};
use crate::repo::catalog;

/// One table's discovery request: where it lives on each side, and how parallel its extraction
/// should run once reconciled.
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    pub project: i64,
    pub alias: String,
    pub parallel_degree: u32,
    pub source_schema: String,
    pub source_table: String,
    pub target_schema: String,
    pub target_table: String,
    pub mod_column: Option<String>,
    pub table_filter: Option<String>,
    pub preserve_case_schema: bool,
    pub preserve_case_table: bool,
    pub alias_overrides: HashMap<String, String>,
}

/// Discover one table: read both sides' columns, persist the table/table-map/column-map rows,
/// and return the assigned `tid`.
pub async fn run(
    repo_pool: &Pool,
    source_conn: &ConnectionConfig,
    target_conn: &ConnectionConfig,
    settings: &Settings,
    request: &DiscoverRequest,
) -> Result<i64, PgCompareError> {
    let source_connector = engine::connect(source_conn).await?;
    let target_connector = engine::connect(target_conn).await?;

    let source_columns = fetch_columns(&*source_connector, source_conn, &request.source_schema, &request.source_table).await?;
    let target_columns = fetch_columns(&*target_connector, target_conn, &request.target_schema, &request.target_table).await?;

    let tid = catalog::upsert_table(repo_pool, request.project, &request.alias, request.parallel_degree).await?;

    let source_map = TableMap {
        tid,
        origin: Side::Source,
        schema_name: request.source_schema.clone(),
        table_name: request.source_table.clone(),
        mod_column: request.mod_column.clone(),
        table_filter: request.table_filter.clone(),
        preserve_case_schema: request.preserve_case_schema,
        preserve_case_table: request.preserve_case_table,
    };
    let target_map = TableMap {
        tid,
        origin: Side::Target,
        schema_name: request.target_schema.clone(),
        table_name: request.target_table.clone(),
        mod_column: request.mod_column.clone(),
        table_filter: request.table_filter.clone(),
        preserve_case_schema: request.preserve_case_schema,
        preserve_case_table: request.preserve_case_table,
    };
    catalog::upsert_table_map(repo_pool, &source_map).await?;
    catalog::upsert_table_map(repo_pool, &target_map).await?;

    let column_hash_raw = matches!(settings.cast.column_hash_method, crate::config::ColumnHashMethod::Raw);
    let cast = CastCompiler::new(settings.cast.number_cast, settings.cast.float_cast, column_hash_raw);

    let column_map = compile_column_map(
        &source_columns,
        &target_columns,
        source_conn.engine,
        target_conn.engine,
        &cast,
        &request.alias_overrides,
    )?;

    catalog::upsert_column_map(repo_pool, tid, &column_map).await?;

    log::info!(
        "discovered tid={tid} alias={} ({} source columns, {} target columns, {} aligned entries)",
        request.alias,
        source_columns.len(),
        target_columns.len(),
        column_map.entries.len()
    );

    Ok(tid)
}

async fn fetch_columns(
    connector: &dyn EngineConnector,
    conn: &ConnectionConfig,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>, PgCompareError> {
    let dialect = conn.engine.dialect();
    let sql = dialect.select_columns_sql(schema, Some(table));
    let mut rows = connector.stream_query(&sql).await?;

    let mut columns = Vec::new();
    while let Some(row) = rows.next().await {
        columns.push(parse_column_row(&row?)?);
    }
    Ok(columns)
}

/// Every dialect's `select_columns_sql` projects the same nine-column shape (section 4.1):
/// `{owner, table_name, column_name, data_type, data_length, data_precision, data_scale,
/// nullable('Y'/'N'), pk('Y'/'N')}`.
fn parse_column_row(row: &[Option<String>]) -> Result<ColumnInfo, PgCompareError> {
    let get = |i: usize| -> Result<&str, PgCompareError> {
        row.get(i)
            .and_then(|v| v.as_deref())
            .ok_or_else(|| PgCompareError::Repo(format!("discovery: missing column projection field {i}")))
    };

    Ok(ColumnInfo {
        owner: get(0)?.to_string(),
        table_name: get(1)?.to_string(),
        column_name: get(2)?.to_string(),
        data_type: get(3)?.to_string(),
        data_length: row.get(4).and_then(|v| v.as_deref()).and_then(|s| s.parse().ok()),
        data_precision: row.get(5).and_then(|v| v.as_deref()).and_then(|s| s.parse().ok()),
        data_scale: row.get(6).and_then(|v| v.as_deref()).and_then(|s| s.parse().ok()),
        nullable: get(7)? == "Y",
        primary_key: get(8)? == "Y",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_row() {
        let row = vec![
            Some("public".to_string()),
            Some("emp".to_string()),
            Some("id".to_string()),
            Some("integer".to_string()),
            None,
            Some("10".to_string()),
            Some("0".to_string()),
            Some("N".to_string()),
            Some("Y".to_string()),
        ];
        let col = parse_column_row(&row).unwrap();
        assert_eq!(col.column_name, "id");
        assert!(col.primary_key);
        assert!(!col.nullable);
        assert_eq!(col.data_precision, Some(10));
    }

    #[test]
    fn test_parse_column_row_missing_field_errs() {
        let row = vec![Some("public".to_string())];
        assert!(parse_column_row(&row).is_err());
    }
}
