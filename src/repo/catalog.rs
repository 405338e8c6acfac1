//! Catalog access: `dc_table` / `dc_table_map` / `dc_table_column_map` / `dc_table_history`.
//!
//! Discovery (A6) writes through this module; the Reconciler reads through it to resolve a
//! `--table`/`--batch` selector into the `TableEntry` + `TableMap` pair + `ColumnMap` it needs
//! to run a table end to end.

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde_json::Value as JsonValue;

use crate::cast::DataClass;
use crate::colmap::ColumnMap;
use crate::error::PgCompareError;
use crate::model::{ColumnMapEntry, ColumnSide, HistoryAction, Side, TableEntry, TableMap};

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Source => "source",
        Side::Target => "target",
    }
}

fn side_from_str(s: &str) -> Side {
    match s {
        "source" => Side::Source,
        _ => Side::Target,
    }
}

/// Look up an enabled table registered under `project` by its alias.
pub async fn find_table(
    pool: &Pool,
    project: i64,
    alias: &str,
) -> Result<Option<TableEntry>, PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let row = client
        .query_opt(
            "SELECT tid, pid, alias, enabled, batch_nbr, parallel_degree \
             FROM dc_table WHERE pid = $1 AND alias = $2",
            &[&project, &alias],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    Ok(row.map(|row| TableEntry {
        tid: row.get(0),
        project: row.get(1),
        alias: row.get(2),
        enabled: row.get(3),
        batch_nbr: row.get(4),
        parallel_degree: row.get::<_, i32>(5) as u32,
    }))
}

/// Every enabled table registered under `project` with the given `batch_nbr`.
pub async fn tables_for_batch(
    pool: &Pool,
    project: i64,
    batch_nbr: i64,
) -> Result<Vec<TableEntry>, PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let rows = client
        .query(
            "SELECT tid, pid, alias, enabled, batch_nbr, parallel_degree \
             FROM dc_table WHERE pid = $1 AND batch_nbr = $2 AND enabled = true \
             ORDER BY alias",
            &[&project, &batch_nbr],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    Ok(rows
        .iter()
        .map(|row| TableEntry {
            tid: row.get(0),
            project: row.get(1),
            alias: row.get(2),
            enabled: row.get(3),
            batch_nbr: row.get(4),
            parallel_degree: row.get::<_, i32>(5) as u32,
        })
        .collect())
}

/// Create (or update the identity of) a table registration, returning its `tid`.
pub async fn upsert_table(
    pool: &Pool,
    project: i64,
    alias: &str,
    parallel_degree: u32,
) -> Result<i64, PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let row = client
        .query_one(
            "INSERT INTO dc_table (pid, alias, parallel_degree) VALUES ($1, $2, $3) \
             ON CONFLICT (pid, alias) DO UPDATE SET parallel_degree = EXCLUDED.parallel_degree \
             RETURNING tid",
            &[&project, &alias, &(parallel_degree as i32)],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    Ok(row.get(0))
}

/// Both sides' `TableMap` for `tid`, in `(source, target)` order. Errs if either is missing.
pub async fn table_maps(pool: &Pool, tid: i64) -> Result<(TableMap, TableMap), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let rows = client
        .query(
            "SELECT dest_type, schema_name, table_name, mod_column, table_filter, \
             preserve_case_schema, preserve_case_table FROM dc_table_map WHERE tid = $1",
            &[&tid],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    let mut source = None;
    let mut target = None;

    for row in &rows {
        let dest_type: String = row.get(0);
        let map = TableMap {
            tid,
            origin: side_from_str(&dest_type),
            schema_name: row.get(1),
            table_name: row.get(2),
            mod_column: row.get(3),
            table_filter: row.get(4),
            preserve_case_schema: row.get(5),
            preserve_case_table: row.get(6),
        };
        match dest_type.as_str() {
            "source" => source = Some(map),
            _ => target = Some(map),
        }
    }

    match (source, target) {
        (Some(s), Some(t)) => Ok((s, t)),
        _ => Err(PgCompareError::Repo(format!(
            "tid={tid} is missing a source or target table map; run `discover` first"
        ))),
    }
}

/// Write (or replace) one side's `TableMap` for `tid`.
pub async fn upsert_table_map(pool: &Pool, map: &TableMap) -> Result<(), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    client
        .execute(
            "INSERT INTO dc_table_map \
             (tid, dest_type, schema_name, table_name, mod_column, table_filter, preserve_case_schema, preserve_case_table) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (tid, dest_type) DO UPDATE SET \
             schema_name = EXCLUDED.schema_name, table_name = EXCLUDED.table_name, \
             mod_column = EXCLUDED.mod_column, table_filter = EXCLUDED.table_filter, \
             preserve_case_schema = EXCLUDED.preserve_case_schema, preserve_case_table = EXCLUDED.preserve_case_table",
            &[
                &map.tid,
                &side_str(map.origin),
                &map.schema_name,
                &map.table_name,
                &map.mod_column,
                &map.table_filter,
                &map.preserve_case_schema,
                &map.preserve_case_table,
            ],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    Ok(())
}

/// Reconstruct the compiled `ColumnMap` discovery persisted for `tid`.
pub async fn column_map(pool: &Pool, tid: i64) -> Result<ColumnMap, PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let rows = client
        .query(
            "SELECT column_alias, dest_type, column_name, data_type, data_length, \
             data_precision, data_scale, nullable, pk, data_class, preserve_case, \
             value_expression, supported \
             FROM dc_table_column_map WHERE tid = $1 ORDER BY column_alias",
            &[&tid],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    use std::collections::BTreeMap;
    let mut by_alias: BTreeMap<String, ColumnMapEntry> = BTreeMap::new();

    for row in &rows {
        let alias: String = row.get(0);
        let dest_type: String = row.get(1);
        let column_name: Option<String> = row.get(2);
        let supported: bool = row.get(12);

        let side = column_name.map(|column_name| ColumnSide {
            column_name,
            data_type: row.get(3),
            data_length: row.get(4),
            data_precision: row.get(5),
            data_scale: row.get(6),
            nullable: row.get(7),
            primary_key: row.get(8),
            preserve_case: row.get(10),
            value_expression: row.get(11),
        });

        let data_class: Option<String> = row.get(9);
        let data_class = data_class.and_then(|dc| match dc.as_str() {
            "boolean" => Some(DataClass::Boolean),
            "numeric" => Some(DataClass::Numeric),
            "char" => Some(DataClass::Char),
            _ => None,
        });

        let entry = by_alias.entry(alias.clone()).or_insert_with(|| ColumnMapEntry {
            column_alias: alias.clone(),
            source: None,
            target: None,
            data_class,
            supported,
        });

        match dest_type.as_str() {
            "source" => entry.source = side,
            _ => entry.target = side,
        }
        entry.supported = entry.supported && supported;
    }

    Ok(ColumnMap {
        entries: by_alias.into_values().collect(),
    })
}

/// Persist a compiled `ColumnMap` for `tid`, replacing any prior mapping.
pub async fn upsert_column_map(pool: &Pool, tid: i64, map: &ColumnMap) -> Result<(), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;

    client
        .execute("DELETE FROM dc_table_column_map WHERE tid = $1", &[&tid])
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;

    for entry in &map.entries {
        for (dest_type, side) in [("source", &entry.source), ("target", &entry.target)] {
            let Some(side) = side else { continue };
            let data_class = entry.data_class.map(|dc| match dc {
                DataClass::Boolean => "boolean",
                DataClass::Numeric => "numeric",
                DataClass::Char => "char",
            });
            client
                .execute(
                    "INSERT INTO dc_table_column_map \
                     (tid, column_alias, dest_type, column_name, data_type, data_length, \
                      data_precision, data_scale, nullable, pk, data_class, preserve_case, \
                      value_expression, supported) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
                    &[
                        &tid,
                        &entry.column_alias,
                        &dest_type,
                        &side.column_name,
                        &side.data_type,
                        &side.data_length,
                        &side.data_precision,
                        &side.data_scale,
                        &side.nullable,
                        &side.primary_key,
                        &data_class,
                        &side.preserve_case,
                        &side.value_expression,
                        &entry.supported,
                    ],
                )
                .await
                .map_err(|e| PgCompareError::Repo(e.to_string()))?;
        }
    }

    Ok(())
}

fn history_action_str(action: HistoryAction) -> &'static str {
    match action {
        HistoryAction::Compare => "compare",
        HistoryAction::Check => "check",
    }
}

/// Record one run's start in `dc_table_history`, returning its row id-free key (tid/batch_nbr
/// pairs are not unique across runs, so the caller keeps the `start_ts` to close it out).
pub async fn record_history_start(
    pool: &Pool,
    tid: i64,
    action: HistoryAction,
    batch_nbr: i64,
) -> Result<DateTime<Utc>, PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    let start = Utc::now();
    client
        .execute(
            "INSERT INTO dc_table_history (tid, action, batch_nbr, start_ts) VALUES ($1, $2, $3, $4)",
            &[&tid, &history_action_str(action), &batch_nbr, &start],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    Ok(start)
}

/// Close out the most recent open history row for (tid, action, batch_nbr, start_ts) with an
/// end timestamp and a JSON result payload (typically a serialized `RunHistory`).
pub async fn record_history_end(
    pool: &Pool,
    tid: i64,
    action: HistoryAction,
    batch_nbr: i64,
    start_ts: DateTime<Utc>,
    result: JsonValue,
) -> Result<(), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    client
        .execute(
            "UPDATE dc_table_history SET end_ts = $1, result = $2 \
             WHERE tid = $3 AND action = $4 AND batch_nbr = $5 AND start_ts = $6",
            &[&Utc::now(), &result, &tid, &history_action_str(action), &batch_nbr, &start_ts],
        )
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))?;
    Ok(())
}

/// Duplicate a registered table (its `TableEntry`, both `TableMap`s, and its `ColumnMap`)
/// under a new alias in the same project, returning the new `tid`. Staging rows, findings,
/// and history are never copied — a fresh `tid` starts with a clean run history.
///
/// NOTE (section 9, Open Question #3): the source system builds a bind list for the target
/// schema/table override here and then issues the map INSERT with the *cloned* map's own
/// field values instead of that constructed list, so a `copy-table` invocation always
/// produces a byte-for-byte duplicate of the source map rather than applying any override.
/// That's preserved verbatim below rather than silently fixed — see DESIGN.md.
pub async fn copy_table(
    pool: &Pool,
    project: i64,
    from_alias: &str,
    to_alias: &str,
) -> Result<i64, PgCompareError> {
    let source = find_table(pool, project, from_alias).await?.ok_or_else(|| {
        PgCompareError::Repo(format!(
            "copy-table: no table registered under project={project} with alias '{from_alias}'"
        ))
    })?;

    let new_tid = upsert_table(pool, project, to_alias, source.parallel_degree).await?;

    let (source_map, target_map) = table_maps(pool, source.tid).await?;
    for map in [&source_map, &target_map] {
        let intended_binds = [map.schema_name.as_str(), map.table_name.as_str()];
        let _ = intended_binds; // constructed, then unused — see NOTE above

        let mut cloned = map.clone();
        cloned.tid = new_tid;
        upsert_table_map(pool, &cloned).await?;
    }

    let map = column_map(pool, source.tid).await?;
    upsert_column_map(pool, new_tid, &map).await?;

    Ok(new_tid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_round_trip() {
        assert_eq!(side_str(side_from_str("source")), "source");
        assert_eq!(side_str(side_from_str("target")), "target");
    }

    #[test]
    fn test_history_action_strings() {
        assert_eq!(history_action_str(HistoryAction::Compare), "compare");
        assert_eq!(history_action_str(HistoryAction::Check), "check");
    }
}
