//! Rechecker (C8).
//!
//! "Check" mode: for each finding from a prior compare, re-reads the live row on both sides
//! through the same ColumnMap the Reconciler used, re-fingerprints it with the same client-side
//! MD5 logic (`crate::extract::fingerprint_row`), and reclassifies the finding as confirmed,
//! resolved, or still missing. Never touches the staging tables — only the original source and
//! target tables, and only for the rows named by prior findings.

use futures::StreamExt;
use serde_json::Value as JsonValue;

use crate::colmap::ColumnMap;
use crate::config::Engine;
use crate::dialect::Dialect;
use crate::engine::EngineConnector;
use crate::error::PgCompareError;
use crate::extract;
use crate::model::{Finding, FindingStatus, RecheckOutcome, RowFingerprint, Side, TableMap};

/// One finding's re-examined verdict.
#[derive(Debug, Clone)]
pub struct RecheckResult {
    pub side: Side,
    pub pk: JsonValue,
    pub status: FindingStatus,
    pub outcome: RecheckOutcome,
}

/// Re-examine every finding from the prior run. `source_map`/`target_map` and `column_map` must
/// be the same ones the original compare used, so a resolved finding's re-fingerprint is
/// computed the identical way.
pub async fn run(
    findings: Vec<Finding>,
    source_connector: &dyn EngineConnector,
    target_connector: &dyn EngineConnector,
    source_map: &TableMap,
    target_map: &TableMap,
    column_map: &ColumnMap,
    source_engine: Engine,
    target_engine: Engine,
) -> Result<Vec<RecheckResult>, PgCompareError> {
    let pk_aliases = column_map.pk_aliases();
    let mut results = Vec::with_capacity(findings.len());

    for finding in findings {
        let outcome = match finding.status {
            FindingStatus::NotEqual => {
                let source_row = fetch_fingerprint(
                    source_connector,
                    source_map,
                    column_map,
                    Side::Source,
                    source_engine,
                    &finding.pk,
                    &pk_aliases,
                )
                .await?;
                let target_row = fetch_fingerprint(
                    target_connector,
                    target_map,
                    column_map,
                    Side::Target,
                    target_engine,
                    &finding.pk,
                    &pk_aliases,
                )
                .await?;
                match (source_row, target_row) {
                    (Some(s), Some(t)) if s.column_hash == t.column_hash => RecheckOutcome::Resolved,
                    _ => RecheckOutcome::Confirmed,
                }
            }
            FindingStatus::Missing => {
                // `finding.side` is the side that HAS the row (see `repo::staging::compare`);
                // the opposite side is the one that was missing it.
                let opposite = finding.side.other();

                let present_row = match finding.side {
                    Side::Source => {
                        fetch_fingerprint(
                            source_connector,
                            source_map,
                            column_map,
                            Side::Source,
                            source_engine,
                            &finding.pk,
                            &pk_aliases,
                        )
                        .await?
                    }
                    Side::Target => {
                        fetch_fingerprint(
                            target_connector,
                            target_map,
                            column_map,
                            Side::Target,
                            target_engine,
                            &finding.pk,
                            &pk_aliases,
                        )
                        .await?
                    }
                };
                let opposite_row = match opposite {
                    Side::Source => {
                        fetch_fingerprint(
                            source_connector,
                            source_map,
                            column_map,
                            Side::Source,
                            source_engine,
                            &finding.pk,
                            &pk_aliases,
                        )
                        .await?
                    }
                    Side::Target => {
                        fetch_fingerprint(
                            target_connector,
                            target_map,
                            column_map,
                            Side::Target,
                            target_engine,
                            &finding.pk,
                            &pk_aliases,
                        )
                        .await?
                    }
                };

                match (present_row, opposite_row) {
                    (Some(p), Some(o)) if p.column_hash == o.column_hash => RecheckOutcome::Resolved,
                    (Some(_), Some(_)) => RecheckOutcome::Confirmed,
                    _ => RecheckOutcome::StillMissing,
                }
            }
        };

        results.push(RecheckResult {
            side: finding.side,
            pk: finding.pk,
            status: finding.status,
            outcome,
        });
    }

    Ok(results)
}

async fn fetch_fingerprint(
    connector: &dyn EngineConnector,
    table_map: &TableMap,
    column_map: &ColumnMap,
    side: Side,
    engine: Engine,
    pk: &JsonValue,
    pk_aliases: &[&str],
) -> Result<Option<RowFingerprint>, PgCompareError> {
    let sql = build_select_by_pk(table_map, column_map, side, engine, pk)?;
    let mut rows = connector.stream_query(&sql).await?;
    let pk_count = column_map.pk_select_list(side).len();

    let row = match rows.next().await {
        Some(row) => row?,
        None => return Ok(None),
    };
    let (pk_values, column_values) = row.split_at(pk_count.min(row.len()));
    Ok(Some(extract::fingerprint_row(table_map.tid, pk_aliases, pk_values, column_values)))
}

/// Build `SELECT <column map's select list> FROM <table> WHERE <pk predicates>` against one
/// side's original table, keyed by the finding's stored `pk` JSON.
fn build_select_by_pk(
    table_map: &TableMap,
    column_map: &ColumnMap,
    side: Side,
    engine: Engine,
    pk: &JsonValue,
) -> Result<String, PgCompareError> {
    let dialect = engine.dialect();
    let schema = dialect.quote(&table_map.schema_name, table_map.preserve_case_schema);
    let table = dialect.quote(&table_map.table_name, table_map.preserve_case_table);
    let select_list = column_map.select_list(side).join(", ");

    let pk_obj = pk
        .as_object()
        .ok_or_else(|| PgCompareError::Repo("recheck: finding pk is not a JSON object".to_string()))?;

    let mut predicates = Vec::new();
    for entry in column_map.pk_entries() {
        let column = match side {
            Side::Source => entry.source.as_ref(),
            Side::Target => entry.target.as_ref(),
        };
        let Some(column) = column else { continue };

        let value = pk_obj
            .get(&entry.column_alias)
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let quoted_column = dialect.quote(&column.column_name, column.preserve_case);
        let escaped = value.replace('\'', "''");
        predicates.push(format!("{quoted_column} = '{escaped}'"));
    }

    if predicates.is_empty() {
        return Err(PgCompareError::Repo(
            "recheck: no primary key predicates resolved for this side".to_string(),
        ));
    }

    Ok(format!(
        "SELECT {select_list} FROM {schema}.{table} WHERE {}",
        predicates.join(" AND ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::CastCompiler;
    use crate::colmap::compile_column_map;
    use crate::config::NumericCastMode;
    use crate::dialect::ColumnInfo;
    use std::collections::HashMap;

    fn col(name: &str, data_type: &str, pk: bool) -> ColumnInfo {
        ColumnInfo {
            owner: "public".to_string(),
            table_name: "emp".to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            data_length: None,
            data_precision: Some(10),
            data_scale: Some(0),
            nullable: !pk,
            primary_key: pk,
        }
    }

    fn sample_map() -> ColumnMap {
        let source = vec![col("id", "integer", true), col("name", "varchar", false)];
        let target = vec![col("id", "integer", true), col("name", "varchar", false)];
        let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
        compile_column_map(&source, &target, Engine::Postgres, Engine::Postgres, &cast, &HashMap::new()).unwrap()
    }

    fn sample_table_map(origin: Side) -> TableMap {
        TableMap {
            tid: 1,
            origin,
            schema_name: "public".to_string(),
            table_name: "emp".to_string(),
            mod_column: None,
            table_filter: None,
            preserve_case_schema: false,
            preserve_case_table: false,
        }
    }

    #[test]
    fn test_build_select_by_pk_embeds_escaped_value() {
        let map = sample_map();
        let table_map = sample_table_map(Side::Source);
        let pk = serde_json::json!({"id": "O'Brien"});
        let sql = build_select_by_pk(&table_map, &map, Side::Source, Engine::Postgres, &pk).unwrap();
        assert!(sql.contains("O''Brien"));
        assert!(sql.starts_with("SELECT"));
        assert!(sql.contains("FROM public.emp"));
    }

    #[tokio::test]
    async fn test_missing_finding_resolves_when_row_now_matches() {
        use crate::engine::MockConnector;

        let map = sample_map();
        let source_map = sample_table_map(Side::Source);
        let target_map = sample_table_map(Side::Target);

        let source_connector = MockConnector {
            engine: Engine::Postgres,
            rows: vec![vec![Some("2".to_string()), Some("B".to_string())]],
        };
        let target_connector = MockConnector {
            engine: Engine::Postgres,
            rows: vec![vec![Some("2".to_string()), Some("B".to_string())]],
        };

        let finding = Finding {
            tid: 1,
            batch_nbr: 1,
            side: Side::Source,
            pk: serde_json::json!({"id": "2"}),
            status: FindingStatus::Missing,
        };

        let results = run(
            vec![finding],
            &source_connector,
            &target_connector,
            &source_map,
            &target_map,
            &map,
            Engine::Postgres,
            Engine::Postgres,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, RecheckOutcome::Resolved);
    }

    #[tokio::test]
    async fn test_missing_finding_still_missing_when_opposite_side_empty() {
        use crate::engine::MockConnector;

        let map = sample_map();
        let source_map = sample_table_map(Side::Source);
        let target_map = sample_table_map(Side::Target);

        let source_connector = MockConnector {
            engine: Engine::Postgres,
            rows: vec![vec![Some("3".to_string()), Some("C".to_string())]],
        };
        let target_connector = MockConnector {
            engine: Engine::Postgres,
            rows: vec![],
        };

        let finding = Finding {
            tid: 1,
            batch_nbr: 1,
            side: Side::Source,
            pk: serde_json::json!({"id": "3"}),
            status: FindingStatus::Missing,
        };

        let results = run(
            vec![finding],
            &source_connector,
            &target_connector,
            &source_map,
            &target_map,
            &map,
            Engine::Postgres,
            Engine::Postgres,
        )
        .await
        .unwrap();

        assert_eq!(results[0].outcome, RecheckOutcome::StillMissing);
    }
}
