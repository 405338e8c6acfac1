//! End-to-end pipeline coverage against mocked connectors (A9).
//!
//! Exercises the Extractor → queue → fingerprint path and the Rechecker's reclassification
//! logic without a live database, using `engine::MockConnector` (available outside unit tests
//! via the `test-util` feature). This does NOT cover the repository-side `repo::staging`
//! compare/load-findings SQL, which only runs against a real Postgres pool and stays covered by
//! that module's own `#[cfg(test)]` unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pgcompare::cast::CastCompiler;
use pgcompare::colmap::compile_column_map;
use pgcompare::config::{Engine, NumericCastMode};
use pgcompare::dialect::ColumnInfo;
use pgcompare::engine::MockConnector;
use pgcompare::extract::{self, BatchSink, ExtractorConfig};
use pgcompare::model::{Finding, FindingStatus, RecheckOutcome, Side, TableMap};
use pgcompare::recheck;
use pgcompare::sync::{SideSync, ThrottleFlag};
use pgcompare::BoundedQueue;

fn col(name: &str, pk: bool) -> ColumnInfo {
    ColumnInfo {
        owner: "public".to_string(),
        table_name: "emp".to_string(),
        column_name: name.to_string(),
        data_type: "varchar".to_string(),
        data_length: Some(64),
        data_precision: None,
        data_scale: None,
        nullable: !pk,
        primary_key: pk,
    }
}

fn table_map(origin: Side) -> TableMap {
    TableMap {
        tid: 7,
        origin,
        schema_name: "public".to_string(),
        table_name: "emp".to_string(),
        mod_column: None,
        table_filter: None,
        preserve_case_schema: false,
        preserve_case_table: false,
    }
}

/// Drives `extract::run_shard` for one side straight into a `BoundedQueue`, draining it
/// manually (standing in for what a Loader would do) and returning the fingerprints it saw.
async fn extract_all(connector: &MockConnector, side: Side) -> Vec<pgcompare::model::RowFingerprint> {
    let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
    let column_map = compile_column_map(
        &[col("id", true), col("name", false)],
        &[col("id", true), col("name", false)],
        Engine::Postgres,
        Engine::Postgres,
        &cast,
        &HashMap::new(),
    )
    .unwrap();
    let map = table_map(side);

    let (tx, mut rx) = BoundedQueue::channel(4);
    let sync = Arc::new(SideSync::new(1));
    let throttle = Arc::new(ThrottleFlag::new());
    let config = ExtractorConfig {
        tid: map.tid,
        shard: 0,
        shard_count: 1,
        batch_fetch_size: 2,
        batch_progress_report_size: 0,
        database_sort: false,
    };

    extract::run_shard(
        connector,
        &map,
        &column_map,
        side,
        Engine::Postgres,
        &config,
        BatchSink::Queued(tx),
        sync,
        throttle,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let mut seen = Vec::new();
    loop {
        match rx.poll(Duration::from_millis(100)).await {
            Ok(Some(batch)) if batch.is_empty() => break,
            Ok(Some(batch)) => seen.extend(batch),
            Ok(None) => panic!("extractor never sent its end-of-cursor sentinel"),
            Err(_closed) => break,
        }
    }
    seen
}

#[tokio::test]
async fn extractor_streams_mocked_rows_into_fingerprinted_batches() {
    let source = MockConnector {
        engine: Engine::Postgres,
        rows: vec![
            vec![Some("1".to_string()), Some("Alice".to_string())],
            vec![Some("2".to_string()), Some("Bob".to_string())],
            vec![Some("3".to_string()), Some("Carol".to_string())],
        ],
    };

    let fingerprints = extract_all(&source, Side::Source).await;

    assert_eq!(fingerprints.len(), 3);
    assert_eq!(fingerprints[0].pk.get("id"), Some(&"1".to_string()));
    // Every fingerprint is 32 lowercase hex chars, deterministic for identical row text.
    assert!(fingerprints.iter().all(|f| f.pk_hash.len() == 32 && f.column_hash.len() == 32));
    assert_ne!(fingerprints[0].column_hash, fingerprints[1].column_hash);
}

#[tokio::test]
async fn extractor_fingerprints_diverge_when_target_row_differs() {
    let source = MockConnector {
        engine: Engine::Postgres,
        rows: vec![vec![Some("1".to_string()), Some("Alice".to_string())]],
    };
    let target = MockConnector {
        engine: Engine::Postgres,
        rows: vec![vec![Some("1".to_string()), Some("ALICE".to_string())]],
    };

    let source_fp = extract_all(&source, Side::Source).await;
    let target_fp = extract_all(&target, Side::Target).await;

    assert_eq!(source_fp[0].pk_hash, target_fp[0].pk_hash);
    assert_ne!(source_fp[0].column_hash, target_fp[0].column_hash);
}

fn sample_column_map() -> pgcompare::colmap::ColumnMap {
    let cast = CastCompiler::new(NumericCastMode::Standard, NumericCastMode::Standard, false);
    compile_column_map(
        &[col("id", true), col("name", false)],
        &[col("id", true), col("name", false)],
        Engine::Postgres,
        Engine::Postgres,
        &cast,
        &HashMap::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn recheck_confirms_a_not_equal_finding_that_still_differs() {
    let column_map = sample_column_map();
    let source_map = table_map(Side::Source);
    let target_map = table_map(Side::Target);

    let source_connector = MockConnector {
        engine: Engine::Postgres,
        rows: vec![vec![Some("1".to_string()), Some("Alice".to_string())]],
    };
    let target_connector = MockConnector {
        engine: Engine::Postgres,
        rows: vec![vec![Some("1".to_string()), Some("ALICE".to_string())]],
    };

    let finding = Finding {
        tid: source_map.tid,
        batch_nbr: 1,
        side: Side::Source,
        pk: serde_json::json!({"id": "1"}),
        status: FindingStatus::NotEqual,
    };

    let results = recheck::run(
        vec![finding],
        &source_connector,
        &target_connector,
        &source_map,
        &target_map,
        &column_map,
        Engine::Postgres,
        Engine::Postgres,
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, RecheckOutcome::Confirmed);
}

#[tokio::test]
async fn recheck_resolves_a_missing_finding_once_both_sides_agree() {
    let column_map = sample_column_map();
    let source_map = table_map(Side::Source);
    let target_map = table_map(Side::Target);

    // Both sides now carry the row that was missing from the target at compare time.
    let source_connector = MockConnector {
        engine: Engine::Postgres,
        rows: vec![vec![Some("9".to_string()), Some("Dana".to_string())]],
    };
    let target_connector = MockConnector {
        engine: Engine::Postgres,
        rows: vec![vec![Some("9".to_string()), Some("Dana".to_string())]],
    };

    let finding = Finding {
        tid: source_map.tid,
        batch_nbr: 1,
        side: Side::Source,
        pk: serde_json::json!({"id": "9"}),
        status: FindingStatus::Missing,
    };

    let results = recheck::run(
        vec![finding],
        &source_connector,
        &target_connector,
        &source_map,
        &target_map,
        &column_map,
        Engine::Postgres,
        Engine::Postgres,
    )
    .await
    .unwrap();

    assert_eq!(results[0].outcome, RecheckOutcome::Resolved);
}
