//! Extractor (C4).
//!
//! Streams one shard of one side's rows, computes each row's content-addressed fingerprint
//! client-side (MD5 over the ordered, dialect-normalized canonical text the cast compiler
//! emitted — see DESIGN.md's hash-computation-locus decision), and pushes fixed-size batches
//! onto the per-side bounded queue.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use md5::{Digest, Md5};
use tokio_util::sync::CancellationToken;

use deadpool_postgres::Pool;

use crate::config::Engine;
use crate::colmap::ColumnMap;
use crate::engine::EngineConnector;
use crate::error::PgCompareError;
use crate::load;
use crate::model::{RowFingerprint, Side, TableMap};
use crate::queue::QueueSender;
use crate::sync::{SideSync, ThrottleFlag};

/// Where an Extractor sends its finished batches: the normal bounded queue a Loader drains, or
/// (in `loader-threads=0` degraded mode, section 5's note) a direct staging insert that bypasses
/// the queue entirely, using the same insert shape a Loader would have used.
pub enum BatchSink {
    Queued(QueueSender),
    Direct {
        pool: Pool,
        side: Side,
        tid: i64,
        batch_nbr: i64,
        commit_size: usize,
    },
}

impl BatchSink {
    /// Send one non-empty batch onward. In `Direct` mode this also credits `sync`'s staged-row
    /// counter directly, since no Loader task exists to do it. `tid`/`shard` are only used to
    /// annotate a queue-closed error.
    async fn put(
        &self,
        batch: Vec<RowFingerprint>,
        sync: &SideSync,
        tid: i64,
        shard: u32,
    ) -> Result<(), PgCompareError> {
        match self {
            BatchSink::Queued(sender) => sender
                .put(batch)
                .await
                .map_err(|e| PgCompareError::Extract {
                    tid,
                    shard,
                    message: e.to_string(),
                }),
            BatchSink::Direct { pool, side, tid: d_tid, batch_nbr, commit_size } => {
                let len = batch.len();
                load::insert_directly(pool, *side, *d_tid, *batch_nbr, &batch, *commit_size).await?;
                sync.add_staged_rows(len as u64);
                Ok(())
            }
        }
    }

    /// End-of-cursor signal. `Queued` sends the empty sentinel batch the Loader watches for;
    /// `Direct` mode has no Loader waiting on one, so it's a no-op.
    async fn close(&self) {
        if let BatchSink::Queued(sender) = self {
            let _ = sender.put(Vec::new()).await;
        }
    }
}

/// Parameters an Extractor shard runs with, drawn from `AppConfig` and the Reconciler's
/// per-table plan.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub tid: i64,
    pub shard: u32,
    pub shard_count: u32,
    pub batch_fetch_size: usize,
    pub batch_progress_report_size: u64,
    pub database_sort: bool,
}

/// Given a TableMap, a compiled ColumnMap, a shard index, and a shard count, stream matching
/// rows and push fingerprint batches onto `queue`. Enqueues the empty sentinel batch and
/// marks the shard done in `sync` on normal end-of-cursor; any DB error aborts the shard.
pub async fn run_shard(
    connector: &dyn EngineConnector,
    table_map: &TableMap,
    column_map: &ColumnMap,
    side: Side,
    engine: Engine,
    config: &ExtractorConfig,
    sink: BatchSink,
    sync: Arc<SideSync>,
    throttle: Arc<ThrottleFlag>,
    cancel: CancellationToken,
) -> Result<(), PgCompareError> {
    let sql = build_select_sql(table_map, column_map, side, engine, config);

    let mut rows = connector
        .stream_query(&sql)
        .await
        .map_err(|e| PgCompareError::Extract {
            tid: config.tid,
            shard: config.shard,
            message: e.to_string(),
        })?;

    let pk_count = column_map.pk_select_list(side).len();
    let pk_aliases = column_map.pk_aliases();

    let mut batch = Vec::with_capacity(config.batch_fetch_size);
    let mut processed: u64 = 0;

    while let Some(row_result) = rows.next().await {
        if cancel.is_cancelled() {
            break;
        }

        let row = row_result.map_err(|e| PgCompareError::Extract {
            tid: config.tid,
            shard: config.shard,
            message: e.to_string(),
        })?;

        let (pk_values, column_values) = row.split_at(pk_count.min(row.len()));
        let fingerprint = fingerprint_row(config.tid, &pk_aliases, pk_values, column_values);
        batch.push(fingerprint);
        processed += 1;

        if batch.len() >= config.batch_fetch_size {
            wait_for_throttle(&throttle, &cancel).await;
            let to_send = std::mem::replace(&mut batch, Vec::with_capacity(config.batch_fetch_size));
            sink.put(to_send, &sync, config.tid, config.shard).await?;
        }

        if config.batch_progress_report_size > 0 && processed % config.batch_progress_report_size == 0 {
            log::info!(
                "tid={} shard={} side={} progress: {} rows",
                config.tid,
                config.shard,
                side.as_str(),
                processed
            );
        }
    }

    if !batch.is_empty() {
        sink.put(batch, &sync, config.tid, config.shard).await?;
    }

    // Sentinel: an empty batch signals end-of-cursor for this shard (no-op in Direct mode).
    sink.close().await;
    sync.extractor_done();

    Ok(())
}

async fn wait_for_throttle(throttle: &ThrottleFlag, cancel: &CancellationToken) {
    while throttle.is_set() {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub(crate) fn fingerprint_row(
    tid: i64,
    pk_aliases: &[&str],
    pk_values: &[Option<String>],
    column_values: &[Option<String>],
) -> RowFingerprint {
    let pk_text = concat_values(pk_values);
    let column_text = concat_values(column_values);

    let mut pk = BTreeMap::new();
    for (alias, value) in pk_aliases.iter().zip(pk_values.iter()) {
        pk.insert(alias.to_string(), value.clone().unwrap_or_default());
    }

    RowFingerprint {
        tid,
        pk_hash: md5_hex(&pk_text),
        column_hash: md5_hex(&column_text),
        pk,
    }
}

fn concat_values(values: &[Option<String>]) -> String {
    values
        .iter()
        .map(|v| v.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .concat()
}

fn md5_hex(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_select_sql(
    table_map: &TableMap,
    column_map: &ColumnMap,
    side: Side,
    engine: Engine,
    config: &ExtractorConfig,
) -> String {
    let dialect = engine.dialect();
    let schema = dialect.quote(&table_map.schema_name, table_map.preserve_case_schema);
    let table = dialect.quote(&table_map.table_name, table_map.preserve_case_table);

    let select_list = column_map.select_list(side).join(", ");

    let mut predicates = Vec::new();
    if let Some(filter) = &table_map.table_filter {
        predicates.push(format!("({filter})"));
    }

    if config.shard_count > 1 {
        if let Some(mod_column) = &table_map.mod_column {
            let quoted_mod_column = dialect.quote(mod_column, false);
            predicates.push(shard_predicate(engine, &quoted_mod_column, config.shard, config.shard_count));
        } else {
            log::warn!(
                "tid={} has no mod_column; running unsharded on side={}",
                config.tid,
                side.as_str()
            );
        }
    }

    let where_clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };

    let order_by = if config.database_sort {
        let pk_aliases: Vec<&str> = column_map.pk_aliases();
        if pk_aliases.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", pk_aliases.join(", "))
        }
    } else {
        String::new()
    };

    format!("SELECT {select_list} FROM {schema}.{table}{where_clause}{order_by}")
}

fn shard_predicate(engine: Engine, quoted_mod_column: &str, shard: u32, shard_count: u32) -> String {
    match engine {
        Engine::Postgres => format!(
            "mod(('x' || md5({quoted_mod_column}::text))::bit(32)::bigint, {shard_count}) = {shard}"
        ),
        Engine::Oracle => format!(
            "MOD(ORA_HASH(TO_CHAR({quoted_mod_column})), {shard_count}) = {shard}"
        ),
        Engine::MySql => format!(
            "MOD(CONV(SUBSTRING(MD5(CAST({quoted_mod_column} AS CHAR)), 1, 8), 16, 10), {shard_count}) = {shard}"
        ),
        Engine::SqlServer => format!(
            "ABS(CHECKSUM({quoted_mod_column})) % {shard_count} = {shard}"
        ),
        Engine::Db2 => format!(
            "MOD(HASH({quoted_mod_column}, 2), {shard_count}) = {shard}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex_is_32_lowercase_hex_chars() {
        let digest = md5_hex("hello");
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_concat_values_treats_none_as_empty() {
        let values = vec![Some("a".to_string()), None, Some("b".to_string())];
        assert_eq!(concat_values(&values), "ab");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let pk_aliases = vec!["id"];
        let pk_values = vec![Some("1".to_string())];
        let column_values = vec![Some("A".to_string()), Some("100.00".to_string())];

        let fp1 = fingerprint_row(1, &pk_aliases, &pk_values, &column_values);
        let fp2 = fingerprint_row(1, &pk_aliases, &pk_values, &column_values);
        assert_eq!(fp1.pk_hash, fp2.pk_hash);
        assert_eq!(fp1.column_hash, fp2.column_hash);
        assert_eq!(fp1.pk.get("id"), Some(&"1".to_string()));
    }

    #[test]
    fn test_fingerprint_sensitive_to_column_values() {
        let pk_aliases = vec!["id"];
        let pk_values = vec![Some("2".to_string())];
        let a = fingerprint_row(1, &pk_aliases, &pk_values, &[Some("50.00".to_string())]);
        let b = fingerprint_row(1, &pk_aliases, &pk_values, &[Some("50.50".to_string())]);
        assert_eq!(a.pk_hash, b.pk_hash);
        assert_ne!(a.column_hash, b.column_hash);
    }
}
