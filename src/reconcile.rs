//! Reconciler (C7).
//!
//! Drives one table end to end: resolve its TableMaps/ColumnMap, clear staging, spawn
//! `parallel_degree` Extractors and `loader-threads` Loaders per side behind an Observer, await
//! drain, run the compare set-difference SQL, and record a RunHistory row. `check` mode skips
//! straight to the Rechecker instead of re-extracting.

use std::sync::Arc;
use std::time::Instant;

use deadpool_postgres::Pool;
use tokio_util::sync::CancellationToken;

use crate::colmap::ColumnMap;
use crate::config::{ConnectionConfig, Settings};
use crate::engine;
use crate::error::{join_error_to_extract, join_error_to_load, PgCompareError};
use crate::extract::{self, BatchSink, ExtractorConfig};
use crate::load;
use crate::model::{HistoryAction, RunHistory, Side, TableEntry, TableMap};
use crate::observer::{self, ObserverConfig};
use crate::queue::BoundedQueue;
use crate::recheck;
use crate::repo::catalog;
use crate::repo::staging;
use crate::sync::TableSync;

/// Replaces the source's `isCheck` boolean/string flag (section 4.10, section 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Compare,
    Check,
}

/// What one `Reconciler::run` call produced: the RunHistory row always, plus (in `check` mode)
/// the individual recheck verdicts the report renderer (A7) lists per finding.
pub struct RunOutcome {
    pub history: RunHistory,
    pub recheck: Option<Vec<recheck::RecheckResult>>,
}

/// Everything the Reconciler needs to run a table against the repository and both sides,
/// built once at startup and shared read-only for the duration of the invocation.
pub struct Reconciler {
    repo_pool: Pool,
    source_conn: ConnectionConfig,
    target_conn: ConnectionConfig,
    settings: Settings,
}

impl Reconciler {
    pub fn new(
        repo_pool: Pool,
        source_conn: ConnectionConfig,
        target_conn: ConnectionConfig,
        settings: Settings,
    ) -> Self {
        Self {
            repo_pool,
            source_conn,
            target_conn,
            settings,
        }
    }

    /// Run one table in the given mode, returning the RunHistory row recorded for it (and, in
    /// `check` mode, every finding's individual recheck verdict for the report renderer).
    pub async fn run(
        &self,
        table: &TableEntry,
        mode: RunMode,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PgCompareError> {
        match mode {
            RunMode::Compare => {
                let history = self.run_compare(table, cancel).await?;
                Ok(RunOutcome { history, recheck: None })
            }
            RunMode::Check => {
                let (history, outcomes) = self.run_check(table).await?;
                Ok(RunOutcome { history, recheck: Some(outcomes) })
            }
        }
    }

    async fn run_compare(
        &self,
        table: &TableEntry,
        cancel: CancellationToken,
    ) -> Result<RunHistory, PgCompareError> {
        let tid = table.tid;
        let batch_nbr = table.batch_nbr;

        let (source_map, target_map) = catalog::table_maps(&self.repo_pool, tid).await?;
        let column_map = catalog::column_map(&self.repo_pool, tid).await?;

        staging::truncate_staging(&self.repo_pool, tid, batch_nbr).await?;
        let start_ts = catalog::record_history_start(&self.repo_pool, tid, HistoryAction::Compare, batch_nbr).await?;
        let started = Instant::now();

        let source_degree = clamp_parallel_degree(table.parallel_degree, &source_map, Side::Source, tid);
        let target_degree = clamp_parallel_degree(table.parallel_degree, &target_map, Side::Target, tid);

        let table_sync = Arc::new(TableSync::new(source_degree, target_degree));

        // Degraded mode (`loader-threads == 0`) has no Loader tasks; `run_side` instead
        // credits `side_sync.loader_finished()` once per side itself, so the Observer should
        // still wait for exactly one signal rather than zero.
        let loader_threads = self.settings.loader.threads.max(1) as u32;

        let observer_config = ObserverConfig {
            tid,
            batch_nbr,
            throttle_enabled: self.settings.observer.throttle,
            throttle_size: self.settings.observer.throttle_size,
            vacuum: self.settings.observer.vacuum,
            source_loader_threads: loader_threads,
            target_loader_threads: loader_threads,
        };

        let observer_pool = self.repo_pool.clone();
        let observer_source = table_sync.source.clone();
        let observer_target = table_sync.target.clone();
        let observer_throttle = table_sync.throttle.clone();
        let observer_task = tokio::spawn(async move {
            observer::run(&observer_pool, &observer_config, observer_source, observer_target, observer_throttle).await
        });

        let (source_result, target_result) = tokio::join!(
            self.run_side(
                Side::Source,
                &source_map,
                &column_map,
                source_degree,
                tid,
                batch_nbr,
                table_sync.clone(),
                cancel.clone(),
            ),
            self.run_side(
                Side::Target,
                &target_map,
                &column_map,
                target_degree,
                tid,
                batch_nbr,
                table_sync.clone(),
                cancel.clone(),
            ),
        );

        observer_task.await.map_err(|e| join_error_to_load(tid, e))??;

        source_result?;
        target_result?;

        let (counts, _findings) = staging::compare(&self.repo_pool, tid, batch_nbr).await?;

        let history = RunHistory {
            tid,
            batch_nbr,
            equal: counts.equal,
            not_equal: counts.not_equal,
            missing_source: counts.missing_source,
            missing_target: counts.missing_target,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let result_json = serde_json::to_value(&history).unwrap_or(serde_json::Value::Null);
        catalog::record_history_end(&self.repo_pool, tid, HistoryAction::Compare, batch_nbr, start_ts, result_json)
            .await?;

        Ok(history)
    }

    async fn run_check(&self, table: &TableEntry) -> Result<(RunHistory, Vec<recheck::RecheckResult>), PgCompareError> {
        let tid = table.tid;
        let batch_nbr = table.batch_nbr;

        let (source_map, target_map) = catalog::table_maps(&self.repo_pool, tid).await?;
        let column_map = catalog::column_map(&self.repo_pool, tid).await?;

        let start_ts = catalog::record_history_start(&self.repo_pool, tid, HistoryAction::Check, batch_nbr).await?;
        let started = Instant::now();

        let prior = staging::load_findings(&self.repo_pool, tid, batch_nbr).await?;

        let source_connector = engine::connect(&self.source_conn).await?;
        let target_connector = engine::connect(&self.target_conn).await?;

        let outcomes = recheck::run(
            prior,
            &*source_connector,
            &*target_connector,
            &source_map,
            &target_map,
            &column_map,
            self.source_conn.engine,
            self.target_conn.engine,
        )
        .await?;

        for resolved in outcomes.iter().filter(|o| o.outcome == crate::model::RecheckOutcome::Resolved) {
            staging::delete_finding(&self.repo_pool, tid, batch_nbr, resolved.side, &resolved.pk).await?;
        }

        // `outcome.side` is the side the finding's row was stored against — i.e. the side
        // that HAS the row (see recheck.rs). A `StillMissing` outcome on `Source` means the
        // opposite side, Target, is still missing it, and vice versa.
        let still_missing_source = outcomes
            .iter()
            .filter(|o| o.outcome == crate::model::RecheckOutcome::StillMissing && o.side == Side::Target)
            .count() as u64;
        let still_missing_target = outcomes
            .iter()
            .filter(|o| o.outcome == crate::model::RecheckOutcome::StillMissing && o.side == Side::Source)
            .count() as u64;
        let confirmed = outcomes
            .iter()
            .filter(|o| o.outcome == crate::model::RecheckOutcome::Confirmed)
            .count() as u64;

        let history = RunHistory {
            tid,
            batch_nbr,
            equal: 0,
            not_equal: confirmed,
            missing_source: still_missing_source,
            missing_target: still_missing_target,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let result_json = serde_json::to_value(&history).unwrap_or(serde_json::Value::Null);
        catalog::record_history_end(&self.repo_pool, tid, HistoryAction::Check, batch_nbr, start_ts, result_json)
            .await?;

        Ok((history, outcomes))
    }

    /// Spawn and await this side's extractors (and, when `loader-threads > 0`, its loaders)
    /// for one table, returning once every extractor/loader task has finished.
    #[allow(clippy::too_many_arguments)]
    async fn run_side(
        &self,
        side: Side,
        table_map: &TableMap,
        column_map: &ColumnMap,
        parallel_degree: u32,
        tid: i64,
        batch_nbr: i64,
        table_sync: Arc<TableSync>,
        cancel: CancellationToken,
    ) -> Result<(), PgCompareError> {
        let conn = match side {
            Side::Source => &self.source_conn,
            Side::Target => &self.target_conn,
        };
        let engine_kind = conn.engine;

        let side_sync = match side {
            Side::Source => table_sync.source.clone(),
            Side::Target => table_sync.target.clone(),
        };
        let throttle = table_sync.throttle.clone();

        let extractor_config = ExtractorConfig {
            tid,
            shard: 0,
            shard_count: parallel_degree,
            batch_fetch_size: self.settings.batch.fetch_size,
            batch_progress_report_size: self.settings.batch.progress_report_size,
            database_sort: self.settings.database_sort,
        };

        let loader_threads = self.settings.loader.threads;

        if loader_threads == 0 {
            // Degraded mode: no queue, no Loader tasks; each Extractor writes straight into
            // staging via `BatchSink::Direct` (section 4.6).
            let mut extractor_tasks = Vec::with_capacity(parallel_degree as usize);
            for shard in 0..parallel_degree {
                let mut shard_config = extractor_config.clone();
                shard_config.shard = shard;

                let connector = engine::connect(conn).await?;
                let table_map = table_map.clone();
                let column_map = column_map.clone();
                let sink = BatchSink::Direct {
                    pool: self.repo_pool.clone(),
                    side,
                    tid,
                    batch_nbr,
                    commit_size: self.settings.batch.commit_size,
                };
                let sync = side_sync.clone();
                let throttle = throttle.clone();
                let cancel = cancel.clone();

                extractor_tasks.push(tokio::spawn(async move {
                    extract::run_shard(
                        &*connector,
                        &table_map,
                        &column_map,
                        side,
                        engine_kind,
                        &shard_config,
                        sink,
                        sync,
                        throttle,
                        cancel,
                    )
                    .await
                }));
            }

            for (shard, task) in extractor_tasks.into_iter().enumerate() {
                task.await
                    .map_err(|e| join_error_to_extract(tid, shard as u32, e))??;
            }

            // No Loader exists to raise this side's loader-complete counter; the Observer's
            // exit condition waits on it, so credit it here once every extractor has drained.
            side_sync.loader_finished();
            return Ok(());
        }

        let (sender, receiver) = BoundedQueue::channel_shared(self.settings.loader.message_queue_size);

        let mut extractor_tasks = Vec::with_capacity(parallel_degree as usize);
        for shard in 0..parallel_degree {
            let mut shard_config = extractor_config.clone();
            shard_config.shard = shard;

            let connector = engine::connect(conn).await?;
            let table_map = table_map.clone();
            let column_map = column_map.clone();
            let sink = BatchSink::Queued(sender.clone());
            let sync = side_sync.clone();
            let throttle = throttle.clone();
            let cancel = cancel.clone();

            extractor_tasks.push(tokio::spawn(async move {
                extract::run_shard(
                    &*connector,
                    &table_map,
                    &column_map,
                    side,
                    engine_kind,
                    &shard_config,
                    sink,
                    sync,
                    throttle,
                    cancel,
                )
                .await
            }));
        }
        drop(sender);

        let commit_size = self.settings.batch.commit_size;
        let mut loader_tasks = Vec::with_capacity(loader_threads);
        for _ in 0..loader_threads {
            let pool = self.repo_pool.clone();
            let receiver = receiver.clone();
            let sync = side_sync.clone();
            loader_tasks.push(tokio::spawn(async move {
                load::run(&pool, side, tid, batch_nbr, commit_size, receiver, sync).await
            }));
        }

        for (shard, task) in extractor_tasks.into_iter().enumerate() {
            task.await
                .map_err(|e| join_error_to_extract(tid, shard as u32, e))??;
        }

        for task in loader_tasks {
            task.await.map_err(|e| join_error_to_load(tid, e))??;
        }

        Ok(())
    }
}

/// When a side has no `mod_column`, it cannot be sharded: clamp to 1 and warn (section 4.4).
fn clamp_parallel_degree(requested: u32, table_map: &TableMap, side: Side, tid: i64) -> u32 {
    if table_map.mod_column.is_none() && requested > 1 {
        log::warn!(
            "tid={tid} side={} has no mod_column; clamping parallel_degree {requested} to 1",
            side.as_str()
        );
        1
    } else {
        requested.max(1)
    }
}
