//! Loader (C6).
//!
//! Drains a side's bounded queue, batch-inserts fingerprints into that side's staging table
//! under the session settings section 4.6 calls for, committing every `batch-commit-size` rows
//! (a queue batch larger than that is split across several transactions; one smaller just
//! commits once). Terminates once its side's extractors are done and the queue has drained.

use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::Pool;

use crate::error::PgCompareError;
use crate::model::{RowFingerprint, Side};
use crate::queue::{QueueError, SharedReceiver};
use crate::repo::staging;
use crate::sync::SideSync;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Drain `receiver` into `side`'s staging table for (tid, batch_nbr) until the side's
/// extractors have all finished and the queue is empty.
///
/// `receiver` is shared across every Loader thread working this side's queue: each poll takes
/// the lock just long enough to pull the next batch (or time out), then releases it before the
/// insert runs, so `loader-threads` Loaders drain one queue concurrently instead of racing each
/// other for the whole poll-insert cycle.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    pool: &Pool,
    side: Side,
    tid: i64,
    batch_nbr: i64,
    commit_size: usize,
    receiver: SharedReceiver,
    sync: Arc<SideSync>,
) -> Result<(), PgCompareError> {
    loop {
        let polled = {
            let mut receiver = receiver.lock().await;
            receiver.poll(POLL_TIMEOUT).await
        };
        match polled {
            Ok(Some(batch)) => {
                if batch.is_empty() {
                    continue;
                }
                if let Err(e) = insert_batch(pool, side, tid, batch_nbr, &batch, commit_size).await {
                    log::error!("tid={tid} side={} loader batch failed: {e}", side.as_str());
                } else {
                    sync.add_staged_rows(batch.len() as u64);
                }
            }
            Ok(None) => {
                if sync.is_complete() {
                    break;
                }
            }
            Err(QueueError::Closed) => break,
        }
    }

    sync.loader_finished();
    Ok(())
}

/// Inserts `rows` in chunks of `commit_size`, each chunk its own transaction: commits that
/// chunk or rolls it back whole, per section 4.6's failure note ("the compare will simply
/// report missing rows, which a rerun resolves"). A queue batch that arrived larger than
/// `commit_size` (section 4.4's `batch-fetch-size`, a separate knob, can outsize it) is split
/// across several commits instead of one.
async fn insert_batch(
    pool: &Pool,
    side: Side,
    tid: i64,
    batch_nbr: i64,
    rows: &[RowFingerprint],
    commit_size: usize,
) -> Result<(), PgCompareError> {
    let mut client = pool
        .get()
        .await
        .map_err(|e| PgCompareError::Load { tid, message: e.to_string() })?;

    staging::apply_loader_session_settings(&*client).await?;

    for chunk in rows.chunks(commit_size.max(1)) {
        let txn = client
            .transaction()
            .await
            .map_err(|e| PgCompareError::Load { tid, message: e.to_string() })?;

        staging::insert_batch(&*txn, side, tid, batch_nbr, chunk)
            .await
            .map_err(|e| PgCompareError::Load { tid, message: e.to_string() })?;

        txn.commit()
            .await
            .map_err(|e| PgCompareError::Load { tid, message: e.to_string() })?;
    }

    Ok(())
}

/// `loader-threads=0` degraded mode: the Extractor calls this directly, bypassing the queue
/// entirely, using the exact insert shape a real Loader would have used.
pub async fn insert_directly(
    pool: &Pool,
    side: Side,
    tid: i64,
    batch_nbr: i64,
    rows: &[RowFingerprint],
    commit_size: usize,
) -> Result<(), PgCompareError> {
    insert_batch(pool, side, tid, batch_nbr, rows, commit_size).await
}
