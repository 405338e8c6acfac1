//! Observer (C9).
//!
//! Periodically counts staged rows across both sides of an in-flight table reconciliation and
//! sets a throttle flag the Extractors honor before their next enqueue. Clears the flag once
//! drained below half the watermark, so extractors don't thrash around the threshold.

use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::Pool;

use crate::error::PgCompareError;
use crate::sync::{SideSync, ThrottleFlag};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub tid: i64,
    pub batch_nbr: i64,
    pub throttle_enabled: bool,
    pub throttle_size: u64,
    pub vacuum: bool,
    /// How many `loader_finished()` signals each side raises once fully drained: one per
    /// real Loader task, or one synthetic signal in `loader-threads == 0` degraded mode.
    pub source_loader_threads: u32,
    pub target_loader_threads: u32,
}

/// Run until both sides report complete. Intended to be spawned alongside a table's
/// Extractors/Loaders and joined by the Reconciler after it awaits the loader latches.
pub async fn run(
    pool: &Pool,
    config: &ObserverConfig,
    source: Arc<SideSync>,
    target: Arc<SideSync>,
    throttle: Arc<ThrottleFlag>,
) -> Result<(), PgCompareError> {
    loop {
        let staged = source.staged_rows() + target.staged_rows();

        if config.throttle_enabled {
            if staged >= config.throttle_size {
                if !throttle.is_set() {
                    log::warn!(
                        "tid={} staged rows {} exceeds throttle watermark {}, stalling extractors",
                        config.tid,
                        staged,
                        config.throttle_size
                    );
                }
                throttle.set();
            } else if throttle.is_set() && staged <= config.throttle_size / 2 {
                log::info!("tid={} staged rows drained below 50% watermark, resuming extractors", config.tid);
                throttle.clear();
            }
        }

        if config.vacuum {
            if let Err(e) = vacuum_staging(pool).await {
                log::warn!("tid={} observer vacuum failed: {e}", config.tid);
            }
        }

        if source.is_complete()
            && target.is_complete()
            && source.loaders_finished() >= config.source_loader_threads
            && target.loaders_finished() >= config.target_loader_threads
        {
            break;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    throttle.clear();
    Ok(())
}

async fn vacuum_staging(pool: &Pool) -> Result<(), PgCompareError> {
    let client = pool.get().await.map_err(|e| PgCompareError::Repo(e.to_string()))?;
    client
        .batch_execute("VACUUM dc_source; VACUUM dc_target;")
        .await
        .map_err(|e| PgCompareError::Repo(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_thresholds() {
        let source = Arc::new(SideSync::new(1));
        let target = Arc::new(SideSync::new(1));
        let throttle = Arc::new(ThrottleFlag::new());

        source.add_staged_rows(1_500_000);
        target.add_staged_rows(600_000);
        let staged = source.staged_rows() + target.staged_rows();
        assert!(staged >= 2_000_000);

        if staged >= 2_000_000 {
            throttle.set();
        }
        assert!(throttle.is_set());
    }
}
