//! Optional daily pre-warm: periodically runs `get_or_generate` for every
//! enabled topic so the first reader of the day gets a cache hit. Uses the
//! same lease path as request traffic.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use super::FreshnessEngine;

struct TickRunningGuard {
    running: Arc<AtomicBool>,
}

impl Drop for TickRunningGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Spawns the pre-warm loop. The first tick fires immediately.
pub fn start_prewarm(engine: Arc<FreshnessEngine>, interval: Duration) -> JoinHandle<()> {
    info!(
        "[PREWARM] starting background job, interval={}s",
        interval.as_secs()
    );

    tokio::spawn(async move {
        let running = Arc::new(AtomicBool::new(false));
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if running.swap(true, Ordering::AcqRel) {
                info!("[PREWARM] previous pass still running, skip this tick");
                continue;
            }

            let engine = Arc::clone(&engine);
            let running = Arc::clone(&running);
            tokio::spawn(async move {
                let _guard = TickRunningGuard { running };
                let report = engine.prewarm_all().await;
                info!(
                    "[PREWARM] pass complete: ready={} pending={} failed={} errors={}",
                    report.ready, report.pending, report.failed, report.errors
                );
            });
        }
    })
}
