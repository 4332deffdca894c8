//! Clock-driven sweep — the wakeup that keeps timers honest when nobody
//! is clicking.
//!
//! Any live worker may run this loop; several running at once contend
//! harmlessly for the store lock. Keep the sweep period at or below a
//! third of the confirmation timeout so offer expiry stays timely.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::PauseScheduler;

/// Run the periodic sweep, with a janitor pass on a slower cadence.
/// Never returns; spawn it as a background task.
pub async fn run_sweep(
    scheduler: Arc<PauseScheduler>,
    sweep_every: Duration,
    janitor_every: Duration,
) {
    tracing::info!(
        "⏰ sweep started (tick every {}s, janitor every {}s)",
        sweep_every.as_secs(),
        janitor_every.as_secs()
    );

    let mut interval = tokio::time::interval(sweep_every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_compact = tokio::time::Instant::now();

    loop {
        interval.tick().await;

        match scheduler.tick().await {
            Ok(true) => tracing::debug!("sweep advanced the queue"),
            Ok(false) => {}
            Err(e) if e.is_retryable() => {
                tracing::warn!("sweep skipped, storage unavailable: {e}");
            }
            Err(e) => tracing::error!("sweep failed: {e}"),
        }

        if last_compact.elapsed() >= janitor_every {
            last_compact = tokio::time::Instant::now();
            match scheduler.compact().await {
                Ok(_) => {}
                Err(e) => tracing::warn!("janitor pass failed: {e}"),
            }
        }
    }
}
