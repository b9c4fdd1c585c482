use crate::internal_metrics::DiscoveryMetrics;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;

/// Logs a periodic "heartbeat" message with the current discovery counters.
///
/// This is a debugging utility designed to help identify "zombie" tasks that
/// fail to terminate during graceful shutdown. If a heartbeat message
/// continues to be logged after the shutdown signal has been sent, the
/// corresponding task is not respecting the shutdown signal.
pub async fn run_heartbeat(
    task_name: &'static str,
    metrics: Arc<DiscoveryMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut timer = interval(Duration::from_secs(30));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("[Heartbeat] '{}' started.", task_name);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("[Heartbeat] '{}' received shutdown. Exiting.", task_name);
                break;
            }
            _ = timer.tick() => {
                debug!(
                    successes = metrics.query_success_count(),
                    failures = metrics.query_failed_count(),
                    resolved = metrics.resolved_address_count(),
                    "[Heartbeat] '{}' is alive.",
                    task_name
                );
            }
        }
    }
}
