//! Periodic background collection.

use shared::collector::Collector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Background loop running a collection pass at a fixed interval.
#[derive(Debug)]
pub struct CollectionMonitor {
    collector: Arc<Collector>,
    interval_duration: Duration,
}

impl CollectionMonitor {
    /// Creates a new collection monitor.
    ///
    /// # Arguments
    ///
    /// * `collector` - Collector shared with the `/metrics` handler
    /// * `interval_duration` - How often to run a pass
    #[must_use]
    pub fn new(collector: Arc<Collector>, interval_duration: Duration) -> Self {
        Self {
            collector,
            interval_duration,
        }
    }

    /// Starts the monitoring loop.
    ///
    /// A pass that fails fatally is logged and the loop keeps going; the next
    /// tick starts a fresh pass. Ticks missed while a slow pass runs are
    /// skipped rather than bunched up.
    ///
    /// # Cancellation
    ///
    /// This function runs until cancelled via the task handle.
    pub async fn run(self: Arc<Self>) {
        let mut tick = interval(self.interval_duration);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            match self.collector.collect_once().await {
                Ok(report) => {
                    tracing::info!(
                        targets = report.targets,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        busy = report.busy,
                        "Collection pass finished"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Collection pass failed");
                }
            }
        }
    }
}
