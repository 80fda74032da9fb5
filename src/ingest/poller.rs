use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tracing::{error, info, warn};

use super::{process_records, BatchReport};
use crate::{
    db::{ReadingSink, SinkError},
    hubitat::{DeviceSource, FetchError, FetchErrorKind},
};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Pull mode: fetch every device from the hub on a fixed interval and write
/// the extracted readings.
///
/// Cycles never overlap. A failed cycle is logged and the next tick is the
/// retry; the loop only ends on shutdown.
pub struct Poller {
    source: Arc<dyn DeviceSource>,
    sink: Arc<dyn ReadingSink>,
    interval: Duration,
}

impl Poller {
    pub fn new(source: Arc<dyn DeviceSource>, sink: Arc<dyn ReadingSink>, interval: Duration) -> Self {
        Self { source, sink, interval }
    }

    /// Fetch, extract and write once.
    pub async fn run_cycle(&self) -> Result<BatchReport, CycleError> {
        let records = self.source.fetch_all().await?;
        let report = process_records(records, self.sink.as_ref()).await?;
        Ok(report)
    }

    /// A single cycle with the same logging as the loop.
    pub async fn run_once(&self) -> Result<BatchReport, CycleError> {
        let result = self.run_cycle().await;
        log_cycle(&result, 1);
        result
    }

    /// Run cycles until `shutdown` flips to `true` (or its sender goes away).
    ///
    /// The first cycle starts immediately. The shutdown flag is only checked
    /// between cycles, so a write already in flight always completes. A cycle
    /// that overruns the interval delays the next tick instead of stacking
    /// ticks up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Poll loop started");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let result = self.run_cycle().await;
            consecutive_failures = if result.is_ok() { 0 } else { consecutive_failures + 1 };
            log_cycle(&result, consecutive_failures);
        }

        info!("Poll loop stopped");
    }
}

fn log_cycle(result: &Result<BatchReport, CycleError>, consecutive_failures: u32) {
    match result {
        Ok(report) => info!(
            written = report.written,
            dropped = report.dropped,
            summary = %report.summary,
            "Poll cycle complete"
        ),
        Err(CycleError::Fetch(e)) if e.kind() == FetchErrorKind::Transient => warn!(
            error = %e,
            consecutive_failures,
            "Hub fetch failed, retrying next tick"
        ),
        Err(CycleError::Fetch(e)) => error!(
            error = %e,
            consecutive_failures,
            "Hub fetch failed and will keep failing until the hub configuration is fixed"
        ),
        Err(CycleError::Sink(e)) => error!(
            written = 0,
            error = %e,
            consecutive_failures,
            "Failed to write readings"
        ),
    }
}
