pub mod poller;

use chrono::Utc;
use tracing::debug;

use crate::{
    db::{ReadingSink, SinkError},
    hubitat::models::DeviceRecord,
    readings::{self, extract, Reading},
};

pub use poller::{CycleError, Poller};

/// Outcome of pushing one batch of device records through extraction and
/// into the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Records that produced no reading (unusable id).
    pub dropped: usize,
    /// Rows written to the store.
    pub written: usize,
    /// `device:temperature` list of the written readings.
    pub summary: String,
}

/// Extract every record and write the resulting readings in one sink call.
///
/// Both delivery modes go through here, so pulled and pushed records are
/// treated identically. Records without a usable id are counted and skipped;
/// they never reach the sink.
pub async fn process_records(
    records: Vec<DeviceRecord>,
    sink: &dyn ReadingSink,
) -> Result<BatchReport, SinkError> {
    let observed_at = Utc::now();
    let mut dropped = 0;

    let batch: Vec<Reading> = records
        .into_iter()
        .filter_map(|record| match extract(record, observed_at) {
            Ok(reading) => Some(reading),
            Err(reason) => {
                dropped += 1;
                debug!(reason = ?reason, "Device record dropped");
                None
            }
        })
        .collect();

    for r in &batch {
        debug!(
            device_id = %r.device_id(),
            label = ?r.label(),
            temperature = ?r.temperature(),
            setpoint = ?r.setpoint(),
            battery = ?r.battery(),
            operating_state = ?r.operating_state(),
            "Reading extracted"
        );
    }

    let written = sink.write(&batch).await?;

    Ok(BatchReport {
        dropped,
        written,
        summary: readings::summarize(&batch),
    })
}
