mod extraction;

use chrono::{DateTime, Utc};

use crate::hubitat::models::DeviceRecord;

pub use extraction::{extract, Dropped};

/// One device's telemetry at one point in time, flattened out of a
/// [`DeviceRecord`].
///
/// Only [`extract`] builds a `Reading`, so `device_id` is always a non-empty
/// string. Every other field is independently optional: missing and
/// unparseable source values both end up as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    device_id: String,
    label: Option<String>,
    room: Option<String>,
    /// Degrees as reported by the hub (no unit conversion).
    temperature: Option<f64>,
    setpoint: Option<f64>,
    /// Percent by convention; not range-checked.
    battery: Option<i32>,
    health_status: Option<String>,
    operating_state: Option<String>,
    raw: DeviceRecord,
    /// Assigned on our side when the record was extracted.
    observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn setpoint(&self) -> Option<f64> {
        self.setpoint
    }

    pub fn battery(&self) -> Option<i32> {
        self.battery
    }

    pub fn health_status(&self) -> Option<&str> {
        self.health_status.as_deref()
    }

    pub fn operating_state(&self) -> Option<&str> {
        self.operating_state.as_deref()
    }

    /// The record this reading was extracted from, unmodified.
    pub fn raw(&self) -> &DeviceRecord {
        &self.raw
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Compact `device:temperature` list used in per-cycle log lines,
/// e.g. `45:17.6 7:-`.
pub fn summarize(readings: &[Reading]) -> String {
    readings
        .iter()
        .map(|r| match r.temperature {
            Some(t) => format!("{}:{t}", r.device_id),
            None => format!("{}:-", r.device_id),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
