use chrono::{DateTime, Utc};
use serde_json::Value;

use super::Reading;
use crate::hubitat::models::DeviceRecord;

// Maker API attribute names.
const ATTR_TEMPERATURE: &str = "temperature";
const ATTR_SETPOINT: &str = "thermostatSetpoint";
const ATTR_HEATING_SETPOINT: &str = "heatingSetpoint";
const ATTR_BATTERY: &str = "battery";
const ATTR_HEALTH_STATUS: &str = "healthStatus";
const ATTR_OPERATING_STATE: &str = "thermostatOperatingState";

/// Why a record produced no reading. Dropping is an expected filtering
/// outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dropped {
    /// No `id` key, or `id` is `null`.
    MissingId,
    /// `id` is an empty string.
    EmptyId,
    /// `id` is a boolean, array or object.
    UnsupportedId,
}

/// Flatten one device record into a [`Reading`] stamped with `observed_at`.
///
/// Pure: the same record and timestamp always give the same result. Values
/// that are missing or of the wrong type become `None` for that field only;
/// the only way to get no reading at all is an unusable `id`.
pub fn extract(record: DeviceRecord, observed_at: DateTime<Utc>) -> Result<Reading, Dropped> {
    let device_id = device_id(record.id())?;

    let setpoint = record
        .attribute(ATTR_SETPOINT)
        .and_then(as_f64)
        .or_else(|| record.attribute(ATTR_HEATING_SETPOINT).and_then(as_f64));

    Ok(Reading {
        device_id,
        label: record.label().map(str::to_owned),
        room: record.room().map(str::to_owned),
        temperature: record.attribute(ATTR_TEMPERATURE).and_then(as_f64),
        setpoint,
        battery: record.attribute(ATTR_BATTERY).and_then(as_i32),
        health_status: record.attribute(ATTR_HEALTH_STATUS).and_then(as_string),
        operating_state: record.attribute(ATTR_OPERATING_STATE).and_then(as_string),
        raw: record,
        observed_at,
    })
}

fn device_id(id: Option<&Value>) -> Result<String, Dropped> {
    match id {
        None | Some(Value::Null) => Err(Dropped::MissingId),
        Some(Value::String(s)) if s.is_empty() => Err(Dropped::EmptyId),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(Dropped::UnsupportedId),
    }
}

/// JSON numbers, or strings holding a finite decimal number.
fn as_f64(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// JSON integers, JSON floats truncated toward zero, or strings holding an
/// integer. `"85.0"` is not an integer string and reads as `None`.
fn as_i32(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                let f = n.as_f64()?.trunc();
                let in_range = f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX);
                in_range.then_some(f as i32)
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn as_string(v: &Value) -> Option<String> {
    v.as_str().map(str::to_owned)
}
