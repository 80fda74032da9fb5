use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// DeviceRecord
//
// One entry of the Maker API `devices/all` listing, e.g.
//
//   {
//     "id": "45", "name": "Sonoff TRVZB", "label": "Good Room", "room": "Good room",
//     "attributes": { "temperature": "17.6", "thermostatSetpoint": "19.0", ... },
//     "capabilities": [...], "commands": [...]
//   }
//
// The hub does not guarantee any of these keys or their types, so the record
// is kept as the untouched JSON object and fields are read through typed
// accessors. Serialising a record yields exactly what was received.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRecord(Map<String, Value>);

impl DeviceRecord {
    /// Raw `id` value, whatever its JSON type.
    pub fn id(&self) -> Option<&Value> {
        self.0.get("id")
    }

    pub fn label(&self) -> Option<&str> {
        self.0.get("label").and_then(Value::as_str)
    }

    pub fn room(&self) -> Option<&str> {
        self.0.get("room").and_then(Value::as_str)
    }

    /// The `attributes` object. Absent, `null` or non-object values all read
    /// as `None`.
    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.0.get("attributes").and_then(Value::as_object)
    }

    /// Look up a single attribute value.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes().and_then(|a| a.get(name))
    }
}

impl TryFrom<Value> for DeviceRecord {
    type Error = PayloadError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PayloadError::NotAnObject(json_type(&other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Push payloads: POST /hubitat/events
//
// Accepted shapes:
//   { "device": { ...record... }, ... }   → the nested record
//   { ...record... }                      → one record
//   [ { ...record... }, ... ]             → every element
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unsupported payload: expected a device object or an array of device objects, got {0}")]
    Unsupported(&'static str),

    #[error("array element {index} is {kind}, expected a device object")]
    InvalidElement { index: usize, kind: &'static str },

    #[error("expected a device object, got {0}")]
    NotAnObject(&'static str),
}

/// Normalise an inbound event body into zero or more device records.
pub fn records_from_payload(payload: Value) -> Result<Vec<DeviceRecord>, PayloadError> {
    match payload {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(DeviceRecord(map)),
                other => Err(PayloadError::InvalidElement {
                    index,
                    kind: json_type(&other),
                }),
            })
            .collect(),
        Value::Object(mut map) => {
            if matches!(map.get("device"), Some(Value::Object(_))) {
                if let Some(Value::Object(device)) = map.remove("device") {
                    return Ok(vec![DeviceRecord(device)]);
                }
            }
            Ok(vec![DeviceRecord(map)])
        }
        other => Err(PayloadError::Unsupported(json_type(&other))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
