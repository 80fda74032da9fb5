//! In-memory stand-ins for the hub, the store and the schema bootstrap.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::{
    db::{BootstrapError, ReadingSink, SchemaBootstrap, SinkError},
    hubitat::{models::DeviceRecord, DeviceSource, FetchError},
    readings::Reading,
};

pub fn records(v: Value) -> Vec<DeviceRecord> {
    serde_json::from_value(v).unwrap()
}

/// Hands out scripted fetch results in order, then empty listings.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<DeviceRecord>, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<DeviceRecord>, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceSource for ScriptedSource {
    async fn fetch_all(&self) -> Result<Vec<DeviceRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn transient() -> FetchError {
    FetchError::Status(StatusCode::BAD_GATEWAY)
}

pub fn permanent() -> FetchError {
    FetchError::Unauthorized(StatusCode::UNAUTHORIZED)
}

/// Records every batch it is given.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Reading>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<Reading>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn rows(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl ReadingSink for RecordingSink {
    async fn write(&self, readings: &[Reading]) -> Result<usize, SinkError> {
        if readings.is_empty() {
            return Ok(0);
        }
        self.batches.lock().unwrap().push(readings.to_vec());
        Ok(readings.len())
    }
}

/// Rejects every non-empty batch as a whole.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadingSink for FailingSink {
    async fn write(&self, readings: &[Reading]) -> Result<usize, SinkError> {
        if readings.is_empty() {
            return Ok(0);
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Rejected {
            attempted: readings.len(),
            source: sqlx::Error::PoolClosed,
        })
    }
}

/// Counts invocations; optionally fails every time.
#[derive(Default)]
pub struct CountingBootstrap {
    pub fail: bool,
    calls: AtomicUsize,
}

impl CountingBootstrap {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaBootstrap for CountingBootstrap {
    async fn bootstrap(&self) -> Result<(), BootstrapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BootstrapError("relation \"trv_temperatures\" could not be created".into()));
        }
        Ok(())
    }
}
