use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::readings::Reading;

/// Rows per `INSERT` statement. Ten binds per row keeps each statement well
/// under the Postgres limit of 65535 bind parameters.
const ROWS_PER_STATEMENT: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("could not open a store transaction: {0}")]
    Connect(#[source] sqlx::Error),

    /// The whole batch was rolled back; no rows from it are stored.
    #[error("store rejected batch of {attempted} readings, nothing written: {source}")]
    Rejected {
        attempted: usize,
        #[source]
        source: sqlx::Error,
    },
}

/// Write path into the store.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    /// Persist `readings`, returning how many rows were written. Either every
    /// reading is stored or the call fails and none are.
    async fn write(&self, readings: &[Reading]) -> Result<usize, SinkError>;
}

/// Appends readings to `trv_temperatures`, one row each.
///
/// A batch is written inside a single transaction so a failure part-way
/// through (constraint violation, dropped connection) leaves nothing behind.
/// Rows are never read back or de-duplicated.
#[derive(Debug, Clone)]
pub struct PgReadingSink {
    pool: PgPool,
}

impl PgReadingSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingSink for PgReadingSink {
    async fn write(&self, readings: &[Reading]) -> Result<usize, SinkError> {
        if readings.is_empty() {
            return Ok(0);
        }

        let rejected = |source| SinkError::Rejected {
            attempted: readings.len(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(SinkError::Connect)?;

        for chunk in readings.chunks(ROWS_PER_STATEMENT) {
            let mut builder = insert_statement(chunk);
            builder.build().execute(&mut *tx).await.map_err(rejected)?;
        }

        tx.commit().await.map_err(rejected)?;

        debug!(rows = readings.len(), "Readings committed");
        Ok(readings.len())
    }
}

fn insert_statement(chunk: &[Reading]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO trv_temperatures \
         (time, device_id, label, room, temperature, setpoint, battery, \
          health_status, operating_state, raw) ",
    );

    builder.push_values(chunk, |mut b, r| {
        b.push_bind(r.observed_at())
            .push_bind(r.device_id())
            .push_bind(r.label())
            .push_bind(r.room())
            .push_bind(r.temperature())
            .push_bind(r.setpoint())
            .push_bind(r.battery())
            .push_bind(r.health_status())
            .push_bind(r.operating_state())
            .push_bind(Json(r.raw()));
    });

    builder
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
