use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ingest::BatchReport;

/// Response for an accepted `POST /hubitat/events` submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    /// Rows written to the store.
    pub inserted: usize,
    /// Records skipped because they carried no usable device id.
    pub dropped: usize,
}

impl From<BatchReport> for IngestResponse {
    fn from(r: BatchReport) -> Self {
        Self {
            inserted: r.written,
            dropped: r.dropped,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
