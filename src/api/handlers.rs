use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;
use tracing::{error, info, warn};
use utoipa::OpenApi;

use super::{
    dto::{ErrorResponse, IngestResponse},
    errors::AppError,
};
use crate::{
    db::ReadingSink,
    hubitat::models::records_from_payload,
    ingest::process_records,
};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Accept a device event from the hub and store the resulting readings.
///
/// The body may be a single device object, an array of device objects, or an
/// event object carrying the device under `device`. Readings are written
/// before the response is sent.
#[utoipa::path(
    post,
    path = "/hubitat/events",
    request_body(
        content = Value,
        content_type = "application/json",
        description = "Device object, array of device objects, or object with a `device` field"
    ),
    responses(
        (status = 200, description = "Submission stored", body = IngestResponse),
        (status = 400, description = "Body is not valid JSON or not a supported shape", body = ErrorResponse),
        (status = 500, description = "Readings could not be written", body = ErrorResponse),
    ),
    tag = "events"
)]
pub async fn ingest_events(
    State(sink): State<Arc<dyn ReadingSink>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError> {
    let records = serde_json::from_slice::<Value>(&body)
        .map_err(AppError::from)
        .and_then(|payload| records_from_payload(payload).map_err(AppError::from))
        .inspect_err(|e| warn!(error = %e, "Rejected event submission"))?;

    let report = process_records(records, sink.as_ref())
        .await
        .inspect_err(|e| error!(error = %e, written = 0, "Failed to store event readings"))?;

    info!(
        written = report.written,
        dropped = report.dropped,
        summary = %report.summary,
        "Event submission stored"
    );

    Ok(Json(report.into()))
}

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(ingest_events, health),
    components(schemas(IngestResponse, ErrorResponse)),
    tags(
        (name = "events", description = "Hub event ingestion"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Hubitat Agent API",
        version = "0.1.0",
        description = "Push endpoint for Hubitat device events"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::{
        api::router,
        db::ReadingSink,
        testing::{FailingSink, RecordingSink},
    };

    fn test_server(sink: Arc<dyn ReadingSink>) -> TestServer {
        TestServer::new(router(sink)).unwrap()
    }

    // -----------------------------------------------------------------------
    // POST /hubitat/events
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn bare_array_is_written_in_one_batch() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        let resp = server
            .post("/hubitat/events")
            .json(&json!([
                { "id": "1", "attributes": { "temperature": "20.5" } },
                { "id": "2", "attributes": { "temperature": 19 } }
            ]))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body, json!({ "inserted": 2, "dropped": 0 }));

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].device_id(), "1");
        assert_eq!(batches[0][0].temperature(), Some(20.5));
        assert_eq!(batches[0][1].device_id(), "2");
        assert_eq!(batches[0][1].temperature(), Some(19.0));
    }

    #[tokio::test]
    async fn single_device_object_is_accepted() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        let resp = server
            .post("/hubitat/events")
            .json(&json!({ "id": "45", "label": "Good Room", "attributes": { "battery": "90" } }))
            .await;
        resp.assert_status_ok();

        let batches = sink.batches();
        assert_eq!(batches[0][0].label(), Some("Good Room"));
        assert_eq!(batches[0][0].battery(), Some(90));
    }

    #[tokio::test]
    async fn wrapped_device_is_unwrapped() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        let resp = server
            .post("/hubitat/events")
            .json(&json!({
                "device": { "id": "9", "attributes": { "thermostatOperatingState": "idle" } },
                "name": "thermostatOperatingState"
            }))
            .await;
        resp.assert_status_ok();

        let batch = &sink.batches()[0];
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].device_id(), "9");
        assert_eq!(batch[0].operating_state(), Some("idle"));
    }

    #[tokio::test]
    async fn records_without_id_are_counted_not_stored() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        let resp = server
            .post("/hubitat/events")
            .json(&json!([{ "label": "No ID Device" }, { "id": "2" }]))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body, json!({ "inserted": 1, "dropped": 1 }));
        assert_eq!(sink.rows(), 1);
    }

    #[tokio::test]
    async fn empty_array_is_accepted() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        let resp = server.post("/hubitat/events").json(&json!([])).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["inserted"], 0);
        assert_eq!(sink.rows(), 0);
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        let resp = server.post("/hubitat/events").text("{not json").await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("invalid json"));
        assert_eq!(sink.rows(), 0);
    }

    #[tokio::test]
    async fn unsupported_shapes_are_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let server = test_server(sink.clone());

        for payload in [json!("hello"), json!(42), json!(null), json!([{ "id": "1" }, "x"])] {
            let resp = server.post("/hubitat/events").json(&payload).await;
            resp.assert_status(StatusCode::BAD_REQUEST);
        }
        assert_eq!(sink.rows(), 0);
    }

    #[tokio::test]
    async fn store_failure_rejects_the_submission() {
        let sink = Arc::new(FailingSink::default());
        let server = test_server(sink.clone());

        let resp = server
            .post("/hubitat/events")
            .json(&json!([{ "id": "1" }, { "id": "2" }]))
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("nothing written"));
        assert_eq!(sink.attempts(), 1);
    }

    // -----------------------------------------------------------------------
    // GET /health
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let server = test_server(Arc::new(RecordingSink::default()));
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    // -----------------------------------------------------------------------
    // GET /api-docs/openapi.json
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = test_server(Arc::new(RecordingSink::default()));
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Hubitat Agent API");
        assert!(body["paths"]["/hubitat/events"]["post"].is_object());
    }
}
