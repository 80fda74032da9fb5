use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{db::SinkError, hubitat::models::PayloadError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The submission itself is unusable; the sender has to fix and resend it.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] SinkError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<PayloadError> for AppError {
    fn from(e: PayloadError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid json: {e}"))
    }
}
