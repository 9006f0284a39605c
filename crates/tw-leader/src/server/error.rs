use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tw_core::TickerWallError;

/// Handler error, rendered as `{"error": CODE, "message": ...}`.
#[derive(Debug)]
pub enum AppError {
    Domain(TickerWallError),
    BadRequest(String),
}

impl From<TickerWallError> for AppError {
    fn from(e: TickerWallError) -> Self {
        AppError::Domain(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Domain(e) => match e {
                TickerWallError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
                TickerWallError::UnknownScreen(_) => (StatusCode::NOT_FOUND, "UNKNOWN_SCREEN"),
                TickerWallError::UnknownTicker(_) => (StatusCode::NOT_FOUND, "UNKNOWN_TICKER"),
                TickerWallError::DuplicateScreen(_) => (StatusCode::CONFLICT, "DUPLICATE_SCREEN"),
                TickerWallError::DuplicateTicker(_) => (StatusCode::CONFLICT, "DUPLICATE_TICKER"),
                TickerWallError::Connection(_) | TickerWallError::Feed(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM"),
                TickerWallError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            AppError::BadRequest(msg) => msg,
            AppError::Domain(e) => e.to_string(),
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
