pub mod achievements;
pub mod challenges;
pub mod mood;
pub mod session;
pub mod wellness;

use crate::error::EngineError;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Seconds a client should wait before retrying after a storage outage.
const RETRY_AFTER_SECS: &str = "5";

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/mood", mood::router(state.clone()))
        .nest("/wellness", wellness::router(state.clone()))
        .nest("/challenges", challenges::router(state.clone()))
        .nest("/achievements", achievements::router(state))
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if self.is_retryable() {
            tracing::warn!("Request failed on storage: {}", self);
        }

        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        let mut response = (status, body).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
