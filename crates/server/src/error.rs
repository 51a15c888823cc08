use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{DbErr, models::order::OrderError};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing Idempotency-Key")]
    MissingIdempotencyKey,
    #[error("Invalid JSON body")]
    InvalidJsonBody,
    #[error("Invalid data")]
    ValidationFailed(BTreeMap<String, Vec<String>>),
    #[error("Existing Idempotency-Key with different payload.")]
    PayloadMismatch,
    #[error("Request in process")]
    RequestInProgress,
    #[error("Conflict: Idempotency-Key was just recorded by a concurrent request")]
    InsertRaceConflict,
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Simulated failure: data committed but no response sent")]
    SimulatedPostCommitFault,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::MissingIdempotencyKey | ApiError::InvalidJsonBody => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadMismatch
            | ApiError::RequestInProgress
            | ApiError::InsertRaceConflict => StatusCode::CONFLICT,
            ApiError::Order(err) => match err {
                OrderError::OrderNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_)
            | ApiError::Internal(_)
            | ApiError::SimulatedPostCommitFault => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status_code.is_server_error() {
            tracing::error!(status = %status_code, error = %self, "API request failed");
        }

        let mut body: Value = json!({ "Error": self.to_string() });
        if let ApiError::ValidationFailed(messages) = &self {
            body["Messages"] = serde_json::to_value(messages).unwrap_or(Value::Null);
        }
        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::MissingIdempotencyKey.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidJsonBody.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ValidationFailed(BTreeMap::new())
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::PayloadMismatch.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::RequestInProgress.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InsertRaceConflict.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(OrderError::OrderNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::SimulatedPostCommitFault.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_failure_carries_per_field_messages() {
        let mut messages = BTreeMap::new();
        messages.insert(
            "quantity".to_string(),
            vec!["Must be greater than or equal to 1.".to_string()],
        );

        let response = ApiError::ValidationFailed(messages).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
