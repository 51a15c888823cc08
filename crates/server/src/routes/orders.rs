use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use db::models::order::{CreateOrder, Order};
use serde_json::Value;

use crate::{
    AppState,
    error::ApiError,
    fingerprint,
    idempotency::{self, CreateOutcome},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order))
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let key = idempotency::idempotency_key(&headers).ok_or(ApiError::MissingIdempotencyKey)?;
    let Ok(Json(raw)) = body else {
        return Err(ApiError::InvalidJsonBody);
    };
    let payload = validate_order_payload(&raw)?;
    let fingerprint = fingerprint::fingerprint(&payload)
        .map_err(|err| ApiError::Internal(format!("Failed to fingerprint payload: {err}")))?;

    let outcome =
        idempotency::create_order_idempotent(&state.db().pool, &key, &payload, &fingerprint)
            .await?;

    match outcome {
        CreateOutcome::Created { response_body } => {
            // The commit is durable either way; only delivery is sacrificed.
            if idempotency::fail_after_commit(&headers) {
                return Err(ApiError::SimulatedPostCommitFault);
            }
            Ok((StatusCode::CREATED, ResponseJson(response_body)).into_response())
        }
        CreateOutcome::Replayed {
            response_code,
            response_body,
        } => {
            let status = u16::try_from(response_code)
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| {
                    ApiError::Internal(format!("Cached response code {response_code} is invalid"))
                })?;
            Ok((status, ResponseJson(response_body)).into_response())
        }
    }
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<Order>, ApiError> {
    let order = Order::get(&state.db().pool, id).await?;
    Ok(ResponseJson(order))
}

/// Schema check for the create payload. Collects every field problem instead
/// of stopping at the first, so the 422 response can report them all.
fn validate_order_payload(raw: &Value) -> Result<CreateOrder, ApiError> {
    let Some(object) = raw.as_object() else {
        return Err(ApiError::InvalidJsonBody);
    };

    let mut messages: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut report = |field: &str, message: &str| {
        messages
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    };

    for field in object.keys() {
        if !matches!(field.as_str(), "customer_id" | "item_id" | "quantity") {
            report(field, "Unknown field.");
        }
    }

    let mut required_string = |field: &str| -> Option<String> {
        match object.get(field) {
            None | Some(Value::Null) => {
                report(field, "Missing data for required field.");
                None
            }
            Some(Value::String(value)) => {
                if value.is_empty() {
                    report(field, "Shorter than minimum length 1.");
                    None
                } else {
                    Some(value.clone())
                }
            }
            Some(_) => {
                report(field, "Not a valid string.");
                None
            }
        }
    };

    let customer_id = required_string("customer_id");
    let item_id = required_string("item_id");

    let quantity = match object.get("quantity") {
        None | Some(Value::Null) => {
            report("quantity", "Missing data for required field.");
            None
        }
        Some(value) => match value.as_i64() {
            Some(quantity) if quantity < 1 => {
                report("quantity", "Must be greater than or equal to 1.");
                None
            }
            Some(quantity) => match i32::try_from(quantity) {
                Ok(quantity) => Some(quantity),
                Err(_) => {
                    report("quantity", "Not a valid integer.");
                    None
                }
            },
            None => {
                report("quantity", "Not a valid integer.");
                None
            }
        },
    };

    match (customer_id, item_id, quantity) {
        (Some(customer_id), Some(item_id), Some(quantity)) if messages.is_empty() => {
            Ok(CreateOrder {
                customer_id,
                item_id,
                quantity,
            })
        }
        _ => Err(ApiError::ValidationFailed(messages)),
    }
}
