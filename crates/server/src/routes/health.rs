use axum::Json;
use serde_json::{Value, json};

pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn home() -> Json<Value> {
    Json(json!({
        "message": "POST /orders to create an order. GET /orders/{order_id} to fetch one."
    }))
}
