//! `{"data": ..., "meta": ...}` envelope shared with the error body in [`crate::error`].

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// 200 with `data`; `meta` omitted when `None`.
pub fn ok<T: Serialize>(data: T, meta: Option<Value>) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::OK, Json(Envelope { data, meta }))
}
