//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("connections file {path}: {message}")]
    ConnectionsFile { path: String, message: String },
}

#[derive(Error, Debug)]
pub enum TenantError {
    /// No usable tenant matched; fatal only for interactive resolution.
    #[error("tenant not resolved: {selector}")]
    NotResolved { selector: String },
    /// Tenant names its own connection but has no subdomain to build the database name from.
    #[error("tenant {tenant_id} declares connection '{connection}' but has no subdomain for its database name")]
    DatabaseNameEmpty { tenant_id: String, connection: String },
    #[error("unknown connection profile: {0}")]
    UnknownConnection(String),
    #[error("tenant lookup: {0}")]
    Lookup(String),
    #[error("migration: {0}")]
    Migration(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("serialization: {0}")]
    Serialize(#[from] serde_json::Error),
    /// A tenant-scoped extractor ran on a route without the tenant middleware.
    #[error("route {path} is not behind tenant resolution")]
    TenancyNotConfigured { path: String },
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl TenantError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            TenantError::NotResolved { .. } => (StatusCode::NOT_FOUND, "tenant_not_resolved"),
            TenantError::DatabaseNameEmpty { .. }
            | TenantError::UnknownConnection(_)
            | TenantError::Settings(_)
            | TenantError::TenancyNotConfigured { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "tenant_config_error"),
            TenantError::Lookup(_) => (StatusCode::BAD_GATEWAY, "tenant_lookup_error"),
            TenantError::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "migration_error"),
            TenantError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            TenantError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            TenantError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            TenantError::Serialize(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
        }
    }
}

impl IntoResponse for TenantError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let details = match &self {
            TenantError::NotResolved { selector } => Some(serde_json::json!({ "selector": selector })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
