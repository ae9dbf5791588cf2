//! Active tenant handler.

use crate::connection::{ConnectionRegistry, ProfileField};
use crate::extractors::CurrentTenant;
use crate::response::ok;
use crate::state::TenantState;
use crate::tenant::Tenant;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct ActiveTenantBody {
    pub tenant: Tenant,
    /// Connection the registry hands out while this request runs.
    pub connection: String,
    pub database: Option<String>,
}

/// GET /tenant: tenant resolved for this request and the connection it switched to.
pub async fn current_tenant(
    CurrentTenant(tenant): CurrentTenant,
    State(state): State<TenantState>,
) -> impl IntoResponse {
    let connection = state.registry.active_connection();
    let database = state.registry.config().field(&connection, ProfileField::Database);
    ok(
        ActiveTenantBody {
            tenant,
            connection,
            database,
        },
        Some(serde_json::json!({ "base_connection": state.base_connection })),
    )
}
