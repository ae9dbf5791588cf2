//! Tenant-independent routes: liveness, landlord readiness, build version.

use crate::connection::ConnectionRegistry;
use crate::state::TenantState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    base_connection: String,
    landlord: &'static str,
    profiles: usize,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 503 when the landlord database (base connection) does not answer. Tenant databases are not probed.
async fn ready(State(state): State<TenantState>) -> (StatusCode, Json<ReadyBody>) {
    let reachable = match state.registry.open_pool(&state.base_connection) {
        Ok(pool) => {
            let answered = sqlx::query("SELECT 1").fetch_optional(&pool).await.is_ok();
            pool.close().await;
            answered
        }
        Err(e) => {
            tracing::warn!(error = %e, "base connection profile unusable");
            false
        }
    };
    let (code, status, landlord) = if reachable {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };
    let body = ReadyBody {
        status,
        base_connection: state.base_connection.clone(),
        landlord,
        profiles: state.registry.config().profile_names().len(),
    };
    (code, Json(body))
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn stateless<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// GET /health, GET /version.
pub fn common_routes() -> Router {
    stateless()
}

/// [`common_routes`] plus GET /ready.
pub fn common_routes_with_ready(state: TenantState) -> Router {
    stateless()
        .route("/ready", get(ready))
        .with_state(state)
}
