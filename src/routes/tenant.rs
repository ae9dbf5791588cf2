//! Tenant-scoped routes.

use crate::handlers::current_tenant;
use crate::middleware::resolve_tenant;
use crate::state::TenantState;
use axum::{middleware::from_fn_with_state, routing::get, Router};

/// Put every route of `router` behind tenant resolution.
pub fn with_tenancy<S>(router: Router<S>, state: TenantState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(from_fn_with_state(state, resolve_tenant))
}

/// GET /tenant behind tenant resolution.
pub fn tenant_routes(state: TenantState) -> Router {
    let router = Router::new().route("/tenant", get(current_tenant));
    with_tenancy(router, state.clone()).with_state(state)
}
