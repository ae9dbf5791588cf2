//! Request middleware: resolve the tenant from host/path, switch the default connection, run the handler,
//! then purge. Unresolved requests are rejected with `tenant_not_resolved`.

use crate::context::{ExecutionContext, RequestTarget};
use crate::error::TenantError;
use crate::extractors::CurrentTenant;
use crate::state::TenantState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

pub async fn resolve_tenant(
    State(state): State<TenantState>,
    mut request: Request,
    next: Next,
) -> Result<Response, TenantError> {
    let target = RequestTarget::from_http(request.headers(), request.uri());
    let host = target.host().to_string();

    let _switch = state.switch_lock.clone().lock_owned().await;
    let mut resolver = state.resolver(ExecutionContext::Interactive(target));
    let tenant = match resolver.resolve_tenant().await {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            resolver.purge_connection().await;
            return Err(TenantError::NotResolved { selector: host });
        }
        Err(e) => {
            resolver.purge_connection().await;
            return Err(e);
        }
    };

    request.extensions_mut().insert(CurrentTenant(tenant));
    let response = next.run(request).await;
    resolver.purge_connection().await;
    Ok(response)
}
