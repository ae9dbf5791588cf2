//! Extract the tenant resolved by the tenant middleware.

use crate::error::TenantError;
use crate::tenant::Tenant;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Tenant active for this request. Rejected as a config error when the route is not behind the tenant middleware.
#[derive(Clone, Debug)]
pub struct CurrentTenant(pub Tenant);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = TenantError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentTenant>()
            .cloned()
            .ok_or_else(|| TenantError::TenancyNotConfigured {
                path: parts.uri.path().to_string(),
            })
    }
}
