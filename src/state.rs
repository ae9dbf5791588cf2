//! Shared state for tenant-aware routes.

use crate::connection::{ConnectionRegistry, PgConnectionRegistry};
use crate::context::ExecutionContext;
use crate::events::EventSink;
use crate::resolver::TenantResolver;
use crate::store::TenantStore;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct TenantState {
    pub store: Arc<dyn TenantStore>,
    pub registry: Arc<PgConnectionRegistry>,
    pub events: Arc<dyn EventSink>,
    /// Captured once at startup; per-request resolvers use it as their base connection.
    pub base_connection: String,
    /// The registry is process-wide: held across resolve, handler and purge so requests for different
    /// tenants never interleave a switch with another request's queries.
    pub switch_lock: Arc<Mutex<()>>,
}

impl TenantState {
    pub fn new(
        store: Arc<dyn TenantStore>,
        registry: Arc<PgConnectionRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let base_connection = registry.config().default_connection();
        TenantState {
            store,
            registry,
            events,
            base_connection,
            switch_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fresh resolver for one request or command.
    pub fn resolver(&self, context: ExecutionContext) -> TenantResolver {
        TenantResolver::with_base_connection(
            self.store.clone(),
            self.registry.clone(),
            self.events.clone(),
            context,
            &self.base_connection,
        )
    }
}
