//! Tenant resolver: identifies the tenant of a request or console invocation, activates it, and repoints the
//! default connection at the tenant's store.
//!
//! One resolver exists per request (interactive) or per process (console). It starts unresolved; every
//! successful resolution or explicit activation replaces the active tenant.

use crate::connection::{ConnectionRegistry, ProfileField, TENANT_BASE_CONNECTION};
use crate::context::ExecutionContext;
use crate::error::TenantError;
use crate::events::{EventSink, TenantEvent};
use crate::lookup::TenantPredicate;
use crate::store::TenantStore;
use crate::tenant::Tenant;
use std::future::Future;
use std::sync::Arc;

pub struct TenantResolver {
    store: Arc<dyn TenantStore>,
    registry: Arc<dyn ConnectionRegistry>,
    events: Arc<dyn EventSink>,
    context: ExecutionContext,
    base_connection: String,
    tenant_connection: String,
    active: Option<Tenant>,
}

impl TenantResolver {
    /// Captures the registry's current default as the base connection.
    pub fn new(
        store: Arc<dyn TenantStore>,
        registry: Arc<dyn ConnectionRegistry>,
        events: Arc<dyn EventSink>,
        context: ExecutionContext,
    ) -> Self {
        let base = registry.config().default_connection();
        Self::with_base_connection(store, registry, events, context, &base)
    }

    /// Uses `base_connection` as the template for tenants without their own connection.
    /// Seeds the synthetic `envtenant` profile with a copy of it.
    pub fn with_base_connection(
        store: Arc<dyn TenantStore>,
        registry: Arc<dyn ConnectionRegistry>,
        events: Arc<dyn EventSink>,
        context: ExecutionContext,
        base_connection: &str,
    ) -> Self {
        let config = registry.config();
        match config.profile(base_connection) {
            Some(profile) => config.set_profile(TENANT_BASE_CONNECTION, profile),
            None => tracing::warn!(connection = %base_connection, "base connection profile is not defined"),
        }
        TenantResolver {
            store,
            registry,
            events,
            context,
            base_connection: base_connection.to_string(),
            tenant_connection: TENANT_BASE_CONNECTION.to_string(),
            active: None,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn base_connection(&self) -> &str {
        &self.base_connection
    }

    pub fn active_tenant(&self) -> Option<&Tenant> {
        self.active.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.active.is_some()
    }

    /// Resolve from the execution context. Interactive: host/path lookup, failure is an error.
    /// Console: `--tenant` lookup, failure returns `Ok(None)`.
    pub async fn resolve_tenant(&mut self) -> Result<Option<Tenant>, TenantError> {
        let (selector, found) = match &self.context {
            ExecutionContext::Console(args) => {
                let selector = args.tenant().map(str::to_string);
                let found = match &selector {
                    Some(selector) => {
                        self.console_lookup(&TenantPredicate::console_selector(selector), selector)
                            .await
                    }
                    None => {
                        tracing::debug!("no --tenant selector given");
                        None
                    }
                };
                (selector, found)
            }
            ExecutionContext::Interactive(target) => {
                let found = self.store.find_first(&TenantPredicate::request(target)).await?;
                (Some(target.host().to_string()), found)
            }
        };
        self.complete(selector, found).await
    }

    /// Resolve strictly by subdomain. Same validation, events and failure policy as [`Self::resolve_tenant`].
    pub async fn resolve_by_subdomain(&mut self, subdomain: &str) -> Result<Option<Tenant>, TenantError> {
        let predicate = TenantPredicate::subdomain(subdomain);
        let found = if self.context.is_console() {
            self.console_lookup(&predicate, subdomain).await
        } else {
            self.store.find_first(&predicate).await?
        };
        self.complete(Some(subdomain.to_string()), found).await
    }

    /// Console lookups never fail: errors are logged and read as "not found".
    async fn console_lookup(&self, predicate: &TenantPredicate, selector: &str) -> Option<Tenant> {
        match self.store.find_first(predicate).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(selector = %selector, error = %e, "tenant lookup failed, treating as not found");
                None
            }
        }
    }

    async fn complete(
        &mut self,
        selector: Option<String>,
        found: Option<Tenant>,
    ) -> Result<Option<Tenant>, TenantError> {
        let usable = match found {
            Some(tenant) if tenant.is_usable() => Some(tenant),
            Some(tenant) => {
                tracing::debug!(tenant_id = %tenant.id, connection = ?tenant.connection, "tenant has no usable connection");
                None
            }
            None => None,
        };

        if let Some(tenant) = usable {
            self.set_active_tenant(tenant.clone()).await?;
            self.events.publish(TenantEvent::Resolved(tenant.clone()));
            return Ok(Some(tenant));
        }

        self.events.publish(TenantEvent::NotResolved {
            selector: selector.clone(),
        });
        if self.context.is_console() {
            return Ok(None);
        }
        Err(TenantError::NotResolved {
            selector: selector.unwrap_or_default(),
        })
    }

    /// Switch the default connection to `tenant`, record it as active, and publish `Activated`.
    /// Nothing is recorded when the switch fails.
    pub async fn set_active_tenant(&mut self, tenant: Tenant) -> Result<(), TenantError> {
        self.set_default_connection(Some(&tenant)).await?;
        tracing::info!(tenant_id = %tenant.id, subdomain = ?tenant.subdomain(), "tenant activated");
        self.active = Some(tenant.clone());
        self.events.publish(TenantEvent::Activated(tenant));
        Ok(())
    }

    pub async fn get_all_tenants(&self) -> Result<Vec<Tenant>, TenantError> {
        self.store.find_all().await
    }

    /// Activate each tenant in store order and run `f` for it. Leaves the last tenant active.
    pub async fn map_all_tenants<F, Fut>(&mut self, mut f: F) -> Result<(), TenantError>
    where
        F: FnMut(Tenant) -> Fut,
        Fut: Future<Output = Result<(), TenantError>>,
    {
        for tenant in self.get_all_tenants().await? {
            self.set_active_tenant(tenant.clone()).await?;
            f(tenant).await?;
        }
        Ok(())
    }

    /// Point the default connection back at the shared base connection. The active tenant is kept.
    pub async fn reconnect_default_connection(&self) -> Result<(), TenantError> {
        self.set_default_connection(None).await
    }

    /// Point the default connection at the active tenant's store (the base connection when unresolved).
    pub async fn reconnect_tenant_connection(&self) -> Result<(), TenantError> {
        self.set_default_connection(self.active.as_ref()).await
    }

    pub async fn purge_connection(&self) {
        self.registry.purge().await;
    }

    /// Repoint the default connection. `None` targets the synthetic base connection with no subdomain.
    ///
    /// Isolated tenants (own `connection`) get database `prefix + subdomain` on their profile; everyone
    /// else gets the base profile with an empty database field.
    async fn set_default_connection(&self, tenant: Option<&Tenant>) -> Result<(), TenantError> {
        let config = self.registry.config();
        let connection = tenant.and_then(Tenant::connection);
        let subdomain = tenant.and_then(Tenant::subdomain);
        let connection_name = connection.unwrap_or(&self.tenant_connection).to_string();

        let (database_prefix, database_name) = match (connection, subdomain) {
            (Some(_), Some(subdomain)) => (
                config
                    .field(&connection_name, ProfileField::DatabasePrefix)
                    .unwrap_or_default(),
                subdomain.to_string(),
            ),
            (Some(connection), None) => {
                return Err(TenantError::DatabaseNameEmpty {
                    tenant_id: tenant.map(|t| t.id.clone()).unwrap_or_default(),
                    connection: connection.to_string(),
                });
            }
            (None, _) => (String::new(), String::new()),
        };

        config.set_default_connection(&connection_name);
        config.set_field(
            &connection_name,
            ProfileField::Database,
            &format!("{database_prefix}{database_name}"),
        );

        if let (Some(tenant), Some(_)) = (tenant, connection) {
            config.set_current_tenant(tenant.snapshot());
            self.registry.purge().await;
        }

        self.registry.use_connection(&connection_name);
        self.registry.purge().await;
        tracing::debug!(
            connection = %connection_name,
            database = %format!("{database_prefix}{database_name}"),
            "default connection switched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, ConnectionProfile, PgConnectionRegistry};
    use crate::context::{ConsoleArgs, RequestTarget};
    use crate::events::{BroadcastEventSink, TracingEventSink};
    use crate::store::InMemoryTenantStore;
    use std::collections::HashMap;

    fn registry() -> Arc<PgConnectionRegistry> {
        Arc::new(PgConnectionRegistry::new(ConnectionConfig::new(
            "pgsql",
            HashMap::from([
                ("pgsql".to_string(), ConnectionProfile::from_url("postgres://localhost/landlord")),
                (
                    "tidb".to_string(),
                    ConnectionProfile::from_url("postgres://localhost/postgres").with_database_prefix("tid_"),
                ),
            ]),
        )))
    }

    fn resolver(context: ExecutionContext, tenants: Vec<Tenant>) -> (TenantResolver, Arc<PgConnectionRegistry>) {
        let registry = registry();
        let resolver = TenantResolver::new(
            Arc::new(InMemoryTenantStore::new(tenants)),
            registry.clone(),
            Arc::new(TracingEventSink),
            context,
        );
        (resolver, registry)
    }

    #[test]
    fn construction_seeds_envtenant_from_base() {
        let (resolver, registry) = resolver(ExecutionContext::Console(ConsoleArgs::default()), vec![]);
        assert_eq!(resolver.base_connection(), "pgsql");
        assert_eq!(
            registry.config().profile(TENANT_BASE_CONNECTION),
            registry.config().profile("pgsql")
        );
        assert!(!resolver.is_resolved());
    }

    #[tokio::test]
    async fn isolated_tenant_gets_prefixed_database() {
        let (mut resolver, registry) = resolver(ExecutionContext::Console(ConsoleArgs::default()), vec![]);
        resolver
            .set_active_tenant(Tenant::new("1").with_subdomain("acme").with_connection("tidb"))
            .await
            .unwrap();

        let config = registry.config();
        assert_eq!(config.default_connection(), "tidb");
        assert_eq!(config.field("tidb", ProfileField::Database).as_deref(), Some("tid_acme"));
        assert_eq!(registry.active_connection(), "tidb");
        assert_eq!(config.current_tenant().unwrap()["subdomain"], "acme");
    }

    #[tokio::test]
    async fn reconnect_default_keeps_active_tenant() {
        let (mut resolver, registry) = resolver(ExecutionContext::Console(ConsoleArgs::default()), vec![]);
        resolver
            .set_active_tenant(Tenant::new("1").with_subdomain("acme").with_connection("tidb"))
            .await
            .unwrap();

        resolver.reconnect_default_connection().await.unwrap();
        assert_eq!(registry.config().default_connection(), TENANT_BASE_CONNECTION);
        assert_eq!(
            registry.config().field(TENANT_BASE_CONNECTION, ProfileField::Database).as_deref(),
            Some("")
        );
        assert_eq!(resolver.active_tenant().map(|t| t.id.as_str()), Some("1"));

        resolver.reconnect_tenant_connection().await.unwrap();
        assert_eq!(registry.config().default_connection(), "tidb");
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl TenantStore for FailingStore {
        async fn find_first(&self, _: &TenantPredicate) -> Result<Option<Tenant>, TenantError> {
            Err(TenantError::Lookup("connection refused".into()))
        }
        async fn find_all(&self) -> Result<Vec<Tenant>, TenantError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn interactive_lookup_errors_are_not_swallowed() {
        let store: Arc<dyn TenantStore> = Arc::new(FailingStore);
        let mut interactive = TenantResolver::new(
            store.clone(),
            registry(),
            Arc::new(TracingEventSink),
            ExecutionContext::Interactive(RequestTarget::new("acme.example.com", "/")),
        );
        assert!(matches!(interactive.resolve_tenant().await, Err(TenantError::Lookup(_))));

        let mut console = TenantResolver::new(
            store,
            registry(),
            Arc::new(TracingEventSink),
            ExecutionContext::Console(ConsoleArgs::default().with_flag("tenant", "acme")),
        );
        assert!(console.resolve_tenant().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn console_subdomain_lookup_errors_read_as_not_found() {
        let events = Arc::new(BroadcastEventSink::default());
        let mut rx = events.subscribe();
        let registry = registry();
        let mut console = TenantResolver::new(
            Arc::new(FailingStore),
            registry.clone(),
            events,
            ExecutionContext::Console(ConsoleArgs::default()),
        );

        assert_eq!(console.resolve_by_subdomain("acme").await.unwrap(), None);
        assert!(!console.is_resolved());
        assert_eq!(
            rx.try_recv().unwrap(),
            TenantEvent::NotResolved {
                selector: Some("acme".into())
            }
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.config().default_connection(), "pgsql");

        let mut interactive = TenantResolver::new(
            Arc::new(FailingStore),
            registry,
            Arc::new(TracingEventSink),
            ExecutionContext::Interactive(RequestTarget::new("acme.example.com", "/")),
        );
        assert!(matches!(
            interactive.resolve_by_subdomain("acme").await,
            Err(TenantError::Lookup(_))
        ));
    }
}
