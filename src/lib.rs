//! Architect tenant: tenant resolution and per-tenant connection switching for database-per-tenant
//! PostgreSQL backends.

pub mod cli;
pub mod connection;
pub mod context;
pub mod error;
pub mod events;
pub mod extractors;
pub mod handlers;
pub mod lookup;
pub mod middleware;
pub mod migration;
pub mod resolver;
pub mod response;
pub mod routes;
pub mod settings;
pub mod state;
pub mod store;
pub mod tenant;

pub use connection::{
    ConnectionConfig, ConnectionProfile, ConnectionRegistry, PgConnectionRegistry, ProfileField,
    TENANT_BASE_CONNECTION,
};
pub use context::{ConsoleArgs, ExecutionContext, RequestTarget};
pub use error::{SettingsError, TenantError};
pub use events::{BroadcastEventSink, EventSink, FanoutEventSink, TenantEvent, TracingEventSink};
pub use extractors::CurrentTenant;
pub use lookup::{TenantField, TenantPredicate};
pub use middleware::resolve_tenant;
pub use migration::{migrate_tenants, MigrationReport, Migrator, SqlScriptMigrator, TenantSelector};
pub use resolver::TenantResolver;
pub use routes::{common_routes, common_routes_with_ready, tenant_routes, with_tenancy};
pub use settings::Settings;
pub use state::TenantState;
pub use store::{InMemoryTenantStore, PgTenantStore, TenantStore};
pub use tenant::{Tenant, PENDING_CONNECTION};
