#![allow(dead_code)]

use architect_tenant::{
    ConnectionConfig, ConnectionProfile, ConnectionRegistry, EventSink, ExecutionContext, InMemoryTenantStore,
    Migrator, ProfileField, Tenant, TenantError, TenantEvent, TenantResolver,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Keeps every published event, in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TenantEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TenantEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(TenantEvent::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: TenantEvent) {
        self.events.lock().push(event);
    }
}

/// Registry without pools: logs `use:<name>`, `purge` and anything tests append with [`RecordingRegistry::note`].
pub struct RecordingRegistry {
    config: ConnectionConfig,
    active: RwLock<String>,
    ops: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    /// `pgsql` (default, landlord) and `tidb` (isolated, prefix `tid_`).
    pub fn new() -> Self {
        let config = ConnectionConfig::new(
            "pgsql",
            HashMap::from([
                ("pgsql".to_string(), ConnectionProfile::from_url("postgres://app@localhost/landlord")),
                (
                    "tidb".to_string(),
                    ConnectionProfile::from_url("postgres://app@db2/postgres").with_database_prefix("tid_"),
                ),
            ]),
        );
        let active = config.default_connection();
        RecordingRegistry {
            config,
            active: RwLock::new(active),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn note(&self, op: String) {
        self.ops.lock().push(op);
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    pub fn purges(&self) -> usize {
        self.ops.lock().iter().filter(|op| *op == "purge").count()
    }

    pub fn database(&self, connection: &str) -> Option<String> {
        self.config.field(connection, ProfileField::Database)
    }
}

#[async_trait]
impl ConnectionRegistry for RecordingRegistry {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn use_connection(&self, name: &str) {
        *self.active.write() = name.to_string();
        self.note(format!("use:{name}"));
    }

    fn active_connection(&self) -> String {
        self.active.read().clone()
    }

    async fn purge(&self) {
        self.note("purge".to_string());
    }
}

/// Records which tenant and database each run saw; fails on `fail_on` subdomain.
pub struct RecordingMigrator {
    registry: Arc<RecordingRegistry>,
    fail_on: Option<String>,
    runs: Mutex<Vec<(String, String)>>,
}

impl RecordingMigrator {
    pub fn new(registry: Arc<RecordingRegistry>) -> Self {
        RecordingMigrator {
            registry,
            fail_on: None,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, subdomain: &str) -> Self {
        self.fail_on = Some(subdomain.to_string());
        self
    }

    /// `(tenant id, database of the active connection)` per run.
    pub fn runs(&self) -> Vec<(String, String)> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl Migrator for RecordingMigrator {
    async fn migrate(&self, tenant: &Tenant) -> Result<(), TenantError> {
        let connection = self.registry.active_connection();
        let database = self.registry.database(&connection).unwrap_or_default();
        self.runs.lock().push((tenant.id.clone(), database));
        self.registry.note(format!("migrate:{}", tenant.id));
        if self.fail_on.is_some() && self.fail_on.as_deref() == tenant.subdomain() {
            return Err(TenantError::Migration(format!("tenant {} failed", tenant.id)));
        }
        Ok(())
    }
}

pub struct Harness {
    pub resolver: TenantResolver,
    pub registry: Arc<RecordingRegistry>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<InMemoryTenantStore>,
}

pub fn harness(context: ExecutionContext, tenants: Vec<Tenant>) -> Harness {
    let registry = Arc::new(RecordingRegistry::new());
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(InMemoryTenantStore::new(tenants));
    let resolver = TenantResolver::new(store.clone(), registry.clone(), sink.clone(), context);
    Harness {
        resolver,
        registry,
        sink,
        store,
    }
}

pub fn isolated(id: &str, subdomain: &str) -> Tenant {
    Tenant::new(id).with_subdomain(subdomain).with_connection("tidb")
}
