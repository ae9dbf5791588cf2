//! Connection profiles, the process-wide connection configuration, and the registry that owns pooled handles.
//!
//! The resolver rewrites two things here on every switch: which profile name is the default, and the
//! `database` field of that profile. Pools opened under old parameters must be purged after each rewrite,
//! or a handle opened for one tenant can serve the next.

use crate::error::{SettingsError, TenantError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Synthetic profile registered at resolver construction, seeded from the base profile.
pub const TENANT_BASE_CONNECTION: &str = "envtenant";

/// Named bundle of connection parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Empty means the database encoded in `url` (or the server default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Prepended to the tenant subdomain to form an isolated tenant's database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_prefix: Option<String>,
}

impl ConnectionProfile {
    pub fn from_url(url: impl Into<String>) -> Self {
        ConnectionProfile {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_database_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.database_prefix = Some(prefix.into());
        self
    }

    pub fn get(&self, field: ProfileField) -> Option<&str> {
        match field {
            ProfileField::Url => self.url.as_deref(),
            ProfileField::Host => self.host.as_deref(),
            ProfileField::Database => self.database.as_deref(),
            ProfileField::DatabasePrefix => self.database_prefix.as_deref(),
        }
    }

    pub fn set(&mut self, field: ProfileField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            ProfileField::Url => self.url = value,
            ProfileField::Host => self.host = value,
            ProfileField::Database => self.database = value,
            ProfileField::DatabasePrefix => self.database_prefix = value,
        }
    }

    /// sqlx connect options: URL first, then explicit fields override it. An empty database is left as the URL's.
    pub fn connect_options(&self) -> Result<PgConnectOptions, TenantError> {
        let mut opts = match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => PgConnectOptions::from_str(url).map_err(|e| {
                TenantError::Settings(SettingsError::Invalid {
                    key: "url",
                    message: e.to_string(),
                })
            })?,
            None => PgConnectOptions::new(),
        };
        if let Some(host) = &self.host {
            opts = opts.host(host);
        }
        if let Some(port) = self.port {
            opts = opts.port(port);
        }
        if let Some(username) = &self.username {
            opts = opts.username(username);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        if let Some(database) = self.database.as_deref().filter(|d| !d.is_empty()) {
            opts = opts.database(database);
        }
        Ok(opts)
    }
}

/// Profile fields addressable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileField {
    Url,
    Host,
    Database,
    DatabasePrefix,
}

/// Shape of the connections JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionsFile {
    pub default: String,
    pub connections: HashMap<String, ConnectionProfile>,
}

#[derive(Debug)]
struct ConfigState {
    default: String,
    profiles: HashMap<String, ConnectionProfile>,
    tenant: Option<Value>,
}

/// Process-wide connection configuration: default profile name, profiles by name, and the
/// `tenant` snapshot of the active isolated tenant.
#[derive(Debug)]
pub struct ConnectionConfig {
    inner: RwLock<ConfigState>,
}

impl ConnectionConfig {
    pub fn new(default: impl Into<String>, profiles: HashMap<String, ConnectionProfile>) -> Self {
        ConnectionConfig {
            inner: RwLock::new(ConfigState {
                default: default.into(),
                profiles,
                tenant: None,
            }),
        }
    }

    /// One profile, marked default.
    pub fn single(name: impl Into<String>, profile: ConnectionProfile) -> Self {
        let name = name.into();
        let profiles = HashMap::from([(name.clone(), profile)]);
        Self::new(name, profiles)
    }

    pub fn from_file(file: ConnectionsFile) -> Result<Self, SettingsError> {
        if !file.connections.contains_key(&file.default) {
            return Err(SettingsError::Invalid {
                key: "default",
                message: format!("no connection named '{}'", file.default),
            });
        }
        Ok(Self::new(file.default, file.connections))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let to_err = |message: String| SettingsError::ConnectionsFile {
            path: path.display().to_string(),
            message,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| to_err(e.to_string()))?;
        let file: ConnectionsFile = serde_json::from_str(&raw).map_err(|e| to_err(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn default_connection(&self) -> String {
        self.inner.read().default.clone()
    }

    pub fn set_default_connection(&self, name: &str) {
        self.inner.write().default = name.to_string();
    }

    pub fn profile(&self, name: &str) -> Option<ConnectionProfile> {
        self.inner.read().profiles.get(name).cloned()
    }

    pub fn set_profile(&self, name: &str, profile: ConnectionProfile) {
        self.inner.write().profiles.insert(name.to_string(), profile);
    }

    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().profiles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn field(&self, name: &str, field: ProfileField) -> Option<String> {
        self.inner
            .read()
            .profiles
            .get(name)
            .and_then(|p| p.get(field))
            .map(str::to_string)
    }

    /// Writes one field; a missing profile is created holding only that field.
    pub fn set_field(&self, name: &str, field: ProfileField, value: &str) {
        let mut state = self.inner.write();
        let profile = state.profiles.entry(name.to_string()).or_insert_with(|| {
            tracing::warn!(connection = %name, "writing field of undefined connection profile");
            ConnectionProfile::default()
        });
        profile.set(field, value);
    }

    pub fn current_tenant(&self) -> Option<Value> {
        self.inner.read().tenant.clone()
    }

    pub fn set_current_tenant(&self, snapshot: Value) {
        self.inner.write().tenant = Some(snapshot);
    }
}

/// Connection configuration plus the manager of live handles.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    fn config(&self) -> &ConnectionConfig;

    /// Point the connection manager at `name` for subsequent connections.
    fn use_connection(&self, name: &str);

    /// Connection the manager currently hands out.
    fn active_connection(&self) -> String;

    /// Close and drop cached handles so the next use reconnects with current parameters. Idempotent.
    async fn purge(&self);
}

/// Registry backed by lazily-connected sqlx Postgres pools, one per profile name.
#[derive(Debug)]
pub struct PgConnectionRegistry {
    config: ConnectionConfig,
    active: RwLock<String>,
    pools: Mutex<HashMap<String, PgPool>>,
    max_connections: u32,
}

impl PgConnectionRegistry {
    pub fn new(config: ConnectionConfig) -> Self {
        let active = config.default_connection();
        PgConnectionRegistry {
            config,
            active: RwLock::new(active),
            pools: Mutex::new(HashMap::new()),
            max_connections: 5,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Pool of the active connection.
    pub fn pool(&self) -> Result<PgPool, TenantError> {
        let name = self.active_connection();
        self.pool_for(&name)
    }

    /// Cached pool for `name`, created from the profile's current parameters on first use.
    pub fn pool_for(&self, name: &str) -> Result<PgPool, TenantError> {
        if let Some(pool) = self.pools.lock().get(name) {
            return Ok(pool.clone());
        }
        let pool = self.open_pool(name)?;
        let mut pools = self.pools.lock();
        Ok(pools.entry(name.to_string()).or_insert(pool).clone())
    }

    /// Uncached pool for `name`. Not closed by `purge`; for long-lived landlord access.
    pub fn open_pool(&self, name: &str) -> Result<PgPool, TenantError> {
        let profile = self
            .config
            .profile(name)
            .ok_or_else(|| TenantError::UnknownConnection(name.to_string()))?;
        let opts = profile.connect_options()?;
        Ok(PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_lazy_with(opts))
    }

    pub fn cached_pools(&self) -> usize {
        self.pools.lock().len()
    }
}

#[async_trait]
impl ConnectionRegistry for PgConnectionRegistry {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn use_connection(&self, name: &str) {
        *self.active.write() = name.to_string();
    }

    fn active_connection(&self) -> String {
        self.active.read().clone()
    }

    async fn purge(&self) {
        let pools: Vec<(String, PgPool)> = self.pools.lock().drain().collect();
        for (name, pool) in pools {
            pool.close().await;
            tracing::debug!(connection = %name, "purged pool");
        }
    }
}
