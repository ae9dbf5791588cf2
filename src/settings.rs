//! Runtime settings from the environment (after `.env` is loaded by the binary).

use crate::connection::{ConnectionConfig, ConnectionProfile};
use crate::error::SettingsError;
use crate::store::TENANTS_TABLE;
use std::path::PathBuf;

/// Profile name used when no connections file is given.
pub const DEFAULT_CONNECTION: &str = "pgsql";

#[derive(Clone, Debug)]
pub struct Settings {
    /// Landlord database holding the tenants table; also the base connection without a connections file.
    pub database_url: String,
    pub tenant_schema: String,
    pub tenant_table: String,
    /// JSON file with `{ "default": ..., "connections": { name: profile } }`.
    pub connections_path: Option<PathBuf>,
    pub max_connections: u32,
    pub bind_addr: String,
    pub migrations_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let database_url = get("DATABASE_URL").ok_or(SettingsError::Missing("DATABASE_URL"))?;
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| SettingsError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                message: e.to_string(),
            })?,
            None => 5,
        };
        Ok(Settings {
            database_url,
            tenant_schema: get("ARCHITECT_SCHEMA").unwrap_or_else(|| "architect".into()),
            tenant_table: get("TENANT_TABLE").unwrap_or_else(|| TENANTS_TABLE.into()),
            connections_path: get("TENANT_CONNECTIONS").map(PathBuf::from),
            max_connections,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".into()),
            migrations_path: get("MIGRATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("migrations")),
        })
    }

    /// Connection profiles from the connections file, or a single `pgsql` profile from `DATABASE_URL`.
    pub fn connection_config(&self) -> Result<ConnectionConfig, SettingsError> {
        match &self.connections_path {
            Some(path) => ConnectionConfig::load(path),
            None => Ok(ConnectionConfig::single(
                DEFAULT_CONNECTION,
                ConnectionProfile::from_url(&self.database_url),
            )),
        }
    }
}
