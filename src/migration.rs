//! Tenant-aware migrations: run the standard migration procedure once per selected tenant, switching the
//! default connection between runs. Tenants are processed sequentially in store order; a tenant's connection
//! is purged before the next one starts.

use crate::connection::PgConnectionRegistry;
use crate::error::TenantError;
use crate::resolver::TenantResolver;
use crate::tenant::Tenant;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Selector value meaning "every tenant".
pub const ALL_TENANTS: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TenantSelector {
    All,
    Subdomain(String),
}

impl TenantSelector {
    /// `None` for a missing or blank value: the caller must ask for a tenant or `*`.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(ALL_TENANTS) => Some(TenantSelector::All),
            Some(subdomain) => Some(TenantSelector::Subdomain(subdomain.to_string())),
            None => None,
        }
    }
}

impl fmt::Display for TenantSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantSelector::All => f.write_str(ALL_TENANTS),
            TenantSelector::Subdomain(s) => f.write_str(s),
        }
    }
}

/// The standard migration procedure, run against whatever connection is currently active.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn migrate(&self, tenant: &Tenant) -> Result<(), TenantError>;
}

/// Executes `.sql` scripts, in file-name order, on the registry's active pool.
pub struct SqlScriptMigrator {
    registry: Arc<PgConnectionRegistry>,
    scripts: Vec<(String, String)>,
}

impl SqlScriptMigrator {
    pub fn new(registry: Arc<PgConnectionRegistry>, scripts: Vec<(String, String)>) -> Self {
        SqlScriptMigrator { registry, scripts }
    }

    /// Load every `*.sql` file of `dir`, sorted by file name.
    pub async fn from_dir(registry: Arc<PgConnectionRegistry>, dir: &Path) -> Result<Self, TenantError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut scripts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let sql = tokio::fs::read_to_string(&path).await?;
            scripts.push((name, sql));
        }
        scripts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self::new(registry, scripts))
    }

    pub fn script_names(&self) -> Vec<&str> {
        self.scripts.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[async_trait]
impl Migrator for SqlScriptMigrator {
    async fn migrate(&self, tenant: &Tenant) -> Result<(), TenantError> {
        let pool = self.registry.pool()?;
        for (name, sql) in &self.scripts {
            sqlx::raw_sql(sql)
                .execute(&pool)
                .await
                .map_err(|e| TenantError::Migration(format!("{} on tenant {}: {}", name, tenant.id, e)))?;
            tracing::debug!(script = %name, tenant_id = %tenant.id, "applied");
        }
        Ok(())
    }
}

/// Outcome of one `migrate_tenants` run.
#[derive(Clone, Debug, Serialize)]
pub struct MigrationReport {
    pub selector: TenantSelector,
    /// Subdomains migrated, in order.
    pub migrated: Vec<String>,
    /// Requested or listed tenants that could not be resolved.
    pub not_found: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MigrationReport {
    fn new(selector: TenantSelector) -> Self {
        MigrationReport {
            selector,
            migrated: Vec::new(),
            not_found: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Run `migrator` for the selected tenants. A missing tenant is reported and skipped; a failing migration
/// stops the run (after its connection is purged).
pub async fn migrate_tenants<M>(
    resolver: &mut TenantResolver,
    migrator: &M,
    selector: &TenantSelector,
) -> Result<MigrationReport, TenantError>
where
    M: Migrator + ?Sized,
{
    let mut report = MigrationReport::new(selector.clone());

    let (tenants, revalidate) = match selector {
        TenantSelector::All => {
            tracing::info!("running migrations for all tenants");
            (resolver.get_all_tenants().await?, true)
        }
        TenantSelector::Subdomain(subdomain) => match resolver.resolve_by_subdomain(subdomain).await? {
            Some(tenant) => (vec![tenant], false),
            None => (Vec::new(), false),
        },
    };

    if tenants.is_empty() {
        tracing::warn!(selector = %selector, "could not find tenant");
        if let TenantSelector::Subdomain(subdomain) = selector {
            report.not_found.push(subdomain.clone());
        }
        return Ok(report.finish());
    }

    for tenant in tenants {
        let Some(subdomain) = tenant.subdomain().map(str::to_string) else {
            tracing::warn!(tenant_id = %tenant.id, "tenant has no subdomain, skipping");
            report.not_found.push(tenant.id.clone());
            continue;
        };

        let tenant = if revalidate {
            match resolver.resolve_by_subdomain(&subdomain).await? {
                Some(tenant) => tenant,
                None => {
                    tracing::warn!(subdomain = %subdomain, "could not find tenant");
                    report.not_found.push(subdomain);
                    continue;
                }
            }
        } else {
            tenant
        };

        tracing::info!(subdomain = %subdomain, "running migrations");
        let result = migrator.migrate(&tenant).await;
        resolver.purge_connection().await;
        result?;
        report.migrated.push(subdomain);
    }

    Ok(report.finish())
}
