//! Tenant store: lookup by predicate and full listing. Schema and table names come from
//! [`crate::settings::Settings`].

use crate::error::TenantError;
use crate::lookup::TenantPredicate;
use crate::tenant::Tenant;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use sqlx::PgPool;

/// Default tenants table name (inside the architect schema).
pub const TENANTS_TABLE: &str = "_sys_tenants";

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// First tenant matching the predicate, if any.
    async fn find_first(&self, predicate: &TenantPredicate) -> Result<Option<Tenant>, TenantError>;

    /// Every tenant, in store order.
    async fn find_all(&self) -> Result<Vec<Tenant>, TenantError>;
}

type TenantRow = (String, Option<String>, Option<String>, Option<String>, Option<Value>);

fn tenant_from_row((id, subdomain, alias_domain, connection, attributes): TenantRow) -> Tenant {
    let attributes = match attributes {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    Tenant {
        id,
        subdomain,
        alias_domain,
        connection,
        attributes,
    }
}

/// Tenants table in the landlord database.
#[derive(Clone, Debug)]
pub struct PgTenantStore {
    pool: PgPool,
    table: String,
}

impl PgTenantStore {
    pub fn with_table(pool: PgPool, schema: &str, table: &str) -> Self {
        PgTenantStore {
            pool,
            table: format!("{}.{}", quote_ident(schema), quote_ident(table)),
        }
    }

    pub fn qualified_table(&self) -> &str {
        &self.table
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT id, subdomain, alias_domain, connection, attributes FROM {}",
            self.table
        )
    }

    /// Create the schema and tenants table if missing.
    pub async fn ensure_tenants_table(&self) -> Result<(), TenantError> {
        if let Some((schema, _)) = self.table.split_once('.') {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
                .execute(&self.pool)
                .await?;
        }
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                subdomain TEXT,
                alias_domain TEXT,
                connection TEXT,
                attributes JSONB,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn find_first(&self, predicate: &TenantPredicate) -> Result<Option<Tenant>, TenantError> {
        let clause = predicate.to_where();
        let sql = format!("{} WHERE {} ORDER BY id LIMIT 1", self.select_sql(), clause.sql);
        let mut query = sqlx::query_as::<_, TenantRow>(&sql);
        for param in &clause.params {
            query = query.bind(param);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(tenant_from_row))
    }

    async fn find_all(&self) -> Result<Vec<Tenant>, TenantError> {
        let sql = format!("{} ORDER BY id", self.select_sql());
        let rows = sqlx::query_as::<_, TenantRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(tenant_from_row).collect())
    }
}

/// Ordered in-memory store; first match in insertion order wins.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<Vec<Tenant>>,
}

impl InMemoryTenantStore {
    pub fn new(tenants: Vec<Tenant>) -> Self {
        InMemoryTenantStore {
            tenants: RwLock::new(tenants),
        }
    }

    pub fn insert(&self, tenant: Tenant) {
        self.tenants.write().push(tenant);
    }

    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_first(&self, predicate: &TenantPredicate) -> Result<Option<Tenant>, TenantError> {
        Ok(self
            .tenants
            .read()
            .iter()
            .find(|t| predicate.matches(t))
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Tenant>, TenantError> {
        Ok(self.tenants.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_attributes_must_be_an_object() {
        let t = tenant_from_row(("1".into(), Some("acme".into()), None, Some("tidb".into()), Some(json!({"plan": "pro"}))));
        assert_eq!(t.attributes.get("plan"), Some(&json!("pro")));

        let t = tenant_from_row(("2".into(), None, None, None, Some(json!([1, 2]))));
        assert!(t.attributes.is_empty());
    }

    #[tokio::test]
    async fn pg_store_quotes_table_name() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy_with(sqlx::postgres::PgConnectOptions::new());
        let store = PgTenantStore::with_table(pool, "landlord", "tenants");
        assert_eq!(store.qualified_table(), "\"landlord\".\"tenants\"");
    }

    #[tokio::test]
    async fn in_memory_first_match_follows_insertion_order() {
        let store = InMemoryTenantStore::new(vec![
            Tenant::new("1").with_alias_domain("acme"),
            Tenant::new("2").with_subdomain("acme"),
        ]);
        let found = store
            .find_first(&TenantPredicate::console_selector("acme"))
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.id), Some("1".to_string()));

        store.insert(Tenant::new("3"));
        assert_eq!(store.find_all().await.unwrap().len(), 3);
        assert!(store
            .find_first(&TenantPredicate::subdomain("globex"))
            .await
            .unwrap()
            .is_none());
    }
}
