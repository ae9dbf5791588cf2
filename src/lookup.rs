//! Tenant lookup predicates: OR/AND chains of equality clauses over tenant columns.
//! Evaluated in memory by [`crate::store::InMemoryTenantStore`] and rendered to parameterized SQL by the Postgres store.

use crate::context::RequestTarget;
use crate::tenant::Tenant;

/// Tenant columns a lookup may match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenantField {
    Id,
    Subdomain,
    AliasDomain,
}

impl TenantField {
    pub fn column(self) -> &'static str {
        match self {
            TenantField::Id => "id",
            TenantField::Subdomain => "subdomain",
            TenantField::AliasDomain => "alias_domain",
        }
    }

    fn raw<'a>(self, tenant: &'a Tenant) -> Option<&'a str> {
        match self {
            TenantField::Id => Some(tenant.id.as_str()),
            TenantField::Subdomain => tenant.subdomain.as_deref(),
            TenantField::AliasDomain => tenant.alias_domain.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TenantPredicate {
    /// Column equals the value exactly.
    Eq(TenantField, String),
    /// Column is NULL or the empty string.
    IsEmpty(TenantField),
    And(Vec<TenantPredicate>),
    Or(Vec<TenantPredicate>),
}

/// WHERE clause with `$n` placeholders and the values to bind, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<String>,
}

/// Quote identifier for PostgreSQL (columns come from [`TenantField`] only).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

impl TenantPredicate {
    /// Console selector: subdomain, alias domain, or id equals the selector. First match wins.
    pub fn console_selector(selector: &str) -> Self {
        TenantPredicate::Or(vec![
            TenantPredicate::Eq(TenantField::Subdomain, selector.to_string()),
            TenantPredicate::Eq(TenantField::AliasDomain, selector.to_string()),
            TenantPredicate::Eq(TenantField::Id, selector.to_string()),
        ])
    }

    /// Request lookup: (subdomain = first host label OR alias_domain = host)
    /// OR (no domain mapping AND id = first path segment).
    pub fn request(target: &RequestTarget) -> Self {
        let by_domain = TenantPredicate::Or(vec![
            TenantPredicate::Eq(TenantField::Subdomain, target.subdomain().to_string()),
            TenantPredicate::Eq(TenantField::AliasDomain, target.host().to_string()),
        ]);
        match target.first_path_segment() {
            Some(id) => TenantPredicate::Or(vec![
                by_domain,
                TenantPredicate::And(vec![
                    TenantPredicate::IsEmpty(TenantField::Subdomain),
                    TenantPredicate::IsEmpty(TenantField::AliasDomain),
                    TenantPredicate::Eq(TenantField::Id, id.to_string()),
                ]),
            ]),
            None => by_domain,
        }
    }

    /// Strict subdomain lookup used to target one tenant deterministically.
    pub fn subdomain(subdomain: &str) -> Self {
        TenantPredicate::Eq(TenantField::Subdomain, subdomain.to_string())
    }

    pub fn matches(&self, tenant: &Tenant) -> bool {
        match self {
            TenantPredicate::Eq(field, value) => field.raw(tenant) == Some(value.as_str()),
            TenantPredicate::IsEmpty(field) => field.raw(tenant).map_or(true, str::is_empty),
            TenantPredicate::And(parts) => parts.iter().all(|p| p.matches(tenant)),
            TenantPredicate::Or(parts) => parts.iter().any(|p| p.matches(tenant)),
        }
    }

    pub fn to_where(&self) -> WhereClause {
        let mut params = Vec::new();
        let sql = self.render(&mut params);
        WhereClause { sql, params }
    }

    fn render(&self, params: &mut Vec<String>) -> String {
        match self {
            TenantPredicate::Eq(field, value) => {
                params.push(value.clone());
                format!("{} = ${}", quoted(field.column()), params.len())
            }
            TenantPredicate::IsEmpty(field) => {
                let col = quoted(field.column());
                format!("({col} IS NULL OR {col} = '')")
            }
            TenantPredicate::And(parts) if parts.is_empty() => "TRUE".into(),
            TenantPredicate::Or(parts) if parts.is_empty() => "FALSE".into(),
            TenantPredicate::And(parts) => Self::join(parts, " AND ", params),
            TenantPredicate::Or(parts) => Self::join(parts, " OR ", params),
        }
    }

    fn join(parts: &[TenantPredicate], op: &str, params: &mut Vec<String>) -> String {
        let rendered: Vec<String> = parts.iter().map(|p| p.render(params)).collect();
        format!("({})", rendered.join(op))
    }
}
