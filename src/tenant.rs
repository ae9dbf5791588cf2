//! Tenant records as stored in the landlord database. Read-only from the resolver's side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Connection value of a tenant that is provisioned but not yet usable.
pub const PENDING_CONNECTION: &str = "pending";

/// One customer/organization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    /// First host label of the tenant; also the database name (after the profile's prefix).
    #[serde(default)]
    pub subdomain: Option<String>,
    /// Alternate fully-qualified host mapped to this tenant.
    #[serde(default)]
    pub alias_domain: Option<String>,
    /// Connection profile name. Empty means the shared base connection; `pending` means not provisioned.
    #[serde(default)]
    pub connection: Option<String>,
    /// Remaining columns, carried into the `tenant` snapshot on activation.
    #[serde(default, flatten)]
    pub attributes: Map<String, Value>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Tenant {
    pub fn new(id: impl Into<String>) -> Self {
        Tenant {
            id: id.into(),
            subdomain: None,
            alias_domain: None,
            connection: None,
            attributes: Map::new(),
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_alias_domain(mut self, alias_domain: impl Into<String>) -> Self {
        self.alias_domain = Some(alias_domain.into());
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Subdomain, treating an empty string as absent.
    pub fn subdomain(&self) -> Option<&str> {
        non_empty(&self.subdomain)
    }

    pub fn alias_domain(&self) -> Option<&str> {
        non_empty(&self.alias_domain)
    }

    /// Connection profile name, treating an empty string as absent.
    pub fn connection(&self) -> Option<&str> {
        non_empty(&self.connection)
    }

    pub fn is_pending(&self) -> bool {
        self.connection() == Some(PENDING_CONNECTION)
    }

    /// A resolved record is only usable when it names a connection other than `pending`.
    pub fn is_usable(&self) -> bool {
        self.connection().is_some() && !self.is_pending()
    }

    /// Full attribute set, as written to the `tenant` configuration entry.
    pub fn snapshot(&self) -> Value {
        let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        let mut map = self.attributes.clone();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("subdomain".into(), opt(&self.subdomain));
        map.insert("alias_domain".into(), opt(&self.alias_domain));
        map.insert("connection".into(), opt(&self.connection));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_pending_connections_are_not_usable() {
        assert!(!Tenant::new("1").is_usable());
        assert!(!Tenant::new("1").with_connection("").is_usable());

        let pending = Tenant::new("1").with_subdomain("acme").with_connection(PENDING_CONNECTION);
        assert!(pending.is_pending());
        assert!(!pending.is_usable());

        assert!(Tenant::new("1").with_connection("tidb").is_usable());
    }

    #[test]
    fn empty_strings_read_as_absent() {
        let tenant = Tenant::new("7").with_subdomain("").with_alias_domain("");
        assert_eq!(tenant.subdomain(), None);
        assert_eq!(tenant.alias_domain(), None);
    }

    #[test]
    fn snapshot_carries_extra_attributes() {
        let tenant = Tenant::new("42")
            .with_subdomain("acme")
            .with_connection("tidb")
            .with_attribute("plan", json!("pro"));
        assert_eq!(
            tenant.snapshot(),
            json!({
                "id": "42",
                "subdomain": "acme",
                "alias_domain": null,
                "connection": "tidb",
                "plan": "pro"
            })
        );
    }

    #[test]
    fn deserializes_extra_columns_into_attributes() {
        let tenant: Tenant = serde_json::from_value(json!({
            "id": "3",
            "subdomain": "globex",
            "connection": "tidb",
            "region": "eu"
        }))
        .unwrap();
        assert_eq!(tenant.subdomain(), Some("globex"));
        assert_eq!(tenant.attributes.get("region"), Some(&json!("eu")));
    }
}
