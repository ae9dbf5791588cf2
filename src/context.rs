//! Execution context handed to the resolver at construction: an inbound request or a console invocation.

use axum::http::{header, HeaderMap, Uri};
use std::collections::HashMap;

/// Console flag carrying the tenant selector.
pub const TENANT_FLAG: &str = "tenant";

#[derive(Clone, Debug)]
pub enum ExecutionContext {
    /// Request-scoped: resolution failure aborts the request.
    Interactive(RequestTarget),
    /// CLI: resolution failure is non-fatal and lookup errors are swallowed.
    Console(ConsoleArgs),
}

impl ExecutionContext {
    pub fn is_console(&self) -> bool {
        matches!(self, ExecutionContext::Console(_))
    }
}

/// Host and path of an inbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTarget {
    host: String,
    path: String,
}

impl RequestTarget {
    /// Host without port; path as received.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        let host = host.into();
        let host = strip_port(&host).to_ascii_lowercase();
        RequestTarget {
            host,
            path: path.into(),
        }
    }

    /// Host header first, then the URI authority (HTTP/2 requests carry no Host header).
    pub fn from_http(headers: &HeaderMap, uri: &Uri) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.host().map(str::to_string))
            .unwrap_or_default();
        RequestTarget::new(host, uri.path())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// First label of the host, e.g. `acme` for `acme.example.com`.
    pub fn subdomain(&self) -> &str {
        self.host.split('.').next().unwrap_or("")
    }

    pub fn first_path_segment(&self) -> Option<&str> {
        self.path.split('/').find(|s| !s.is_empty())
    }
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets; only a trailing :port is removed.
    match host.rsplit_once(':') {
        Some((name, port))
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) && !name.ends_with(':') =>
        {
            name
        }
        _ => host,
    }
}

/// Named console options, as parsed by the command line front end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsoleArgs {
    flags: HashMap<String, String>,
}

impl ConsoleArgs {
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Flag value by name; `None` when absent or empty.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn tenant(&self) -> Option<&str> {
        self.flag(TENANT_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_target_splits_host_and_path() {
        let target = RequestTarget::new("Acme.Example.com:8080", "/42/orders");
        assert_eq!(target.host(), "acme.example.com");
        assert_eq!(target.subdomain(), "acme");
        assert_eq!(target.first_path_segment(), Some("42"));

        assert_eq!(RequestTarget::new("localhost", "/").first_path_segment(), None);
        assert_eq!(RequestTarget::new("[::1]:3000", "").host(), "[::1]");
    }

    #[test]
    fn request_target_prefers_host_header() {
        let (parts, _) = axum::http::Request::builder()
            .uri("http://ignored.example.com/7/x")
            .header("host", "globex.example.com:3000")
            .body(())
            .unwrap()
            .into_parts();
        let target = RequestTarget::from_http(&parts.headers, &parts.uri);
        assert_eq!(target.host(), "globex.example.com");
        assert_eq!(target.first_path_segment(), Some("7"));
    }

    #[test]
    fn console_args_absent_or_empty_tenant_is_none() {
        assert_eq!(ConsoleArgs::default().tenant(), None);
        assert_eq!(ConsoleArgs::default().with_flag(TENANT_FLAG, "").tenant(), None);

        let args = ConsoleArgs::default().with_flag(TENANT_FLAG, "acme").with_flag("path", "db");
        assert_eq!(args.tenant(), Some("acme"));
        assert_eq!(args.flag("path"), Some("db"));
        assert_eq!(args.flag("force"), None);
    }
}
