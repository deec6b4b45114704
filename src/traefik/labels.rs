//! Structured access to the recognized container label namespace.
//!
//! Label keys are built in exactly one place, keyed by (namespace,
//! service, field), instead of being concatenated ad hoc at every call
//! site. Only the closed set of keys below is honored:
//!
//! - `traefik.enable`
//! - `traefik.{http,tcp}.routers.<name>.{rule,entrypoints}`
//! - `traefik.{http,tcp}.services.<name>.loadbalancer.server.port`
//! - `traefik.http.services.<name>.loadbalancer.healthCheck.*`

use std::collections::HashMap;

use super::model::HealthCheckSpec;

pub const ENABLE_LABEL: &str = "traefik.enable";

/// Router protocol namespace within the label tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Http,
    Tcp,
}

impl Namespace {
    fn as_str(self) -> &'static str {
        match self {
            Namespace::Http => "http",
            Namespace::Tcp => "tcp",
        }
    }
}

/// Health-check fields settable through labels, in document order.
const HEALTH_CHECK_FIELDS: [&str; 10] = [
    "path",
    "interval",
    "timeout",
    "scheme",
    "mode",
    "hostname",
    "port",
    "followRedirects",
    "method",
    "status",
];

fn router_key(ns: Namespace, service: &str, field: &str) -> String {
    format!("traefik.{}.routers.{}.{}", ns.as_str(), service, field)
}

fn service_key(ns: Namespace, service: &str, field: &str) -> String {
    format!(
        "traefik.{}.services.{}.loadbalancer.{}",
        ns.as_str(),
        service,
        field
    )
}

/// A view over one container's label map, scoped to one service name.
pub struct ServiceLabels<'a> {
    service: &'a str,
    labels: &'a HashMap<String, String>,
}

impl<'a> ServiceLabels<'a> {
    pub fn new(service: &'a str, labels: &'a HashMap<String, String>) -> Self {
        Self { service, labels }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.labels
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether the container opts in to routing at all.
    pub fn enabled(&self) -> bool {
        self.labels.get(ENABLE_LABEL).map(String::as_str) == Some("true")
    }

    pub fn router_rule(&self, ns: Namespace) -> Option<&'a str> {
        self.get(&router_key(ns, self.service, "rule"))
    }

    pub fn entrypoints(&self, ns: Namespace) -> Option<&'a str> {
        self.get(&router_key(ns, self.service, "entrypoints"))
    }

    pub fn server_port(&self, ns: Namespace) -> Option<&'a str> {
        self.get(&service_key(ns, self.service, "server.port"))
    }

    /// Extract the health-check sub-document from the label tree.
    ///
    /// Presence of any key under the `healthCheck` prefix triggers
    /// extraction; the caller attaches the result only when at least one
    /// field is non-empty. Headers may arrive as one JSON-encoded blob
    /// under `...healthCheck.headers` or as individually keyed
    /// `...healthCheck.headers.<name>` labels; both are merged, with
    /// individual keys taking precedence. A malformed JSON blob is an
    /// error so the caller can skip the service.
    pub fn health_check(&self) -> Result<Option<HealthCheckSpec>, serde_json::Error> {
        let prefix = service_key(Namespace::Http, self.service, "healthCheck");
        if !self.labels.keys().any(|k| k.starts_with(prefix.as_str())) {
            return Ok(None);
        }

        let field = |name: &str| -> String {
            self.get(&format!("{prefix}.{name}"))
                .unwrap_or_default()
                .to_string()
        };

        let mut spec = HealthCheckSpec::default();
        for name in HEALTH_CHECK_FIELDS {
            let value = field(name);
            match name {
                "path" => spec.path = value,
                "interval" => spec.interval = value,
                "timeout" => spec.timeout = value,
                "scheme" => spec.scheme = value,
                "mode" => spec.mode = value,
                "hostname" => spec.hostname = value,
                "port" => spec.port = value,
                "followRedirects" => spec.follow_redirects = value,
                "method" => spec.method = value,
                "status" => spec.status = value,
                _ => unreachable!(),
            }
        }

        // JSON blob first, then individual header labels on top.
        if let Some(blob) = self.get(&format!("{prefix}.headers")) {
            let parsed: HashMap<String, String> = serde_json::from_str(blob)?;
            spec.headers.extend(parsed);
        }
        let header_prefix = format!("{prefix}.headers.");
        for (key, value) in self.labels {
            if let Some(name) = key.strip_prefix(header_prefix.as_str()) {
                if !name.is_empty() && !value.is_empty() {
                    spec.headers.insert(name.to_string(), value.clone());
                }
            }
        }

        Ok(Some(spec))
    }
}
