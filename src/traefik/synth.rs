//! Full rebuild of the dynamic configuration from the container inventory.
//!
//! Synthesis is a pure function of (running containers, declared service
//! set); it never consults the previously published document. Per-service
//! problems are soft failures: the service is skipped with a log line and
//! generation continues for the rest.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{debug, info, warn};

use super::labels::{Namespace, ServiceLabels};
use super::model::{BackendService, DynamicConfig, LoadBalancer, Router, Server};
use crate::compose::ComposeProject;
use crate::error::Result;
use crate::runtime::ContainerRuntime;
use crate::types::ContainerInfo;

const DEFAULT_BACKEND_PORT: &str = "80";

/// Build a complete document from a container snapshot.
///
/// Only running containers whose compose service label appears in
/// `declared` produce targets. The first replica (by creation time, then
/// id) is the representative whose labels configure the service.
pub fn synthesize(containers: &[ContainerInfo], declared: &BTreeSet<String>) -> DynamicConfig {
    let mut by_service: BTreeMap<&str, Vec<&ContainerInfo>> = BTreeMap::new();
    for container in containers {
        if !container.running {
            continue;
        }
        let Some(service) = container.service() else {
            continue;
        };
        if declared.contains(service) {
            by_service.entry(service).or_default().push(container);
        }
    }

    let mut config = DynamicConfig::default();
    for (service, mut group) in by_service {
        group.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        let representative = group[0];
        let view = ServiceLabels::new(service, &representative.labels);

        if !view.enabled() {
            debug!("Skipping service {} (routing not enabled)", service);
            continue;
        }
        let Some(rule) = view.router_rule(Namespace::Http) else {
            warn!("No router rule found for service {}, skipping", service);
            continue;
        };
        let port = view
            .server_port(Namespace::Http)
            .unwrap_or(DEFAULT_BACKEND_PORT);

        let mut seen = BTreeSet::new();
        let mut servers = Vec::new();
        for container in &group {
            let url = format!("http://{}:{}", container.short_id(), port);
            if seen.insert(url.clone()) {
                servers.push(Server { url });
            }
        }
        if servers.is_empty() {
            continue;
        }

        let health_check = match view.health_check() {
            Ok(spec) => spec.filter(|s| !s.is_empty()),
            Err(e) => {
                warn!(
                    "Service {}: malformed health-check headers JSON ({}), skipping",
                    service, e
                );
                continue;
            }
        };

        config.http.routers.insert(
            service.to_string(),
            Router {
                rule: rule.to_string(),
                service: service.to_string(),
            },
        );
        config.http.services.insert(
            service.to_string(),
            BackendService {
                load_balancer: LoadBalancer {
                    servers,
                    health_check,
                },
            },
        );
    }
    config
}

/// Rebuild the document from live runtime state and publish it.
pub async fn resync(
    runtime: &dyn ContainerRuntime,
    project: &ComposeProject,
    path: &Path,
) -> Result<()> {
    let declared = project.service_names()?;
    let snapshot = runtime.list_containers().await?;
    let config = synthesize(&snapshot, &declared);
    super::publish(path, &config)?;
    info!(
        "Routing configuration written to {} ({} services)",
        path.display(),
        config.http.services.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn declared(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn container(id: &str, service: &str, labels: &[(&str, &str)], created: i64) -> ContainerInfo {
        let mut map: HashMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert(
            crate::types::COMPOSE_SERVICE_LABEL.to_string(),
            service.to_string(),
        );
        ContainerInfo {
            id: id.to_string(),
            labels: map,
            running: true,
            created,
        }
    }

    fn api_labels() -> Vec<(&'static str, &'static str)> {
        vec![
            ("traefik.enable", "true"),
            ("traefik.http.routers.api.rule", "Host(`a.com`)"),
        ]
    }

    #[test]
    fn two_containers_default_port() {
        let containers = vec![
            container("a111111111111111", "api", &api_labels(), 1),
            container("b222222222222222", "api", &api_labels(), 2),
        ];
        let config = synthesize(&containers, &declared(&["api"]));

        let router = &config.http.routers["api"];
        assert_eq!(router.rule, "Host(`a.com`)");
        assert_eq!(router.service, "api");

        let servers = &config.http.services["api"].load_balancer.servers;
        let urls: Vec<&str> = servers.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, ["http://a11111111111:80", "http://b22222222222:80"]);
    }

    #[test]
    fn port_label_overrides_default() {
        let mut labels = api_labels();
        labels.push(("traefik.http.services.api.loadbalancer.server.port", "8080"));
        let containers = vec![container("a111111111111111", "api", &labels, 1)];
        let config = synthesize(&containers, &declared(&["api"]));
        assert_eq!(
            config.http.services["api"].load_balancer.servers[0].url,
            "http://a11111111111:8080"
        );
    }

    #[test]
    fn idempotent_byte_identical() {
        let containers = vec![
            container("a111111111111111", "api", &api_labels(), 1),
            container(
                "c333333333333333",
                "web",
                &[
                    ("traefik.enable", "true"),
                    ("traefik.http.routers.web.rule", "Host(`w.com`)"),
                ],
                3,
            ),
        ];
        let set = declared(&["api", "web"]);
        let first = serde_yaml::to_string(&synthesize(&containers, &set)).unwrap();
        let second = serde_yaml::to_string(&synthesize(&containers, &set)).unwrap();
        assert_eq!(first, second);

        // List order must not matter either.
        let mut reversed = containers.clone();
        reversed.reverse();
        let third = serde_yaml::to_string(&synthesize(&reversed, &set)).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn undeclared_service_is_ignored() {
        let containers = vec![container("a111111111111111", "rogue", &api_labels(), 1)];
        let config = synthesize(&containers, &declared(&["api"]));
        assert!(config.http.services.is_empty());
    }

    #[test]
    fn disabled_or_ruleless_services_are_skipped() {
        let no_enable = vec![container(
            "a111111111111111",
            "api",
            &[("traefik.http.routers.api.rule", "Host(`a.com`)")],
            1,
        )];
        assert!(synthesize(&no_enable, &declared(&["api"]))
            .http
            .services
            .is_empty());

        let no_rule = vec![container(
            "a111111111111111",
            "api",
            &[("traefik.enable", "true")],
            1,
        )];
        assert!(synthesize(&no_rule, &declared(&["api"]))
            .http
            .services
            .is_empty());
    }

    #[test]
    fn stopped_containers_produce_no_targets() {
        let mut stopped = container("a111111111111111", "api", &api_labels(), 1);
        stopped.running = false;
        let config = synthesize(&[stopped], &declared(&["api"]));
        assert!(config.http.services.is_empty());
    }

    #[test]
    fn empty_health_check_is_not_attached() {
        let mut labels = api_labels();
        labels.push((
            "traefik.http.services.api.loadbalancer.healthCheck.path",
            "",
        ));
        let containers = vec![container("a111111111111111", "api", &labels, 1)];
        let config = synthesize(&containers, &declared(&["api"]));
        assert!(config.http.services["api"]
            .load_balancer
            .health_check
            .is_none());
    }

    #[test]
    fn populated_health_check_is_attached() {
        let mut labels = api_labels();
        labels.push((
            "traefik.http.services.api.loadbalancer.healthCheck.path",
            "/health",
        ));
        labels.push((
            "traefik.http.services.api.loadbalancer.healthCheck.headers.X-Probe",
            "1",
        ));
        let containers = vec![container("a111111111111111", "api", &labels, 1)];
        let config = synthesize(&containers, &declared(&["api"]));
        let spec = config.http.services["api"]
            .load_balancer
            .health_check
            .as_ref()
            .unwrap();
        assert_eq!(spec.path, "/health");
        assert_eq!(spec.headers.get("X-Probe").map(String::as_str), Some("1"));
        assert!(spec.interval.is_empty());
    }

    #[test]
    fn malformed_headers_skip_only_that_service() {
        let mut bad = api_labels();
        bad.push((
            "traefik.http.services.api.loadbalancer.healthCheck.headers",
            "{broken",
        ));
        let containers = vec![
            container("a111111111111111", "api", &bad, 1),
            container(
                "c333333333333333",
                "web",
                &[
                    ("traefik.enable", "true"),
                    ("traefik.http.routers.web.rule", "Host(`w.com`)"),
                ],
                3,
            ),
        ];
        let config = synthesize(&containers, &declared(&["api", "web"]));
        assert!(!config.http.services.contains_key("api"));
        assert!(config.http.services.contains_key("web"));
        assert!(!config.http.routers.contains_key("api"));
    }

    #[test]
    fn duplicate_addresses_are_collapsed() {
        // Same short id and port twice (degenerate snapshot).
        let containers = vec![
            container("a111111111111111", "api", &api_labels(), 1),
            container("a11111111111", "api", &api_labels(), 2),
        ];
        let config = synthesize(&containers, &declared(&["api"]));
        assert_eq!(config.http.services["api"].load_balancer.servers.len(), 1);
    }
}
