//! Shared test support: a scripted container runtime double.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use ztd::error::{Error, Result};
use ztd::runtime::ContainerRuntime;
use ztd::types::{ContainerInfo, HealthState, COMPOSE_SERVICE_LABEL};

/// Build a container with a compose service label plus routing labels.
pub fn container(
    id: &str,
    service: &str,
    extra_labels: &[(&str, &str)],
    created: i64,
) -> ContainerInfo {
    let mut labels: HashMap<String, String> = extra_labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    labels.insert(COMPOSE_SERVICE_LABEL.to_string(), service.to_string());
    ContainerInfo {
        id: id.to_string(),
        labels,
        running: true,
        created,
    }
}

/// Routing labels every test service carries.
pub fn routing_labels(service: &str, rule: &str) -> Vec<(String, String)> {
    vec![
        ("traefik.enable".to_string(), "true".to_string()),
        (
            format!("traefik.http.routers.{service}.rule"),
            rule.to_string(),
        ),
    ]
}

/// Write a compose file declaring the given services and return the
/// handle (the file is removed when dropped).
pub fn write_compose_file(services: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yml")
        .tempfile()
        .unwrap();
    writeln!(file, "services:").unwrap();
    for service in services {
        writeln!(file, "  {service}:").unwrap();
        writeln!(file, "    image: example/{service}").unwrap();
    }
    file
}

#[derive(Default)]
pub struct FakeState {
    pub containers: Vec<ContainerInfo>,
    /// Per-container health sequence; the last entry repeats once the
    /// sequence is exhausted.
    pub health: HashMap<String, Vec<HealthState>>,
    pub health_polls: HashMap<String, usize>,
    /// Containers whose health query fails with a runtime error.
    pub health_errors: HashSet<String>,
    /// Containers appended to the inventory when `scale` is called.
    pub scale_adds: Vec<ContainerInfo>,
    pub scale_calls: Vec<(String, usize)>,
    pub compose_ups: Vec<Option<String>>,
    pub started: Vec<String>,
    pub removed: Vec<String>,
    pub logs_followed: Vec<String>,
}

#[derive(Default)]
pub struct FakeRuntime {
    pub state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_container(&self, info: ContainerInfo) {
        self.state.lock().unwrap().containers.push(info);
    }

    pub fn on_scale_add(&self, info: ContainerInfo) {
        self.state.lock().unwrap().scale_adds.push(info);
    }

    pub fn set_health_sequence(&self, id: &str, sequence: Vec<HealthState>) {
        self.state
            .lock()
            .unwrap()
            .health
            .insert(id.to_string(), sequence);
    }

    pub fn fail_health_for(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .health_errors
            .insert(id.to_string());
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn scale_calls(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().scale_calls.clone()
    }

    pub fn compose_ups(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().compose_ups.clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        Ok(self.state.lock().unwrap().containers.clone())
    }

    async fn health(&self, id: &str) -> Result<HealthState> {
        let mut state = self.state.lock().unwrap();
        if state.health_errors.contains(id) {
            return Err(Error::runtime(format!("inspect failed for {id}")));
        }
        let poll = state.health_polls.entry(id.to_string()).or_insert(0);
        let index = *poll;
        *poll += 1;
        let sequence = state
            .health
            .get(id)
            .cloned()
            .unwrap_or_else(|| vec![HealthState::NoHealthCheck]);
        Ok(*sequence
            .get(index)
            .unwrap_or_else(|| sequence.last().expect("empty health sequence")))
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.running)
            .unwrap_or(false))
    }

    async fn compose_up(&self, service: Option<&str>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .compose_ups
            .push(service.map(str::to_string));
        Ok(())
    }

    async fn scale(&self, service: &str, replicas: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.scale_calls.push((service.to_string(), replicas));
        let adds: Vec<ContainerInfo> = state.scale_adds.drain(..).collect();
        state.containers.extend(adds);
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.started.push(id.to_string());
        if let Some(c) = state.containers.iter_mut().find(|c| c.id == id) {
            c.running = true;
        }
        Ok(())
    }

    async fn stop_and_remove(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for id in ids {
            state.removed.push(id.clone());
            state.containers.retain(|c| &c.id != id);
        }
        Ok(())
    }

    async fn follow_logs(&self, id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .logs_followed
            .push(id.to_string());
        Ok(())
    }

    async fn follow_compose_logs(&self) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .logs_followed
            .push("<stack>".to_string());
        Ok(())
    }
}
