//! The rolling-update state machine.
//!
//! One deployment attempt runs to completion (or failure) per invocation:
//! scale the service to double size without touching the running
//! containers, gate on the new half becoming healthy, repoint the routing
//! document, drain, retire the old half, then resynthesize the full
//! document from live state. A failed health gate rolls back only the new
//! containers; the old deployment keeps serving throughout.

use std::collections::BTreeSet;

use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::compose::ComposeProject;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::health;
use crate::lock::DeployLock;
use crate::runtime::ContainerRuntime;
use crate::traefik;
use crate::types::{sort_stable, ContainerInfo};

/// Phases of one rolling-update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Scaling,
    HealthGating,
    RoutingSwap,
    Draining,
    Cleanup,
    Resync,
    Done,
    RollingBack,
    Failed,
}

/// Tracks the phase of the in-flight attempt for transition logging.
#[derive(Debug)]
struct Attempt {
    service: String,
    state: UpdateState,
}

impl Attempt {
    fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            state: UpdateState::Idle,
        }
    }

    fn transition(&mut self, next: UpdateState) {
        debug!("{}: {:?} -> {:?}", self.service, self.state, next);
        self.state = next;
    }
}

/// Doubling is what produces the overlap window: the old replicas keep
/// serving while an equal number of new ones start.
pub fn scale_target(current: usize) -> usize {
    current * 2
}

/// The containers present after scaling but not before: a set difference
/// on full ids, never a positional comparison. Result is sorted by
/// (created, id) so downstream pairing is deterministic.
pub fn added_containers(before: &[ContainerInfo], after: &[ContainerInfo]) -> Vec<ContainerInfo> {
    let known: BTreeSet<&str> = before.iter().map(|c| c.id.as_str()).collect();
    let mut added: Vec<ContainerInfo> = after
        .iter()
        .filter(|c| !known.contains(c.id.as_str()))
        .cloned()
        .collect();
    sort_stable(&mut added);
    added
}

/// Drives deployments against an explicit runtime handle and project;
/// there is no process-global state.
pub struct Deployer<'a> {
    runtime: &'a dyn ContainerRuntime,
    project: &'a ComposeProject,
    config: &'a Config,
}

impl<'a> Deployer<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        project: &'a ComposeProject,
        config: &'a Config,
    ) -> Self {
        Self {
            runtime,
            project,
            config,
        }
    }

    /// Entry point: `up` converges the whole stack, anything else is a
    /// rolling update (or plain start) of one service.
    pub async fn run(&self, service: &str) -> Result<()> {
        if service == "up" {
            self.converge_stack().await
        } else {
            self.update_service(service).await
        }
    }

    async fn update_service(&self, service: &str) -> Result<()> {
        let declared = self.project.service_names()?;
        if !declared.contains(service) {
            return Err(Error::config(format!(
                "service '{service}' not found in compose files"
            )));
        }

        let _lock = DeployLock::acquire(self.project.project_name().as_deref(), service)?;

        let old = self.service_containers(service).await?;
        if old.is_empty() {
            info!("Service '{}' is not running. Starting the service.", service);
            return self.start_service(service).await;
        }

        let mut attempt = Attempt::new(service);

        // Scaling: double the instance count, old set untouched.
        attempt.transition(UpdateState::Scaling);
        let target = scale_target(old.len());
        info!("Scaling '{}' to {} instances", service, target);
        self.runtime.scale(service, target).await?;

        let after = self.service_containers(service).await?;
        let new = added_containers(&old, &after);
        let old_ids: Vec<String> = old.iter().map(|c| c.id.clone()).collect();
        let new_ids: Vec<String> = new.iter().map(|c| c.id.clone()).collect();
        info!(
            "Old containers: {:?}",
            old.iter().map(ContainerInfo::short_id).collect::<Vec<_>>()
        );
        info!(
            "New containers: {:?}",
            new.iter().map(ContainerInfo::short_id).collect::<Vec<_>>()
        );

        // HealthGating: only a gate timeout rolls back; a runtime error
        // while polling aborts without touching either container set.
        attempt.transition(UpdateState::HealthGating);
        match health::await_healthy(self.runtime, &new_ids, self.config.healthcheck_timeout()).await
        {
            Ok(()) => {}
            Err(timeout @ Error::HealthGateTimeout { .. }) => {
                attempt.transition(UpdateState::RollingBack);
                error!("New containers are not healthy. Rolling back.");
                if let Err(e) = self.runtime.stop_and_remove(&new_ids).await {
                    error!("Failed to roll back new containers: {}", e);
                }
                attempt.transition(UpdateState::Failed);
                return Err(timeout);
            }
            Err(e) => {
                attempt.transition(UpdateState::Failed);
                return Err(e);
            }
        }

        // RoutingSwap: repoint the published document at the new
        // backends. On publish failure nothing has been torn down yet,
        // so abort here: old keeps serving, new keeps running.
        attempt.transition(UpdateState::RoutingSwap);
        match traefik::patch::patch_file(&self.config.traefik_conf, &old_ids, &new_ids) {
            Ok(rewritten) => {
                info!("Rewired {} backend target(s) to new containers", rewritten);
            }
            Err(e) => {
                attempt.transition(UpdateState::Failed);
                return Err(e);
            }
        }

        // Draining: optional settle delay, then the unconditional drain
        // delay even when a real health check gated the new containers.
        attempt.transition(UpdateState::Draining);
        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            info!(
                "Waiting {}s for healthy containers to settle down",
                settle.as_secs()
            );
            sleep(settle).await;
        }
        let drain = self.config.drain_delay();
        info!(
            "Waiting {}s before stopping old containers",
            drain.as_secs()
        );
        sleep(drain).await;

        // Cleanup: retire the old half.
        attempt.transition(UpdateState::Cleanup);
        info!("Stopping and removing old containers");
        self.runtime.stop_and_remove(&old_ids).await?;

        // Resync: rebuild the whole document from live state, healing
        // any drift that happened during the update.
        attempt.transition(UpdateState::Resync);
        traefik::synth::resync(self.runtime, self.project, &self.config.traefik_conf).await?;

        attempt.transition(UpdateState::Done);
        info!("Rolling update of '{}' complete", service);
        Ok(())
    }

    /// Plain start-up of a service with no running containers. No
    /// rollback: this path converges, it does not replace.
    async fn start_service(&self, service: &str) -> Result<()> {
        let existing = self.service_containers(service).await?;
        let follow_id = match existing.first() {
            Some(container) if !container.running => {
                info!("Starting existing container: {}", container.short_id());
                self.runtime.start_container(&container.id).await?;
                Some(container.id.clone())
            }
            Some(container) => {
                info!("Container {} is already running", container.short_id());
                Some(container.id.clone())
            }
            None => {
                info!("Creating new container for service: {}", service);
                self.runtime.compose_up(Some(service)).await?;
                None
            }
        };

        traefik::synth::resync(self.runtime, self.project, &self.config.traefik_conf).await?;

        if !self.config.detach {
            match follow_id {
                Some(id) => self.runtime.follow_logs(&id).await?,
                None => self.runtime.follow_compose_logs().await?,
            }
        }
        Ok(())
    }

    /// `up`: idempotent convergence of the whole declared stack.
    async fn converge_stack(&self) -> Result<()> {
        self.runtime.compose_up(None).await?;
        info!("Compose stack is starting, continuing with configuration");

        self.wait_for_stack_running().await?;

        traefik::synth::resync(self.runtime, self.project, &self.config.traefik_conf).await?;

        if !self.config.detach {
            self.runtime.follow_compose_logs().await?;
        }
        Ok(())
    }

    /// Bounded wait for every container of this compose project to reach
    /// a running state. Exhausting the retries is not fatal; the resync
    /// that follows simply will not route the stragglers.
    async fn wait_for_stack_running(&self) -> Result<()> {
        const MAX_RETRIES: usize = 30;
        const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

        let project_name = self.project.project_name();
        for attempt in 1..=MAX_RETRIES {
            let containers = self.runtime.list_containers().await?;
            let pending: Vec<&ContainerInfo> = containers
                .iter()
                .filter(|c| match project_name.as_deref() {
                    Some(name) => c.project() == Some(name),
                    None => c.service().is_some(),
                })
                .filter(|c| !c.running)
                .collect();

            if pending.is_empty() {
                info!("All containers are running");
                return Ok(());
            }
            for container in &pending {
                debug!("Container {} is not running yet", container.short_id());
            }
            if attempt < MAX_RETRIES {
                info!(
                    "Waiting for containers to be ready (attempt {}/{})",
                    attempt, MAX_RETRIES
                );
                sleep(RETRY_INTERVAL).await;
            }
        }
        warn!(
            "Some containers are still not running after {} attempts",
            MAX_RETRIES
        );
        Ok(())
    }

    /// All containers labelled with this compose service, sorted by
    /// (created, id).
    async fn service_containers(&self, service: &str) -> Result<Vec<ContainerInfo>> {
        let mut containers: Vec<ContainerInfo> = self
            .runtime
            .list_containers()
            .await?
            .into_iter()
            .filter(|c| c.service() == Some(service))
            .collect();
        sort_stable(&mut containers);
        debug!(
            "Found {} containers for service {}",
            containers.len(),
            service
        );
        Ok(containers)
    }
}
