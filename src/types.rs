//! Domain types shared across the deployment pipeline.
//!
//! These are immutable snapshot views produced by the container runtime
//! adapter. Nothing here is cached between health-gate ticks; callers
//! re-query the runtime whenever they need fresh state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Compose label carrying the service a container belongs to.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// Compose label carrying the project a container belongs to.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Health of a single container as reported by the runtime.
///
/// `NoHealthCheck` is deliberately distinct from `Healthy`: the gate
/// treats it as immediately passing, but the distinction matters for
/// logging and for deciding which drain delay applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    NoHealthCheck,
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthState {
    /// Whether the health gate considers this state passing.
    pub fn is_passing(self) -> bool {
        matches!(self, HealthState::Healthy | HealthState::NoHealthCheck)
    }
}

/// A container observed to belong to one compose service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef {
    /// Full runtime identifier.
    pub id: String,
    /// Compose service the container belongs to.
    pub service: String,
    pub health: HealthState,
}

impl ContainerRef {
    /// The 12-character short form used in routing target addresses.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// One row of the runtime inventory snapshot.
///
/// Carries the complete label map so the config synthesizer can read
/// routing labels without a second inspect round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub labels: HashMap<String, String>,
    pub running: bool,
    /// Creation time in seconds since the epoch, used to order replicas
    /// deterministically.
    pub created: i64,
}

impl ContainerInfo {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Compose service label, if the container belongs to one.
    pub fn service(&self) -> Option<&str> {
        self.labels.get(COMPOSE_SERVICE_LABEL).map(String::as_str)
    }

    /// Compose project label, if the container belongs to one.
    pub fn project(&self) -> Option<&str> {
        self.labels.get(COMPOSE_PROJECT_LABEL).map(String::as_str)
    }
}

/// Truncate a full container identifier to the short 12-character form.
pub fn short_id(id: &str) -> &str {
    if id.len() > 12 {
        &id[..12]
    } else {
        id
    }
}

/// Sort containers by creation time, then id, so replica ordering does not
/// depend on the runtime's list order.
pub fn sort_stable(containers: &mut [ContainerInfo]) {
    containers.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
}
