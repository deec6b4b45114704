//! Container runtime adapter boundary.
//!
//! The orchestrator and synthesizer talk to the runtime only through this
//! trait, so tests can substitute a scripted double. All methods are
//! snapshot reads or single operations; nothing here holds state between
//! calls.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContainerInfo, HealthState};

pub mod docker;
pub use docker::DockerRuntime;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Snapshot of all containers, running or not, with their label maps.
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// Current health of one container.
    async fn health(&self, id: &str) -> Result<HealthState>;

    /// Whether the container's state is currently `running`.
    async fn is_running(&self, id: &str) -> Result<bool>;

    /// Bring up one service (or the whole declared stack when `service`
    /// is `None`) detached, never recreating running containers.
    async fn compose_up(&self, service: Option<&str>) -> Result<()>;

    /// Scale a service to `replicas` instances without recreating the
    /// containers that are already running.
    async fn scale(&self, service: &str, replicas: usize) -> Result<()>;

    /// Start an existing stopped or created container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop each container with a bounded grace period, then force-remove
    /// it. Processes ids in order and fails on the first error.
    async fn stop_and_remove(&self, ids: &[String]) -> Result<()>;

    /// Follow one container's output to this process's stdout/stderr
    /// until the stream ends.
    async fn follow_logs(&self, id: &str) -> Result<()>;

    /// Follow the whole compose stack's logs until interrupted.
    async fn follow_compose_logs(&self) -> Result<()>;
}
