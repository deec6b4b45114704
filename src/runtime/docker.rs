use async_trait::async_trait;
use bollard::container::{
    ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::models::HealthStatusEnum;
use bollard::Docker;
use futures_util::stream::StreamExt;
use log::{debug, info, warn};
use std::process::Stdio;
use tokio::process::Command;

use super::ContainerRuntime;
use crate::compose::ComposeProject;
use crate::error::{Error, Result};
use crate::types::{short_id, ContainerInfo, HealthState};

/// Grace period in seconds before a stop escalates to a kill.
const STOP_GRACE_SECS: i64 = 10;

/// Docker implementation of the runtime adapter.
///
/// Container-level operations go through the daemon API; `up` and `scale`
/// shell out to `docker compose`, which owns replica naming and recreate
/// semantics.
pub struct DockerRuntime {
    docker: Docker,
    project: ComposeProject,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon using default settings.
    /// This handles unix socket on Linux.
    pub fn connect(project: ComposeProject) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker, project })
    }

    async fn run_compose(&self, extra: &[&str]) -> Result<()> {
        let mut args = vec!["compose".to_string()];
        args.extend(self.project.compose_args());
        args.extend(extra.iter().map(|s| s.to_string()));
        debug!("Running: docker {}", args.join(" "));

        let output = Command::new("docker")
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::runtime(format!("failed to spawn docker: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::runtime(format!(
                "docker {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let opts = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(opts)).await?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else {
                continue;
            };
            containers.push(ContainerInfo {
                id,
                labels: summary.labels.unwrap_or_default(),
                running: summary.state.as_deref() == Some("running"),
                created: summary.created.unwrap_or_default(),
            });
        }
        Ok(containers)
    }

    async fn health(&self, id: &str) -> Result<HealthState> {
        let detail = self.docker.inspect_container(id, None).await?;
        let status = detail
            .state
            .and_then(|s| s.health)
            .and_then(|h| h.status);
        Ok(match status {
            Some(HealthStatusEnum::HEALTHY) => HealthState::Healthy,
            Some(HealthStatusEnum::UNHEALTHY) => HealthState::Unhealthy,
            Some(HealthStatusEnum::STARTING) => HealthState::Starting,
            _ => HealthState::NoHealthCheck,
        })
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        let detail = self.docker.inspect_container(id, None).await?;
        Ok(detail.state.and_then(|s| s.running).unwrap_or(false))
    }

    async fn compose_up(&self, service: Option<&str>) -> Result<()> {
        match service {
            Some(name) => {
                self.run_compose(&["up", "-d", "--no-recreate", name]).await
            }
            None => self.run_compose(&["up", "-d"]).await,
        }
    }

    async fn scale(&self, service: &str, replicas: usize) -> Result<()> {
        let scale_arg = format!("{service}={replicas}");
        self.run_compose(&[
            "up",
            "--detach",
            "--scale",
            &scale_arg,
            "--no-recreate",
            service,
        ])
        .await
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_and_remove(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            info!("Stopping container: {}", short_id(id));
            self.docker
                .stop_container(id, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
                .await?;

            info!("Removing container: {}", short_id(id));
            self.docker
                .remove_container(
                    id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn follow_logs(&self, id: &str) -> Result<()> {
        info!("Streaming logs for container: {}", short_id(id));
        let opts = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(opts));
        while let Some(item) = stream.next().await {
            match item {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                    print!("{}", String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    eprint!("{}", String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Log stream for {} ended: {}", short_id(id), e);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn follow_compose_logs(&self) -> Result<()> {
        let mut args = vec!["compose".to_string()];
        args.extend(self.project.compose_args());
        args.extend(["logs", "--follow", "--tail=1"].map(String::from));
        debug!("Running: docker {}", args.join(" "));

        let status = Command::new("docker")
            .args(&args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::runtime(format!("failed to spawn docker: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::runtime(format!(
                "docker compose logs exited with {status}"
            )))
        }
    }
}
