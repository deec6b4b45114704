//! Bounded health gate over a set of containers.
//!
//! A plain liveness poll with no side effects: every tick re-queries each
//! container's current health until all pass or the deadline elapses. A
//! container with no health check configured passes immediately.

use std::time::Duration;

use log::{debug, info};
use tokio::time::{sleep, Instant};

use crate::error::{Error, Result};
use crate::runtime::ContainerRuntime;
use crate::types::short_id;

/// Interval between polls.
const TICK: Duration = Duration::from_secs(1);

/// Block until every container in `ids` reports a passing health state,
/// or fail with [`Error::HealthGateTimeout`] once `timeout` has elapsed.
///
/// Runtime errors while polling propagate as-is; they are not timeouts
/// and must not trigger the caller's rollback branch.
pub async fn await_healthy(
    runtime: &dyn ContainerRuntime,
    ids: &[String],
    timeout: Duration,
) -> Result<()> {
    info!(
        "Waiting up to {}s for {} container(s) to become healthy",
        timeout.as_secs(),
        ids.len()
    );

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        // Every container is queried every tick, even after one has
        // already failed the round.
        let mut all_passing = true;
        for id in ids {
            let state = runtime.health(id).await?;
            debug!("Container {} health: {:?}", short_id(id), state);
            if !state.is_passing() {
                all_passing = false;
            }
        }
        if all_passing {
            info!("All containers are healthy");
            return Ok(());
        }
        sleep(TICK).await;
    }

    Err(Error::HealthGateTimeout {
        seconds: timeout.as_secs(),
    })
}
