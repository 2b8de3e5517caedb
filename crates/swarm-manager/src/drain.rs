//! Node draining.
//!
//! A drain sets the node's availability to `drain` and then polls its
//! task list until every task has shut down or the drain deadline passes.
//! Availability is left as `drain` on timeout.

use std::fmt;
use std::time::Duration;

use swarm_core::all_shutdown;
use swarm_transport::Switcher;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::command::Param;
use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::query;

/// Progress of a single node drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    /// Asking the coordinator to set availability to drain.
    Requesting,
    /// Waiting for tasks to shut down; `polls` listings taken so far.
    Polling { polls: u32 },
    /// Every task on the node has shut down.
    Drained,
    /// The drain deadline passed first.
    TimedOut,
}

impl fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainPhase::Requesting => write!(f, "requesting"),
            DrainPhase::Polling { polls } => write!(f, "polling ({polls})"),
            DrainPhase::Drained => write!(f, "drained"),
            DrainPhase::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Drain `node` through the coordinator `switcher` is bound to.
pub(crate) async fn drain_node<S: Switcher + ?Sized>(
    switcher: &S,
    config: &ManagerConfig,
    node: &str,
) -> ManagerResult<DrainPhase> {
    let started = Instant::now();
    debug!(%node, phase = %DrainPhase::Requesting, "draining node");

    let options = ["--availability".to_string(), "drain".to_string()];
    query::run(
        switcher,
        &config.commands.update,
        &[("options", Param::Args(&options)), ("node", Param::Arg(node))],
    )
    .await?;

    let poll = config.drain_poll_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(started + poll, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep_until(started + config.drain_timeout);
    tokio::pin!(deadline);

    let mut polls = 0;
    loop {
        let phase = DrainPhase::Polling { polls };

        tokio::select! {
            _ = &mut deadline => {
                let elapsed = started.elapsed();
                error!(%node, phase = %DrainPhase::TimedOut, ?elapsed, "timed out waiting for node to drain");
                return Err(ManagerError::DrainTimeout {
                    node: node.to_string(),
                    elapsed,
                });
            }
            listing = async {
                ticker.tick().await;
                query::tasks(switcher, &config.commands, node).await
            } => {
                polls += 1;
                let elapsed = started.elapsed();
                match listing {
                    Ok(tasks) if all_shutdown(&tasks) => {
                        info!(%node, phase = %DrainPhase::Drained, ?elapsed, "successfully drained node");
                        return Ok(DrainPhase::Drained);
                    }
                    Ok(tasks) => {
                        let running = tasks.iter().filter(|t| !t.is_shutdown()).count();
                        info!(%node, %phase, running, ?elapsed, "still waiting for node to drain");
                    }
                    Err(e) => {
                        warn!(%node, %phase, error = %e, "error getting tasks from node, retrying");
                    }
                }
            }
        }
    }
}
