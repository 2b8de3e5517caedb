//! Coordinator resolution.
//!
//! Membership changes must be issued from a node with control access.
//! When the bound node is only a worker, each remote manager it knows of
//! is tried in turn, relaying through the worker.

use swarm_core::NodeInfo;
use swarm_transport::{Switcher, split_host_port};
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::query;

/// Make sure `switcher` is bound to a manager and return that manager's
/// info.
///
/// Remote manager addresses that cannot be split into host and port are
/// skipped, as are managers that cannot be reached or no longer report
/// control access. Fails with
/// [`ManagerError::NoCoordinator`] when every candidate is exhausted.
pub async fn ensure_manager<S: Switcher + ?Sized>(
    switcher: &S,
    config: &ManagerConfig,
) -> ManagerResult<NodeInfo> {
    let node = query::info(switcher, &config.commands).await?;
    if node.is_manager() {
        debug!(transport = %switcher, node = %node.name, "bound node is a manager");
        return Ok(node);
    }

    for remote in &node.swarm.remote_managers {
        let host = match split_host_port(&remote.addr) {
            Some((host, _)) if !host.is_empty() => host,
            _ => {
                warn!(addr = %remote.addr, "unparsable remote manager address, trying next manager");
                continue;
            }
        };

        if let Err(e) = query::switch(switcher, host, true, config.switch_timeout).await {
            warn!(manager = %host, error = %e, "error switching to remote manager, trying next manager");
            continue;
        }

        match query::info(switcher, &config.commands).await {
            Ok(candidate) if candidate.is_manager() => {
                info!(transport = %switcher, manager = %host, "switched to coordinator");
                return Ok(candidate);
            }
            Ok(candidate) => {
                warn!(manager = %host, node = %candidate.name, "remote manager has no control access, trying next manager");
            }
            Err(e) => {
                warn!(manager = %host, error = %e, "error querying remote manager, trying next manager");
            }
        }
    }

    Err(ManagerError::NoCoordinator)
}
