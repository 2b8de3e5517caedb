use anyhow::Context;
use swarm_manager::Manager;
use swarm_transport::Switcher;

use super::status;

pub async fn drain<S: Switcher>(manager: &Manager<S>, nodes: &[String]) -> anyhow::Result<()> {
    manager
        .drain_nodes(nodes)
        .await
        .context("error draining nodes")?;

    println!("Nodes {} successfully drained", nodes.join(","));
    status::status(manager).await
}
