use anyhow::Context;
use swarm_core::Clusterfile;
use swarm_manager::Manager;
use swarm_transport::Switcher;

use super::status;

pub async fn update<S: Switcher>(manager: &Manager<S>, clusterfile: &str) -> anyhow::Result<()> {
    let cf = Clusterfile::load(clusterfile)
        .with_context(|| format!("error reading Clusterfile {clusterfile}"))?;
    cf.validate().context("error validating Clusterfile")?;

    manager
        .update_swarm(&cf.nodes)
        .await
        .context("error updating swarm cluster")?;

    let node = manager.info().await.context("error getting node info")?;
    println!(
        "Swarm Cluster successfully updated with id: {}",
        node.cluster_id()
    );
    status::status(manager).await
}
