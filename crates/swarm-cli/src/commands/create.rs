use anyhow::Context;
use swarm_core::Clusterfile;
use swarm_manager::Manager;
use swarm_transport::Switcher;

use super::status;

pub async fn create<S: Switcher>(
    manager: &Manager<S>,
    clusterfile: &str,
    force: bool,
) -> anyhow::Result<()> {
    let cf = Clusterfile::load(clusterfile)
        .with_context(|| format!("error reading Clusterfile {clusterfile}"))?;
    if !force {
        cf.validate().context("error validating Clusterfile")?;
    }

    let cluster_id = manager
        .create_swarm(&cf.nodes, force)
        .await
        .context("error creating swarm cluster")?;

    println!("Swarm Cluster successfully created with id: {cluster_id}");
    status::status(manager).await
}
