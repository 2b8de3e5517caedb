use std::io::{self, Write};

use anyhow::Context;
use swarm_core::NodeInfo;
use swarm_manager::Manager;
use swarm_transport::Switcher;

pub async fn info<S: Switcher>(manager: &Manager<S>) -> anyhow::Result<()> {
    let node = manager.info().await.context("error getting node info")?;
    let managers = manager.managers().await.context("error getting managers")?;
    write_info(&mut io::stdout().lock(), &node, &managers)?;
    Ok(())
}

pub fn write_info(out: &mut impl Write, node: &NodeInfo, managers: &[NodeInfo]) -> io::Result<()> {
    let swarm = &node.swarm;
    writeln!(out, "Cluster ID: {}", swarm.cluster.id)?;
    writeln!(out, "Nodes: {}", swarm.nodes)?;
    writeln!(out, "Managers: {}", swarm.managers)?;
    writeln!(out, "Workers: {}", swarm.nodes.saturating_sub(swarm.managers))?;
    writeln!(out, "Managers:")?;
    for manager in managers {
        writeln!(out, "  {}", manager.name)?;
    }
    Ok(())
}
