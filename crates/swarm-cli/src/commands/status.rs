use std::io::{self, Write};

use anyhow::Context;
use swarm_core::NodeStatus;
use swarm_manager::Manager;
use swarm_transport::Switcher;

pub async fn status<S: Switcher>(manager: &Manager<S>) -> anyhow::Result<()> {
    let nodes = manager.nodes().await.context("error getting nodes")?;
    write_status(&mut io::stdout().lock(), &nodes)?;
    Ok(())
}

/// One line per node: id, hostname, status, availability, manager status
/// and engine version.
pub fn write_status(out: &mut impl Write, nodes: &[NodeStatus]) -> io::Result<()> {
    for node in nodes {
        writeln!(
            out,
            "{} {} {} {} {} {}",
            node.id,
            node.hostname,
            node.status,
            node.availability,
            node.manager_status,
            node.engine_version,
        )?;
    }
    Ok(())
}
