//! Rendered commands and switches shared by the manager, coordinator
//! resolution and draining.

use std::time::Duration;

use swarm_core::{NodeInfo, Tasks};
use swarm_transport::{Switcher, TransportError, exec};
use tracing::error;

use crate::command::{CommandTemplate, CommandTemplates, Param};
use crate::decode::{decode_document, decode_lines};
use crate::error::{ManagerError, ManagerResult};

/// Render `template` and run it on the bound node.
pub(crate) async fn run<S: Switcher + ?Sized>(
    switcher: &S,
    template: &CommandTemplate,
    params: &[(&str, Param<'_>)],
) -> ManagerResult<Vec<u8>> {
    let command = template.render(params)?;
    Ok(exec::run(switcher, &command).await?)
}

pub(crate) async fn info<S: Switcher + ?Sized>(
    switcher: &S,
    commands: &CommandTemplates,
) -> ManagerResult<NodeInfo> {
    let out = run(switcher, &commands.info, &[]).await?;
    Ok(decode_document(&out)?)
}

pub(crate) async fn tasks<S: Switcher + ?Sized>(
    switcher: &S,
    commands: &CommandTemplates,
    node: &str,
) -> ManagerResult<Tasks> {
    let out = run(switcher, &commands.tasks, &[("node", Param::Arg(node))]).await?;
    Ok(decode_lines(&out)?)
}

/// Switch to `addr`, directly or relaying through the bound node, giving
/// up after `timeout`.
pub(crate) async fn switch<S: Switcher + ?Sized>(
    switcher: &S,
    addr: &str,
    via: bool,
    timeout: Duration,
) -> ManagerResult<()> {
    let result = if via {
        tokio::time::timeout(timeout, switcher.switch_via(addr)).await
    } else {
        tokio::time::timeout(timeout, switcher.switch(addr)).await
    };

    let source = match result {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(source)) => source,
        Err(_) => TransportError::Timeout {
            addr: addr.to_string(),
            timeout,
        },
    };

    error!(transport = %switcher, node = %addr, via, error = %source, "error switching node");
    Err(ManagerError::Switch {
        addr: addr.to_string(),
        source,
    })
}
