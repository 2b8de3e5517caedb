use anyhow::Context;
use swarm_transport::{LocalSwitcher, SshAuth, SshConfig, SshSwitcher, Switcher};
use tracing::debug;

use crate::settings::Settings;

/// Build the switcher the settings ask for and bind it to the starting
/// node.
pub async fn connect(settings: &Settings) -> anyhow::Result<Box<dyn Switcher>> {
    if settings.use_local {
        let switcher = LocalSwitcher::new();
        switcher
            .switch("")
            .await
            .context("error switching to local node")?;
        return Ok(Box::new(switcher));
    }

    let addr = settings
        .ssh_addr
        .as_deref()
        .filter(|addr| !addr.is_empty())
        .context("no node to connect to: pass --ssh-addr or --use-local")?;

    let auth = if settings.use_ssh_agent {
        let socket = std::env::var_os("SSH_AUTH_SOCK")
            .context("--use-ssh-agent given but SSH_AUTH_SOCK is not set")?;
        SshAuth::agent(socket)
    } else {
        SshAuth::key(settings.ssh_key.clone())
    };

    let config = SshConfig::new(settings.ssh_user.clone(), addr)
        .context("error creating ssh switcher")?
        .with_connect_timeout(settings.ssh_timeout);
    let switcher = SshSwitcher::new(config, auth);

    debug!(%addr, user = %settings.ssh_user, "connecting");
    tokio::time::timeout(settings.ssh_timeout, switcher.switch(addr))
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {:?}", settings.ssh_timeout))
        .and_then(|result| result.map_err(anyhow::Error::from))
        .with_context(|| format!("error switching to remote node {addr}"))?;

    Ok(Box::new(switcher))
}
