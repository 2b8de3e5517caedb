//! Local transport: runs commands on the machine running swarm.

use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::switcher::{CommandOutput, Runner, Switcher};

/// Runs command lines through `sh -c` on this machine.
#[derive(Debug, Default)]
pub struct LocalRunner;

#[async_trait]
impl Runner for LocalRunner {
    async fn command(&self, command: &str) -> TransportResult<CommandOutput> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        capture(cmd, "sh").await
    }
}

/// Spawn `cmd` with piped stdout/stderr and wait for it.
///
/// The child is killed if the returned future is dropped.
pub(crate) async fn capture(mut cmd: Command, program: &str) -> TransportResult<CommandOutput> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| TransportError::Spawn {
            program: program.to_string(),
            source,
        })?;

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Switcher bound to the local machine.
///
/// Every switch succeeds and rebinds to a fresh local runner; the target
/// address is ignored since there is only one machine to talk to.
#[derive(Default)]
pub struct LocalSwitcher {
    runner: RwLock<Option<Arc<dyn Runner>>>,
}

impl LocalSwitcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for LocalSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("local://")
    }
}

#[async_trait]
impl Switcher for LocalSwitcher {
    async fn switch(&self, node_addr: &str) -> TransportResult<()> {
        debug!(node = %node_addr, "binding local runner");
        let runner: Arc<dyn Runner> = Arc::new(LocalRunner);
        *self.runner.write().expect("local switcher lock") = Some(runner);
        Ok(())
    }

    async fn switch_via(&self, node_addr: &str) -> TransportResult<()> {
        self.switch(node_addr).await
    }

    fn runner(&self) -> Option<Arc<dyn Runner>> {
        self.runner.read().expect("local switcher lock").clone()
    }

    fn address(&self) -> Option<String> {
        self.runner().map(|_| "localhost".to_string())
    }
}
