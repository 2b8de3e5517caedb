//! Command execution on the bound node.

use tracing::{debug, error};

use crate::error::{ExecError, ExecResult};
use crate::switcher::Switcher;

/// Run `command` on whatever node `switcher` is bound to and return its
/// stdout.
///
/// A non-zero exit fails with [`ExecError::Failed`] carrying both captured
/// streams. Nothing is retried.
pub async fn run<S: Switcher + ?Sized>(switcher: &S, command: &str) -> ExecResult<Vec<u8>> {
    let runner = switcher.runner().ok_or(ExecError::NoTransport)?;

    debug!(transport = %switcher, %command, "running command");

    let output = runner
        .command(command)
        .await
        .map_err(|source| ExecError::Transport {
            command: command.to_string(),
            source,
        })?;

    if !output.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        error!(
            transport = %switcher,
            %command,
            code = ?output.code,
            %stdout,
            %stderr,
            "command failed"
        );
        return Err(ExecError::Failed {
            command: command.to_string(),
            code: output.code,
            stdout,
            stderr,
        });
    }

    Ok(output.stdout)
}
