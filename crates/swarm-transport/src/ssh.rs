//! SSH transport: runs commands on remote nodes with the system `ssh`
//! client.
//!
//! Every switch probes the target so connection and authentication
//! failures surface when switching, not on the first command. Relayed
//! switches reach the target through the currently bound node with a
//! `ProxyCommand`, so the relay uses the same credentials as the target.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::local::capture;
use crate::quote::shell_join;
use crate::switcher::{CommandOutput, Runner, Switcher, split_host_port};

/// Port used when an address does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Exit status `ssh` reserves for its own errors.
const SSH_ERROR_STATUS: i32 = 255;

/// How the ssh client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshAuth {
    /// Private key file. `$VAR` and `${VAR}` are expanded from the
    /// environment when the key is used.
    Key(String),
    /// An ssh-agent listening on this socket.
    Agent(PathBuf),
}

impl SshAuth {
    pub fn key(path: impl Into<String>) -> Self {
        Self::Key(path.into())
    }

    pub fn agent(socket: impl Into<PathBuf>) -> Self {
        Self::Agent(socket.into())
    }
}

/// Settings shared by every connection a [`SshSwitcher`] opens.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote login user.
    pub user: String,
    /// Port for every node, taken from the initial address.
    pub port: u16,
    /// Connection timeout handed to the ssh client.
    pub connect_timeout: Duration,
    /// ssh client binary.
    pub program: String,
}

impl SshConfig {
    /// Settings for `user`, with the port taken from `addr` (`host[:port]`),
    /// defaulting to 22 when absent.
    pub fn new(user: impl Into<String>, addr: &str) -> TransportResult<Self> {
        Ok(Self {
            user: user.into(),
            port: parse_port(addr)?,
            connect_timeout: Duration::from_secs(30),
            program: "ssh".to_string(),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// Port of `host[:port]`, 22 when missing or empty.
fn parse_port(addr: &str) -> TransportResult<u16> {
    let invalid = |reason: &str| TransportError::InvalidAddress {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    match split_host_port(addr) {
        None => Err(invalid("unterminated IPv6 literal")),
        Some((_, None | Some(""))) => Ok(DEFAULT_SSH_PORT),
        Some((_, Some(port))) => port.parse().map_err(|_| invalid("invalid port")),
    }
}

/// One ssh destination.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SshTarget {
    user: String,
    host: String,
    port: u16,
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}@[{}]:{}", self.user, self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

/// Runs commands on one node, optionally through a chain of relays
/// (outermost first).
#[derive(Debug, Clone)]
pub struct SshRunner {
    config: SshConfig,
    auth: SshAuth,
    target: SshTarget,
    relays: Vec<SshTarget>,
}

impl SshRunner {
    /// Full ssh argument list to run `command` on the target.
    fn args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_args();
        if !self.relays.is_empty() {
            args.push("-o".to_string());
            args.push(format!("ProxyCommand={}", self.proxy_command(&self.relays)));
        }
        args.extend(self.destination_args(&self.target));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    /// Shell line that opens a stdio tunnel through the last relay in
    /// `chain`, itself reached through the ones before it.
    fn proxy_command(&self, chain: &[SshTarget]) -> String {
        let Some((relay, outer)) = chain.split_last() else {
            return String::new();
        };

        let mut args = vec![self.config.program.clone()];
        args.extend(self.common_args());
        if !outer.is_empty() {
            // ssh expands % tokens once per level.
            let nested = self.proxy_command(outer).replace('%', "%%");
            args.push("-o".to_string());
            args.push(format!("ProxyCommand={nested}"));
        }
        args.push("-W".to_string());
        args.push("%h:%p".to_string());
        args.extend(self.destination_args(relay));
        shell_join(args)
    }

    fn common_args(&self) -> Vec<String> {
        let timeout = self.config.connect_timeout.as_secs().max(1);
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={timeout}"),
        ];
        if let SshAuth::Key(key) = &self.auth {
            args.push("-i".to_string());
            args.push(expand_env(key));
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }
        args
    }

    fn destination_args(&self, target: &SshTarget) -> Vec<String> {
        vec![
            "-p".to_string(),
            target.port.to_string(),
            "-l".to_string(),
            target.user.clone(),
            target.host.clone(),
        ]
    }

    fn build(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.args(command));
        if let SshAuth::Agent(socket) = &self.auth {
            cmd.env("SSH_AUTH_SOCK", socket);
        }
        cmd
    }

    /// Open a session and run a no-op to prove the target is reachable
    /// and accepts our credentials.
    async fn probe(&self) -> TransportResult<()> {
        let out = capture(self.build("true"), &self.config.program).await?;
        if out.success() {
            return Ok(());
        }

        let addr = self.target.to_string();
        let reason = String::from_utf8_lossy(&out.stderr).trim().to_string();
        if out.code == Some(SSH_ERROR_STATUS) && is_auth_failure(&reason) {
            Err(TransportError::Auth { addr, reason })
        } else {
            Err(TransportError::Connect { addr, reason })
        }
    }
}

#[async_trait]
impl Runner for SshRunner {
    async fn command(&self, command: &str) -> TransportResult<CommandOutput> {
        capture(self.build(command), &self.config.program).await
    }
}

fn is_auth_failure(stderr: &str) -> bool {
    stderr.contains("Permission denied")
        || stderr.contains("Too many authentication failures")
        || stderr.contains("no such identity")
}

#[derive(Default)]
struct SshState {
    target: Option<SshTarget>,
    relays: Vec<SshTarget>,
    runner: Option<Arc<dyn Runner>>,
}

/// Switcher that reaches nodes over SSH.
pub struct SshSwitcher {
    config: SshConfig,
    auth: SshAuth,
    state: RwLock<SshState>,
}

impl SshSwitcher {
    /// Create an unbound switcher.
    pub fn new(config: SshConfig, auth: SshAuth) -> Self {
        Self {
            config,
            auth,
            state: RwLock::new(SshState::default()),
        }
    }

    fn runner_for(&self, host: &str, relays: Vec<SshTarget>) -> TransportResult<SshRunner> {
        let host = match split_host_port(host) {
            Some((host, _)) if !host.is_empty() => host,
            _ => {
                return Err(TransportError::InvalidAddress {
                    addr: host.to_string(),
                    reason: "missing host".to_string(),
                });
            }
        };

        Ok(SshRunner {
            config: self.config.clone(),
            auth: self.auth.clone(),
            target: SshTarget {
                user: self.config.user.clone(),
                host: host.to_string(),
                port: self.config.port,
            },
            relays,
        })
    }

    fn bind(&self, runner: SshRunner) {
        let mut state = self.state.write().expect("ssh switcher lock");
        state.target = Some(runner.target.clone());
        state.relays = runner.relays.clone();
        state.runner = Some(Arc::new(runner));
    }
}

impl fmt::Display for SshSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().expect("ssh switcher lock");
        match &state.target {
            Some(target) => write!(f, "ssh://{target}"),
            None => write!(f, "ssh://{}@", self.config.user),
        }
    }
}

#[async_trait]
impl Switcher for SshSwitcher {
    async fn switch(&self, node_addr: &str) -> TransportResult<()> {
        let runner = self.runner_for(node_addr, Vec::new())?;
        debug!(target = %runner.target, "opening ssh session");
        runner.probe().await?;
        info!(target = %runner.target, "switched node");
        self.bind(runner);
        Ok(())
    }

    async fn switch_via(&self, node_addr: &str) -> TransportResult<()> {
        let relays = {
            let state = self.state.read().expect("ssh switcher lock");
            match &state.target {
                Some(current) => {
                    let mut relays = state.relays.clone();
                    relays.push(current.clone());
                    relays
                }
                None => Vec::new(),
            }
        };

        let runner = self.runner_for(node_addr, relays)?;
        debug!(target = %runner.target, relays = runner.relays.len(), "opening relayed ssh session");
        runner.probe().await?;
        info!(target = %runner.target, via = ?runner.relays.last().map(ToString::to_string), "switched node");
        self.bind(runner);
        Ok(())
    }

    fn runner(&self) -> Option<Arc<dyn Runner>> {
        self.state.read().expect("ssh switcher lock").runner.clone()
    }

    fn address(&self) -> Option<String> {
        let state = self.state.read().expect("ssh switcher lock");
        state.target.as_ref().map(|t| t.host.clone())
    }
}

/// Expand `$VAR` and `${VAR}` from the environment; unset variables
/// expand to nothing.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        if consumed == 0 {
            out.push('$');
            rest = after;
            continue;
        }

        out.push_str(&std::env::var(name).unwrap_or_default());
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}
