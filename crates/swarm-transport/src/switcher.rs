//! Transport traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;

/// Exit status and separately captured output of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs shell command lines on one bound node.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `command` through the node's shell and wait for it to exit.
    ///
    /// A non-zero exit is not an error at this level; only failing to
    /// start or talk to the command is.
    async fn command(&self, command: &str) -> TransportResult<CommandOutput>;
}

/// Binds command execution to one node at a time.
///
/// Implementations keep their bound address and runner behind a single
/// lock, and build the new runner before taking it, so `runner()` never
/// observes a half-finished switch.
#[async_trait]
pub trait Switcher: fmt::Display + Send + Sync {
    /// Rebind to `node_addr` with a fresh execution channel.
    async fn switch(&self, node_addr: &str) -> TransportResult<()>;

    /// Rebind to `node_addr`, relaying through the currently bound node.
    async fn switch_via(&self, node_addr: &str) -> TransportResult<()>;

    /// The runner for the bound node; `None` before the first switch.
    fn runner(&self) -> Option<Arc<dyn Runner>>;

    /// Host of the bound node, when bound to one.
    fn address(&self) -> Option<String>;
}

#[async_trait]
impl<S: Switcher + ?Sized> Switcher for Box<S> {
    async fn switch(&self, node_addr: &str) -> TransportResult<()> {
        (**self).switch(node_addr).await
    }

    async fn switch_via(&self, node_addr: &str) -> TransportResult<()> {
        (**self).switch_via(node_addr).await
    }

    fn runner(&self) -> Option<Arc<dyn Runner>> {
        (**self).runner()
    }

    fn address(&self) -> Option<String> {
        (**self).address()
    }
}

#[async_trait]
impl<S: Switcher + ?Sized> Switcher for Arc<S> {
    async fn switch(&self, node_addr: &str) -> TransportResult<()> {
        (**self).switch(node_addr).await
    }

    async fn switch_via(&self, node_addr: &str) -> TransportResult<()> {
        (**self).switch_via(node_addr).await
    }

    fn runner(&self) -> Option<Arc<dyn Runner>> {
        (**self).runner()
    }

    fn address(&self) -> Option<String> {
        (**self).address()
    }
}

/// Split `host:port`, `[v6]:port` or a bare host. The port is `None`
/// when the address omits one.
pub fn split_host_port(addr: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail {
            "" => Some((host, None)),
            _ => tail.strip_prefix(':').map(|port| (host, Some(port))),
        };
    }

    match addr.rsplit_once(':') {
        // More than one colon and no brackets: a bare IPv6 address.
        Some((host, _)) if host.contains(':') => Some((addr, None)),
        Some((host, port)) => Some((host, Some(port))),
        None => Some((addr, None)),
    }
}
