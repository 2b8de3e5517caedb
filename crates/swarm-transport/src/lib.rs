//! swarm-transport — where the next command runs.
//!
//! A [`Switcher`] is bound to one node at a time and hands out a
//! [`Runner`] for it. Switching rebinds the transport to another node,
//! either directly or by relaying through the current node.
//!
//! # Variants
//!
//! ```text
//! LocalSwitcher  local://           sh -c on this machine
//! SshSwitcher    ssh://user@host    system ssh client, key or agent auth
//! NullSwitcher   null://            every operation succeeds, does nothing
//! ```
//!
//! [`exec::run`] wraps a runner invocation, turning non-zero exits into
//! errors that carry the captured output.

pub mod error;
pub mod exec;
pub mod local;
pub mod null;
pub mod quote;
pub mod ssh;
pub mod switcher;

pub use error::{ExecError, ExecResult, TransportError, TransportResult};
pub use local::LocalSwitcher;
pub use null::NullSwitcher;
pub use quote::{shell_join, shell_quote};
pub use ssh::{DEFAULT_SSH_PORT, SshAuth, SshConfig, SshSwitcher, expand_env};
pub use switcher::{CommandOutput, Runner, Switcher, split_host_port};
