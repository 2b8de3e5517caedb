//! swarm-manager — Docker Swarm cluster lifecycle over a switchable
//! transport.
//!
//! # Architecture
//!
//! ```text
//! Manager<S: Switcher>
//!   ├── create_swarm()  init on a random manager, join the rest, label
//!   ├── update_swarm()  join new nodes, drain removed ones
//!   ├── label_node()    docker node update --label-add ...
//!   ├── drain_nodes()   availability=drain, poll tasks until shut down
//!   └── ensure_manager() fail over to a node with control access
//!
//! Switcher (swarm-transport)
//!   └── which node the next `docker` command runs on
//! ```
//!
//! Every command line comes from a [`CommandTemplate`] in the
//! [`ManagerConfig`], and every status query is decoded fresh; nothing
//! about the cluster is cached between calls.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod decode;
pub mod drain;
pub mod error;
pub mod manager;
mod query;

pub use command::{CommandError, CommandTemplate, CommandTemplates, Param};
pub use config::ManagerConfig;
pub use decode::DecodeError;
pub use drain::DrainPhase;
pub use error::{ManagerError, ManagerResult};
pub use manager::{Manager, TokenKind};
