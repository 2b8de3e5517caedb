//! Manager error types.

use std::time::Duration;

use swarm_core::LabelError;
use swarm_transport::{ExecError, TransportError};
use thiserror::Error;

use crate::command::CommandError;
use crate::decode::DecodeError;

/// Errors that can occur while driving a swarm cluster.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("expected 3 or 5 managers but got {0}")]
    Quorum(usize),

    #[error("no manager nodes to create a swarm with")]
    NoManagers,

    #[error("error switching to node {addr}: {source}")]
    Switch {
        addr: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("error parsing labels of {node}: {source}")]
    Labels {
        node: String,
        #[source]
        source: LabelError,
    },

    #[error("unable to connect to suitable coordinator")]
    NoCoordinator,

    #[error("swarm cluster with id {0} already exists")]
    ClusterExists(String),

    #[error("no swarm cluster found")]
    NoCluster,

    #[error("error joining {role} {node} to {coordinator} on swarm cluster {cluster_id}: {source}")]
    Join {
        role: &'static str,
        node: String,
        coordinator: String,
        cluster_id: String,
        #[source]
        source: Box<ManagerError>,
    },

    #[error("error labelling node {node}: {source}")]
    Label {
        node: String,
        #[source]
        source: Box<ManagerError>,
    },

    #[error("error draining node {node}: {source}")]
    Drain {
        node: String,
        #[source]
        source: Box<ManagerError>,
    },

    #[error("timed out waiting for {node} to drain after {elapsed:?}")]
    DrainTimeout { node: String, elapsed: Duration },
}

impl ManagerError {
    /// Whether this error is, or wraps, a drain timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            ManagerError::DrainTimeout { .. } => true,
            ManagerError::Join { source, .. }
            | ManagerError::Label { source, .. }
            | ManagerError::Drain { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;
