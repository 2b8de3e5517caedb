//! swarm-core — shared types for the swarm cluster tooling.
//!
//! - [`clusterfile`]: the declarative `Clusterfile` topology and its nodes
//! - [`labels`]: the query-string label syntax carried in node tags
//! - [`types`]: runtime records decoded from the `docker` CLI

pub mod clusterfile;
pub mod labels;
pub mod types;

pub use clusterfile::{
    Clusterfile, ClusterfileError, ClusterfileResult, LABELS_TAG, MANAGER_ROLE, ROLE_TAG, VmNode,
    VmNodes, WORKER_ROLE, is_valid_quorum,
};
pub use labels::{LabelError, LabelResult, Labels, parse_labels};
pub use types::*;
