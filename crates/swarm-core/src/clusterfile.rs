//! Declarative description of a cluster's nodes.
//!
//! A Clusterfile names the region, environment, cluster and domain a set
//! of VMs belong to, and lists each VM with its addresses and tags. The
//! `role` tag assigns swarm roles and the `labels` tag carries node labels
//! in query-string form (see [`crate::labels`]).
//!
//! ```json
//! {
//!   "region": "local",
//!   "environment": "test",
//!   "cluster": "c1",
//!   "domain": "localdomain",
//!   "nodes": [{
//!     "hostname": "dm1",
//!     "public_address": "10.0.0.1",
//!     "private_address": "172.16.0.1",
//!     "tags": { "role": "manager", "labels": "zone=a&ssd" }
//!   }]
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::labels::{LabelError, LabelResult, Labels, parse_labels};

/// Tag assigning a swarm role (`manager` or `worker`) to a VM.
pub const ROLE_TAG: &str = "role";

/// Value of [`ROLE_TAG`] for manager nodes.
pub const MANAGER_ROLE: &str = "manager";

/// Value of [`ROLE_TAG`] for worker nodes.
pub const WORKER_ROLE: &str = "worker";

/// Tag holding freeform node labels, e.g. `key1=value1&key2=v2,v3&key3`.
pub const LABELS_TAG: &str = "labels";

/// Result type alias for Clusterfile operations.
pub type ClusterfileResult<T> = Result<T, ClusterfileError>;

/// Errors raised while loading or validating a Clusterfile.
#[derive(Debug, Error)]
pub enum ClusterfileError {
    #[error("error reading clusterfile: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing clusterfile json: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("error serializing clusterfile: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("number of managers should be 3 or 5 not {0}")]
    Quorum(usize),

    #[error("invalid labels on node {node}: {source}")]
    Labels {
        node: String,
        #[source]
        source: LabelError,
    },
}

/// Whether `managers` is an accepted manager quorum size (3 or 5).
pub fn is_valid_quorum(managers: usize) -> bool {
    managers == 3 || managers == 5
}

/// A single VM and the addresses used to reach it.
///
/// The public address is what the transport connects to; the private
/// address is what the swarm advertises and listens on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmNode {
    pub hostname: String,
    pub public_address: String,
    pub private_address: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl VmNode {
    /// Value of a tag, or `""` when absent.
    pub fn tag(&self, name: &str) -> &str {
        self.tags.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Whether the tag `name` is present with exactly `value`.
    pub fn has_tag(&self, name: &str, value: &str) -> bool {
        self.tags.get(name).is_some_and(|actual| actual == value)
    }

    pub fn is_manager(&self) -> bool {
        self.has_tag(ROLE_TAG, MANAGER_ROLE)
    }

    /// Parsed [`LABELS_TAG`]; empty when the tag is absent.
    pub fn labels(&self) -> LabelResult<Labels> {
        parse_labels(self.tag(LABELS_TAG))
    }
}

impl fmt::Display for VmNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VmNode{{hostname: {:?}, public_address: {:?}}}",
            self.hostname, self.public_address
        )
    }
}

/// Ordered collection of [`VmNode`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmNodes(Vec<VmNode>);

impl VmNodes {
    pub fn new(nodes: Vec<VmNode>) -> Self {
        Self(nodes)
    }

    /// Nodes tagged with exactly `name=value`, in their original order.
    pub fn filter_by_tag(&self, name: &str, value: &str) -> VmNodes {
        self.filter(|vm| vm.has_tag(name, value))
    }

    pub fn filter_by_public_address(&self, address: &str) -> VmNodes {
        self.filter(|vm| vm.public_address == address)
    }

    pub fn filter_by_private_address(&self, address: &str) -> VmNodes {
        self.filter(|vm| vm.private_address == address)
    }

    /// Manager-role nodes.
    pub fn managers(&self) -> VmNodes {
        self.filter_by_tag(ROLE_TAG, MANAGER_ROLE)
    }

    /// Worker-role nodes.
    pub fn workers(&self) -> VmNodes {
        self.filter_by_tag(ROLE_TAG, WORKER_ROLE)
    }

    fn filter(&self, predicate: impl Fn(&VmNode) -> bool) -> VmNodes {
        self.0.iter().filter(|vm| predicate(vm)).cloned().collect()
    }
}

impl Deref for VmNodes {
    type Target = [VmNode];

    fn deref(&self) -> &[VmNode] {
        &self.0
    }
}

impl From<Vec<VmNode>> for VmNodes {
    fn from(nodes: Vec<VmNode>) -> Self {
        Self(nodes)
    }
}

impl FromIterator<VmNode> for VmNodes {
    fn from_iter<I: IntoIterator<Item = VmNode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for VmNodes {
    type Item = VmNode;
    type IntoIter = std::vec::IntoIter<VmNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a VmNodes {
    type Item = &'a VmNode;
    type IntoIter = std::slice::Iter<'a, VmNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A set of VMs along with the region, environment, cluster and domain
/// they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clusterfile {
    pub region: String,
    pub environment: String,
    pub cluster: String,
    pub domain: String,
    #[serde(default)]
    pub nodes: VmNodes,
}

impl Clusterfile {
    /// Parse a Clusterfile from any reader (an open file, stdin, ...).
    pub fn from_reader(mut reader: impl Read) -> ClusterfileResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        serde_json::from_slice(&data).map_err(ClusterfileError::Parse)
    }

    pub fn from_json(json: &str) -> ClusterfileResult<Self> {
        serde_json::from_str(json).map_err(ClusterfileError::Parse)
    }

    pub fn from_file(path: &Path) -> ClusterfileResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load from `path`, where `-` reads standard input.
    pub fn load(path: &str) -> ClusterfileResult<Self> {
        if path == "-" {
            Self::from_reader(std::io::stdin().lock())
        } else {
            Self::from_file(Path::new(path))
        }
    }

    pub fn to_json(&self) -> ClusterfileResult<String> {
        serde_json::to_string_pretty(self).map_err(ClusterfileError::Serialize)
    }

    /// Check the manager count forms a valid quorum (3 or 5) and every
    /// node's labels parse.
    pub fn validate(&self) -> ClusterfileResult<()> {
        let managers = self.nodes.managers().len();
        if !is_valid_quorum(managers) {
            return Err(ClusterfileError::Quorum(managers));
        }

        for node in self.nodes.iter() {
            node.labels().map_err(|source| ClusterfileError::Labels {
                node: node.hostname.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
