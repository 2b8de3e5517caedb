//! Swarm cluster lifecycle.

use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use swarm_core::{NodeInfo, NodeStatus, Tasks, VmNode, VmNodes, is_valid_quorum};
use swarm_transport::{Switcher, split_host_port};
use tracing::{debug, info, warn};

use crate::command::Param;
use crate::config::ManagerConfig;
use crate::coordinator;
use crate::decode::decode_lines;
use crate::drain::drain_node;
use crate::error::{ManagerError, ManagerResult};
use crate::query;

/// Which join token to ask a manager for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Manager,
    Worker,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Manager => "manager",
            TokenKind::Worker => "worker",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives a Docker Swarm cluster through a [`Switcher`].
///
/// Every operation runs its commands one at a time on whichever node the
/// switcher is bound to, switching between nodes as the protocol needs.
/// Cluster state is re-read on every call.
pub struct Manager<S> {
    switcher: S,
    config: ManagerConfig,
}

impl<S: Switcher> Manager<S> {
    pub fn new(switcher: S, config: ManagerConfig) -> Self {
        Self { switcher, config }
    }

    pub fn switcher(&self) -> &S {
        &self.switcher
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Bind to `addr` with a fresh connection.
    pub async fn switch_node(&self, addr: &str) -> ManagerResult<()> {
        query::switch(&self.switcher, addr, false, self.config.switch_timeout).await
    }

    /// Bind to `addr`, relaying through the current node.
    pub async fn switch_node_via(&self, addr: &str) -> ManagerResult<()> {
        query::switch(&self.switcher, addr, true, self.config.switch_timeout).await
    }

    /// Runtime information of the bound node.
    pub async fn info(&self) -> ManagerResult<NodeInfo> {
        query::info(&self.switcher, &self.config.commands).await
    }

    /// Runtime information of every manager the bound node knows of.
    ///
    /// Leaves the switcher bound to the last manager visited.
    pub async fn managers(&self) -> ManagerResult<Vec<NodeInfo>> {
        let node = self.info().await?;

        let mut managers = Vec::with_capacity(node.swarm.remote_managers.len());
        for remote in &node.swarm.remote_managers {
            let host = remote_host(&remote.addr).ok_or_else(|| ManagerError::Switch {
                addr: remote.addr.clone(),
                source: swarm_transport::TransportError::InvalidAddress {
                    addr: remote.addr.clone(),
                    reason: "expected host:port".to_string(),
                },
            })?;
            self.switch_node(host).await?;
            managers.push(self.info().await?);
        }

        Ok(managers)
    }

    /// Every node in the cluster, as seen by a manager.
    pub async fn nodes(&self) -> ManagerResult<Vec<NodeStatus>> {
        self.ensure_manager().await?;
        let out = query::run(&self.switcher, &self.config.commands.nodes, &[]).await?;
        Ok(decode_lines(&out)?)
    }

    /// Tasks scheduled on `node`.
    pub async fn tasks(&self, node: &str) -> ManagerResult<Tasks> {
        query::tasks(&self.switcher, &self.config.commands, node).await
    }

    /// The current join token of the given kind, queried fresh.
    pub async fn join_token(&self, kind: TokenKind) -> ManagerResult<String> {
        let out = query::run(
            &self.switcher,
            &self.config.commands.token,
            &[("role", Param::Arg(kind.as_str()))],
        )
        .await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    /// Make sure the switcher is bound to a manager, failing over to the
    /// bound node's remote managers if not.
    pub async fn ensure_manager(&self) -> ManagerResult<NodeInfo> {
        coordinator::ensure_manager(&self.switcher, &self.config).await
    }

    /// Create a new swarm from `nodes` and return its cluster id.
    ///
    /// One manager is picked at random to initialise the swarm; every other
    /// manager and then every worker joins it. Without `force` the topology
    /// must have 3 or 5 managers. The switcher is left bound to the
    /// bootstrap manager.
    pub async fn create_swarm(&self, nodes: &VmNodes, force: bool) -> ManagerResult<String> {
        let managers = nodes.managers();
        let workers = nodes.workers();

        if force {
            if managers.is_empty() {
                return Err(ManagerError::NoManagers);
            }
            warn!(
                managers = managers.len(),
                "skipping manager validation and forcing creation of cluster"
            );
        } else if !is_valid_quorum(managers.len()) {
            return Err(ManagerError::Quorum(managers.len()));
        }
        check_labels(nodes)?;

        let bootstrap = &managers[rand::rng().random_range(0..managers.len())];
        info!(
            manager = %bootstrap.hostname,
            address = %bootstrap.public_address,
            "creating swarm"
        );

        self.switch_node(&bootstrap.public_address).await?;
        let node = self.info().await?;
        if !node.cluster_id().is_empty() {
            return Err(ManagerError::ClusterExists(node.cluster_id().to_string()));
        }

        query::run(
            &self.switcher,
            &self.config.commands.init,
            &[
                ("advertise_addr", Param::Arg(&bootstrap.private_address)),
                ("listen_addr", Param::Arg(&bootstrap.private_address)),
            ],
        )
        .await?;

        self.label_node(bootstrap)
            .await
            .map_err(|e| label_error(bootstrap, e))?;

        self.switch_node(&bootstrap.public_address).await?;
        let cluster_id = self.info().await?.cluster_id().to_string();
        info!(%cluster_id, "swarm initialised");

        let manager_token = self.join_token(TokenKind::Manager).await?;
        let worker_token = self.join_token(TokenKind::Worker).await?;

        let coordinator = Coordinator {
            public_address: &bootstrap.public_address,
            private_address: &bootstrap.private_address,
            cluster_id: &cluster_id,
        };

        let others = managers
            .iter()
            .filter(|m| m.public_address != bootstrap.public_address);
        for manager in others {
            self.add_node(manager, TokenKind::Manager, &manager_token, &coordinator)
                .await?;
        }
        for worker in &workers {
            self.add_node(worker, TokenKind::Worker, &worker_token, &coordinator)
                .await?;
        }

        self.switch_node(&bootstrap.public_address).await?;
        Ok(cluster_id)
    }

    /// Reconcile the running swarm with `nodes`.
    ///
    /// Nodes not yet in the cluster are joined and labelled, managers
    /// first. Nodes no longer listed are drained, in hostname order. The
    /// switcher is left bound to the coordinator; a coordinator missing
    /// from `nodes` is returned to by relay.
    pub async fn update_swarm(&self, nodes: &VmNodes) -> ManagerResult<()> {
        let managers = nodes.managers();
        if !is_valid_quorum(managers.len()) {
            return Err(ManagerError::Quorum(managers.len()));
        }
        check_labels(nodes)?;

        let current: HashSet<String> = self
            .nodes()
            .await?
            .into_iter()
            .map(|n| n.hostname)
            .collect();
        let desired: HashSet<&str> = nodes.iter().map(|n| n.hostname.as_str()).collect();

        let new_nodes: VmNodes = nodes
            .iter()
            .filter(|n| !current.contains(&n.hostname))
            .cloned()
            .collect();
        let mut removed: Vec<String> = current
            .iter()
            .filter(|h| !desired.contains(h.as_str()))
            .cloned()
            .collect();
        removed.sort();

        let node = self.ensure_manager().await?;
        let cluster_id = node.cluster_id().to_string();
        if cluster_id.is_empty() {
            return Err(ManagerError::NoCluster);
        }

        let bound = self.switcher.address();
        let private_address = match node.swarm.node_addr.as_str() {
            "" => bound.clone().ok_or(ManagerError::NoCoordinator)?,
            addr => addr.to_string(),
        };
        let listed = nodes
            .filter_by_private_address(&private_address)
            .first()
            .map(|n| n.public_address.clone());
        let public_address = listed
            .clone()
            .or(bound)
            .ok_or(ManagerError::NoCoordinator)?;

        info!(
            %cluster_id,
            coordinator = %public_address,
            joining = new_nodes.len(),
            draining = removed.len(),
            "updating swarm"
        );

        let manager_token = self.join_token(TokenKind::Manager).await?;
        let worker_token = self.join_token(TokenKind::Worker).await?;

        let coordinator = Coordinator {
            public_address: &public_address,
            private_address: &private_address,
            cluster_id: &cluster_id,
        };

        for manager in &new_nodes.managers() {
            self.add_node(manager, TokenKind::Manager, &manager_token, &coordinator)
                .await?;
        }
        for worker in &new_nodes.workers() {
            self.add_node(worker, TokenKind::Worker, &worker_token, &coordinator)
                .await?;
        }

        if !new_nodes.is_empty() {
            match &listed {
                Some(public) => self.switch_node(public).await?,
                // Outside the topology: relay back from the last joined node.
                None => self.switch_node_via(&private_address).await?,
            }
        }
        if !removed.is_empty() {
            self.drain_nodes(&removed).await?;
        }

        Ok(())
    }

    /// Apply the `labels` tag of `node` as swarm node labels.
    ///
    /// A node without labels is left alone and no command is run.
    pub async fn label_node(&self, node: &VmNode) -> ManagerResult<()> {
        let labels = node.labels().map_err(|source| ManagerError::Labels {
            node: node.hostname.clone(),
            source,
        })?;
        if labels.is_empty() {
            debug!(node = %node.hostname, "no labels to apply");
            return Ok(());
        }

        self.switch_node(&node.public_address).await?;
        let node_id = self.info().await?.swarm.node_id;
        self.ensure_manager().await?;

        let options: Vec<String> = labels
            .iter()
            .flat_map(|(key, values)| {
                let label = if values.is_empty() {
                    key.clone()
                } else {
                    format!("{key}={}", values.join(","))
                };
                ["--label-add".to_string(), label]
            })
            .collect();

        debug!(node = %node.hostname, %node_id, ?labels, "labelling node");
        query::run(
            &self.switcher,
            &self.config.commands.update,
            &[("options", Param::Args(&options)), ("node", Param::Arg(&node_id))],
        )
        .await?;
        Ok(())
    }

    /// Drain each named node in turn, stopping at the first failure.
    pub async fn drain_nodes(&self, names: &[String]) -> ManagerResult<()> {
        self.ensure_manager().await?;

        for name in names {
            drain_node(&self.switcher, &self.config, name)
                .await
                .map_err(|e| ManagerError::Drain {
                    node: name.clone(),
                    source: Box::new(e),
                })?;
        }

        Ok(())
    }

    /// Join `node` to the swarm run by `coordinator`, then label it.
    async fn add_node(
        &self,
        node: &VmNode,
        kind: TokenKind,
        token: &str,
        coordinator: &Coordinator<'_>,
    ) -> ManagerResult<()> {
        info!(
            role = %kind,
            node = %node.hostname,
            coordinator = %coordinator.public_address,
            "joining node"
        );

        self.join_swarm(node, coordinator.private_address, token)
            .await
            .map_err(|e| ManagerError::Join {
                role: kind.as_str(),
                node: node.public_address.clone(),
                coordinator: coordinator.public_address.to_string(),
                cluster_id: coordinator.cluster_id.to_string(),
                source: Box::new(e),
            })?;

        self.label_node(node)
            .await
            .map_err(|e| label_error(node, e))
    }

    async fn join_swarm(&self, node: &VmNode, remote: &str, token: &str) -> ManagerResult<()> {
        self.switch_node(&node.public_address).await?;

        let remote_addr = join_host_port(remote, self.config.swarm_port);
        query::run(
            &self.switcher,
            &self.config.commands.join,
            &[
                ("advertise_addr", Param::Arg(&node.private_address)),
                ("listen_addr", Param::Arg(&node.private_address)),
                ("token", Param::Arg(token)),
                ("remote_addr", Param::Arg(&remote_addr)),
            ],
        )
        .await?;
        Ok(())
    }
}

/// The manager new nodes join through.
struct Coordinator<'a> {
    public_address: &'a str,
    private_address: &'a str,
    cluster_id: &'a str,
}

/// Every node's labels must parse before anything is run remotely.
fn check_labels(nodes: &VmNodes) -> ManagerResult<()> {
    for node in nodes.iter() {
        node.labels().map_err(|source| ManagerError::Labels {
            node: node.hostname.clone(),
            source,
        })?;
    }
    Ok(())
}

fn label_error(node: &VmNode, source: ManagerError) -> ManagerError {
    ManagerError::Label {
        node: node.hostname.clone(),
        source: Box::new(source),
    }
}

fn remote_host(addr: &str) -> Option<&str> {
    split_host_port(addr)
        .map(|(host, _)| host)
        .filter(|host| !host.is_empty())
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
