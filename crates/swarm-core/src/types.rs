//! Runtime records decoded from the `docker` CLI's JSON output.
//!
//! Field names follow `docker info`, `docker node ls` and `docker node ps`
//! with `--format '{{ json . }}'`. Absent or `null` fields decode to their
//! empty value.

use serde::{Deserialize, Deserializer, Serialize};

/// Cluster identity as reported by a swarm member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    #[serde(rename = "ID", deserialize_with = "null_default")]
    pub id: String,
    #[serde(rename = "CreatedAt", deserialize_with = "null_default")]
    pub created_at: String,
}

/// A manager known to the queried node, as `host:port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteManager {
    #[serde(rename = "NodeID", deserialize_with = "null_default")]
    pub node_id: String,
    #[serde(rename = "Addr", deserialize_with = "null_default")]
    pub addr: String,
}

/// The swarm membership block of `docker info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmInfo {
    #[serde(rename = "NodeID", deserialize_with = "null_default")]
    pub node_id: String,
    #[serde(rename = "NodeAddr", deserialize_with = "null_default")]
    pub node_addr: String,
    #[serde(rename = "LocalNodeState", deserialize_with = "null_default")]
    pub local_node_state: String,
    #[serde(rename = "ControlAvailable", deserialize_with = "null_default")]
    pub control_available: bool,
    #[serde(rename = "Nodes", deserialize_with = "null_default")]
    pub nodes: u32,
    #[serde(rename = "Managers", deserialize_with = "null_default")]
    pub managers: u32,
    #[serde(rename = "RemoteManagers", deserialize_with = "null_default")]
    pub remote_managers: Vec<RemoteManager>,
    #[serde(rename = "Cluster", deserialize_with = "null_default")]
    pub cluster: ClusterInfo,
}

/// Node runtime information from `docker info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    #[serde(rename = "ID", deserialize_with = "null_default")]
    pub id: String,
    #[serde(rename = "Name", deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "Labels", deserialize_with = "null_default")]
    pub labels: Vec<String>,

    #[serde(rename = "OSType", deserialize_with = "null_default")]
    pub os_type: String,
    #[serde(rename = "OSVersion", deserialize_with = "null_default")]
    pub os_version: String,
    #[serde(rename = "KernelVersion", deserialize_with = "null_default")]
    pub kernel_version: String,
    #[serde(rename = "OperatingSystem", deserialize_with = "null_default")]
    pub operating_system: String,

    #[serde(rename = "NCPU", deserialize_with = "null_default")]
    pub ncpu: u32,
    #[serde(rename = "MemTotal", deserialize_with = "null_default")]
    pub mem_total: i64,

    #[serde(rename = "ServerVersion", deserialize_with = "null_default")]
    pub server_version: String,

    #[serde(rename = "Swarm", deserialize_with = "null_default")]
    pub swarm: SwarmInfo,
}

impl NodeInfo {
    /// Whether this node can issue membership changes.
    pub fn is_manager(&self) -> bool {
        self.swarm.control_available
    }

    /// The swarm cluster id, empty when the node is not in a swarm.
    pub fn cluster_id(&self) -> &str {
        &self.swarm.cluster.id
    }
}

/// One row of `docker node ls`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    #[serde(rename = "ID", deserialize_with = "null_default")]
    pub id: String,
    #[serde(rename = "Hostname", deserialize_with = "null_default")]
    pub hostname: String,
    #[serde(rename = "EngineVersion", deserialize_with = "null_default")]
    pub engine_version: String,
    #[serde(rename = "Availability", deserialize_with = "null_default")]
    pub availability: String,
    #[serde(rename = "ManagerStatus", deserialize_with = "null_default")]
    pub manager_status: String,
    #[serde(rename = "Status", deserialize_with = "null_default")]
    pub status: String,
}

/// One row of `docker node ps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStatus {
    #[serde(rename = "ID", deserialize_with = "null_default")]
    pub id: String,
    #[serde(rename = "Name", deserialize_with = "null_default")]
    pub name: String,
    #[serde(rename = "Image", deserialize_with = "null_default")]
    pub image: String,
    #[serde(rename = "Error", deserialize_with = "null_default")]
    pub error: String,
    #[serde(rename = "Node", deserialize_with = "null_default")]
    pub node: String,
    #[serde(rename = "Ports", deserialize_with = "null_default")]
    pub ports: String,
    #[serde(rename = "CurrentState", deserialize_with = "null_default")]
    pub current_state: String,
    #[serde(rename = "DesiredState", deserialize_with = "null_default")]
    pub desired_state: String,
}

impl TaskStatus {
    /// Whether the task's current state starts with "shutdown" (any case).
    pub fn is_shutdown(&self) -> bool {
        self.current_state.to_lowercase().starts_with("shutdown")
    }
}

/// Tasks scheduled on a node.
pub type Tasks = Vec<TaskStatus>;

/// Whether every task has shut down. True for no tasks.
pub fn all_shutdown(tasks: &[TaskStatus]) -> bool {
    tasks.iter().all(TaskStatus::is_shutdown)
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(state: &str) -> TaskStatus {
        TaskStatus {
            current_state: state.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn decode_docker_info() {
        let json = r#"{
            "ID": "ABCD:EFGH",
            "Name": "dm1",
            "Labels": null,
            "OSType": "linux",
            "KernelVersion": "5.10.0",
            "OperatingSystem": "RancherOS v1.5.8",
            "NCPU": 4,
            "MemTotal": 8254881792,
            "ServerVersion": "20.10.7",
            "Swarm": {
                "NodeID": "x1y2z3",
                "NodeAddr": "172.16.0.1",
                "LocalNodeState": "active",
                "ControlAvailable": true,
                "Nodes": 5,
                "Managers": 3,
                "RemoteManagers": [
                    {"NodeID": "x1y2z3", "Addr": "172.16.0.1:2377"},
                    {"NodeID": "a1b2c3", "Addr": "172.16.0.2:2377"}
                ],
                "Cluster": {"ID": "cluster-1", "CreatedAt": "2021-06-01T00:00:00Z", "Spec": {}}
            }
        }"#;
        let info: NodeInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.name, "dm1");
        assert!(info.labels.is_empty());
        assert_eq!(info.ncpu, 4);
        assert!(info.is_manager());
        assert_eq!(info.cluster_id(), "cluster-1");
        assert_eq!(info.swarm.remote_managers.len(), 2);
        assert_eq!(info.swarm.remote_managers[1].addr, "172.16.0.2:2377");
    }

    #[test]
    fn decode_info_outside_swarm() {
        let json = r#"{"ID": "x", "Name": "lonely",
            "Swarm": {"NodeID": "", "LocalNodeState": "inactive",
                      "ControlAvailable": false, "RemoteManagers": null, "Cluster": null}}"#;
        let info: NodeInfo = serde_json::from_str(json).unwrap();

        assert!(!info.is_manager());
        assert_eq!(info.cluster_id(), "");
        assert!(info.swarm.remote_managers.is_empty());
    }

    #[test]
    fn decode_node_status() {
        let json = r#"{"Availability":"Active","EngineVersion":"20.10.7","Hostname":"dm1",
            "ID":"x1y2z3","ManagerStatus":"Leader","Self":true,"Status":"Ready","TLSStatus":"Ready"}"#;
        let node: NodeStatus = serde_json::from_str(json).unwrap();
        assert_eq!(node.hostname, "dm1");
        assert_eq!(node.manager_status, "Leader");
        assert_eq!(node.availability, "Active");
    }

    #[test]
    fn task_shutdown_is_case_insensitive_prefix() {
        assert!(task("Shutdown 2 minutes ago").is_shutdown());
        assert!(task("shutdown").is_shutdown());
        assert!(task("SHUTDOWN.Complete").is_shutdown());
        assert!(!task("Running 3 hours ago").is_shutdown());
        assert!(!task("Pending shutdown").is_shutdown());
        assert!(!task("").is_shutdown());
    }

    #[test]
    fn all_shutdown_semantics() {
        assert!(all_shutdown(&[]));
        assert!(all_shutdown(&[task("Shutdown.Complete"), task("shutdown 1s ago")]));
        assert!(!all_shutdown(&[task("Shutdown"), task("Running")]));
    }
}
