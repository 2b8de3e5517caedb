//! Orchestration scenarios against a scripted in-memory fleet.
//!
//! The fleet answers the default `docker` command templates the way a
//! real engine would, closely enough to drive create, update, label and
//! drain end to end, and records every command with the host it ran on.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use swarm_core::{LABELS_TAG, MANAGER_ROLE, ROLE_TAG, VmNode, VmNodes, WORKER_ROLE};
use swarm_manager::{Manager, ManagerConfig, ManagerError};
use swarm_transport::{CommandOutput, Runner, Switcher, TransportError, TransportResult};

const CLUSTER_ID: &str = "cluster-1";

#[derive(Debug, Clone)]
struct Host {
    hostname: String,
    public: String,
    private: String,
    manager: bool,
    in_swarm: bool,
    availability: String,
    task_state: String,
}

#[derive(Default)]
struct FleetState {
    hosts: Vec<Host>,
    cluster_id: Option<String>,
    commands: Vec<(String, String)>,
    switches: Vec<(String, bool)>,
    unreachable: HashSet<String>,
    failing: Vec<String>,
    stale_managers: Vec<String>,
}

impl FleetState {
    fn find(&self, addr: &str) -> Option<usize> {
        self.hosts
            .iter()
            .position(|h| h.public == addr || h.private == addr || h.hostname == addr)
    }

    fn find_mut(&mut self, addr: &str) -> Option<&mut Host> {
        let idx = self.find(addr)?;
        Some(&mut self.hosts[idx])
    }

    fn info(&self, idx: usize) -> String {
        let host = &self.hosts[idx];
        let remote_managers: Vec<_> = if host.in_swarm {
            let live = self
                .hosts
                .iter()
                .filter(|h| h.in_swarm && h.manager)
                .map(|h| h.private.clone());
            self.stale_managers
                .iter()
                .cloned()
                .chain(live)
                .map(|addr| json!({"NodeID": format!("id-{addr}"), "Addr": format!("{addr}:2377")}))
                .collect()
        } else {
            Vec::new()
        };
        let cluster_id = match (&self.cluster_id, host.in_swarm) {
            (Some(id), true) => id.clone(),
            _ => String::new(),
        };

        let (node_id, node_addr, state) = if host.in_swarm {
            (format!("id-{}", host.hostname), host.private.clone(), "active")
        } else {
            (String::new(), String::new(), "inactive")
        };
        let control_available = host.in_swarm && host.manager;

        json!({
            "ID": format!("engine-{}", host.hostname),
            "Name": host.hostname,
            "Swarm": {
                "NodeID": node_id,
                "NodeAddr": node_addr,
                "LocalNodeState": state,
                "ControlAvailable": control_available,
                "RemoteManagers": remote_managers,
                "Cluster": {"ID": cluster_id},
            }
        })
        .to_string()
    }

    fn run(&mut self, idx: usize, command: &str) -> CommandOutput {
        self.commands
            .push((self.hosts[idx].hostname.clone(), command.to_string()));
        let controls = self.hosts[idx].in_swarm && self.hosts[idx].manager;
        let words: Vec<&str> = command.split_whitespace().collect();

        if self.failing.iter().any(|f| command.contains(f.as_str())) {
            return CommandOutput::failed(1, "Error response from daemon: rpc error");
        }

        if command.starts_with("docker info") {
            return CommandOutput::ok(self.info(idx));
        }

        if command.starts_with("docker swarm init") {
            if self.hosts[idx].in_swarm {
                return CommandOutput::failed(1, "This node is already part of a swarm.");
            }
            self.cluster_id = Some(CLUSTER_ID.to_string());
            self.hosts[idx].in_swarm = true;
            self.hosts[idx].manager = true;
            return CommandOutput::ok("Swarm initialized\n");
        }

        if command.starts_with("docker swarm join-token") {
            if !controls {
                return CommandOutput::failed(1, "This node is not a swarm manager.");
            }
            let role = words.last().copied().unwrap_or_default();
            return CommandOutput::ok(format!("SWMTKN-1-{role}\n"));
        }

        if command.starts_with("docker swarm join") {
            let remote = words.last().copied().unwrap_or_default();
            let remote_host = remote.trim_end_matches(":2377");
            let reachable = self
                .find(remote_host)
                .is_some_and(|i| self.hosts[i].in_swarm && self.hosts[i].manager);
            if !reachable {
                return CommandOutput::failed(1, "could not reach manager");
            }
            self.hosts[idx].in_swarm = true;
            self.hosts[idx].manager = command.contains("SWMTKN-1-manager");
            return CommandOutput::ok("This node joined a swarm.\n");
        }

        if !controls && command.starts_with("docker node") {
            return CommandOutput::failed(1, "This node is not a swarm manager.");
        }

        if command.starts_with("docker node ls") {
            let lines: Vec<String> = self
                .hosts
                .iter()
                .filter(|h| h.in_swarm)
                .map(|h| {
                    let manager_status = if h.manager { "Reachable" } else { "" };
                    json!({
                        "ID": format!("id-{}", h.hostname),
                        "Hostname": h.hostname,
                        "Status": "Ready",
                        "Availability": h.availability,
                        "ManagerStatus": manager_status,
                        "EngineVersion": "20.10.7",
                    })
                    .to_string()
                })
                .collect();
            return CommandOutput::ok(lines.join("\n") + "\n");
        }

        if command.starts_with("docker node update") {
            if command.contains("--availability drain") {
                let node = words.last().copied().unwrap_or_default();
                match self.find_mut(node) {
                    Some(host) => host.availability = "Drain".to_string(),
                    None => return CommandOutput::failed(1, "node not found"),
                }
            }
            return CommandOutput::ok("");
        }

        if command.starts_with("docker node ps") {
            let node = words.last().copied().unwrap_or_default();
            return match self.find(node) {
                Some(i) => {
                    let state = &self.hosts[i].task_state;
                    let task = json!({"ID": "task-1", "Node": node, "CurrentState": state});
                    CommandOutput::ok(format!("{task}\n"))
                }
                None => CommandOutput::failed(1, "node not found"),
            };
        }

        CommandOutput::failed(127, "command not found")
    }
}

#[derive(Clone, Default)]
struct Fleet(Arc<Mutex<FleetState>>);

impl Fleet {
    fn add(&self, hostname: &str, n: u8, manager: bool, in_swarm: bool) -> &Self {
        self.0.lock().unwrap().hosts.push(Host {
            hostname: hostname.to_string(),
            public: format!("203.0.113.{n}"),
            private: format!("10.0.0.{n}"),
            manager,
            in_swarm,
            availability: "Active".to_string(),
            task_state: "Shutdown.Complete".to_string(),
        });
        self
    }

    fn form_cluster(&self) {
        self.0.lock().unwrap().cluster_id = Some(CLUSTER_ID.to_string());
    }

    fn unreachable(&self, addr: &str) {
        self.0.lock().unwrap().unreachable.insert(addr.to_string());
    }

    fn fail_commands_containing(&self, fragment: &str) {
        self.0.lock().unwrap().failing.push(fragment.to_string());
    }

    /// Advertise `private` as a remote manager whatever its current role.
    fn stale_manager(&self, private: &str) {
        self.0
            .lock()
            .unwrap()
            .stale_managers
            .push(private.to_string());
    }

    fn set_task_state(&self, hostname: &str, state: &str) {
        let mut state_guard = self.0.lock().unwrap();
        let host = state_guard.find_mut(hostname).unwrap();
        host.task_state = state.to_string();
    }

    fn commands(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().commands.clone()
    }

    fn commands_matching(&self, prefix: &str) -> Vec<(String, String)> {
        self.commands()
            .into_iter()
            .filter(|(_, c)| c.starts_with(prefix))
            .collect()
    }

    fn switches(&self) -> Vec<(String, bool)> {
        self.0.lock().unwrap().switches.clone()
    }

    fn host(&self, hostname: &str) -> Host {
        let state = self.0.lock().unwrap();
        state.hosts[state.find(hostname).unwrap()].clone()
    }

    fn vm(&self, hostname: &str, role: &str, labels: &str) -> VmNode {
        let host = self.host(hostname);
        let mut tags = HashMap::from([(ROLE_TAG.to_string(), role.to_string())]);
        if !labels.is_empty() {
            tags.insert(LABELS_TAG.to_string(), labels.to_string());
        }
        VmNode {
            hostname: host.hostname,
            public_address: host.public,
            private_address: host.private,
            tags,
        }
    }
}

struct FleetRunner {
    fleet: Fleet,
    idx: usize,
}

#[async_trait]
impl Runner for FleetRunner {
    async fn command(&self, command: &str) -> TransportResult<CommandOutput> {
        Ok(self.fleet.0.lock().unwrap().run(self.idx, command))
    }
}

struct FleetSwitcher {
    fleet: Fleet,
    bound: RwLock<Option<usize>>,
}

impl FleetSwitcher {
    fn new(fleet: &Fleet) -> Self {
        Self {
            fleet: fleet.clone(),
            bound: RwLock::new(None),
        }
    }

    fn bound_hostname(&self) -> Option<String> {
        let idx = (*self.bound.read().unwrap())?;
        Some(self.fleet.0.lock().unwrap().hosts[idx].hostname.clone())
    }

    fn bind(&self, addr: &str, via: bool) -> TransportResult<()> {
        let mut state = self.fleet.0.lock().unwrap();
        state.switches.push((addr.to_string(), via));
        if state.unreachable.contains(addr) {
            return Err(TransportError::Connect {
                addr: addr.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let idx = state.find(addr).ok_or_else(|| TransportError::Connect {
            addr: addr.to_string(),
            reason: "no route to host".to_string(),
        })?;
        *self.bound.write().unwrap() = Some(idx);
        Ok(())
    }
}

impl fmt::Display for FleetSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fleet://{}", self.bound_hostname().unwrap_or_default())
    }
}

#[async_trait]
impl Switcher for FleetSwitcher {
    async fn switch(&self, node_addr: &str) -> TransportResult<()> {
        self.bind(node_addr, false)
    }

    async fn switch_via(&self, node_addr: &str) -> TransportResult<()> {
        self.bind(node_addr, true)
    }

    fn runner(&self) -> Option<Arc<dyn Runner>> {
        let idx = (*self.bound.read().unwrap())?;
        Some(Arc::new(FleetRunner {
            fleet: self.fleet.clone(),
            idx,
        }))
    }

    fn address(&self) -> Option<String> {
        let idx = (*self.bound.read().unwrap())?;
        Some(self.fleet.0.lock().unwrap().hosts[idx].private.clone())
    }
}

fn fast_config() -> ManagerConfig {
    ManagerConfig::default()
        .with_drain_poll_interval(Duration::from_millis(10))
        .with_drain_timeout(Duration::from_millis(150))
        .with_switch_timeout(Duration::from_secs(5))
}

fn fresh_fleet() -> Fleet {
    let fleet = Fleet::default();
    fleet
        .add("dm1", 1, false, false)
        .add("dm2", 2, false, false)
        .add("dm3", 3, false, false)
        .add("dw1", 4, false, false)
        .add("dw2", 5, false, false);
    fleet
}

#[tokio::test]
async fn create_initialises_once_and_joins_the_rest() {
    let fleet = fresh_fleet();
    let nodes: VmNodes = vec![
        fleet.vm("dm1", MANAGER_ROLE, ""),
        fleet.vm("dm2", MANAGER_ROLE, ""),
        fleet.vm("dm3", MANAGER_ROLE, ""),
        fleet.vm("dw1", WORKER_ROLE, "tier=web"),
        fleet.vm("dw2", WORKER_ROLE, ""),
    ]
    .into();
    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());

    let cluster_id = manager.create_swarm(&nodes, false).await.unwrap();
    assert_eq!(cluster_id, CLUSTER_ID);

    let inits = fleet.commands_matching("docker swarm init");
    assert_eq!(inits.len(), 1);
    let bootstrap = fleet.host(&inits[0].0);
    assert!(
        inits[0]
            .1
            .ends_with(&format!("--advertise-addr {0} --listen-addr {0}", bootstrap.private))
    );

    let joins = fleet.commands_matching("docker swarm join ");
    assert_eq!(joins.len(), 4);
    let joined: HashSet<&str> = joins.iter().map(|(h, _)| h.as_str()).collect();
    assert_eq!(joined.len(), 4);
    assert!(!joined.contains(bootstrap.hostname.as_str()));
    for (host, command) in &joins {
        assert!(command.ends_with(&format!("{}:2377", bootstrap.private)), "{command}");
        let token = if host.starts_with("dm") { "SWMTKN-1-manager" } else { "SWMTKN-1-worker" };
        assert!(command.contains(token), "{command}");
    }

    for name in ["dm1", "dm2", "dm3", "dw1", "dw2"] {
        let host = fleet.host(name);
        assert!(host.in_swarm);
        assert_eq!(host.manager, name.starts_with("dm"));
    }

    let labels = fleet.commands_matching("docker node update");
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].1, "docker node update --label-add tier=web id-dw1");
    assert!(labels[0].0.starts_with("dm"));

    assert_eq!(
        manager.switcher().bound_hostname().as_deref(),
        Some(bootstrap.hostname.as_str())
    );
}

#[tokio::test]
async fn create_without_quorum_touches_nothing() {
    let fleet = fresh_fleet();
    fleet.add("dm4", 6, false, false);
    let nodes: VmNodes = ["dm1", "dm2", "dm3", "dm4"]
        .iter()
        .map(|n| fleet.vm(n, MANAGER_ROLE, ""))
        .collect();
    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());

    let err = manager.create_swarm(&nodes, false).await.unwrap_err();
    assert!(matches!(err, ManagerError::Quorum(4)));
    assert!(fleet.commands().is_empty());
    assert!(fleet.switches().is_empty());
}

#[tokio::test]
async fn forced_create_with_single_manager() {
    let fleet = fresh_fleet();
    let nodes: VmNodes = vec![
        fleet.vm("dm1", MANAGER_ROLE, ""),
        fleet.vm("dw1", WORKER_ROLE, ""),
    ]
    .into();
    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());

    manager.create_swarm(&nodes, true).await.unwrap();
    assert_eq!(fleet.commands_matching("docker swarm init")[0].0, "dm1");
    assert_eq!(fleet.commands_matching("docker swarm join ").len(), 1);
}

#[tokio::test]
async fn create_refuses_existing_cluster() {
    let fleet = Fleet::default();
    fleet
        .add("dm1", 1, true, true)
        .add("dm2", 2, true, true)
        .add("dm3", 3, true, true);
    fleet.form_cluster();
    let nodes: VmNodes = ["dm1", "dm2", "dm3"]
        .iter()
        .map(|n| fleet.vm(n, MANAGER_ROLE, ""))
        .collect();
    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());

    let err = manager.create_swarm(&nodes, false).await.unwrap_err();
    assert!(matches!(err, ManagerError::ClusterExists(ref id) if id == CLUSTER_ID));
    assert!(fleet.commands_matching("docker swarm init").is_empty());
}

#[tokio::test]
async fn update_joins_new_and_drains_removed() {
    let fleet = Fleet::default();
    fleet
        .add("a", 1, true, true)
        .add("b", 2, true, true)
        .add("c", 3, true, true)
        .add("d", 4, false, false);
    fleet.form_cluster();
    let nodes: VmNodes = ["a", "b", "d"]
        .iter()
        .map(|n| fleet.vm(n, MANAGER_ROLE, ""))
        .collect();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("a").public).await.unwrap();
    manager.update_swarm(&nodes).await.unwrap();

    let joins = fleet.commands_matching("docker swarm join ");
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].0, "d");
    assert_eq!(
        joins[0].1,
        "docker swarm join --advertise-addr 10.0.0.4 --listen-addr 10.0.0.4 \
         --token SWMTKN-1-manager 10.0.0.1:2377"
    );

    let drains = fleet.commands_matching("docker node update --availability drain");
    assert_eq!(drains.len(), 1);
    assert_eq!(drains[0].1, "docker node update --availability drain c");
    assert_eq!(fleet.host("c").availability, "Drain");
    assert!(
        fleet
            .commands_matching("docker node ps")
            .iter()
            .all(|(_, c)| c.ends_with(" c"))
    );

    assert_eq!(manager.switcher().bound_hostname().as_deref(), Some("a"));
}

#[tokio::test]
async fn update_in_sync_only_queries() {
    let fleet = Fleet::default();
    fleet
        .add("a", 1, true, true)
        .add("b", 2, true, true)
        .add("c", 3, true, true);
    fleet.form_cluster();
    let nodes: VmNodes = ["a", "b", "c"]
        .iter()
        .map(|n| fleet.vm(n, MANAGER_ROLE, ""))
        .collect();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("b").public).await.unwrap();
    manager.update_swarm(&nodes).await.unwrap();

    assert!(fleet.commands_matching("docker swarm join ").is_empty());
    assert!(fleet.commands_matching("docker node update").is_empty());
}

#[tokio::test]
async fn update_without_quorum_touches_nothing() {
    let fleet = Fleet::default();
    fleet.add("a", 1, true, true).add("b", 2, true, true);
    let nodes: VmNodes = ["a", "b"]
        .iter()
        .map(|n| fleet.vm(n, MANAGER_ROLE, ""))
        .collect();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    let err = manager.update_swarm(&nodes).await.unwrap_err();
    assert!(matches!(err, ManagerError::Quorum(2)));
    assert!(fleet.commands().is_empty());
}

#[tokio::test]
async fn drain_completes_when_tasks_shut_down() {
    let fleet = Fleet::default();
    fleet.add("a", 1, true, true).add("w", 2, false, true);
    fleet.form_cluster();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("a").public).await.unwrap();
    manager.drain_nodes(&["w".to_string()]).await.unwrap();

    assert_eq!(fleet.host("w").availability, "Drain");
    assert_eq!(fleet.commands_matching("docker node ps").len(), 1);
}

#[tokio::test]
async fn drain_times_out_on_running_tasks() {
    let fleet = Fleet::default();
    fleet.add("a", 1, true, true).add("w", 2, false, true);
    fleet.form_cluster();
    fleet.set_task_state("w", "Running 2 hours ago");

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("a").public).await.unwrap();
    let err = manager
        .drain_nodes(&["w".to_string(), "a".to_string()])
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, ManagerError::Drain { ref node, .. } if node == "w"));
    // Stops at the first failure; availability is not rolled back.
    assert_eq!(fleet.host("a").availability, "Active");
    assert_eq!(fleet.host("w").availability, "Drain");
}

#[tokio::test]
async fn worker_fails_over_to_next_reachable_manager() {
    let fleet = Fleet::default();
    fleet
        .add("m1", 1, true, true)
        .add("m2", 2, true, true)
        .add("w", 3, false, true);
    fleet.form_cluster();
    fleet.unreachable("10.0.0.1");

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("w").public).await.unwrap();
    let node = manager.ensure_manager().await.unwrap();

    assert_eq!(node.name, "m2");
    assert_eq!(manager.switcher().bound_hostname().as_deref(), Some("m2"));
    assert_eq!(
        fleet.switches()[1..],
        [("10.0.0.1".to_string(), true), ("10.0.0.2".to_string(), true)]
    );
}

#[tokio::test]
async fn worker_with_no_reachable_manager() {
    let fleet = Fleet::default();
    fleet.add("m1", 1, true, true).add("w", 2, false, true);
    fleet.form_cluster();
    fleet.unreachable("10.0.0.1");

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("w").public).await.unwrap();
    let err = manager.nodes().await.unwrap_err();

    assert!(matches!(err, ManagerError::NoCoordinator));
    assert_eq!(manager.switcher().bound_hostname().as_deref(), Some("w"));
}

#[tokio::test]
async fn labels_worker_through_a_manager() {
    let fleet = Fleet::default();
    fleet.add("m1", 1, true, true).add("w", 2, false, true);
    fleet.form_cluster();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager
        .label_node(&fleet.vm("w", WORKER_ROLE, "env=prod,staging&tier=web&gpu"))
        .await
        .unwrap();

    let updates = fleet.commands_matching("docker node update");
    assert_eq!(
        updates,
        vec![(
            "m1".to_string(),
            "docker node update --label-add env=prod,staging --label-add gpu \
             --label-add tier=web id-w"
                .to_string()
        )]
    );
}

#[tokio::test]
async fn unlabelled_node_is_a_no_op() {
    let fleet = Fleet::default();
    fleet.add("m1", 1, true, true);

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager
        .label_node(&fleet.vm("m1", MANAGER_ROLE, ""))
        .await
        .unwrap();

    assert!(fleet.commands().is_empty());
    assert!(fleet.switches().is_empty());
}

#[tokio::test]
async fn managers_reports_every_known_manager() {
    let fleet = Fleet::default();
    fleet
        .add("m1", 1, true, true)
        .add("m2", 2, true, true)
        .add("m3", 3, true, true)
        .add("w", 4, false, true);
    fleet.form_cluster();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("w").public).await.unwrap();
    let names: Vec<String> = manager
        .managers()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.name)
        .collect();

    assert_eq!(names, ["m1", "m2", "m3"]);
}

#[tokio::test]
async fn create_with_malformed_labels_touches_nothing() {
    let fleet = fresh_fleet();
    let nodes: VmNodes = vec![
        fleet.vm("dm1", MANAGER_ROLE, ""),
        fleet.vm("dm2", MANAGER_ROLE, ""),
        fleet.vm("dm3", MANAGER_ROLE, ""),
        fleet.vm("dw1", WORKER_ROLE, ""),
        fleet.vm("dw2", WORKER_ROLE, "zone=a;b"),
    ]
    .into();
    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());

    let err = manager.create_swarm(&nodes, false).await.unwrap_err();
    assert!(matches!(err, ManagerError::Labels { ref node, .. } if node == "dw2"));
    assert!(fleet.commands().is_empty());
    assert!(fleet.switches().is_empty());

    // Nothing was initialised, so the same topology can be retried once fixed.
    let fixed: VmNodes = nodes
        .iter()
        .map(|n| fleet.vm(&n.hostname, n.tag(ROLE_TAG), ""))
        .collect();
    assert_eq!(manager.create_swarm(&fixed, false).await.unwrap(), CLUSTER_ID);
}

#[tokio::test]
async fn update_with_malformed_labels_touches_nothing() {
    let fleet = Fleet::default();
    fleet
        .add("a", 1, true, true)
        .add("b", 2, true, true)
        .add("c", 3, true, true)
        .add("d", 4, false, false);
    fleet.form_cluster();
    let nodes: VmNodes = vec![
        fleet.vm("a", MANAGER_ROLE, ""),
        fleet.vm("b", MANAGER_ROLE, ""),
        fleet.vm("c", MANAGER_ROLE, ""),
        fleet.vm("d", WORKER_ROLE, "=web"),
    ]
    .into();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    let err = manager.update_swarm(&nodes).await.unwrap_err();
    assert!(matches!(err, ManagerError::Labels { ref node, .. } if node == "d"));
    assert!(fleet.commands().is_empty());
}

#[tokio::test]
async fn create_stops_at_first_unreachable_worker() {
    let fleet = fresh_fleet();
    fleet.unreachable("203.0.113.4");
    let nodes: VmNodes = vec![
        fleet.vm("dm1", MANAGER_ROLE, ""),
        fleet.vm("dm2", MANAGER_ROLE, ""),
        fleet.vm("dm3", MANAGER_ROLE, ""),
        fleet.vm("dw1", WORKER_ROLE, ""),
        fleet.vm("dw2", WORKER_ROLE, ""),
    ]
    .into();
    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());

    let err = manager.create_swarm(&nodes, false).await.unwrap_err();
    match err {
        ManagerError::Join {
            role,
            ref node,
            ref cluster_id,
            ..
        } => {
            assert_eq!(role, "worker");
            assert_eq!(node, "203.0.113.4");
            assert_eq!(cluster_id, CLUSTER_ID);
        }
        other => panic!("expected join error, got {other:?}"),
    }

    for name in ["dm1", "dm2", "dm3"] {
        assert!(fleet.host(name).in_swarm, "{name} should have joined");
    }
    assert!(!fleet.host("dw1").in_swarm);
    assert!(!fleet.host("dw2").in_swarm);
    assert!(
        fleet
            .switches()
            .iter()
            .all(|(addr, _)| addr != &fleet.host("dw2").public)
    );
}

#[tokio::test]
async fn update_label_failure_stops_before_draining() {
    let fleet = Fleet::default();
    fleet
        .add("a", 1, true, true)
        .add("b", 2, true, true)
        .add("c", 3, true, true)
        .add("x", 4, true, true)
        .add("d", 5, false, false);
    fleet.form_cluster();
    fleet.fail_commands_containing("--label-add");
    let nodes: VmNodes = vec![
        fleet.vm("a", MANAGER_ROLE, ""),
        fleet.vm("b", MANAGER_ROLE, ""),
        fleet.vm("c", MANAGER_ROLE, ""),
        fleet.vm("d", WORKER_ROLE, "zone=a"),
    ]
    .into();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("a").public).await.unwrap();
    let err = manager.update_swarm(&nodes).await.unwrap_err();

    assert!(matches!(err, ManagerError::Label { ref node, .. } if node == "d"));
    assert!(fleet.host("d").in_swarm);
    assert_eq!(fleet.host("x").availability, "Active");
    assert!(
        fleet
            .commands_matching("docker node update --availability drain")
            .is_empty()
    );
}

#[tokio::test]
async fn failover_skips_demoted_manager() {
    let fleet = Fleet::default();
    fleet
        .add("m1", 1, false, true)
        .add("m2", 2, true, true)
        .add("w", 3, false, true);
    fleet.form_cluster();
    fleet.stale_manager("10.0.0.1");

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("w").public).await.unwrap();
    let node = manager.ensure_manager().await.unwrap();

    assert_eq!(node.name, "m2");
    assert_eq!(manager.switcher().bound_hostname().as_deref(), Some("m2"));
    assert_eq!(
        fleet.switches()[1..],
        [("10.0.0.1".to_string(), true), ("10.0.0.2".to_string(), true)]
    );
}

#[tokio::test]
async fn update_relays_back_to_unlisted_coordinator() {
    let fleet = Fleet::default();
    fleet
        .add("x", 1, true, true)
        .add("a", 2, true, true)
        .add("b", 3, true, true)
        .add("c", 4, true, true)
        .add("w", 5, false, true)
        .add("n", 6, false, false);
    fleet.form_cluster();
    let nodes: VmNodes = vec![
        fleet.vm("a", MANAGER_ROLE, ""),
        fleet.vm("b", MANAGER_ROLE, ""),
        fleet.vm("c", MANAGER_ROLE, ""),
        fleet.vm("w", WORKER_ROLE, ""),
        fleet.vm("n", WORKER_ROLE, ""),
    ]
    .into();

    let manager = Manager::new(FleetSwitcher::new(&fleet), fast_config());
    manager.switch_node(&fleet.host("w").public).await.unwrap();
    manager.update_swarm(&nodes).await.unwrap();

    let joins = fleet.commands_matching("docker swarm join ");
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].0, "n");
    assert!(joins[0].1.ends_with(" 10.0.0.1:2377"), "{}", joins[0].1);

    assert_eq!(
        fleet.switches().last(),
        Some(&("10.0.0.1".to_string(), true))
    );
    assert_eq!(manager.switcher().bound_hostname().as_deref(), Some("x"));
    assert_eq!(fleet.host("x").availability, "Drain");
}
