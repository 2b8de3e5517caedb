//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::CommandTemplates;

/// Default swarm management port.
pub const DEFAULT_SWARM_PORT: u16 = 2377;

/// Tunables for [`Manager`](crate::Manager).
///
/// Durations are written as seconds in config files, e.g.
/// `drain_timeout = 600`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Upper bound on a single node switch.
    #[serde(with = "secs")]
    pub switch_timeout: Duration,
    /// How often a draining node's tasks are polled.
    #[serde(with = "secs")]
    pub drain_poll_interval: Duration,
    /// How long a drain may take before giving up.
    #[serde(with = "secs")]
    pub drain_timeout: Duration,
    /// Port other nodes join the swarm on.
    pub swarm_port: u16,
    pub commands: CommandTemplates,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            switch_timeout: Duration::from_secs(5 * 60),
            drain_poll_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(10 * 60),
            swarm_port: DEFAULT_SWARM_PORT,
            commands: CommandTemplates::default(),
        }
    }
}

impl ManagerConfig {
    pub fn with_switch_timeout(mut self, timeout: Duration) -> Self {
        self.switch_timeout = timeout;
        self
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_swarm_port(mut self, port: u16) -> Self {
        self.swarm_port = port;
        self
    }
}

/// Durations as (fractional) seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
