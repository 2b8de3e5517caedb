//! Global options and the config file.
//!
//! Each setting is taken from the first of: command-line flag, `SWARM_*`
//! environment variable, config file, built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use swarm_manager::ManagerConfig;

pub const DEFAULT_SSH_USER: &str = "rancher";
pub const DEFAULT_SSH_KEY: &str = "$HOME/.ssh/id_rsa";
pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const CONFIG_FILE_NAME: &str = ".swarm.toml";

#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Config file [default: ~/.swarm.toml]
    #[arg(long, global = true, env = "SWARM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'D', long, global = true, env = "SWARM_DEBUG")]
    pub debug: bool,

    /// Run docker commands on this machine instead of over SSH
    #[arg(short = 'L', long, global = true, env = "SWARM_USE_LOCAL")]
    pub use_local: bool,

    /// Timeout for SSH connections, e.g. 300, 90s, 5m [default: 5m]
    #[arg(short = 'T', long, global = true, env = "SWARM_SSH_TIMEOUT", value_parser = parse_duration)]
    pub ssh_timeout: Option<Duration>,

    /// SSH address (host[:port]) of the node to start from
    #[arg(short = 'A', long, global = true, env = "SWARM_SSH_ADDR")]
    pub ssh_addr: Option<String>,

    /// SSH private key [default: $HOME/.ssh/id_rsa]
    #[arg(short = 'K', long, global = true, env = "SWARM_SSH_KEY")]
    pub ssh_key: Option<String>,

    /// SSH user [default: rancher]
    #[arg(short = 'U', long, global = true, env = "SWARM_SSH_USER")]
    pub ssh_user: Option<String>,

    /// Authenticate with the running ssh-agent (SSH_AUTH_SOCK)
    #[arg(long, global = true, env = "SWARM_USE_SSH_AGENT")]
    pub use_ssh_agent: bool,
}

/// Contents of `~/.swarm.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub debug: bool,
    pub use_local: bool,
    pub ssh_addr: Option<String>,
    pub ssh_user: Option<String>,
    pub ssh_key: Option<String>,
    pub use_ssh_agent: bool,
    pub ssh_timeout_secs: Option<u64>,
    pub manager: ManagerConfig,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("error reading config file {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("error parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load `explicit` if given, else `~/.swarm.toml` if it exists.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub debug: bool,
    pub use_local: bool,
    pub ssh_addr: Option<String>,
    pub ssh_user: String,
    pub ssh_key: String,
    pub use_ssh_agent: bool,
    pub ssh_timeout: Duration,
    pub manager: ManagerConfig,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, file: FileConfig) -> Self {
        Self {
            debug: args.debug || file.debug,
            use_local: args.use_local || file.use_local,
            ssh_addr: args.ssh_addr.clone().or(file.ssh_addr),
            ssh_user: args
                .ssh_user
                .clone()
                .or(file.ssh_user)
                .unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
            ssh_key: args
                .ssh_key
                .clone()
                .or(file.ssh_key)
                .unwrap_or_else(|| DEFAULT_SSH_KEY.to_string()),
            use_ssh_agent: args.use_ssh_agent || file.use_ssh_agent,
            ssh_timeout: args
                .ssh_timeout
                .or(file.ssh_timeout_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_SSH_TIMEOUT),
            manager: file.manager,
        }
    }
}

/// Parse `300`, `300s`, `5m` or `1h`.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    let (digits, scale) = match text.char_indices().last() {
        Some((idx, 's')) => (&text[..idx], 1),
        Some((idx, 'm')) => (&text[..idx], 60),
        Some((idx, 'h')) => (&text[..idx], 60 * 60),
        _ => (text, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(scale))
        .map(Duration::from_secs)
        .ok_or_else(|| format!("invalid duration {text:?}, expected e.g. 300, 90s, 5m or 1h"))
}
