//! swarm — command-line Docker Swarm manager.
//!
//! Creates and maintains Docker Swarm clusters described by a
//! Clusterfile, driving every node's `docker` CLI over SSH (or locally
//! with `--use-local`).
//!
//! # Usage
//!
//! ```text
//! swarm -A 203.0.113.1 create Clusterfile.json
//! swarm -A 203.0.113.1 update - < Clusterfile.json
//! swarm -A 203.0.113.1 drain dw3 dw4
//! swarm -L status
//! ```

use clap::{Parser, Subcommand};
use swarm_manager::Manager;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;
mod transport;

use settings::{FileConfig, GlobalArgs, Settings};

#[derive(Parser)]
#[command(
    name = "swarm",
    about = "Swarm Manager CLI",
    long_about = "Command-line Docker Swarm manager.\n\n\
        Creates Swarm clusters from a Clusterfile, adds new manager and \
        worker nodes, drains removed nodes and displays cluster information."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new Swarm cluster from a Clusterfile
    Create {
        /// Clusterfile path, or - to read standard input
        clusterfile: String,
        /// Skip manager quorum validation, e.g. for single-manager clusters
        #[arg(short, long)]
        force: bool,
    },
    /// Join new nodes and drain removed ones to match a Clusterfile
    Update {
        /// Clusterfile path, or - to read standard input
        clusterfile: String,
    },
    /// Drain nodes and wait until no tasks run on them
    Drain {
        /// Hostnames of the nodes to drain
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// List every node in the cluster
    Status,
    /// Display cluster id, node counts and managers
    Info,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        return commands::version::version();
    }

    let file = FileConfig::load(cli.global.config.as_deref())?;
    let settings = Settings::resolve(&cli.global, file);

    let level = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    debug!(?settings, "resolved settings");

    let switcher = transport::connect(&settings).await?;
    let manager = Manager::new(switcher, settings.manager.clone());

    match cli.command {
        Commands::Create { clusterfile, force } => {
            commands::create::create(&manager, &clusterfile, force).await
        }
        Commands::Update { clusterfile } => commands::update::update(&manager, &clusterfile).await,
        Commands::Drain { nodes } => commands::drain::drain(&manager, &nodes).await,
        Commands::Status => commands::status::status(&manager).await,
        Commands::Info => commands::info::info(&manager).await,
        Commands::Version => commands::version::version(),
    }
}
