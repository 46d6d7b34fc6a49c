//! Command-line front end for the service registry client

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use registry_client::{Client, ClientConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "registry")]
#[command(about = "Register, renew and discover nodes in a service registry")]
#[command(version)]
struct Cli {
    /// Client configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Registry address, overrides the configuration file
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Shared secret, overrides the configuration file
    #[arg(long, global = true)]
    secret: Option<String>,

    /// Lease duration in seconds
    #[arg(long, global = true)]
    ttl: Option<u64>,

    /// Heartbeat period in seconds
    #[arg(long, global = true)]
    touch_interval: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print this host's IP address as seen by the registry
    Ip,

    /// Manage services
    Service {
        #[command(subcommand)]
        command: commands::service::ServiceCommands,
    },

    /// Manage nodes
    Node {
        #[command(subcommand)]
        command: commands::node::NodeCommands,
    },

    /// Resolve a service to one node
    Discover {
        /// Service identifier
        service_id: String,

        /// Print the node as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep a node's lease alive until interrupted
    Heartbeat(commands::heartbeat::HeartbeatArgs),
}

impl Cli {
    async fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ClientConfig::new(
                self.addr.clone().context("--addr or --config is required")?,
                String::new(),
            ),
        };
        if let Some(addr) = &self.addr {
            config.addr = addr.clone();
        }
        if let Some(secret) = &self.secret {
            config.secret = secret.clone();
        }
        if let Some(ttl) = self.ttl {
            config.ttl = Duration::from_secs(ttl);
        }
        if let Some(interval) = self.touch_interval {
            config.touch_interval = Duration::from_secs(interval);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client = Client::new(cli.client_config().await?).context("Invalid client configuration")?;

    match cli.command {
        Commands::Ip => {
            let ip = client.get_ip().await.context("Failed to resolve own IP")?;
            println!("{ip}");
            Ok(())
        }
        Commands::Service { command } => commands::service::run(&client, command).await,
        Commands::Node { command } => commands::node::run(&client, command).await,
        Commands::Discover { service_id, json } => {
            commands::discover::run(&client, &service_id, json).await
        }
        Commands::Heartbeat(args) => commands::heartbeat::run(&client, args).await,
    }
}
