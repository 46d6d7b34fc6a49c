use super::{NodeArgs, parse_key};
use anyhow::{Context, Result};
use clap::Subcommand;
use registry_client::Client;
use tracing::info;

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Create a node; fails if it already exists
    Add(NodeArgs),

    /// Replace a node, creating it if absent
    Set(NodeArgs),

    /// Remove a node
    Rm {
        /// Service the node belongs to
        service_id: String,
        /// Node key, `<ip>:<port>`
        node: String,
    },

    /// Renew a node's lease once
    Touch {
        /// Service the node belongs to
        service_id: String,
        /// Node key, `<ip>:<port>`
        node: String,
    },
}

pub async fn run(client: &Client, command: NodeCommands) -> Result<()> {
    match command {
        NodeCommands::Add(args) => {
            let node = args.node(client).await?;
            let key = client
                .add_node(&args.service_id, &node)
                .await
                .with_context(|| format!("Failed to add node to {}", args.service_id))?;
            info!("Added node {} to service {}", key, args.service_id);
        }
        NodeCommands::Set(args) => {
            let node = args.node(client).await?;
            let key = client
                .set_node(&args.service_id, &node)
                .await
                .with_context(|| format!("Failed to set node in {}", args.service_id))?;
            info!("Set node {} in service {}", key, args.service_id);
        }
        NodeCommands::Rm { service_id, node } => {
            let key = parse_key(&node)?;
            client
                .remove_node(&service_id, &key)
                .await
                .with_context(|| format!("Failed to remove node {key}"))?;
            info!("Removed node {} from service {}", key, service_id);
        }
        NodeCommands::Touch { service_id, node } => {
            let key = parse_key(&node)?;
            client
                .touch_node(&service_id, &key)
                .await
                .with_context(|| format!("Failed to touch node {key}"))?;
            info!("Renewed lease of node {} for {:?}", key, client.config().ttl);
        }
    }
    Ok(())
}
