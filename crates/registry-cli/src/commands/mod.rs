pub mod discover;
pub mod heartbeat;
pub mod node;
pub mod service;

use anyhow::{Context, Result};
use clap::Args;
use registry_client::{Client, Node, NodeKey};

/// Node attributes shared by `node add`, `node set` and `heartbeat`
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Service the node belongs to
    pub service_id: String,

    /// Node IP address; resolved through the registry when omitted
    #[arg(long)]
    pub ip: Option<String>,

    /// Node port
    #[arg(long)]
    pub port: u32,

    /// Relative selection weight
    #[arg(long, default_value = "1")]
    pub weight: u32,

    /// Lease duration override in seconds (0 uses the registry default)
    #[arg(id = "node_ttl", long = "node-ttl", default_value = "0")]
    pub ttl: u32,

    /// JSON metadata
    #[arg(long)]
    pub meta: Option<String>,
}

impl NodeArgs {
    /// Build the node, asking the registry for our IP if none was given
    pub async fn node(&self, client: &Client) -> Result<Node> {
        let ip = match &self.ip {
            Some(ip) => ip.clone(),
            None => client
                .get_ip()
                .await
                .context("Failed to resolve own IP")?
                .to_string(),
        };
        Ok(Node {
            ip,
            port: self.port,
            weight: self.weight,
            ttl: self.ttl,
            meta: self.meta.clone(),
        })
    }
}

/// Parse an `ip:port` node key
pub fn parse_key(raw: &str) -> Result<NodeKey> {
    raw.parse()
        .with_context(|| format!("Invalid node key {raw:?}, expected <ip>:<port>"))
}
