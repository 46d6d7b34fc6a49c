use super::NodeArgs;
use anyhow::{Context, Result};
use clap::Args;
use registry_client::{Client, validate};
use tracing::{error, info, warn};

#[derive(Args, Debug)]
pub struct HeartbeatArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Register (replace-or-create) the node before renewing its lease
    #[arg(long)]
    pub register: bool,

    /// Remove the node after the heartbeat stops
    #[arg(long)]
    pub deregister: bool,
}

pub async fn run(client: &Client, args: HeartbeatArgs) -> Result<()> {
    let service_id = &args.node.service_id;
    let node = args.node.node(client).await?;

    let key = if args.register {
        client
            .set_node(service_id, &node)
            .await
            .with_context(|| format!("Failed to register node in {service_id}"))?
    } else {
        validate::node(&node)?
    };

    let (handle, heartbeat) = client.auto_touch_node(service_id, key, |err| {
        if err.status() == 404 {
            warn!("Lease lost, node is no longer registered: {}", err);
        } else {
            error!("Lease renewal failed ({}): {}", err.status(), err);
        }
    })?;
    let task = tokio::spawn(heartbeat);

    info!(
        "Renewing node {} in service {} every {:?}, press Ctrl-C to stop",
        key,
        service_id,
        client.config().touch_interval
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    handle.stop();
    task.await.context("Heartbeat task panicked")?;
    let stats = handle.stats();
    info!(
        "Heartbeat stopped after {} touches ({} failed)",
        stats.attempts, stats.failures
    );

    if args.deregister {
        client
            .remove_node(service_id, &key)
            .await
            .with_context(|| format!("Failed to remove node {key}"))?;
        info!("Removed node {} from service {}", key, service_id);
    }
    Ok(())
}
