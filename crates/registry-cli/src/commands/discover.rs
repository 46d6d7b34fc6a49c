use anyhow::{Context, Result, bail};
use registry_client::Client;

pub async fn run(client: &Client, service_id: &str, json: bool) -> Result<()> {
    let selected = client
        .discover_service(service_id)
        .await
        .with_context(|| format!("Failed to discover service {service_id}"))?;

    let Some(node) = selected else {
        bail!("Service {service_id} has no available node");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&node)?);
    } else {
        println!("{}:{}", node.ip, node.port);
    }
    Ok(())
}
