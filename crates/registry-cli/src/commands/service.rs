use anyhow::{Context, Result};
use clap::Subcommand;
use registry_client::{Client, LoadBalance, Service};
use tracing::info;

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// Create a service
    Add {
        /// Service identifier
        id: String,

        /// Load-balancing policy: SWRR, WRR or WR
        #[arg(short, long, default_value = "SWRR")]
        load_balance: String,

        /// JSON metadata
        #[arg(long)]
        meta: Option<String>,
    },

    /// Replace a service, creating it if absent
    Set {
        /// Service identifier
        id: String,

        /// Load-balancing policy: SWRR, WRR or WR
        #[arg(short, long, default_value = "SWRR")]
        load_balance: String,

        /// JSON metadata
        #[arg(long)]
        meta: Option<String>,
    },

    /// Remove a service
    Rm {
        /// Service identifier
        id: String,
    },
}

fn service(id: String, load_balance: &str, meta: Option<String>) -> Result<Service> {
    let load_balance: LoadBalance = load_balance.parse()?;
    Ok(Service {
        id,
        load_balance,
        meta,
    })
}

pub async fn run(client: &Client, command: ServiceCommands) -> Result<()> {
    match command {
        ServiceCommands::Add {
            id,
            load_balance,
            meta,
        } => {
            let service = service(id, &load_balance, meta)?;
            client
                .add_service(&service)
                .await
                .with_context(|| format!("Failed to add service {}", service.id))?;
            info!("Added service {} ({})", service.id, service.load_balance);
        }
        ServiceCommands::Set {
            id,
            load_balance,
            meta,
        } => {
            let service = service(id, &load_balance, meta)?;
            client
                .set_service(&service)
                .await
                .with_context(|| format!("Failed to set service {}", service.id))?;
            info!("Set service {} ({})", service.id, service.load_balance);
        }
        ServiceCommands::Rm { id } => {
            client
                .remove_service(&id)
                .await
                .with_context(|| format!("Failed to remove service {id}"))?;
            info!("Removed service {}", id);
        }
    }
    Ok(())
}
