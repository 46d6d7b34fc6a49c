//! Runtime-agnostic client for a lease-based service registry
//!
//! Services are named, load-balanced groups of nodes. A node registration
//! is a lease: it stays valid until "now + ttl" unless renewed by a touch.
//! This crate registers services and nodes over HTTP, keeps node leases
//! alive with a cancellable background heartbeat, and resolves a service
//! to a node chosen by the registry.
//!
//! # Architecture
//!
//! - [`validate`] rejects bad input before any request is made
//! - [`codec`] makes identifiers safe to embed in URL paths
//! - [`protocol`] builds one request per operation and classifies replies
//! - [`transport`] moves requests; [`HttpTransport`] uses `reqwest`
//! - [`heartbeat`] renews a lease periodically until stopped
//!
//! The heartbeat is returned as a future so the caller picks the runtime.
//! [`HttpTransport`] needs a Tokio reactor; any other runtime can be used
//! with a custom [`Transport`].
//!
//! # Example
//!
//! ```no_run
//! use registry_client::{Client, ClientConfig, LoadBalance, Node, Service};
//!
//! # async fn example() -> registry_client::Result<()> {
//! let client = Client::new(ClientConfig::new("http://127.0.0.1:20080", "123456"))?;
//!
//! client.add_service(&Service::new("demo", LoadBalance::Swrr)).await?;
//! let ip = client.get_ip().await?;
//! client.add_node("demo", &Node::new(ip.to_string(), 8080)).await?;
//!
//! if let Some(node) = client.discover_service("demo").await? {
//!     println!("route to {}:{}", node.ip, node.port);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod models;
pub mod protocol;
pub mod transport;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result, Rule};
pub use heartbeat::{HeartbeatHandle, HeartbeatState, HeartbeatStats};
pub use models::*;
pub use transport::{HttpTransport, Transport};

/// Re-export key types for convenience
pub mod prelude {
    pub use crate::{
        Client,
        ClientConfig,
        Error,
        HeartbeatHandle,
        LoadBalance,
        Node,
        NodeKey,
        Result,
        SelectedNode,
        Service,
    };
}
