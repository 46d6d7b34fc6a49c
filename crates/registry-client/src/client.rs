//! Registry client: registration, lease renewal and discovery

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    heartbeat::{self, HeartbeatHandle},
    models::*,
    protocol::{self, Outcome, RegistryRequest},
    transport::{HttpTransport, Transport},
    validate,
};
use async_io::Timer;
use chrono::Utc;
use futures::future::{self, BoxFuture, Either};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Client for a lease-based service registry.
///
/// Configuration is fixed at construction. Clones share the same
/// transport and configuration.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("addr", &self.config.addr)
            .field("ttl", &self.config.ttl)
            .field("touch_interval", &self.config.touch_interval)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client talking HTTP to `config.addr`
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.addr.clone())?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }

    /// Create a client over a caller-supplied transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute lease expiry, as a Unix timestamp, for a renewal made now
    fn lease_expiry(&self) -> i64 {
        let ttl = i64::try_from(self.config.ttl.as_secs()).unwrap_or(i64::MAX);
        Utc::now().timestamp().saturating_add(ttl)
    }

    async fn send(&self, request: RegistryRequest) -> Result<Outcome> {
        let timeout = self.config.timeout;
        let request = request
            .with_secret(&self.config.secret)
            .with_timeout(timeout);
        let (method, path) = (request.method, request.path.clone());

        // The transport gets the deadline too; this bound covers transports
        // that ignore it.
        let exchange = self.transport.execute(request);
        let response = match future::select(exchange, Timer::after(timeout)).await {
            Either::Left((response, _)) => response?,
            Either::Right(_) => {
                return Err(Error::transport(format!(
                    "{method} {path}: no response within {timeout:?}"
                )));
            }
        };

        debug!("{} {} -> {}", method, path, response.status);
        protocol::classify(response)
    }

    /// Ask the registry for the caller's own IP address
    pub async fn get_ip(&self) -> Result<IpAddr> {
        match self.send(RegistryRequest::get_ip()).await? {
            Outcome::Payload(body) => {
                let text = String::from_utf8_lossy(&body);
                text.trim()
                    .parse()
                    .map_err(|_| Error::transport(format!("malformed IP in response: {text:?}")))
            }
            Outcome::NoContent => Err(Error::transport("empty response to IP lookup")),
        }
    }

    /// Create a service
    pub async fn add_service(&self, service: &Service) -> Result<()> {
        validate::service(service)?;
        debug!("Adding service {} ({})", service.id, service.load_balance);
        self.send(RegistryRequest::create_service(service)).await?;
        Ok(())
    }

    /// Replace a service, creating it if absent
    pub async fn set_service(&self, service: &Service) -> Result<()> {
        validate::service(service)?;
        debug!("Setting service {} ({})", service.id, service.load_balance);
        self.send(RegistryRequest::replace_service(service)).await?;
        Ok(())
    }

    /// Remove a service
    pub async fn remove_service(&self, service_id: &str) -> Result<()> {
        validate::service_id(service_id)?;
        debug!("Removing service {}", service_id);
        self.send(RegistryRequest::remove_service(service_id)).await?;
        Ok(())
    }

    /// Create a node; the registry rejects it if it already exists.
    ///
    /// The lease starts at "now + ttl". Returns the node's lease key.
    pub async fn add_node(&self, service_id: &str, node: &Node) -> Result<NodeKey> {
        validate::service_id(service_id)?;
        let key = validate::node(node)?;
        debug!("Adding node {} to service {}", key, service_id);
        let request = RegistryRequest::create_node(service_id, node, &key, self.lease_expiry());
        self.send(request).await?;
        Ok(key)
    }

    /// Replace a node, creating it if absent. Returns the node's lease key.
    pub async fn set_node(&self, service_id: &str, node: &Node) -> Result<NodeKey> {
        validate::service_id(service_id)?;
        let key = validate::node(node)?;
        debug!("Setting node {} in service {}", key, service_id);
        self.send(RegistryRequest::replace_node(service_id, node, &key))
            .await?;
        Ok(key)
    }

    /// Remove a node
    pub async fn remove_node(&self, service_id: &str, key: &NodeKey) -> Result<()> {
        validate::service_id(service_id)?;
        debug!("Removing node {} from service {}", key, service_id);
        self.send(RegistryRequest::remove_node(service_id, key))
            .await?;
        Ok(())
    }

    /// Renew a node's lease once, moving its expiry to "now + ttl"
    pub async fn touch_node(&self, service_id: &str, key: &NodeKey) -> Result<()> {
        validate::service_id(service_id)?;
        let expires = self.lease_expiry();
        debug!("Touching node {} in service {} until {}", key, service_id, expires);
        self.send(RegistryRequest::touch_node(service_id, key, expires))
            .await?;
        Ok(())
    }

    /// Keep a node's lease alive in the background.
    ///
    /// Returns a handle and the heartbeat future. The future does nothing
    /// until the caller spawns it on a runtime of their choice; it then
    /// touches the node every `touch_interval` and passes each failure to
    /// `on_error` without stopping. It completes only after
    /// [`HeartbeatHandle::stop`] is called or every handle is dropped.
    pub fn auto_touch_node<F>(
        &self,
        service_id: &str,
        key: NodeKey,
        on_error: F,
    ) -> Result<(HeartbeatHandle, BoxFuture<'static, ()>)>
    where
        F: FnMut(&Error) + Send + 'static,
    {
        validate::service_id(service_id)?;
        Ok(heartbeat::start(
            self.clone(),
            service_id.to_string(),
            key,
            on_error,
        ))
    }

    /// Resolve a service to one node chosen by the registry.
    ///
    /// Returns `None` when the registry has no eligible node.
    pub async fn discover_service(&self, service_id: &str) -> Result<Option<SelectedNode>> {
        validate::service_id(service_id)?;
        match self.send(RegistryRequest::select_node(service_id)).await? {
            Outcome::Payload(body) => {
                let node: SelectedNode = serde_json::from_slice(&body).map_err(|e| {
                    Error::transport(format!("malformed discovery response: {e}"))
                })?;
                debug!("Service {} resolved to {}:{}", service_id, node.ip, node.port);
                Ok((!node.is_empty()).then_some(node))
            }
            Outcome::NoContent => {
                debug!("Service {} has no eligible node", service_id);
                Ok(None)
            }
        }
    }
}
