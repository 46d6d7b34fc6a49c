//! Local input checks, run before any request is issued

use crate::error::{Error, Result, Rule};
use crate::models::{Node, NodeKey, Service};
use std::net::IpAddr;

/// Check a service identifier
pub fn service_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation("service_id", Rule::Required));
    }
    Ok(())
}

/// Check a service definition
pub fn service(service: &Service) -> Result<()> {
    if service.id.is_empty() {
        return Err(Error::validation("id", Rule::Required));
    }
    meta(service.meta.as_deref())
}

/// Check a node definition and derive its lease key
pub fn node(node: &Node) -> Result<NodeKey> {
    if node.ip.is_empty() {
        return Err(Error::validation("ip", Rule::Required));
    }
    let ip = node
        .ip
        .parse::<IpAddr>()
        .map_err(|_| Error::validation("ip", Rule::IpAddress))?;
    let port = u16::try_from(node.port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(Error::validation("port", Rule::PortRange))?;
    meta(node.meta.as_deref())?;
    NodeKey::new(ip, port)
}

/// Check optional metadata is syntactically valid JSON
pub fn meta(meta: Option<&str>) -> Result<()> {
    match meta {
        Some(raw) if !raw.is_empty() => serde_json::from_str::<serde::de::IgnoredAny>(raw)
            .map(|_| ())
            .map_err(|_| Error::validation("meta", Rule::Json)),
        _ => Ok(()),
    }
}
