//! Data models for services, nodes and discovery results

use crate::error::{Error, Result, Rule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Load-balancing policy the registry applies when selecting a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadBalance {
    /// Smooth weighted round robin
    #[serde(rename = "SWRR")]
    Swrr,
    /// Weighted round robin
    #[serde(rename = "WRR")]
    Wrr,
    /// Weighted random
    #[serde(rename = "WR")]
    Wr,
}

impl LoadBalance {
    /// Wire names of every policy
    pub const NAMES: &'static [&'static str] = &["SWRR", "WRR", "WR"];

    /// Wire name of this policy
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalance::Swrr => "SWRR",
            LoadBalance::Wrr => "WRR",
            LoadBalance::Wr => "WR",
        }
    }
}

impl fmt::Display for LoadBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadBalance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SWRR" => Ok(LoadBalance::Swrr),
            "WRR" => Ok(LoadBalance::Wrr),
            "WR" => Ok(LoadBalance::Wr),
            "" => Err(Error::validation("load_balance", Rule::Required)),
            _ => Err(Error::validation(
                "load_balance",
                Rule::OneOf(LoadBalance::NAMES),
            )),
        }
    }
}

/// A named, load-balanced group of nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service identifier
    pub id: String,

    /// Selection policy
    pub load_balance: LoadBalance,

    /// Opaque JSON metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl Service {
    /// Create a service without metadata
    pub fn new(id: impl Into<String>, load_balance: LoadBalance) -> Self {
        Self {
            id: id.into(),
            load_balance,
            meta: None,
        }
    }

    /// Attach JSON metadata
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }
}

/// A node registration as supplied by the caller.
///
/// Fields hold raw input; [`crate::validate::node`] checks them and yields
/// the [`NodeKey`] that identifies the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// IPv4 or IPv6 literal
    pub ip: String,

    /// Port, must fall in `1..=65535`
    pub port: u32,

    /// Relative selection weight
    #[serde(default)]
    pub weight: u32,

    /// Lease duration override in seconds, 0 uses the registry default
    #[serde(default)]
    pub ttl: u32,

    /// Opaque JSON metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl Node {
    /// Create a node with weight 1 and the default TTL
    pub fn new(ip: impl Into<String>, port: u32) -> Self {
        Self {
            ip: ip.into(),
            port,
            weight: 1,
            ttl: 0,
            meta: None,
        }
    }

    /// Set the selection weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Set the TTL override in seconds
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Attach JSON metadata
    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }
}

/// Identity of a node lease: `<ip>:<port>` under some service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    ip: IpAddr,
    port: u16,
}

impl NodeKey {
    /// Create a key, rejecting port 0
    pub fn new(ip: IpAddr, port: u16) -> Result<Self> {
        if port == 0 {
            return Err(Error::validation("port", Rule::PortRange));
        }
        Ok(Self { ip, port })
    }

    /// Node IP address
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Node port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The registry keys nodes on the bare concatenation, IPv6 included
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl FromStr for NodeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (ip, port) = s
            .rsplit_once(':')
            .ok_or(Error::validation("node", Rule::Required))?;
        let ip = ip
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| Error::validation("ip", Rule::IpAddress))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::validation("port", Rule::PortRange))?;
        NodeKey::new(ip, port)
    }
}

/// Node chosen by the registry for a discovery request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedNode {
    /// Node IP address
    pub ip: String,

    /// Node port
    pub port: u16,
}

impl SelectedNode {
    /// Whether the registry returned the zero value instead of a node
    pub fn is_empty(&self) -> bool {
        self.ip.is_empty() || self.port == 0
    }
}
