//! In-memory registry for tests
//!
//! [`MockRegistry`] implements [`Transport`] by serving the registry's HTTP
//! surface from memory. It records every request, tracks how many are in
//! flight at once, and can be told to answer slowly or with a fixed status.

use crate::codec::decode_segment;
use crate::error::Result;
use crate::models::{NodeKey, SelectedNode};
use crate::protocol::{Method, RawResponse, RegistryRequest, SECRET_HEADER};
use crate::transport::Transport;
use async_io::Timer;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockService {
    load_balance: String,
    meta: Option<String>,
    nodes: Vec<MockNode>,
    cursor: usize,
}

#[derive(Debug, Clone)]
struct MockNode {
    key: String,
    ip: String,
    port: u16,
    weight: u32,
    ttl: u32,
    expires: Option<i64>,
}

#[derive(Debug, Default)]
struct State {
    services: BTreeMap<String, MockService>,
    requests: Vec<RegistryRequest>,
    delay: Duration,
    fail_with: Option<u16>,
    fail_touches_with: Option<u16>,
}

/// In-memory registry speaking the client's wire protocol
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<State>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn error_body(status: u16, message: &str) -> RawResponse {
    RawResponse::new(
        status,
        serde_json::json!({ "error": message }).to_string(),
    )
}

impl MockRegistry {
    /// Secret the mock accepts
    pub const SECRET: &'static str = "123456";

    /// IP address returned for `GET /ip`
    pub const CALLER_IP: &'static str = "127.0.0.1";

    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// This registry as a shareable transport
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delay every response
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Answer every request with `status`, or behave normally with `None`
    pub fn fail_with(&self, status: Option<u16>) {
        self.lock().fail_with = status;
    }

    /// Answer touches with `status`, or behave normally with `None`
    pub fn fail_touches_with(&self, status: Option<u16>) {
        self.lock().fail_touches_with = status;
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RegistryRequest> {
        self.lock().requests.clone()
    }

    /// Number of touch requests received so far
    pub fn touch_count(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == Method::Patch)
            .count()
    }

    /// Highest number of requests ever in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Whether a service is registered
    pub fn has_service(&self, service_id: &str) -> bool {
        self.lock().services.contains_key(service_id)
    }

    /// Load-balance policy and metadata of a service
    pub fn service(&self, service_id: &str) -> Option<(String, Option<String>)> {
        self.lock()
            .services
            .get(service_id)
            .map(|s| (s.load_balance.clone(), s.meta.clone()))
    }

    /// Number of nodes registered under a service
    pub fn node_count(&self, service_id: &str) -> usize {
        self.lock()
            .services
            .get(service_id)
            .map_or(0, |s| s.nodes.len())
    }

    /// Weight and TTL override of a node
    pub fn node(&self, service_id: &str, key: &NodeKey) -> Option<(u32, u32)> {
        let key = key.to_string();
        self.lock()
            .services
            .get(service_id)?
            .nodes
            .iter()
            .find(|n| n.key == key)
            .map(|n| (n.weight, n.ttl))
    }

    /// Last lease expiry recorded for a node
    pub fn expiry(&self, service_id: &str, key: &NodeKey) -> Option<i64> {
        let key = key.to_string();
        self.lock()
            .services
            .get(service_id)?
            .nodes
            .iter()
            .find(|n| n.key == key)
            .and_then(|n| n.expires)
    }

    fn handle(&self, request: &RegistryRequest) -> RawResponse {
        let mut state = self.lock();
        state.requests.push(request.clone());

        if request.header(SECRET_HEADER) != Some(Self::SECRET) {
            return RawResponse::empty(401);
        }
        if let Some(status) = state.fail_with {
            return error_body(status, "scripted failure");
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, ["ip"]) => RawResponse::new(200, Self::CALLER_IP),
            (Method::Post, ["services"]) => Self::create_service(&mut state, request),
            (Method::Put, ["services", id]) => match decode_segment(id) {
                Ok(id) => Self::put_service(&mut state, id, request),
                Err(e) => error_body(400, &e.to_string()),
            },
            (Method::Delete, ["services", id]) => match decode_segment(id) {
                Ok(id) if state.services.remove(&id).is_some() => RawResponse::empty(204),
                Ok(_) => RawResponse::empty(404),
                Err(e) => error_body(400, &e.to_string()),
            },
            (Method::Get, ["services", id, "select"]) => match decode_segment(id) {
                Ok(id) => Self::select(&mut state, &id),
                Err(e) => error_body(400, &e.to_string()),
            },
            (Method::Post, ["nodes"]) => Self::create_node(&mut state, request),
            (Method::Put, ["nodes", service, node]) => {
                match (decode_segment(service), decode_segment(node)) {
                    (Ok(service), Ok(node)) => Self::put_node(&mut state, &service, node, request),
                    _ => error_body(400, "invalid path"),
                }
            }
            (Method::Delete, ["nodes", service, node]) => {
                match (decode_segment(service), decode_segment(node)) {
                    (Ok(service), Ok(node)) => {
                        let Some(svc) = state.services.get_mut(&service) else {
                            return RawResponse::empty(404);
                        };
                        let before = svc.nodes.len();
                        svc.nodes.retain(|n| n.key != node);
                        if svc.nodes.len() == before {
                            RawResponse::empty(404)
                        } else {
                            RawResponse::empty(204)
                        }
                    }
                    _ => error_body(400, "invalid path"),
                }
            }
            (Method::Patch, ["nodes", service, node, "expires"]) => {
                if let Some(status) = state.fail_touches_with {
                    return error_body(status, "scripted touch failure");
                }
                match (decode_segment(service), decode_segment(node)) {
                    (Ok(service), Ok(node)) => Self::touch(&mut state, &service, &node, request),
                    _ => error_body(400, "invalid path"),
                }
            }
            _ => RawResponse::empty(501),
        }
    }

    fn create_service(state: &mut State, request: &RegistryRequest) -> RawResponse {
        let Some(id) = request.form_value("id").filter(|id| !id.is_empty()) else {
            return error_body(400, "id is required");
        };
        if state.services.contains_key(id) {
            return error_body(400, "service already exists");
        }
        Self::put_service(state, id.to_string(), request)
    }

    fn put_service(state: &mut State, id: String, request: &RegistryRequest) -> RawResponse {
        let Some(load_balance) = request.form_value("load_balance") else {
            return error_body(400, "load_balance is required");
        };
        let entry = state.services.entry(id).or_insert_with(|| MockService {
            load_balance: String::new(),
            meta: None,
            nodes: Vec::new(),
            cursor: 0,
        });
        entry.load_balance = load_balance.to_string();
        entry.meta = request.form_value("meta").map(str::to_string);
        RawResponse::empty(204)
    }

    fn select(state: &mut State, service_id: &str) -> RawResponse {
        let Some(service) = state.services.get_mut(service_id) else {
            return RawResponse::empty(404);
        };
        if service.nodes.is_empty() {
            return RawResponse::empty(204);
        }
        let node = &service.nodes[service.cursor % service.nodes.len()];
        service.cursor = service.cursor.wrapping_add(1);
        let selected = SelectedNode {
            ip: node.ip.clone(),
            port: node.port,
        };
        match serde_json::to_vec(&selected) {
            Ok(body) => RawResponse::new(200, body),
            Err(_) => RawResponse::empty(500),
        }
    }

    fn create_node(state: &mut State, request: &RegistryRequest) -> RawResponse {
        let raw_id = request.form_value("service_id").unwrap_or_default();
        let service_id = match decode_segment(raw_id) {
            Ok(id) => id,
            Err(e) => return error_body(400, &e.to_string()),
        };
        let (Some(ip), Some(port)) = (
            request.form_value("ip"),
            request.form_value("port").and_then(|p| p.parse::<u16>().ok()),
        ) else {
            return error_body(400, "ip and port are required");
        };
        let Some(service) = state.services.get_mut(&service_id) else {
            return RawResponse::empty(404);
        };
        let key = format!("{ip}:{port}");
        if service.nodes.iter().any(|n| n.key == key) {
            return error_body(400, "node already exists");
        }
        service.nodes.push(MockNode {
            key,
            ip: ip.to_string(),
            port,
            weight: parse_or_zero(request.form_value("weight")),
            ttl: parse_or_zero(request.form_value("ttl")),
            expires: request.form_value("expires").and_then(|e| e.parse().ok()),
        });
        RawResponse::empty(204)
    }

    fn put_node(
        state: &mut State,
        service_id: &str,
        key: String,
        request: &RegistryRequest,
    ) -> RawResponse {
        let Some(service) = state.services.get_mut(service_id) else {
            return RawResponse::empty(404);
        };
        let Some((ip, port)) = key
            .rsplit_once(':')
            .and_then(|(ip, port)| Some((ip.to_string(), port.parse::<u16>().ok()?)))
        else {
            return error_body(400, "invalid node key");
        };
        let weight = parse_or_zero(request.form_value("weight"));
        let ttl = parse_or_zero(request.form_value("ttl"));
        match service.nodes.iter_mut().find(|n| n.key == key) {
            Some(node) => {
                node.weight = weight;
                node.ttl = ttl;
            }
            None => service.nodes.push(MockNode {
                key,
                ip,
                port,
                weight,
                ttl,
                expires: None,
            }),
        }
        RawResponse::empty(204)
    }

    fn touch(
        state: &mut State,
        service_id: &str,
        key: &str,
        request: &RegistryRequest,
    ) -> RawResponse {
        let Some(expires) = request.form_value("expires").and_then(|e| e.parse().ok()) else {
            return error_body(400, "expires is required");
        };
        let node = state
            .services
            .get_mut(service_id)
            .and_then(|s| s.nodes.iter_mut().find(|n| n.key == key));
        match node {
            Some(node) => {
                node.expires = Some(expires);
                RawResponse::empty(204)
            }
            None => RawResponse::empty(404),
        }
    }
}

fn parse_or_zero(value: Option<&str>) -> u32 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

#[async_trait]
impl Transport for MockRegistry {
    async fn execute(&self, request: RegistryRequest) -> Result<RawResponse> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.lock().delay;
        if !delay.is_zero() {
            Timer::after(delay).await;
        }
        Ok(self.handle(&request))
    }
}
