//! Wire protocol: request construction and response classification
//!
//! Each registry operation maps to exactly one HTTP request. Requests are
//! described here independently of any HTTP stack so that a
//! [`Transport`](crate::transport::Transport) only has to move bytes.
//!
//! | Operation        | Method   | Path                                   |
//! |------------------|----------|----------------------------------------|
//! | own IP           | `GET`    | `/ip`                                  |
//! | create service   | `POST`   | `/services/`                           |
//! | replace service  | `PUT`    | `/services/{id}`                       |
//! | remove service   | `DELETE` | `/services/{id}`                       |
//! | select node      | `GET`    | `/services/{id}/select`                |
//! | create node      | `POST`   | `/nodes/`                              |
//! | replace node     | `PUT`    | `/nodes/{service_id}/{ip:port}`        |
//! | remove node      | `DELETE` | `/nodes/{service_id}/{ip:port}`        |
//! | touch node       | `PATCH`  | `/nodes/{service_id}/{ip:port}/expires`|
//!
//! Path parameters, and the `service_id` field of a node creation, are
//! encoded with [`crate::codec`].

use crate::codec::encode_segment;
use crate::error::{Error, Result};
use crate::models::{Node, NodeKey, Service};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "SECRET";

/// HTTP method of a registry request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request against the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the registry base address, starting with `/`
    pub path: String,
    /// Extra headers, authentication included
    pub headers: Vec<(&'static str, String)>,
    /// Form fields, sent url-encoded when non-empty
    pub form: Vec<(&'static str, String)>,
    /// Deadline for the whole exchange
    pub timeout: Option<Duration>,
}

impl RegistryRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            form: Vec::new(),
            timeout: None,
        }
    }

    fn field(mut self, name: &'static str, value: impl ToString) -> Self {
        self.form.push((name, value.to_string()));
        self
    }

    fn meta_field(self, meta: Option<&str>) -> Self {
        match meta {
            Some(meta) if !meta.is_empty() => self.field("meta", meta),
            _ => self,
        }
    }

    /// Attach the shared secret
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.headers.push((SECRET_HEADER, secret.to_string()));
        self
    }

    /// Bound the exchange with a deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of a header, if set
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field, if set
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `GET /ip`
    pub fn get_ip() -> Self {
        Self::new(Method::Get, "/ip")
    }

    /// `POST /services/`
    pub fn create_service(service: &Service) -> Self {
        Self::new(Method::Post, "/services/")
            .field("id", &service.id)
            .field("load_balance", service.load_balance)
            .meta_field(service.meta.as_deref())
    }

    /// `PUT /services/{id}`
    pub fn replace_service(service: &Service) -> Self {
        Self::new(Method::Put, service_path(&service.id))
            .field("load_balance", service.load_balance)
            .meta_field(service.meta.as_deref())
    }

    /// `DELETE /services/{id}`
    pub fn remove_service(service_id: &str) -> Self {
        Self::new(Method::Delete, service_path(service_id))
    }

    /// `GET /services/{id}/select`
    pub fn select_node(service_id: &str) -> Self {
        Self::new(Method::Get, format!("{}/select", service_path(service_id)))
    }

    /// `POST /nodes/`, with the initial lease expiry as a Unix timestamp.
    ///
    /// `service_id` travels encoded, like the path parameters.
    pub fn create_node(service_id: &str, node: &Node, key: &NodeKey, expires: i64) -> Self {
        Self::new(Method::Post, "/nodes/")
            .field("service_id", encode_segment(service_id))
            .field("ip", key.ip())
            .field("port", key.port())
            .field("weight", node.weight)
            .field("ttl", node.ttl)
            .field("expires", expires)
            .meta_field(node.meta.as_deref())
    }

    /// `PUT /nodes/{service_id}/{ip:port}`
    pub fn replace_node(service_id: &str, node: &Node, key: &NodeKey) -> Self {
        Self::new(Method::Put, node_path(service_id, key))
            .field("weight", node.weight)
            .field("ttl", node.ttl)
            .meta_field(node.meta.as_deref())
    }

    /// `DELETE /nodes/{service_id}/{ip:port}`
    pub fn remove_node(service_id: &str, key: &NodeKey) -> Self {
        Self::new(Method::Delete, node_path(service_id, key))
    }

    /// `PATCH /nodes/{service_id}/{ip:port}/expires`
    pub fn touch_node(service_id: &str, key: &NodeKey, expires: i64) -> Self {
        Self::new(
            Method::Patch,
            format!("{}/expires", node_path(service_id, key)),
        )
        .field("expires", expires)
    }
}

fn service_path(service_id: &str) -> String {
    format!("/services/{}", encode_segment(service_id))
}

fn node_path(service_id: &str, key: &NodeKey) -> String {
    format!(
        "/nodes/{}/{}",
        encode_segment(service_id),
        encode_segment(&key.to_string())
    )
}

/// Status and body of a registry response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response without a body
    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }
}

/// Successful result of a registry call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200 with a body
    Payload(Vec<u8>),
    /// 204
    NoContent,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Map a registry response onto the client's outcome taxonomy
pub fn classify(response: RawResponse) -> Result<Outcome> {
    match response.status {
        200 => Ok(Outcome::Payload(response.body)),
        204 => Ok(Outcome::NoContent),
        400 => Err(Error::BadRequest(bad_request_message(&response.body))),
        401 => Err(Error::Authentication),
        404 => Err(Error::NotFound),
        500 => Err(Error::Internal),
        501 => Err(Error::NotImplemented),
        status => Err(Error::UnexpectedResponse { status }),
    }
}

fn bad_request_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "Bad Request".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_segment;
    use crate::models::LoadBalance;

    fn key() -> NodeKey {
        "10.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_classify_known_statuses() {
        assert_eq!(
            classify(RawResponse::new(200, "1.2.3.4")).unwrap(),
            Outcome::Payload(b"1.2.3.4".to_vec())
        );
        assert_eq!(
            classify(RawResponse::empty(204)).unwrap(),
            Outcome::NoContent
        );
        assert!(matches!(
            classify(RawResponse::empty(401)),
            Err(Error::Authentication)
        ));
        assert!(matches!(
            classify(RawResponse::empty(404)),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            classify(RawResponse::empty(500)),
            Err(Error::Internal)
        ));
        assert!(matches!(
            classify(RawResponse::empty(501)),
            Err(Error::NotImplemented)
        ));
        assert!(matches!(
            classify(RawResponse::empty(599)),
            Err(Error::UnexpectedResponse { status: 599 })
        ));
    }

    #[test]
    fn test_classify_bad_request_message() {
        let err = classify(RawResponse::new(400, r#"{"error":"port is invalid"}"#)).unwrap_err();
        assert!(matches!(&err, Error::BadRequest(msg) if msg == "port is invalid"));
        assert_eq!(err.to_string(), "port is invalid");

        let err = classify(RawResponse::new(400, "plain text")).unwrap_err();
        assert_eq!(err.to_string(), "plain text");

        let err = classify(RawResponse::empty(400)).unwrap_err();
        assert_eq!(err.to_string(), "Bad Request");
    }

    #[test]
    fn test_service_requests() {
        let service = Service::new("a/b", LoadBalance::Wrr).with_meta("{}");

        let create = RegistryRequest::create_service(&service);
        assert_eq!(create.method, Method::Post);
        assert_eq!(create.path, "/services/");
        assert_eq!(create.form_value("id"), Some("a/b"));
        assert_eq!(create.form_value("load_balance"), Some("WRR"));
        assert_eq!(create.form_value("meta"), Some("{}"));

        let replace = RegistryRequest::replace_service(&service);
        assert_eq!(replace.method, Method::Put);
        let segment = replace.path.strip_prefix("/services/").unwrap();
        assert_eq!(decode_segment(segment).unwrap(), "a/b");
        assert_eq!(replace.form_value("id"), None);

        let select = RegistryRequest::select_node("demo");
        assert_eq!(select.path, "/services/ZGVtbw/select");
    }

    #[test]
    fn test_node_requests() {
        let node = Node::new("10.0.0.1", 8080).with_weight(3).with_ttl(30);

        let create = RegistryRequest::create_node("demo", &node, &key(), 1_700_000_010);
        assert_eq!(create.path, "/nodes/");
        assert_eq!(create.form_value("service_id"), Some("ZGVtbw"));
        assert_eq!(create.form_value("ip"), Some("10.0.0.1"));
        assert_eq!(create.form_value("port"), Some("8080"));
        assert_eq!(create.form_value("weight"), Some("3"));
        assert_eq!(create.form_value("ttl"), Some("30"));
        assert_eq!(create.form_value("expires"), Some("1700000010"));
        assert_eq!(create.form_value("meta"), None);

        let touch = RegistryRequest::touch_node("demo", &key(), 42);
        assert_eq!(touch.method, Method::Patch);
        let rest = touch.path.strip_prefix("/nodes/ZGVtbw/").unwrap();
        let segment = rest.strip_suffix("/expires").unwrap();
        assert_eq!(decode_segment(segment).unwrap(), "10.0.0.1:8080");
        assert_eq!(touch.form_value("expires"), Some("42"));

        let remove = RegistryRequest::remove_node("demo", &key());
        assert_eq!(remove.method, Method::Delete);
        assert!(remove.form.is_empty());
    }

    #[test]
    fn test_secret_header() {
        let request = RegistryRequest::get_ip().with_secret("123456");
        assert_eq!(request.header("secret"), Some("123456"));
    }
}
