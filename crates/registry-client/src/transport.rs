//! Request execution
//!
//! A [`Transport`] moves a [`RegistryRequest`] to the registry and hands
//! back the raw status and body. It does not interpret status codes; that
//! is [`crate::protocol::classify`]'s job.

use crate::error::{Error, Result};
use crate::protocol::{Method, RawResponse, RegistryRequest};
use async_trait::async_trait;
use tracing::debug;

/// Executes registry requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response.
    ///
    /// Failures to obtain a response at all are reported as
    /// [`Error::Transport`].
    async fn execute(&self, request: RegistryRequest) -> Result<RawResponse>;
}

/// HTTP transport backed by `reqwest`.
///
/// The underlying connection pool is shared by clones. `reqwest` drives its
/// I/O on Tokio, so requests must be awaited within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base: String,
}

impl HttpTransport {
    /// Create a transport for the registry at `base` (e.g. `http://127.0.0.1:20080`)
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(Error::transport)?;
        Ok(Self::with_client(http, base))
    }

    /// Create a transport sharing an existing connection pool
    pub fn with_client(http: reqwest::Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    /// Registry base address
    pub fn base(&self) -> &str {
        &self.base
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: RegistryRequest) -> Result<RawResponse> {
        let url = format!("{}{}", self.base, request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self.http.request(Self::method(request.method), &url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(Error::transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Error::transport)?;
        debug!("{} {} -> {}", request.method, url, status);

        Ok(RawResponse::new(status, body.to_vec()))
    }
}
