//! # HTTP Transport
//!
//! Five of the six backends speak JSON over HTTP. Adapters build
//! [`HttpRequest`] values and hand them to a [`Transport`]; a [`Connector`]
//! turns an [`Endpoint`] (base URL plus auth headers) into a transport while
//! an adapter connects.
//!
//! [`HttpConnector`] is the production implementation on top of
//! `reqwest::blocking`. Tests substitute a scripted connector so adapters can
//! be exercised without a running backend.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::errors::{BoxError, VectorStoreError, VectorStoreResult};

/// A request relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).json(body)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Status code and decoded body. Empty bodies decode to `Value::Null`,
/// non-JSON bodies to a string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Non-2xx answer from a backend.
#[derive(Error, Debug)]
#[error("{method} {path} returned HTTP {status}: {body}")]
pub struct StatusError {
    pub method: Method,
    pub path: String,
    pub status: u16,
    pub body: Value,
}

pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError>;
}

/// Where and how to reach a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Endpoint {
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<(String, Option<String>)>,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), ..Default::default() }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn basic_auth(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.basic_auth = Some((user.into(), password));
        self
    }
}

pub trait Connector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, BoxError>;
}

/// Build a base URL from host and port. A host that already carries a
/// scheme is used verbatim.
pub fn base_url(host: &str, port: u16, secure: bool) -> String {
    if host.contains("://") {
        host.trim_end_matches('/').to_string()
    } else {
        let scheme = if secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, host, port)
    }
}

/// Production connector backed by `reqwest::blocking`.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    timeout: Option<Duration>,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request timeout applied by the underlying client.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, BoxError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.headers {
            let mut value = HeaderValue::from_str(value)?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_bytes(name.as_bytes())?, value);
        }

        let mut builder = reqwest::blocking::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Box::new(ReqwestTransport {
            client: builder.build()?,
            base_url: endpoint.base_url.clone(),
            basic_auth: endpoint.basic_auth.clone(),
        }))
    }
}

struct ReqwestTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    basic_auth: Option<(String, Option<String>)>,
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), url).query(&request.query);
        if let Some((user, password)) = &self.basic_auth {
            builder = builder.basic_auth(user, password.as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(HttpResponse { status, body })
    }
}

/// Adapter-side wrapper that turns transport failures and non-2xx statuses
/// into [`VectorStoreError`]s tagged with the backend name.
pub(crate) struct JsonClient {
    backend: &'static str,
    transport: Box<dyn Transport>,
}

impl JsonClient {
    pub(crate) fn connect(
        backend: &'static str,
        connector: &dyn Connector,
        endpoint: &Endpoint,
    ) -> VectorStoreResult<Self> {
        let transport = connector
            .connect(endpoint)
            .map_err(|e| VectorStoreError::connection(backend, e))?;
        Ok(Self { backend, transport })
    }

    /// Send without judging the status.
    pub(crate) fn call(&self, request: HttpRequest) -> VectorStoreResult<HttpResponse> {
        debug!(backend = self.backend, method = %request.method, path = %request.path, "sending request");
        self.transport
            .send(&request)
            .map_err(|e| VectorStoreError::backend(self.backend, e))
    }

    /// Send and require a 2xx answer.
    pub(crate) fn expect(&self, request: HttpRequest) -> VectorStoreResult<Value> {
        let (method, path) = (request.method.clone(), request.path.clone());
        let response = self.call(request)?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(VectorStoreError::backend(
                self.backend,
                StatusError { method, path, status: response.status, body: response.body },
            ))
        }
    }

    /// Like [`expect`](Self::expect) but reports failures as connection errors.
    pub(crate) fn probe(&self, request: HttpRequest) -> VectorStoreResult<Value> {
        self.expect(request).map_err(|e| match e {
            VectorStoreError::Backend { backend, source } => VectorStoreError::Connection { backend, source },
            other => other,
        })
    }

    pub(crate) fn malformed(&self, what: &str) -> VectorStoreError {
        VectorStoreError::backend(self.backend, format!("malformed response: {}", what))
    }
}
