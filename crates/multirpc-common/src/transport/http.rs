//! HTTP Transport
//!
//! Sends a serialized JSON-RPC request as an HTTP/1.1 `POST` and returns the
//! response body. Any failure on the way (connect, timeout, non-2xx status,
//! oversized body) comes back as a [`TransportError`].

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use super::{Target, Transport, TransportError};

/// Default per-call timeout (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default response body limit (16 MB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// HTTP transport configuration.
///
/// # Default Configuration
///
/// - `timeout`: 30 seconds per call
/// - `max_response_bytes`: 16 MB
/// - `user_agent`: `multirpc/<version>`
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Time allowed for one call, from connect to the last body byte
    pub timeout: Duration,
    /// Responses larger than this are rejected
    pub max_response_bytes: usize,
    /// Sent as the `User-Agent` header
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: format!("multirpc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// hyper-based [`Transport`].
///
/// One hyper client is built per transport and shared by every call made
/// through it, so concurrent calls to the same target run in parallel.
/// Only plain `http://` targets are supported; `https://` targets fail with
/// a connection error.
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, config }
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    async fn post(&self, target: &Target, payload: Bytes) -> Result<Bytes, TransportError> {
        if target.is_https() {
            return Err(TransportError::Connection(format!(
                "{}: https targets are not supported by the HTTP transport",
                target
            )));
        }

        let request = Request::builder()
            .method(Method::POST)
            .uri(target.uri().clone())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, self.config.user_agent.as_str())
            .body(Full::new(payload))
            .map_err(|e| TransportError::Connection(format!("failed to build request: {}", e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {}", target, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let limit = self.config.max_response_bytes;
        let body = Limited::new(response.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    TransportError::ResponseTooLarge(limit)
                } else {
                    TransportError::Connection(format!("failed to read response: {}", e))
                }
            })?;

        Ok(body.to_bytes())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(HttpTransportConfig::default())
    }
}

impl Transport for HttpTransport {
    async fn call(&self, target: &Target, payload: Bytes) -> Result<Bytes, TransportError> {
        let timeout = self.config.timeout;

        let result = tokio::time::timeout(timeout, self.post(target, payload))
            .await
            .map_err(|_| TransportError::Timeout(timeout.as_millis() as u64))?;

        if let Err(ref e) = result {
            tracing::debug!(url = %target, error = %e, "HTTP call failed");
        }

        result
    }
}
