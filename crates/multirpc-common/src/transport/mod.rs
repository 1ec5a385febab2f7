//! multirpc Transport Layer
//!
//! Everything needed to carry one serialized call to one server and turn the
//! answer back into a value.
//!
//! # Components
//!
//! - **[`Transport`]**: the adapter boundary. `call` resolves exactly once per
//!   invocation; `send_request` is the callback form built on top of it
//! - **[`HttpTransport`]**: hyper-based HTTP/1.1 implementation
//! - **[`Target`]**: a validated `http://` / `https://` server URL
//! - **[`ResponseDecoder`]** / **[`JsonRpcDecoder`]**: response payload to
//!   result or remote fault
//!
//! # Example
//!
//! ```no_run
//! use multirpc_common::transport::{HttpTransport, HttpTransportConfig, Target, Transport};
//! use multirpc_common::CallSpec;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig::default());
//! let target = Target::parse("http://127.0.0.1:8080/RPC2")?;
//! let spec = CallSpec::new("sample.add", json!([5, 7]))?;
//!
//! let body = transport.call(&target, spec.payload()).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod http;
pub mod target;


use hyper::body::Bytes;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

pub use codec::{Decoded, JsonRpcDecoder, ResponseDecoder};
pub use http::{HttpTransport, HttpTransportConfig};
pub use target::Target;

/// A failure to complete one call at the network or protocol layer.
///
/// Recorded as that target's outcome; never aborts the other targets of a
/// fan-out.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Server answered with HTTP status {0}")]
    HttpStatus(u16),

    #[error("Response body too large (max {0} bytes)")]
    ResponseTooLarge(usize),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Call aborted before completing: {0}")]
    Aborted(String),
}

/// The boundary between the coordinator and the mechanics of one RPC.
///
/// Implementations must resolve every `call` exactly once, with either the
/// raw response payload or a [`TransportError`]. A future that never resolves
/// stalls whoever is waiting on it, so implementations are expected to
/// enforce their own timeout.
pub trait Transport: Send + Sync + 'static {
    /// Sends `payload` to `target` and returns the raw response body.
    fn call(
        &self,
        target: &Target,
        payload: Bytes,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Callback form of [`call`](Transport::call).
    ///
    /// Spawns the call on the current tokio runtime and hands the result to
    /// `on_complete`, which runs exactly once unless the runtime shuts down
    /// first. A call that panics or is cancelled is reported as
    /// [`TransportError::Aborted`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    fn send_request<F>(self: Arc<Self>, target: Target, payload: Bytes, on_complete: F)
    where
        Self: Sized,
        F: FnOnce(Result<Bytes, TransportError>) + Send + 'static,
    {
        let url = target.to_string();
        let call = tokio::spawn(async move { self.call(&target, payload).await });

        tokio::spawn(async move {
            let result = match call.await {
                Ok(result) => result,
                Err(join_error) => {
                    tracing::warn!(url = %url, error = %join_error, "transport call died before answering");
                    Err(TransportError::Aborted(join_error.to_string()))
                }
            };
            on_complete(result);
        });
    }
}
