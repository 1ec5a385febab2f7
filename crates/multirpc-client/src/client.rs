use multirpc_common::protocol::error::Result;
use multirpc_common::protocol::CallSpec;
use multirpc_common::transport::{
    HttpTransport, JsonRpcDecoder, ResponseDecoder, Target, Transport,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::fanout::{FanoutCoordinator, FanoutHandle};
use crate::outcome::{AggregatedOutcome, CallOutcome};

/// multirpc client
///
/// An explicit client value: create one with [`new`](MultirpcClient::new),
/// share it by reference, and call [`shutdown`](MultirpcClient::shutdown)
/// to wait for outstanding work before dropping it. Single calls and
/// fan-outs go through the same transport.
///
/// # Example
///
/// ```no_run
/// use multirpc_client::{ClientConfig, MultirpcClient};
/// use multirpc_common::Target;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MultirpcClient::new(ClientConfig::default())?;
/// let targets = Target::parse_all(["http://127.0.0.1:8080/RPC2", "http://127.0.0.1:8081/RPC2"])?;
///
/// let outcome = client.multicall_sync(targets, "sample.add", json!([5, 7])).await?;
/// println!("{:?}", outcome);
///
/// client.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct MultirpcClient<T: Transport = HttpTransport> {
    config: ClientConfig,
    coordinator: FanoutCoordinator<T>,
}

impl MultirpcClient<HttpTransport> {
    /// Creates a client that talks plain HTTP.
    ///
    /// [`HttpTransport`] carries no TLS stack: an `https://` target parses,
    /// but every call to it fails with
    /// [`TransportError::Connection`](multirpc_common::TransportError::Connection).
    /// Use [`with_transport`](MultirpcClient::with_transport) with a
    /// TLS-capable [`Transport`] to reach such servers.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::InvalidArgument`](multirpc_common::MultirpcError::InvalidArgument)
    /// if the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.to_transport_config());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> MultirpcClient<T> {
    /// Creates a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let coordinator = FanoutCoordinator::new(transport).with_policy(config.aggregation);

        tracing::debug!(
            app = %config.app_name,
            version = %config.app_version,
            policy = %config.aggregation,
            "Client created"
        );

        Ok(Self { config, coordinator })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &FanoutCoordinator<T> {
        &self.coordinator
    }

    /// Calls `method` on one target and waits for the result.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a bad method name or params
    /// - `RemoteFault` if the server answered with a fault
    /// - `Transport` if the call failed on the way
    pub async fn call(&self, target: &Target, method: &str, params: Value) -> Result<Value> {
        let spec = CallSpec::new(method, params)?;
        let response = self.coordinator.transport().call(target, spec.payload()).await;
        let decoded = response.and_then(|body| JsonRpcDecoder.decode(&body));
        CallOutcome::from_decoded(decoded).into_result()
    }

    /// Calls `method` on one target without waiting.
    ///
    /// `on_response` runs exactly once with the target, the method, the
    /// params and the result, including when the transport panics (reported
    /// as [`TransportError::Aborted`](multirpc_common::TransportError::Aborted)).
    /// The call counts as outstanding until it has run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad method name or params; nothing is
    /// sent in that case.
    pub fn call_async<F>(&self, target: Target, method: &str, params: Value, on_response: F) -> Result<()>
    where
        F: FnOnce(&Target, &str, &Value, Result<Value>) + Send + 'static,
    {
        let spec = CallSpec::new(method, params)?;
        let guard = self.coordinator.track();
        let payload = spec.payload();
        let reply_target = target.clone();

        Arc::clone(self.coordinator.transport()).send_request(target, payload, move |response| {
            let decoded = response.and_then(|body| JsonRpcDecoder.decode(&body));
            let result = CallOutcome::from_decoded(decoded).into_result();
            on_response(&reply_target, spec.method(), spec.params(), result);
            drop(guard);
        });

        Ok(())
    }

    /// Starts a fan-out of `method(params)` to `targets`.
    ///
    /// See [`FanoutCoordinator::dispatch_async`].
    pub fn multicall<F>(
        &self,
        targets: Vec<Target>,
        method: &str,
        params: Value,
        on_all_done: F,
    ) -> Result<FanoutHandle>
    where
        F: FnOnce(&str, AggregatedOutcome) + Send + 'static,
    {
        self.coordinator.dispatch_async(targets, method, params, on_all_done)
    }

    /// Fans out `method(params)` to `targets` and waits for the report.
    pub async fn multicall_sync(
        &self,
        targets: Vec<Target>,
        method: &str,
        params: Value,
    ) -> Result<AggregatedOutcome> {
        self.coordinator.dispatch_sync(targets, method, params).await
    }

    /// Number of fan-outs and async calls still outstanding.
    pub fn outstanding(&self) -> usize {
        self.coordinator.outstanding()
    }

    /// Waits until every outstanding fan-out and async call has delivered.
    pub async fn finish_outstanding(&self) {
        self.coordinator.finish_outstanding().await
    }

    /// Like [`finish_outstanding`](Self::finish_outstanding), giving up
    /// with `Timeout` after `timeout`.
    pub async fn finish_outstanding_timeout(&self, timeout: Duration) -> Result<()> {
        self.coordinator.finish_outstanding_timeout(timeout).await
    }

    /// Waits for outstanding work, then drops the client.
    pub async fn shutdown(self) {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            tracing::info!(outstanding, "Waiting for outstanding calls before shutdown");
        }
        self.finish_outstanding().await;
        tracing::debug!("Client shut down");
    }
}
