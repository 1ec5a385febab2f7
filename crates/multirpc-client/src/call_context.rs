use multirpc_common::protocol::error::CoordinationFailure;
use multirpc_common::protocol::CallSpec;
use multirpc_common::transport::{ResponseDecoder, Target, Transport, TransportError};
use std::sync::Arc;
use std::time::Instant;

use crate::completion::{Completion, CompletionGroup};
use crate::outcome::CallOutcome;

/// One target's share of a fan-out.
///
/// Holds the target, the shared request and the shared group. Consumed by
/// [`complete`](CallContext::complete), so a context can record at most one
/// outcome.
#[derive(Debug)]
pub struct CallContext {
    index: usize,
    target: Target,
    spec: Arc<CallSpec>,
    group: Arc<CompletionGroup>,
    started: Instant,
}

impl CallContext {
    /// Builds the context for target `index` of `group`.
    pub fn new(index: usize, spec: Arc<CallSpec>, group: Arc<CompletionGroup>) -> Option<Self> {
        let target = group.targets().get(index)?.clone();

        Some(Self {
            index,
            target,
            spec,
            group,
            started: Instant::now(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn spec(&self) -> &CallSpec {
        &self.spec
    }

    /// Records `outcome` for this target in the shared group.
    pub fn complete(self, outcome: CallOutcome) -> Result<Completion, CoordinationFailure> {
        let latency = self.started.elapsed();
        self.group.record_completion(self.index, outcome, latency)
    }

    /// Performs the call, decodes the answer and records it.
    pub async fn run<T, D>(self, transport: &T, decoder: &D) -> Result<Completion, CoordinationFailure>
    where
        T: Transport,
        D: ResponseDecoder,
    {
        let response = transport.call(&self.target, self.spec.payload()).await;
        let decoded = response.and_then(|body| decoder.decode(&body));
        let outcome = CallOutcome::from_decoded(decoded);

        match &outcome {
            CallOutcome::Transport(e) => warn_transport(&self, e),
            CallOutcome::Fault { code, message } => {
                tracing::debug!(
                    url = %self.target,
                    method = %self.spec.method(),
                    code,
                    message = %message,
                    "Server reported fault"
                );
            }
            CallOutcome::Success(_) => {}
        }

        self.complete(outcome)
    }
}

fn warn_transport(ctx: &CallContext, error: &TransportError) {
    tracing::warn!(
        url = %ctx.target,
        method = %ctx.spec.method(),
        error = %error,
        "Call failed in transport"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::AggregationPolicy;
    use hyper::body::Bytes;
    use multirpc_common::transport::JsonRpcDecoder;
    use serde_json::json;

    struct FixedTransport(std::result::Result<&'static [u8], TransportError>);

    impl Transport for FixedTransport {
        async fn call(&self, _target: &Target, _payload: Bytes) -> std::result::Result<Bytes, TransportError> {
            self.0.clone().map(Bytes::from_static)
        }
    }

    fn group(n: usize) -> Arc<CompletionGroup> {
        let targets = (0..n)
            .map(|i| Target::parse(format!("http://127.0.0.1:{}", 9100 + i)).unwrap())
            .collect();
        Arc::new(CompletionGroup::new("echo", targets, AggregationPolicy::AllOutcomes, |_, _| {}).unwrap())
    }

    #[test]
    fn test_new_rejects_out_of_range_index() {
        let spec = Arc::new(CallSpec::new("echo", json!([])).unwrap());
        assert!(CallContext::new(2, spec.clone(), group(2)).is_none());
        let ctx = CallContext::new(1, spec, group(2)).unwrap();
        assert_eq!(ctx.target().url(), "http://127.0.0.1:9101");
    }

    #[tokio::test]
    async fn test_run_records_decoded_result() {
        let group = group(2);
        let spec = Arc::new(CallSpec::new("echo", json!([1])).unwrap());
        let ctx = CallContext::new(0, spec, group.clone()).unwrap();
        let transport = FixedTransport(Ok(br#"{"jsonrpc":"2.0","result":[1],"id":1}"#));

        let completion = ctx.run(&transport, &JsonRpcDecoder).await.unwrap();
        assert_eq!(completion, Completion::Pending { rank: 1, remaining: 1 });
        assert!(group.is_recorded(0));
    }

    #[tokio::test]
    async fn test_run_records_transport_failure() {
        let group = group(1);
        let spec = Arc::new(CallSpec::new("echo", json!([1])).unwrap());
        let ctx = CallContext::new(0, spec, group.clone()).unwrap();
        let transport = FixedTransport(Err(TransportError::HttpStatus(503)));

        let completion = ctx.run(&transport, &JsonRpcDecoder).await.unwrap();
        assert_eq!(completion, Completion::Delivered { rank: 1 });
        assert!(group.is_retired());
    }
}
