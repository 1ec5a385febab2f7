//! Fan-out Coordinator
//!
//! Sends one call to every target at once and reports back exactly once.
//!
//! # Task layout
//!
//! `dispatch_async` spawns one worker task per target plus one supervisor
//! task for the whole fan-out. Each worker performs its call and records the
//! outcome in the shared [`CompletionGroup`]; the worker that records last
//! runs the completion handler. The supervisor joins every worker, records a
//! [`TransportError::Aborted`] outcome for any worker that died before
//! recording, and reports delivery problems through [`FanoutHandle::wait`].

use multirpc_common::protocol::error::{CoordinationFailure, MultirpcError, Result};
use multirpc_common::protocol::CallSpec;
use multirpc_common::transport::{JsonRpcDecoder, ResponseDecoder, Target, Transport, TransportError};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::call_context::CallContext;
use crate::completion::{Completion, CompletionGroup};
use crate::outcome::{AggregatedOutcome, AggregationPolicy, CallOutcome};
use crate::tracker::{InFlight, InFlightGuard};

/// Dispatches one call to many targets and aggregates the answers.
///
/// Generic over the [`Transport`] that carries each call and the
/// [`ResponseDecoder`] that reads each answer.
pub struct FanoutCoordinator<T, D = JsonRpcDecoder> {
    transport: Arc<T>,
    decoder: Arc<D>,
    policy: AggregationPolicy,
    in_flight: InFlight,
}

impl<T: Transport> FanoutCoordinator<T, JsonRpcDecoder> {
    /// Creates a coordinator that reads JSON-RPC 2.0 responses.
    pub fn new(transport: T) -> Self {
        Self::with_decoder(transport, JsonRpcDecoder)
    }
}

impl<T: Transport, D: ResponseDecoder> FanoutCoordinator<T, D> {
    pub fn with_decoder(transport: T, decoder: D) -> Self {
        Self {
            transport: Arc::new(transport),
            decoder: Arc::new(decoder),
            policy: AggregationPolicy::default(),
            in_flight: InFlight::new(),
        }
    }

    /// Sets how outcomes are combined for fan-outs dispatched afterwards.
    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Number of fan-outs (and async single calls) not yet delivered.
    pub fn outstanding(&self) -> usize {
        self.in_flight.current()
    }

    pub(crate) fn track(&self) -> InFlightGuard {
        self.in_flight.enter()
    }

    /// Sends `method(params)` to every target and returns immediately.
    ///
    /// `on_all_done` runs exactly once, on whichever task records the last
    /// outcome, with the method name and the aggregated report.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::InvalidArgument`] for an empty target list,
    /// an invalid method name, or params that are neither an array nor an
    /// object. Nothing is dispatched and `on_all_done` is dropped unrun.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn dispatch_async<F>(
        &self,
        targets: Vec<Target>,
        method: &str,
        params: Value,
        on_all_done: F,
    ) -> Result<FanoutHandle>
    where
        F: FnOnce(&str, AggregatedOutcome) + Send + 'static,
    {
        if targets.is_empty() {
            return Err(MultirpcError::InvalidArgument(
                "fan-out needs at least one target".to_string(),
            ));
        }

        let spec = Arc::new(CallSpec::new(method, params)?);
        let group = Arc::new(CompletionGroup::new(
            spec.method(),
            targets,
            self.policy,
            on_all_done,
        )?);

        tracing::info!(
            method = %spec.method(),
            id = spec.id(),
            targets = group.required(),
            policy = %self.policy,
            "Dispatching fan-out"
        );

        let guard = self.in_flight.enter();
        let dispatched_at = Instant::now();

        let workers: Vec<(usize, JoinHandle<_>)> = (0..group.required())
            .filter_map(|index| CallContext::new(index, spec.clone(), group.clone()))
            .map(|ctx| {
                let index = ctx.index();
                let transport = self.transport.clone();
                let decoder = self.decoder.clone();
                let worker = tokio::spawn(async move { ctx.run(transport.as_ref(), decoder.as_ref()).await });
                (index, worker)
            })
            .collect();

        let supervisor = tokio::spawn(supervise(group.clone(), workers, dispatched_at, guard));

        Ok(FanoutHandle { group, supervisor })
    }

    /// Dispatches like [`dispatch_async`](Self::dispatch_async) and waits for
    /// the aggregated report.
    ///
    /// # Errors
    ///
    /// Same input errors as `dispatch_async`, plus
    /// [`MultirpcError::Delivery`] if the supervisor task died. Panicking
    /// workers do not fail the call; they show up as `Aborted` outcomes.
    /// [`AggregatedOutcome::DeliveryError`] is a fallback for a report that
    /// never reached this waiter, which the internal handler does not
    /// otherwise allow.
    pub async fn dispatch_sync(
        &self,
        targets: Vec<Target>,
        method: &str,
        params: Value,
    ) -> Result<AggregatedOutcome> {
        let (tx, rx) = oneshot::channel();

        let handle = self.dispatch_async(targets, method, params, move |_, outcome| {
            let _ = tx.send(outcome);
        })?;

        let received = rx.await;
        handle.wait().await?;

        Ok(received.unwrap_or_else(|_| {
            AggregatedOutcome::DeliveryError("completion handler finished without a report".to_string())
        }))
    }

    /// Waits until every fan-out dispatched so far has been delivered.
    pub async fn finish_outstanding(&self) {
        self.in_flight.wait_idle().await;
    }

    /// Like [`finish_outstanding`](Self::finish_outstanding) but gives up
    /// after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::Timeout`] if work is still outstanding when
    /// the timeout expires. The work itself keeps running.
    pub async fn finish_outstanding_timeout(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.in_flight.wait_idle())
            .await
            .map_err(|_| MultirpcError::Timeout(timeout.as_millis() as u64))
    }
}

async fn supervise(
    group: Arc<CompletionGroup>,
    workers: Vec<(usize, JoinHandle<std::result::Result<Completion, CoordinationFailure>>)>,
    dispatched_at: Instant,
    _guard: InFlightGuard,
) -> Result<()> {
    let mut failure = None;

    for (index, worker) in workers {
        let recorded = match worker.await {
            Ok(recorded) => recorded,
            Err(join_error) => {
                tracing::warn!(
                    method = %group.method(),
                    url = %group.targets()[index],
                    error = %join_error,
                    "Worker died before recording"
                );
                if group.is_recorded(index) {
                    continue;
                }
                let outcome = CallOutcome::Transport(TransportError::Aborted(join_error.to_string()));
                group.record_completion(index, outcome, dispatched_at.elapsed())
            }
        };

        match recorded {
            Ok(Completion::DeliveryFailed(reason)) => {
                failure = Some(MultirpcError::Delivery(reason));
            }
            Ok(_) => {}
            Err(coordination) => {
                tracing::error!(
                    method = %group.method(),
                    error = %coordination,
                    "Coordination failure"
                );
                failure = Some(MultirpcError::Coordination(coordination));
            }
        }
    }

    failure.map_or(Ok(()), Err)
}

/// Handle to a dispatched fan-out.
///
/// Dropping the handle does not cancel anything; the fan-out still runs to
/// completion and the handler still fires.
#[derive(Debug)]
pub struct FanoutHandle {
    group: Arc<CompletionGroup>,
    supervisor: JoinHandle<Result<()>>,
}

impl FanoutHandle {
    pub fn required(&self) -> usize {
        self.group.required()
    }

    pub fn completed(&self) -> usize {
        self.group.completed()
    }

    /// True once the last outcome has been recorded.
    pub fn is_delivered(&self) -> bool {
        self.group.is_retired()
    }

    /// Waits until every worker has finished and the handler has run.
    ///
    /// # Errors
    ///
    /// - [`MultirpcError::Delivery`] if the completion handler panicked
    /// - [`MultirpcError::Coordination`] if an outcome could not be recorded
    pub async fn wait(self) -> Result<()> {
        match self.supervisor.await {
            Ok(result) => result,
            Err(e) => Err(MultirpcError::Delivery(format!("fan-out supervisor failed: {}", e))),
        }
    }
}
