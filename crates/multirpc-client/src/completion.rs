//! Completion Group
//!
//! Shared state for one fan-out. Every target records its outcome here
//! exactly once; the record that brings the count to the number of targets
//! runs the completion handler.
//!
//! # Locking
//!
//! A single `std::sync::Mutex` guards the counter, the outcome slots and the
//! handler. Validation, slot write, increment and the quorum comparison
//! happen in one critical section. Aggregation and the handler run after the
//! lock is released, so the handler may block or take as long as it likes
//! without holding up any other target.

use multirpc_common::protocol::error::{CoordinationFailure, MultirpcError, Result};
use multirpc_common::transport::Target;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::outcome::{AggregatedOutcome, AggregationPolicy, CallOutcome, TargetOutcome};

/// Handler invoked once with the method name and the aggregated report.
pub type CompletionHandler = Box<dyn FnOnce(&str, AggregatedOutcome) + Send + 'static>;

/// Result of one successful `record_completion` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Recorded; other targets are still outstanding
    Pending { rank: usize, remaining: usize },
    /// This record completed the group and the handler returned normally
    Delivered { rank: usize },
    /// This record completed the group but the handler panicked
    DeliveryFailed(String),
}

struct GroupState {
    completed: usize,
    slots: Vec<Option<TargetOutcome>>,
    handler: Option<CompletionHandler>,
    retired: bool,
}

/// Exactly-once completion tracking for one fan-out.
pub struct CompletionGroup {
    method: String,
    targets: Vec<Target>,
    policy: AggregationPolicy,
    state: Mutex<GroupState>,
}

impl CompletionGroup {
    /// Creates a group expecting one completion per target.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::InvalidArgument`] if `targets` is empty.
    pub fn new<F>(
        method: impl Into<String>,
        targets: Vec<Target>,
        policy: AggregationPolicy,
        on_all_done: F,
    ) -> Result<Self>
    where
        F: FnOnce(&str, AggregatedOutcome) + Send + 'static,
    {
        if targets.is_empty() {
            return Err(MultirpcError::InvalidArgument(
                "a completion group needs at least one target".to_string(),
            ));
        }

        let slots = (0..targets.len()).map(|_| None).collect();

        Ok(Self {
            method: method.into(),
            targets,
            policy,
            state: Mutex::new(GroupState {
                completed: 0,
                slots,
                handler: Some(Box::new(on_all_done)),
                retired: false,
            }),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Number of completions needed to deliver.
    pub fn required(&self) -> usize {
        self.targets.len()
    }

    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    /// True once the final outcome has been recorded. No further records
    /// are accepted after that point.
    pub fn is_retired(&self) -> bool {
        self.lock().retired
    }

    /// True if `index` already has an outcome (or the group is retired).
    pub fn is_recorded(&self, index: usize) -> bool {
        let state = self.lock();
        state.retired || state.slots.get(index).map_or(false, Option::is_some)
    }

    /// Records the outcome for target `index`.
    ///
    /// Safe to call concurrently from any number of threads. The call that
    /// records the last outstanding target aggregates the outcomes and runs
    /// the handler before returning; every other call returns as soon as the
    /// outcome is stored.
    ///
    /// # Errors
    ///
    /// Returns a [`CoordinationFailure`] if the group is already retired, if
    /// `index` is out of range, or if `index` was already recorded. The
    /// handler is never run by a failing call.
    pub fn record_completion(
        &self,
        index: usize,
        outcome: CallOutcome,
        latency: Duration,
    ) -> std::result::Result<Completion, CoordinationFailure> {
        let required = self.required();

        let (rank, finished) = {
            let mut state = self.lock();

            if state.retired {
                return Err(CoordinationFailure::AlreadyRetired { required });
            }
            if index >= required {
                return Err(CoordinationFailure::UnknownTarget {
                    target: index,
                    required,
                });
            }
            if state.slots[index].is_some() {
                return Err(CoordinationFailure::DuplicateCompletion { target: index });
            }

            state.completed += 1;
            let rank = state.completed;
            state.slots[index] = Some(TargetOutcome {
                index,
                target: self.targets[index].clone(),
                outcome,
                arrival: rank,
                latency_us: latency.as_micros() as u64,
            });

            if rank == required {
                state.retired = true;
                let outcomes: Vec<TargetOutcome> = state.slots.drain(..).flatten().collect();
                (rank, Some((outcomes, state.handler.take())))
            } else {
                (rank, None)
            }
        };

        tracing::debug!(
            method = %self.method,
            url = %self.targets[index],
            rank,
            required,
            "Target completed"
        );

        let Some((outcomes, handler)) = finished else {
            return Ok(Completion::Pending {
                rank,
                remaining: required - rank,
            });
        };

        let report = self.policy.aggregate(outcomes);
        let succeeded = report.is_success();

        let Some(handler) = handler else {
            return Ok(Completion::Delivered { rank });
        };

        match catch_unwind(AssertUnwindSafe(|| handler(&self.method, report))) {
            Ok(()) => {
                tracing::info!(
                    method = %self.method,
                    targets = required,
                    succeeded,
                    "Fan-out delivered"
                );
                Ok(Completion::Delivered { rank })
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(method = %self.method, reason = %reason, "Completion handler panicked");
                Ok(Completion::DeliveryFailed(reason))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        // Never held across user code, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CompletionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CompletionGroup")
            .field("method", &self.method)
            .field("required", &self.targets.len())
            .field("completed", &state.completed)
            .field("retired", &state.retired)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("completion handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("completion handler panicked: {}", s)
    } else {
        "completion handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn targets(n: usize) -> Vec<Target> {
        (0..n)
            .map(|i| Target::parse(format!("http://127.0.0.1:{}/RPC2", 9000 + i)).unwrap())
            .collect()
    }

    fn counting_group(n: usize) -> (Arc<CompletionGroup>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let group = CompletionGroup::new(
            "sample.add",
            targets(n),
            AggregationPolicy::AllOutcomes,
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        (Arc::new(group), calls)
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let err = CompletionGroup::new("m", Vec::new(), AggregationPolicy::AllOutcomes, |_, _| {})
            .unwrap_err();
        assert!(matches!(err, MultirpcError::InvalidArgument(_)));
    }

    #[test]
    fn test_no_premature_completion() {
        let (group, calls) = counting_group(4);

        for (i, index) in [3, 0, 2].into_iter().enumerate() {
            let completion = group
                .record_completion(index, CallOutcome::Success(json!(i)), Duration::ZERO)
                .unwrap();
            assert_eq!(
                completion,
                Completion::Pending {
                    rank: i + 1,
                    remaining: 3 - i
                }
            );
            assert!(group.completed() < group.required());
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert!(!group.is_retired());
        }

        let last = group
            .record_completion(1, CallOutcome::Success(json!(3)), Duration::ZERO)
            .unwrap();
        assert_eq!(last, Completion::Delivered { rank: 4 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(group.is_retired());
    }

    #[test]
    fn test_handler_receives_method_and_report() {
        let (tx, rx) = std::sync::mpsc::channel();
        let group = CompletionGroup::new(
            "sample.add",
            targets(2),
            AggregationPolicy::AllOutcomes,
            move |method, report| {
                tx.send((method.to_string(), report)).unwrap();
            },
        )
        .unwrap();

        group
            .record_completion(1, CallOutcome::Success(json!(12)), Duration::ZERO)
            .unwrap();
        group
            .record_completion(
                0,
                CallOutcome::Fault {
                    code: 1,
                    message: "bad".into(),
                },
                Duration::from_micros(250),
            )
            .unwrap();

        let (method, report) = rx.recv().unwrap();
        assert_eq!(method, "sample.add");
        match report {
            AggregatedOutcome::SomeFaulted { outcomes } => {
                assert_eq!(outcomes[0].arrival, 2);
                assert_eq!(outcomes[0].latency_us, 250);
                assert_eq!(outcomes[1].outcome, CallOutcome::Success(json!(12)));
            }
            other => panic!("expected SomeFaulted, got {:?}", other),
        }
    }

    #[test]
    fn test_record_after_retirement_fails() {
        let (group, calls) = counting_group(1);
        group
            .record_completion(0, CallOutcome::Success(json!(1)), Duration::ZERO)
            .unwrap();

        let err = group
            .record_completion(0, CallOutcome::Success(json!(1)), Duration::ZERO)
            .unwrap_err();
        assert_eq!(err, CoordinationFailure::AlreadyRetired { required: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_and_unknown_targets_fail() {
        let (group, calls) = counting_group(2);
        group
            .record_completion(0, CallOutcome::Success(json!(1)), Duration::ZERO)
            .unwrap();

        assert_eq!(
            group
                .record_completion(0, CallOutcome::Success(json!(1)), Duration::ZERO)
                .unwrap_err(),
            CoordinationFailure::DuplicateCompletion { target: 0 }
        );
        assert_eq!(
            group
                .record_completion(5, CallOutcome::Success(json!(1)), Duration::ZERO)
                .unwrap_err(),
            CoordinationFailure::UnknownTarget {
                target: 5,
                required: 2
            }
        );
        assert_eq!(group.completed(), 1);
        assert!(group.is_recorded(0));
        assert!(!group.is_recorded(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_panic_still_retires() {
        let group = CompletionGroup::new("boom", targets(1), AggregationPolicy::AllOutcomes, |_, _| {
            panic!("handler exploded")
        })
        .unwrap();

        let completion = group
            .record_completion(0, CallOutcome::Success(json!(null)), Duration::ZERO)
            .unwrap();
        match completion {
            Completion::DeliveryFailed(reason) => assert!(reason.contains("handler exploded")),
            other => panic!("expected DeliveryFailed, got {:?}", other),
        }
        assert!(group.is_retired());
        assert!(group
            .record_completion(0, CallOutcome::Success(json!(null)), Duration::ZERO)
            .is_err());
    }

    #[test]
    fn test_concurrent_records_deliver_once() {
        let (group, calls) = counting_group(64);

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let group = group.clone();
                std::thread::spawn(move || {
                    group.record_completion(i, CallOutcome::Success(json!(i)), Duration::ZERO)
                })
            })
            .collect();

        let delivered = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .filter(|c| matches!(c, Completion::Delivered { .. }))
            .count();

        assert_eq!(delivered, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_exactly_once_for_any_order(
            delays in prop::collection::vec(0u64..300, 1..12),
        ) {
            let n = delays.len();
            let (group, calls) = counting_group(n);

            let handles: Vec<_> = delays
                .into_iter()
                .enumerate()
                .map(|(index, delay)| {
                    let group = group.clone();
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_micros(delay));
                        group.record_completion(index, CallOutcome::Success(json!(index)), Duration::ZERO)
                    })
                })
                .collect();

            let mut ranks = Vec::new();
            for handle in handles {
                match handle.join().unwrap().unwrap() {
                    Completion::Pending { rank, remaining } => {
                        prop_assert_eq!(rank + remaining, n);
                        ranks.push(rank);
                    }
                    Completion::Delivered { rank } => ranks.push(rank),
                    Completion::DeliveryFailed(reason) => prop_assert!(false, "{}", reason),
                }
            }

            ranks.sort_unstable();
            prop_assert_eq!(ranks, (1..=n).collect::<Vec<_>>());
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            prop_assert!(group.is_retired());
        }
    }
}
