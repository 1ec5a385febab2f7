//! Per-target outcomes and their aggregation into one report.

use multirpc_common::protocol::error::{MultirpcError, Result};
use multirpc_common::transport::{Decoded, Target, TransportError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// What happened to the call sent to one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CallOutcome {
    /// The server ran the method and returned a value
    Success(Value),
    /// The server reported an application fault
    Fault { code: i32, message: String },
    /// The call never produced a usable response
    Transport(TransportError),
}

impl CallOutcome {
    /// Builds an outcome from a transport result that has already been
    /// through the response decoder.
    pub fn from_decoded(decoded: std::result::Result<Decoded, TransportError>) -> Self {
        match decoded {
            Ok(Decoded::Result(value)) => CallOutcome::Success(value),
            Ok(Decoded::Fault { code, message }) => CallOutcome::Fault { code, message },
            Err(e) => CallOutcome::Transport(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Converts into the single-call result form.
    ///
    /// Faults become [`MultirpcError::RemoteFault`] and transport errors
    /// become [`MultirpcError::Transport`].
    pub fn into_result(self) -> Result<Value> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Fault { code, message } => Err(MultirpcError::RemoteFault { code, message }),
            CallOutcome::Transport(e) => Err(MultirpcError::Transport(e)),
        }
    }
}

/// One target's entry in an aggregated report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetOutcome {
    /// Position of the target in the dispatched target list
    pub index: usize,
    pub target: Target,
    pub outcome: CallOutcome,
    /// 1-based order in which this outcome was recorded
    pub arrival: usize,
    /// Time from dispatch to recording, in microseconds
    pub latency_us: u64,
}

/// The single report handed to the completion handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AggregatedOutcome {
    /// Every reported call succeeded. Results are in target order.
    AllSucceeded { results: Vec<Value> },
    /// At least one reported call faulted or failed in transport. Outcomes
    /// are in target order.
    SomeFaulted { outcomes: Vec<TargetOutcome> },
    /// Fallback for a report that was built but never reached the waiter.
    ///
    /// Only [`FanoutCoordinator::dispatch_sync`](crate::fanout::FanoutCoordinator::dispatch_sync)
    /// produces it, and only if its internal handler is dropped without
    /// sending. Dead workers are reported as
    /// [`TransportError::Aborted`](multirpc_common::TransportError::Aborted)
    /// inside `SomeFaulted`, and a failing user handler surfaces as
    /// [`MultirpcError::Delivery`](multirpc_common::MultirpcError::Delivery)
    /// from [`FanoutHandle::wait`](crate::fanout::FanoutHandle::wait).
    DeliveryError(String),
}

impl AggregatedOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AggregatedOutcome::AllSucceeded { .. })
    }

    /// Result values when every reported call succeeded.
    pub fn results(&self) -> Option<&[Value]> {
        match self {
            AggregatedOutcome::AllSucceeded { results } => Some(results),
            _ => None,
        }
    }

    /// Outcomes that were not a success.
    pub fn failures(&self) -> Vec<&TargetOutcome> {
        match self {
            AggregatedOutcome::SomeFaulted { outcomes } => {
                outcomes.iter().filter(|o| !o.outcome.is_success()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// How the recorded outcomes of a fan-out are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationPolicy {
    /// Report every target's outcome
    #[default]
    AllOutcomes,
    /// Report only the outcome whose arrival completed the group
    TriggeringOutcome,
}

impl AggregationPolicy {
    /// Combines a full set of outcomes (one per target) into a report.
    pub fn aggregate(&self, mut outcomes: Vec<TargetOutcome>) -> AggregatedOutcome {
        if *self == AggregationPolicy::TriggeringOutcome {
            let last = outcomes.len();
            outcomes.retain(|o| o.arrival == last);
        }
        outcomes.sort_by_key(|o| o.index);

        if outcomes.iter().all(|o| o.outcome.is_success()) {
            let results = outcomes
                .into_iter()
                .filter_map(|o| match o.outcome {
                    CallOutcome::Success(value) => Some(value),
                    _ => None,
                })
                .collect();
            AggregatedOutcome::AllSucceeded { results }
        } else {
            AggregatedOutcome::SomeFaulted { outcomes }
        }
    }
}

impl FromStr for AggregationPolicy {
    type Err = MultirpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_outcomes" => Ok(AggregationPolicy::AllOutcomes),
            "triggering" | "triggering_outcome" => Ok(AggregationPolicy::TriggeringOutcome),
            other => Err(MultirpcError::InvalidArgument(format!(
                "unknown aggregation policy '{}' (expected 'all' or 'triggering')",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationPolicy::AllOutcomes => f.write_str("all"),
            AggregationPolicy::TriggeringOutcome => f.write_str("triggering"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(index: usize, arrival: usize, outcome: CallOutcome) -> TargetOutcome {
        TargetOutcome {
            index,
            target: Target::parse(format!("http://127.0.0.1:{}", 9000 + index)).unwrap(),
            outcome,
            arrival,
            latency_us: 0,
        }
    }

    #[test]
    fn test_all_succeeded_in_target_order() {
        let outcomes = vec![
            outcome(2, 1, CallOutcome::Success(json!(3))),
            outcome(0, 3, CallOutcome::Success(json!(1))),
            outcome(1, 2, CallOutcome::Success(json!(2))),
        ];

        let report = AggregationPolicy::AllOutcomes.aggregate(outcomes);
        assert_eq!(
            report,
            AggregatedOutcome::AllSucceeded {
                results: vec![json!(1), json!(2), json!(3)]
            }
        );
    }

    #[test]
    fn test_any_failure_reports_every_outcome() {
        let outcomes = vec![
            outcome(0, 2, CallOutcome::Success(json!(12))),
            outcome(
                1,
                1,
                CallOutcome::Transport(TransportError::Connection("refused".into())),
            ),
            outcome(2, 3, CallOutcome::Success(json!(12))),
        ];

        let report = AggregationPolicy::AllOutcomes.aggregate(outcomes);
        match &report {
            AggregatedOutcome::SomeFaulted { outcomes } => {
                assert_eq!(outcomes.len(), 3);
                assert_eq!(
                    outcomes.iter().map(|o| o.index).collect::<Vec<_>>(),
                    vec![0, 1, 2]
                );
            }
            other => panic!("expected SomeFaulted, got {:?}", other),
        }
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].index, 1);
    }

    #[test]
    fn test_triggering_outcome_keeps_last_arrival() {
        let outcomes = vec![
            outcome(0, 3, CallOutcome::Success(json!("last"))),
            outcome(
                1,
                1,
                CallOutcome::Fault {
                    code: -32000,
                    message: "nope".into(),
                },
            ),
            outcome(2, 2, CallOutcome::Success(json!("middle"))),
        ];

        let report = AggregationPolicy::TriggeringOutcome.aggregate(outcomes);
        assert_eq!(report.results(), Some(&[json!("last")][..]));
    }

    #[test]
    fn test_triggering_outcome_reports_triggering_fault() {
        let outcomes = vec![
            outcome(0, 1, CallOutcome::Success(json!(1))),
            outcome(
                1,
                2,
                CallOutcome::Fault {
                    code: 7,
                    message: "late fault".into(),
                },
            ),
        ];

        let report = AggregationPolicy::TriggeringOutcome.aggregate(outcomes);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].arrival, 2);
    }

    #[test]
    fn test_into_result_maps_fault_messages() {
        let fault = CallOutcome::Fault {
            code: 3,
            message: "division by zero".into(),
        };
        let err = fault.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "RPC failed at server. division by zero (fault code 3)"
        );

        let transport = CallOutcome::Transport(TransportError::Timeout(50));
        let err = transport.into_result().unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Client transport failed to execute the RPC."));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "all".parse::<AggregationPolicy>().unwrap(),
            AggregationPolicy::AllOutcomes
        );
        assert_eq!(
            "Triggering".parse::<AggregationPolicy>().unwrap(),
            AggregationPolicy::TriggeringOutcome
        );
        assert!("first".parse::<AggregationPolicy>().is_err());
        assert_eq!(AggregationPolicy::default().to_string(), "all");
    }

    #[test]
    fn test_report_serializes_with_status_tag() {
        let report = AggregatedOutcome::AllSucceeded {
            results: vec![json!(12)],
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"status": "all_succeeded", "detail": {"results": [12]}})
        );
    }
}
