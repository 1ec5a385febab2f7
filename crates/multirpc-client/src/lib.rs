//! multirpc Client
//!
//! Sends one JSON-RPC call to a fixed set of servers concurrently and
//! delivers exactly one aggregated report when every call has finished.
//!
//! # Components
//!
//! - **[`FanoutCoordinator`]**: builds one [`CallContext`] per target and
//!   runs them as concurrent tasks
//! - **[`CompletionGroup`]**: the shared counter and outcome slots; runs
//!   the completion handler exactly once
//! - **[`AggregationPolicy`]**: how per-target [`TargetOutcome`]s become an
//!   [`AggregatedOutcome`]
//! - **[`MultirpcClient`]**: configured entry point for single calls and
//!   fan-outs over HTTP
//!
//! # Example
//!
//! ```no_run
//! use multirpc_client::{AggregatedOutcome, ClientConfig, MultirpcClient};
//! use multirpc_common::Target;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MultirpcClient::new(ClientConfig::from_env()?)?;
//! let targets = Target::parse_all([
//!     "http://127.0.0.1:8080/RPC2",
//!     "http://127.0.0.1:8081/RPC2",
//!     "http://127.0.0.1:8082/RPC2",
//! ])?;
//!
//! client.multicall(targets, "sample.add", json!([5, 7]), |method, outcome| {
//!     match outcome {
//!         AggregatedOutcome::AllSucceeded { results } => println!("{method}: {results:?}"),
//!         other => eprintln!("{method}: {other:?}"),
//!     }
//! })?;
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod call_context;
pub mod client;
pub mod completion;
pub mod config;
pub mod fanout;
pub mod outcome;
mod tracker;

pub use call_context::CallContext;
pub use client::MultirpcClient;
pub use completion::{Completion, CompletionGroup, CompletionHandler};
pub use config::ClientConfig;
pub use fanout::{FanoutCoordinator, FanoutHandle};
pub use outcome::{AggregatedOutcome, AggregationPolicy, CallOutcome, TargetOutcome};
