//! # multirpc
//!
//! Concurrent JSON-RPC fan-out with exactly-once aggregated completion.
//!
//! This package re-exports the two library crates of the workspace:
//!
//! - [`common`] (`multirpc-common`): JSON-RPC types, [`CallSpec`], the
//!   [`Transport`] trait and the hyper-based [`HttpTransport`]
//! - `multirpc-client`: the fan-out coordinator, completion group and
//!   [`MultirpcClient`], re-exported at the top level
//!
//! # Example
//!
//! ```no_run
//! use multirpc::{ClientConfig, MultirpcClient, Target};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MultirpcClient::new(ClientConfig::default())?;
//! let targets = Target::parse_all(["http://127.0.0.1:8080/RPC2", "http://127.0.0.1:8081/RPC2"])?;
//!
//! let report = client.multicall_sync(targets, "sample.add", json!([5, 7])).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub use multirpc_client::*;
pub use multirpc_common as common;
pub use multirpc_common::{
    CallSpec, CoordinationFailure, HttpTransport, HttpTransportConfig, MultirpcError, Result,
    Target, Transport, TransportError,
};
