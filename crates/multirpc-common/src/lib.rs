//! multirpc Common Types and Transport
//!
//! This crate provides the protocol definitions and the HTTP transport layer
//! shared by the multirpc client and CLI.
//!
//! # Overview
//!
//! multirpc issues the same JSON-RPC 2.0 call to a fixed set of servers at
//! once and hands back one aggregated report. This crate holds everything that
//! is about *one* call:
//!
//! - **Protocol Layer**: JSON-RPC request/response types, the immutable
//!   [`CallSpec`] shared by every dispatch of a fan-out, and the error taxonomy
//! - **Transport Layer**: the [`Transport`] trait, the hyper-based
//!   [`HttpTransport`], validated [`Target`] URLs, and the
//!   [`ResponseDecoder`] that turns a raw response into a result or a fault
//!
//! # Wire Format
//!
//! - **Transport**: HTTP/1.1 `POST`, one request per call
//! - **Serialization**: JSON-RPC 2.0
//! - **Max Response Size**: 16 MB by default (configurable)
//!
//! # Example
//!
//! ```
//! use multirpc_common::{CallSpec, Target};
//! use serde_json::json;
//!
//! let spec = CallSpec::new("sample.add", json!([5, 7])).unwrap();
//! let target = Target::parse("http://127.0.0.1:8080/RPC2").unwrap();
//!
//! assert_eq!(spec.method(), "sample.add");
//! assert_eq!(target.url(), "http://127.0.0.1:8080/RPC2");
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{
    Decoded, HttpTransport, HttpTransportConfig, JsonRpcDecoder, ResponseDecoder, Target,
    Transport, TransportError,
};
