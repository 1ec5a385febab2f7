//! JSON-RPC 2.0 Protocol Types
//!
//! The wire messages exchanged with every target server.
//!
//! - Request: `{"jsonrpc": "2.0", "method": "...", "params": ..., "id": ...}`
//! - Response: `{"jsonrpc": "2.0", "result": ..., "id": ...}` or
//!   `{"jsonrpc": "2.0", "error": {"code": ..., "message": "..."}, "id": ...}`
//!
//! A response carrying an `error` member is a *remote fault*: the server ran
//! (or refused to run) the method and said so. Anything that prevents us from
//! reading such a response at all is a transport error instead.
//!
//! # Example
//!
//! ```
//! use multirpc_common::protocol::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new("sample.add", json!([5, 7]), json!(1));
//! let response = JsonRpcResponse::success(request.id.clone(), json!(12));
//! assert!(!response.is_fault());
//!
//! let fault = JsonRpcResponse::error(json!(1), JsonRpcError::method_not_found());
//! assert!(fault.is_fault());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Name of the method to invoke
    pub method: String,
    /// Positional (array) or named (object) parameters
    pub params: Value,
    /// Request identifier echoed back by the server
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response
///
/// Exactly one of `result` and `error` is expected. A response with neither
/// is read as a successful `null` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC 2.0 error object (a remote fault)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Fault code (standard codes are negative integers)
    pub code: i32,
    /// Short description of the fault
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Start of the implementation-defined server error range
pub const SERVER_ERROR: i32 = -32000;

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn server_error(msg: &str) -> Self {
        Self::new(SERVER_ERROR, msg)
    }
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_fault(&self) -> bool {
        self.error.is_some()
    }
}
