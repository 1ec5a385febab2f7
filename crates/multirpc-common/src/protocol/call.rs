//! The logical call shared by every dispatch of a fan-out.

use hyper::body::Bytes;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use super::error::{MultirpcError, Result};
use super::jsonrpc::JsonRpcRequest;

pub type RequestId = u64;
pub type MethodName = String;
pub type RpcParams = Value;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An immutable, pre-serialized JSON-RPC call.
///
/// The request body is encoded once in [`CallSpec::new`]; every target of a
/// fan-out sends the same bytes. `Bytes` clones share the buffer, so handing
/// the payload to N workers never copies it.
#[derive(Debug, Clone)]
pub struct CallSpec {
    id: RequestId,
    method: MethodName,
    params: RpcParams,
    payload: Bytes,
}

impl CallSpec {
    /// Validates `method` and `params` and serializes the request.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::InvalidArgument`] if the method name is empty,
    /// uses the reserved `rpc.` prefix or contains characters outside
    /// `[A-Za-z0-9_.:/-]`, or if `params` is not a JSON array or object.
    pub fn new(method: impl Into<String>, params: RpcParams) -> Result<Self> {
        let method = method.into();
        validate_method_name(&method)?;

        if !(params.is_array() || params.is_object()) {
            return Err(MultirpcError::InvalidArgument(format!(
                "params for '{}' must be a JSON array or object, got {}",
                method,
                json_kind(&params)
            )));
        }

        let id = generate_request_id();
        let request = JsonRpcRequest::new(method.clone(), params.clone(), Value::from(id));
        let payload = Bytes::from(serde_json::to_vec(&request)?);

        Ok(Self {
            id,
            method,
            params,
            payload,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &RpcParams {
        &self.params
    }

    /// The serialized JSON-RPC request body.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }
}

fn validate_method_name(method: &str) -> Result<()> {
    if method.is_empty() {
        return Err(MultirpcError::InvalidArgument(
            "method name must not be empty".to_string(),
        ));
    }

    if method.starts_with("rpc.") {
        return Err(MultirpcError::InvalidArgument(format!(
            "method name '{}' uses the reserved 'rpc.' prefix",
            method
        )));
    }

    if let Some(bad) = method
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '/' | '-')))
    {
        return Err(MultirpcError::InvalidArgument(format!(
            "method name '{}' contains invalid character {:?}",
            method, bad
        )));
    }

    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn generate_request_id() -> RequestId {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    // Upper 32 bits from the clock, lower 32 bits from the counter.
    (timestamp & 0xFFFF_FFFF_0000_0000) | (counter & 0xFFFF_FFFF)
}
