use serde_json::Value;

use super::TransportError;
use crate::protocol::JsonRpcResponse;

/// What a server said about one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The method ran and returned this value
    Result(Value),
    /// The server reported an application-level fault
    Fault { code: i32, message: String },
}

/// Converts a raw response payload into a [`Decoded`] answer.
///
/// A payload that cannot be read as a response at all is a
/// [`TransportError::MalformedResponse`], not a fault.
pub trait ResponseDecoder: Send + Sync + 'static {
    fn decode(&self, payload: &[u8]) -> Result<Decoded, TransportError>;
}

/// Decoder for JSON-RPC 2.0 response bodies.
///
/// # Example
///
/// ```
/// use multirpc_common::transport::{Decoded, JsonRpcDecoder, ResponseDecoder};
/// use serde_json::json;
///
/// let decoded = JsonRpcDecoder
///     .decode(br#"{"jsonrpc":"2.0","result":12,"id":1}"#)
///     .unwrap();
/// assert_eq!(decoded, Decoded::Result(json!(12)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcDecoder;

impl ResponseDecoder for JsonRpcDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Decoded, TransportError> {
        let response: JsonRpcResponse = serde_json::from_slice(payload)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        if response.jsonrpc != crate::protocol::jsonrpc::JSONRPC_VERSION {
            return Err(TransportError::MalformedResponse(format!(
                "unsupported jsonrpc version '{}'",
                response.jsonrpc
            )));
        }

        match response.error {
            Some(fault) => Ok(Decoded::Fault {
                code: fault.code,
                message: fault.message,
            }),
            None => Ok(Decoded::Result(response.result.unwrap_or(Value::Null))),
        }
    }
}
