pub mod call;
pub mod error;
pub mod jsonrpc;


pub use call::{CallSpec, MethodName, RequestId, RpcParams};
pub use error::{CoordinationFailure, MultirpcError, Result};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
