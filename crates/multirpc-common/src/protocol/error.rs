use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum MultirpcError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Client transport failed to execute the RPC. {0}")]
    Transport(#[from] TransportError),

    #[error("RPC failed at server. {message} (fault code {code})")]
    RemoteFault { code: i32, message: String },

    #[error("Coordination failure: {0}")]
    Coordination(#[from] CoordinationFailure),

    #[error("Completion handler failed: {0}")]
    Delivery(String),

    #[error("Timed out after {0}ms waiting for outstanding calls")]
    Timeout(u64),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// Violation of the exactly-once completion contract.
///
/// These can only be produced by calling
/// `CompletionGroup::record_completion` directly; the fan-out coordinator
/// never triggers them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationFailure {
    #[error("completion group already delivered all {required} outcomes")]
    AlreadyRetired { required: usize },

    #[error("target {target} completed more than once")]
    DuplicateCompletion { target: usize },

    #[error("target index {target} is out of range for a group of {required}")]
    UnknownTarget { target: usize, required: usize },
}

pub type Result<T> = std::result::Result<T, MultirpcError>;
