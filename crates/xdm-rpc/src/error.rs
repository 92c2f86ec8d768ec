use crate::message::ErrorObject;

/// Errors that can occur in the RPC layer.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The connection was torn down; stubs are no longer callable.
    #[error("rpc connection destroyed")]
    Destroyed,

    /// No stub is installed for the requested remote method.
    #[error("unknown remote method: {0}")]
    UnknownMethod(String),

    /// Stub arguments could not be marshaled.
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// An envelope could not be parsed or serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response arrived for an id with no outstanding call.
    #[error("response for unknown call id {0}")]
    UnknownResponse(String),

    /// The remote side answered with an error object.
    #[error("remote error {}: {}", .0.code, .0.message)]
    Remote(ErrorObject),
}

pub type Result<T> = std::result::Result<T, RpcError>;
