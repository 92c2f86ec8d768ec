/// Errors that can occur while setting up a connection.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xdm_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xdm_frame::FrameError),

    /// RPC-level error.
    #[error("rpc error: {0}")]
    Rpc(#[from] xdm_rpc::RpcError),

    /// The host side was configured without a remote location.
    #[error("configuration is missing a remote location")]
    MissingRemote,

    /// The host side was configured without a container for the frame.
    #[error("configuration is missing a container for the hosted frame")]
    MissingContainer,

    /// A connection parameter is absent from the guest's location.
    #[error("location is missing the {0} parameter")]
    MissingParameter(&'static str),

    /// The guest context has no embedder to talk to.
    #[error("context has no parent to connect to")]
    NoParent,

    /// The embedder's origin is not in the access control list.
    #[error("access denied for {0}")]
    AccessDenied(String),

    /// An access control pattern is not a valid regular expression.
    #[error("invalid acl pattern {pattern:?}: {source}")]
    InvalidAcl {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, PeerError>;
