use std::fmt;

use xdm_frame::FrameError;
use xdm_peer::PeerError;
use xdm_rpc::RpcError;
use xdm_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::EmptyUrl
        | TransportError::UnsupportedScheme(_)
        | TransportError::InvalidUrl { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Closed(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidChannelId { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn rpc_error(context: &str, err: RpcError) -> CliError {
    match err {
        RpcError::Json(_) | RpcError::UnknownResponse(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        RpcError::UnknownMethod(_) | RpcError::InvalidArguments(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        RpcError::Destroyed | RpcError::Remote(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Rpc(err) => rpc_error(context, err),
        PeerError::AccessDenied(_) => CliError::new(PERMISSION_DENIED, format!("{context}: {err}")),
        PeerError::InvalidAcl { .. }
        | PeerError::MissingRemote
        | PeerError::MissingContainer
        | PeerError::MissingParameter(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PeerError::NoParent => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_errors_map_to_exit_codes() {
        assert_eq!(
            peer_error("acl", PeerError::AccessDenied("http://evil.test".into())).code,
            PERMISSION_DENIED
        );
        assert_eq!(peer_error("setup", PeerError::MissingContainer).code, USAGE);
        assert_eq!(
            peer_error("setup", PeerError::Transport(TransportError::Closed("x".into()))).code,
            TRANSPORT_ERROR
        );
        assert_eq!(rpc_error("call", RpcError::Destroyed).code, FAILURE);
    }

    #[test]
    fn message_carries_context() {
        let err = frame_error(
            "encode",
            FrameError::InvalidChannelId {
                id: "a b".into(),
                reason: "must not contain whitespace",
            },
        );
        assert!(err.to_string().starts_with("encode: "));
    }
}
