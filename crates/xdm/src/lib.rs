//! Cross-context JSON-RPC between a host page and a hosted frame.
//!
//! xdm turns a string-only, best-effort message channel between two browsing
//! contexts into an ordered, backpressured, bidirectional JSON-RPC connection.
//!
//! # Crate Structure
//!
//! - [`transport`]: Raw channel traits, event loop, in-memory windows, origin helpers
//! - [`stack`]: Layer chain and backpressure queue
//! - [`frame`]: Channel-prefixed framing and the readiness handshake
//! - [`rpc`]: JSON-RPC marshaling, proxies and stubs
//! - [`peer`]: Connection setup for host and guest (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use xdm_transport::*;
}

/// Re-export stack types.
pub mod stack {
    pub use xdm_stack::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xdm_frame::*;
}

/// Re-export rpc types.
pub mod rpc {
    pub use xdm_rpc::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use xdm_peer::*;
}

#[cfg(feature = "peer")]
pub use xdm_peer::{Config, Rpc};
pub use xdm_rpc::{Interface, Outcome, Proxy, Reply, Stub};
