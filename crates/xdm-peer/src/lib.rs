//! Connection setup for cross-context RPC.
//!
//! This is the "just works" layer. A host page calls [`Rpc::new`] with the
//! provider's location; the provider page, loaded in the hosted frame, calls
//! [`Rpc::new`] as well and finds its connection parameters in its own
//! location. Both ends then get a [`Proxy`](xdm_rpc::Proxy) with stubs for
//! the methods the other side exposes.
//!
//! Each connection runs on its own stack:
//!
//! ```text
//! ready notifier   (on_ready)
//! rpc              (JSON-RPC marshaling)
//! queue            (backpressure, removed once drained)
//! transport        (framing and handshake)
//! ```

pub mod acl;
pub mod config;
pub mod error;
pub mod provision;
pub mod query;
pub mod rpc;

pub use acl::{check_acl, Acl};
pub use config::Config;
pub use error::{PeerError, Result};
pub use provision::{default_props, frame_name, frame_prefix};
pub use query::{Query, PARAM_CHANNEL, PARAM_EMBEDDER, PARAM_PROVIDER};
pub use rpc::Rpc;
