//! JSON-RPC 2.0 over a communication stack.
//!
//! [`RpcBehavior`] is the layer that turns a framed, ordered message pipe into
//! remote procedure calls. The application describes what it exposes and what
//! it expects from the other side with an [`Interface`], then calls the remote
//! side through the [`Proxy`] and its generated [`Stub`]s.
//!
//! ```no_run
//! use serde_json::json;
//! use xdm_rpc::{Interface, Outcome, RpcBehavior};
//!
//! let interface = Interface::new()
//!     .with_local("echo", |params, _reply| {
//!         Outcome::Return(params.into_iter().next().unwrap_or_default())
//!     })
//!     .with_remote("add");
//! let rpc = RpcBehavior::new(interface);
//! let proxy = rpc.proxy();
//! // ... chain `rpc` into a stack and initialize it, then:
//! proxy.call("add", vec![json!(2), json!(3)], |sum| println!("{sum}"))?;
//! # Ok::<(), xdm_rpc::RpcError>(())
//! ```

pub mod behavior;
pub mod error;
pub mod interface;
pub mod message;
pub mod proxy;
pub mod reply;

pub use behavior::RpcBehavior;
pub use error::{Result, RpcError};
pub use interface::{ErrorSink, Handler, Interface, Outcome, RawHook, RemoteMethod};
pub use message::{
    Call, Envelope, ErrorObject, Response, APPLICATION_ERROR, JSONRPC_VERSION, METHOD_NOT_FOUND,
};
pub use proxy::{Arg, Proxy, Stub};
pub use reply::{Reply, Sender};
