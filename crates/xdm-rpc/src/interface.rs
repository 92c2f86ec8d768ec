use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::RpcError;
use crate::message::Call;
use crate::reply::{Reply, Sender};

/// Result of running a local method.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Reply with this value.
    Return(Value),
    /// The method answers (or already answered) through its [`Reply`].
    Deferred,
    /// The method failed; reply with an application error carrying this message.
    Threw(String),
}

impl<E: fmt::Display> From<std::result::Result<Value, E>> for Outcome {
    fn from(result: std::result::Result<Value, E>) -> Self {
        match result {
            Ok(value) => Self::Return(value),
            Err(err) => Self::Threw(err.to_string()),
        }
    }
}

/// Implementation of a locally exposed method. Receives the positional
/// parameters and the reply handle for this call.
pub type Handler = Rc<dyn Fn(Vec<Value>, Reply) -> Outcome>;

/// Takes over inbound call dispatch entirely.
pub type RawHook = Rc<dyn Fn(&Call, &Sender)>;

/// Receives protocol violations detected by the RPC layer.
pub type ErrorSink = Rc<dyn Fn(&RpcError)>;

/// How a remote method expects its parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteMethod {
    /// Send a single argument as the bare `params` value instead of a
    /// one-element list.
    pub named_params: bool,
}

/// Methods exposed to and expected from the other side of a connection.
#[derive(Clone, Default)]
pub struct Interface {
    pub local: BTreeMap<String, Handler>,
    pub remote: BTreeMap<String, RemoteMethod>,
    pub raw_hook: Option<RawHook>,
    pub on_error: Option<ErrorSink>,
}

impl Interface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a local method.
    pub fn with_local(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(Vec<Value>, Reply) -> Outcome + 'static,
    ) -> Self {
        self.local.insert(name.into(), Rc::new(handler));
        self
    }

    /// Declare a remote method taking positional parameters.
    pub fn with_remote(self, name: impl Into<String>) -> Self {
        self.with_remote_method(name, RemoteMethod::default())
    }

    /// Declare a remote method with explicit marshaling options.
    pub fn with_remote_method(mut self, name: impl Into<String>, method: RemoteMethod) -> Self {
        self.remote.insert(name.into(), method);
        self
    }

    /// Route every inbound call to `hook` instead of the local method table.
    pub fn with_raw_hook(mut self, hook: impl Fn(&Call, &Sender) + 'static) -> Self {
        self.raw_hook = Some(Rc::new(hook));
        self
    }

    /// Report protocol violations to `sink`.
    pub fn with_error_sink(mut self, sink: impl Fn(&RpcError) + 'static) -> Self {
        self.on_error = Some(Rc::new(sink));
        self
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("local", &self.local.keys().collect::<Vec<_>>())
            .field("remote", &self.remote)
            .field("raw_hook", &self.raw_hook.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
