use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::behavior::{ErrorFn, RpcShared, SuccessFn};
use crate::error::{Result, RpcError};
use crate::interface::RemoteMethod;
use crate::message::ErrorObject;

/// One argument of a variadic stub invocation.
pub enum Arg {
    Value(Value),
    /// A continuation. Only valid after every value.
    Callback(Box<dyn FnOnce(Value)>),
}

impl Arg {
    pub fn callback(f: impl FnOnce(Value) + 'static) -> Self {
        Self::Callback(Box::new(f))
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Callable handle for one remote method.
///
/// Stays valid only as long as the connection: once it is torn down every
/// invocation fails with [`RpcError::Destroyed`].
#[derive(Clone)]
pub struct Stub {
    name: Rc<str>,
    method: RemoteMethod,
    shared: Weak<RpcShared>,
}

impl Stub {
    pub(crate) fn new(name: &str, method: RemoteMethod, shared: Weak<RpcShared>) -> Self {
        Self {
            name: Rc::from(name),
            method,
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with a variadic argument list.
    ///
    /// Trailing callbacks are continuations: one is the success continuation,
    /// two are `(success, error)`. The error continuation receives the error
    /// object as JSON. Without callbacks the call is sent as a notification.
    pub fn invoke(&self, args: Vec<Arg>) -> Result<()> {
        let mut params = Vec::new();
        let mut continuations = Vec::new();
        for arg in args {
            match arg {
                Arg::Value(value) if continuations.is_empty() => params.push(value),
                Arg::Value(_) => {
                    return Err(RpcError::InvalidArguments(
                        "continuations must follow every parameter",
                    ))
                }
                Arg::Callback(f) => continuations.push(f),
            }
        }
        if continuations.len() > 2 {
            return Err(RpcError::InvalidArguments("at most two continuations"));
        }

        let mut continuations = continuations.into_iter();
        let on_success = continuations.next();
        let on_error = continuations.next().map(|f| -> ErrorFn {
            Box::new(move |error: ErrorObject| f(Value::from(error)))
        });
        self.send(params, on_success, on_error)
    }

    /// Send a notification. No reply is expected or processed.
    pub fn notify(&self, params: Vec<Value>) -> Result<()> {
        self.send(params, None, None)
    }

    /// Send a request; `on_success` receives the result. An error reply is
    /// absorbed.
    pub fn call(&self, params: Vec<Value>, on_success: impl FnOnce(Value) + 'static) -> Result<()> {
        self.send(params, Some(Box::new(on_success)), None)
    }

    /// Send a request with both continuations.
    pub fn call_with_error(
        &self,
        params: Vec<Value>,
        on_success: impl FnOnce(Value) + 'static,
        on_error: impl FnOnce(ErrorObject) + 'static,
    ) -> Result<()> {
        self.send(params, Some(Box::new(on_success)), Some(Box::new(on_error)))
    }

    /// Send a request and wait for its reply.
    ///
    /// The future resolves once the reply is processed, which requires the
    /// event loop driving the connection to run. It fails with
    /// [`RpcError::Remote`] on an error reply and [`RpcError::Destroyed`] when
    /// the connection is torn down first.
    #[cfg(feature = "async")]
    pub fn request(
        &self,
        params: Vec<Value>,
    ) -> impl std::future::Future<Output = Result<Value>> + 'static {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let on_success_tx = Rc::new(RefCell::new(Some(tx)));
        let on_error_tx = Rc::clone(&on_success_tx);

        let sent = self.call_with_error(
            params,
            move |result| {
                if let Some(tx) = on_success_tx.borrow_mut().take() {
                    let _ = tx.send(Ok(result));
                }
            },
            move |error| {
                if let Some(tx) = on_error_tx.borrow_mut().take() {
                    let _ = tx.send(Err(RpcError::Remote(error)));
                }
            },
        );

        async move {
            sent?;
            rx.await.map_err(|_| RpcError::Destroyed)?
        }
    }

    fn send(
        &self,
        params: Vec<Value>,
        on_success: Option<SuccessFn>,
        on_error: Option<ErrorFn>,
    ) -> Result<()> {
        let shared = self.shared.upgrade().ok_or(RpcError::Destroyed)?;
        let params = match (self.method.named_params, params.len()) {
            (true, 1) => params.into_iter().next().unwrap_or(Value::Null),
            _ => Value::Array(params),
        };
        shared.call(&self.name, params, on_success, on_error)
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("name", &self.name)
            .field("method", &self.method)
            .finish()
    }
}

/// The application's view of the remote side: one [`Stub`] per declared
/// remote method.
///
/// Stubs are installed when the connection's stack is initialized and removed
/// when it is destroyed.
#[derive(Clone, Default)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

#[derive(Default)]
struct ProxyInner {
    stubs: RefCell<BTreeMap<String, Stub>>,
    destroyed: Cell<bool>,
}

impl Proxy {
    /// Look up the stub for `name`.
    pub fn stub(&self, name: &str) -> Result<Stub> {
        if self.inner.destroyed.get() {
            return Err(RpcError::Destroyed);
        }
        self.inner
            .stubs
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::UnknownMethod(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.stubs.borrow().contains_key(name)
    }

    /// Names of the installed stubs, sorted.
    pub fn methods(&self) -> Vec<String> {
        self.inner.stubs.borrow().keys().cloned().collect()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Variadic invocation of `name`. See [`Stub::invoke`].
    pub fn invoke(&self, name: &str, args: Vec<Arg>) -> Result<()> {
        self.stub(name)?.invoke(args)
    }

    pub fn notify(&self, name: &str, params: Vec<Value>) -> Result<()> {
        self.stub(name)?.notify(params)
    }

    pub fn call(
        &self,
        name: &str,
        params: Vec<Value>,
        on_success: impl FnOnce(Value) + 'static,
    ) -> Result<()> {
        self.stub(name)?.call(params, on_success)
    }

    pub(crate) fn install(&self, stub: Stub) {
        self.inner
            .stubs
            .borrow_mut()
            .insert(stub.name().to_string(), stub);
    }

    pub(crate) fn clear(&self) {
        self.inner.destroyed.set(true);
        self.inner.stubs.borrow_mut().clear();
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("methods", &self.methods())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
