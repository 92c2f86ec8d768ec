use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};
use xdm_stack::{Cx, Layer};

use crate::error::{Result, RpcError};
use crate::interface::{ErrorSink, Handler, Interface, Outcome, RawHook, RemoteMethod};
use crate::message::{Call, Envelope, ErrorObject, Response};
use crate::proxy::{Proxy, Stub};
use crate::reply::{Reply, Sender};

pub(crate) type SuccessFn = Box<dyn FnOnce(Value)>;
pub(crate) type ErrorFn = Box<dyn FnOnce(ErrorObject)>;

struct PendingCall {
    method: String,
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

pub(crate) struct RpcShared {
    counter: Cell<u64>,
    pending: RefCell<HashMap<u64, PendingCall>>,
    cx: RefCell<Option<Cx>>,
    local: BTreeMap<String, Handler>,
    remote: BTreeMap<String, RemoteMethod>,
    raw_hook: Option<RawHook>,
    on_error: Option<ErrorSink>,
    proxy: Proxy,
    destroyed: Cell<bool>,
}

/// JSON-RPC layer: marshals stub invocations into envelopes, correlates
/// responses with outstanding calls and dispatches inbound calls to the local
/// method table.
///
/// Sits above the queue and consumes every inbound message; nothing travels
/// further up except readiness callbacks.
#[derive(Clone)]
pub struct RpcBehavior {
    shared: Rc<RpcShared>,
}

impl RpcBehavior {
    pub fn new(interface: Interface) -> Self {
        let Interface {
            local,
            remote,
            raw_hook,
            on_error,
        } = interface;
        Self {
            shared: Rc::new(RpcShared {
                counter: Cell::new(0),
                pending: RefCell::new(HashMap::new()),
                cx: RefCell::new(None),
                local,
                remote,
                raw_hook,
                on_error,
                proxy: Proxy::default(),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// The proxy whose stubs call the remote side. Empty until the stack is
    /// initialized.
    pub fn proxy(&self) -> Proxy {
        self.shared.proxy.clone()
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.borrow().len()
    }
}

impl RpcShared {
    pub(crate) fn call(
        &self,
        method: &str,
        params: Value,
        on_success: Option<SuccessFn>,
        on_error: Option<ErrorFn>,
    ) -> Result<()> {
        if self.destroyed.get() {
            return Err(RpcError::Destroyed);
        }
        let Some(cx) = self.cx.borrow().clone() else {
            return Err(RpcError::Destroyed);
        };

        if on_success.is_none() && on_error.is_none() {
            let json = Envelope::notification(method, params).to_json()?;
            trace!(method, "sending notification");
            cx.forward_outgoing(json, None, None);
            return Ok(());
        }

        let id = self.counter.get() + 1;
        let json = Envelope::request(method, params, id).to_json()?;
        self.counter.set(id);
        self.pending.borrow_mut().insert(
            id,
            PendingCall {
                method: method.to_string(),
                on_success,
                on_error,
            },
        );
        trace!(method, id, "sending request");
        cx.forward_outgoing(json, None, None);
        Ok(())
    }

    fn handle_incoming(&self, cx: &Cx, message: &str, origin: &str) {
        if self.destroyed.get() {
            return;
        }
        match Envelope::parse(message) {
            Ok(Envelope::Call(call)) => self.dispatch_call(cx, call, origin),
            Ok(Envelope::Response(response)) => self.resolve(response),
            Err(err) => self.report(err),
        }
    }

    fn dispatch_call(&self, cx: &Cx, call: Call, origin: &str) {
        let sender = Sender::new(cx.clone());
        if let Some(hook) = &self.raw_hook {
            hook(&call, &sender);
            return;
        }

        let Some(handler) = self.local.get(&call.method).cloned() else {
            match call.id {
                Some(id) => {
                    debug!(method = %call.method, origin, "call to unknown method");
                    if let Err(err) = sender.send(&Envelope::error(id, ErrorObject::method_not_found())) {
                        warn!(error = %err, "failed to send method-not-found reply");
                    }
                }
                None => trace!(method = %call.method, "dropping notification for unknown method"),
            }
            return;
        };

        let params = call.params_list();
        let reply = Reply::new(call.method.clone(), call.id, sender);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(params, reply.clone())))
            .unwrap_or_else(|payload| Outcome::Threw(panic_message(payload.as_ref())));

        match outcome {
            Outcome::Return(value) => reply.success(value),
            Outcome::Deferred => {}
            Outcome::Threw(message) => {
                warn!(method = %call.method, error = %message, "local method failed");
                reply.error(message, None);
            }
        }
    }

    fn resolve(&self, response: Response) {
        let pending = response
            .id
            .as_u64()
            .and_then(|id| self.pending.borrow_mut().remove(&id));
        let Some(pending) = pending else {
            self.report(RpcError::UnknownResponse(response.id.to_string()));
            return;
        };

        match response.outcome {
            Ok(result) => match pending.on_success {
                Some(on_success) => on_success(result),
                None => trace!(method = %pending.method, "result without success continuation"),
            },
            Err(error) => match pending.on_error {
                Some(on_error) => on_error(error),
                None => debug!(
                    method = %pending.method,
                    code = error.code,
                    "error reply absorbed, no error continuation"
                ),
            },
        }
    }

    fn report(&self, err: RpcError) {
        warn!(error = %err, "rpc protocol violation");
        if let Some(sink) = &self.on_error {
            sink(&err);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "local method panicked".to_string()
    }
}

impl Layer for RpcBehavior {
    fn name(&self) -> &'static str {
        "rpc"
    }

    fn init(&self, cx: &Cx) {
        let shared = &self.shared;
        *shared.cx.borrow_mut() = Some(cx.clone());
        for (name, method) in &shared.remote {
            shared
                .proxy
                .install(Stub::new(name, *method, Rc::downgrade(shared)));
        }
        debug!(stubs = shared.remote.len(), local = shared.local.len(), "rpc initialized");
        cx.forward_init();
    }

    fn incoming(&self, cx: &Cx, message: &str, origin: &str) {
        self.shared.handle_incoming(cx, message, origin);
    }

    fn destroy(&self, cx: &Cx) {
        let shared = &self.shared;
        shared.destroyed.set(true);
        shared.proxy.clear();
        shared.cx.borrow_mut().take();
        let abandoned = std::mem::take(&mut *shared.pending.borrow_mut());
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "abandoning pending calls");
        }
        drop(abandoned);
        cx.forward_destroy();
    }
}
