use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{trace, warn};
use xdm_stack::Cx;

use crate::error::Result;
use crate::message::{Envelope, ErrorObject};

/// Sends envelopes to the layer below the RPC layer.
#[derive(Clone)]
pub struct Sender {
    cx: Cx,
}

impl Sender {
    pub(crate) fn new(cx: Cx) -> Self {
        Self { cx }
    }

    /// Serialize and send one envelope.
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        let json = envelope.to_json()?;
        self.send_raw(json);
        Ok(())
    }

    /// Send already serialized text.
    pub fn send_raw(&self, message: String) {
        self.cx.forward_outgoing(message, None, None);
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender").field("cx", &self.cx).finish()
    }
}

/// Answers one inbound call.
///
/// Clones share a settled flag, so a request yields at most one reply no
/// matter how many times, or through how many clones, it is answered. Both
/// methods do nothing for notifications.
#[derive(Clone)]
pub struct Reply {
    inner: Rc<ReplyInner>,
}

struct ReplyInner {
    method: String,
    id: Option<Value>,
    settled: Cell<bool>,
    sender: Sender,
}

impl Reply {
    pub(crate) fn new(method: String, id: Option<Value>, sender: Sender) -> Self {
        Self {
            inner: Rc::new(ReplyInner {
                method,
                id,
                settled: Cell::new(false),
                sender,
            }),
        }
    }

    pub fn success(&self, result: Value) {
        self.settle(|id| Envelope::result(id, result));
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>) {
        let error = ErrorObject::application(message, data);
        self.settle(|id| Envelope::error(id, error));
    }

    pub fn is_settled(&self) -> bool {
        self.inner.settled.get()
    }

    pub fn is_notification(&self) -> bool {
        self.inner.id.is_none()
    }

    fn settle(&self, build: impl FnOnce(Value) -> Envelope) {
        let Some(id) = self.inner.id.clone() else {
            return;
        };
        if self.inner.settled.replace(true) {
            trace!(method = %self.inner.method, "call already answered, dropping reply");
            return;
        }
        if let Err(err) = self.inner.sender.send(&build(id)) {
            warn!(method = %self.inner.method, error = %err, "failed to send reply");
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("method", &self.inner.method)
            .field("id", &self.inner.id)
            .field("settled", &self.inner.settled.get())
            .finish()
    }
}
