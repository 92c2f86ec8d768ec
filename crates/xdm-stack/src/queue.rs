use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::stack::{Ack, Cx, Layer};

struct Entry {
    payload: String,
    origin: Option<String>,
    on_complete: Option<Ack>,
}

struct QueueState {
    entries: RefCell<VecDeque<Entry>>,
    // Starts true: nothing leaves before the layer below reports ready.
    awaiting_ack: Cell<bool>,
    tearing_down: Cell<bool>,
    remove_when_empty: bool,
}

/// Backpressure layer: buffers outgoing messages and keeps at most one in
/// flight.
///
/// Messages reach the layer below in submission order, one at a time, and
/// their completions fire in the same order on later turns. Clones share the
/// same queue, which lets callers observe it after handing one clone to a
/// [`Stack`](crate::Stack).
#[derive(Clone)]
pub struct Queue {
    state: Rc<QueueState>,
}

impl Queue {
    /// Create a queue. With `remove_when_empty`, the queue splices itself out
    /// of the chain the first time it drains after the layer below is ready.
    pub fn new(remove_when_empty: bool) -> Self {
        Self {
            state: Rc::new(QueueState {
                entries: RefCell::new(VecDeque::new()),
                awaiting_ack: Cell::new(true),
                tearing_down: Cell::new(false),
                remove_when_empty,
            }),
        }
    }

    /// Number of messages waiting to be sent.
    pub fn len(&self) -> usize {
        self.state.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a send is in flight or the layer below is not ready yet.
    pub fn is_awaiting_ack(&self) -> bool {
        self.state.awaiting_ack.get()
    }
}

impl QueueState {
    fn dispatch(self: &Rc<Self>, cx: &Cx) {
        if self.remove_when_empty && self.entries.borrow().is_empty() {
            if cx.is_linked() {
                debug!("queue drained, removing from stack");
                cx.remove_self();
            }
            return;
        }
        if self.awaiting_ack.get() || self.tearing_down.get() {
            return;
        }
        let Some(entry) = self.entries.borrow_mut().pop_front() else {
            return;
        };

        self.awaiting_ack.set(true);
        let state = Rc::clone(self);
        let queue_cx = cx.clone();
        let on_complete = entry.on_complete;
        let completion: Ack = Box::new(move |success| {
            state.awaiting_ack.set(false);
            if let Some(on_complete) = on_complete {
                queue_cx.defer(move || on_complete(success));
            }
            state.dispatch(&queue_cx);
        });

        trace!(size = entry.payload.len(), "queue dispatching message");
        cx.forward_outgoing(entry.payload, entry.origin, Some(completion));
    }
}

impl Layer for Queue {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn outgoing(&self, cx: &Cx, message: String, origin: Option<String>, ack: Option<Ack>) {
        self.state.entries.borrow_mut().push_back(Entry {
            payload: message,
            origin,
            on_complete: ack,
        });
        self.state.dispatch(cx);
    }

    fn callback(&self, cx: &Cx, success: bool) {
        self.state.awaiting_ack.set(false);
        // Dispatch may detach this layer; keep the current upper neighbor.
        let up = cx.up();
        self.state.dispatch(cx);
        if let Some(up) = up {
            up.callback(success);
        }
    }

    fn destroy(&self, cx: &Cx) {
        self.state.tearing_down.set(true);
        let dropped = std::mem::take(&mut *self.state.entries.borrow_mut());
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "discarding queued messages");
        }
        cx.forward_destroy();
    }
}
