use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};
use xdm_stack::{Ack, Cx, Layer};
use xdm_transport::{normalize_location, ListenerId, MessageEvent, RawChannel};

use crate::channel::ChannelId;
use crate::codec::{decode_frame, encode_frame, ready_sentinel};

/// Which end of the channel this transport is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Opened the channel (hosts the frame) and waits for the ready sentinel.
    Initiator,
    /// Runs inside the opened context and announces readiness.
    Responder,
}

struct TransportState {
    role: Role,
    channel: ChannelId,
    remote_origin: String,
    port: Box<dyn RawChannel>,
    listener: Cell<Option<ListenerId>>,
    accepted_origin: RefCell<Option<String>>,
    ready: Cell<bool>,
    destroyed: Cell<bool>,
}

/// Bottom layer of a stack: frames payloads onto a [`RawChannel`] and runs the
/// readiness handshake.
///
/// Inbound messages are delivered upward only if they are strings, come from
/// the origin recorded during the handshake and carry this channel's prefix.
/// Everything else is dropped silently.
pub struct PostMessageTransport {
    state: Rc<TransportState>,
}

impl PostMessageTransport {
    /// `remote_origin` is the normalized origin of the other end.
    pub fn new(
        role: Role,
        channel: ChannelId,
        remote_origin: impl Into<String>,
        port: Box<dyn RawChannel>,
    ) -> Self {
        Self {
            state: Rc::new(TransportState {
                role,
                channel,
                remote_origin: remote_origin.into(),
                port,
                listener: Cell::new(None),
                accepted_origin: RefCell::new(None),
                ready: Cell::new(false),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn channel(&self) -> &ChannelId {
        &self.state.channel
    }
}

impl TransportState {
    fn replace_listener(
        self: &Rc<Self>,
        cx: &Cx,
        handler: fn(&Rc<TransportState>, &Cx, &MessageEvent),
    ) {
        if let Some(previous) = self.listener.take() {
            self.port.unlisten(previous);
        }
        // Listeners hold the state weakly: the port owns them.
        let state: Weak<TransportState> = Rc::downgrade(self);
        let cx = cx.clone();
        let id = self.port.listen(Rc::new(move |event: &MessageEvent| {
            if let Some(state) = state.upgrade() {
                handler(&state, &cx, event);
            }
        }));
        self.listener.set(Some(id));
    }

    fn on_handshake(self: &Rc<Self>, cx: &Cx, event: &MessageEvent) {
        if self.destroyed.get() || self.ready.get() {
            return;
        }
        let sentinel = ready_sentinel(&self.channel);
        if event.data.as_text() != Some(sentinel.as_str()) {
            return;
        }
        match normalize_location(&event.origin) {
            Ok(origin) if origin == self.remote_origin => {
                debug!(channel = %self.channel, %origin, "handshake complete");
                self.replace_listener(cx, TransportState::on_frame);
                self.become_ready(cx, origin);
            }
            _ => trace!(
                channel = %self.channel,
                origin = %event.origin,
                "ignoring ready sentinel from unexpected origin"
            ),
        }
    }

    fn on_frame(self: &Rc<Self>, cx: &Cx, event: &MessageEvent) {
        let Some(raw) = event.data.as_text() else {
            trace!(channel = %self.channel, size = event.data.len(), "dropping non-string message");
            return;
        };
        let Ok(origin) = normalize_location(&event.origin) else {
            trace!(channel = %self.channel, origin = %event.origin, "dropping message with invalid origin");
            return;
        };
        let accepted = self.accepted_origin.borrow().clone();
        if accepted.as_deref() != Some(origin.as_str()) {
            trace!(channel = %self.channel, %origin, size = event.data.len(), "dropping message from foreign origin");
            return;
        }
        let Some(payload) = decode_frame(&self.channel, raw) else {
            trace!(channel = %self.channel, size = event.data.len(), "dropping message for another channel");
            return;
        };
        cx.forward_incoming(payload, &origin);
    }

    fn become_ready(&self, cx: &Cx, origin: String) {
        *self.accepted_origin.borrow_mut() = Some(origin);
        self.ready.set(true);
        let notify = cx.clone();
        cx.defer(move || notify.forward_callback(true));
    }
}

impl Layer for PostMessageTransport {
    fn name(&self) -> &'static str {
        "transport"
    }

    fn init(&self, cx: &Cx) {
        let state = &self.state;
        match state.role {
            Role::Responder => {
                state.replace_listener(cx, TransportState::on_frame);
                state
                    .port
                    .send(&ready_sentinel(&state.channel), &state.remote_origin);
                debug!(channel = %state.channel, remote = %state.remote_origin, "announced ready");
                state.become_ready(cx, state.remote_origin.clone());
            }
            Role::Initiator => {
                debug!(channel = %state.channel, remote = %state.remote_origin, "waiting for ready");
                state.replace_listener(cx, TransportState::on_handshake);
            }
        }
    }

    fn outgoing(&self, _cx: &Cx, message: String, origin: Option<String>, ack: Option<Ack>) {
        let state = &self.state;
        if !state.ready.get() || state.destroyed.get() {
            debug!(channel = %state.channel, "channel not ready, dropping outgoing message");
            if let Some(ack) = ack {
                ack(false);
            }
            return;
        }

        let target = origin
            .or_else(|| state.accepted_origin.borrow().clone())
            .unwrap_or_else(|| state.remote_origin.clone());
        state
            .port
            .send(&encode_frame(&state.channel, &message), &target);
        if let Some(ack) = ack {
            ack(true);
        }
    }

    // Terminal element of the destroy cascade.
    fn destroy(&self, _cx: &Cx) {
        let state = &self.state;
        if state.destroyed.replace(true) {
            return;
        }
        state.ready.set(false);
        if let Some(id) = state.listener.take() {
            state.port.unlisten(id);
        }
        state.port.close();
        debug!(channel = %state.channel, "transport destroyed");
    }
}

impl fmt::Debug for PostMessageTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostMessageTransport")
            .field("role", &self.state.role)
            .field("channel", &self.state.channel)
            .field("remote_origin", &self.state.remote_origin)
            .field("ready", &self.state.ready.get())
            .finish()
    }
}
