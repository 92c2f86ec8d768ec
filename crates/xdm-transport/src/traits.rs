use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;

use crate::error::Result;
use crate::event_loop::EventLoop;

/// Payload carried by a single message event.
///
/// The channel itself is not restricted to strings; layers above decide what
/// they accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageData {
    Text(String),
    Binary(Bytes),
}

impl MessageData {
    /// The payload as text, if it is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageData::Text(text) => Some(text),
            MessageData::Binary(_) => None,
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            MessageData::Text(text) => text.len(),
            MessageData::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for MessageData {
    fn from(value: &str) -> Self {
        MessageData::Text(value.to_string())
    }
}

impl From<String> for MessageData {
    fn from(value: String) -> Self {
        MessageData::Text(value)
    }
}

impl From<Bytes> for MessageData {
    fn from(value: Bytes) -> Self {
        MessageData::Binary(value)
    }
}

/// A message as observed by a listener on the receiving context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// The message payload.
    pub data: MessageData,
    /// Origin of the sending context, as reported by the channel.
    pub origin: String,
}

/// Callback registered for inbound messages.
pub type Listener = Rc<dyn Fn(&MessageEvent)>;

/// Handle returned by [`RawChannel::listen`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The raw cross-context message primitive.
///
/// Delivery is best-effort: a send may be silently dropped (closed target,
/// origin mismatch) and nothing is reported back to the sender.
pub trait RawChannel {
    /// Post a string payload to the remote context.
    ///
    /// `target_origin` restricts delivery to a remote context with that
    /// origin; `"*"` means any origin.
    fn send(&self, payload: &str, target_origin: &str);

    /// Register a listener for messages arriving at the local context.
    fn listen(&self, listener: Listener) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);

    /// Release the remote endpoint, if this side owns it.
    fn close(&self) {}
}

/// Called with the hosted frame's context once it has loaded.
pub type LoadHook = Rc<dyn Fn(&dyn BrowsingContext)>;

/// Request to provision a hosted frame.
#[derive(Clone, Default)]
pub struct FrameSpec {
    /// Location to load, including the connection parameters.
    pub url: String,
    /// Element name and id of the frame.
    pub name: String,
    /// Identifier of the element the frame is inserted into.
    pub container: String,
    /// Presentation properties applied to the frame element.
    pub props: BTreeMap<String, String>,
    /// Invoked once the hosted frame has finished loading.
    pub on_load: Option<LoadHook>,
}

impl fmt::Debug for FrameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSpec")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("container", &self.container)
            .field("props", &self.props)
            .field("on_load", &self.on_load.is_some())
            .finish()
    }
}

/// A browsing context that can host frames or talk to its embedder.
pub trait BrowsingContext {
    /// Full location of this context, including any fragment.
    fn location(&self) -> String;

    /// Scheduler shared by everything living in this context.
    fn event_loop(&self) -> EventLoop;

    /// Create a hosted frame and return a channel to it.
    fn open_frame(&self, spec: FrameSpec) -> Result<Box<dyn RawChannel>>;

    /// Channel to the embedding context, if this context is hosted.
    fn parent(&self) -> Option<Box<dyn RawChannel>>;
}
