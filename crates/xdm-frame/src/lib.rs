//! Channel-prefixed message framing and the connection handshake.
//!
//! Every application payload travels as `<channel id><space><payload>`, so
//! several independent channels can share one raw transport. Before framing
//! starts, the two ends run a one-message handshake: the responder announces
//! itself with `<channel id>-ready`, and the initiator only starts exchanging
//! frames once it has seen that sentinel from the expected origin.

pub mod channel;
pub mod codec;
pub mod error;
pub mod transport;

pub use channel::ChannelId;
pub use codec::{decode_frame, encode_frame, ready_sentinel, READY_SUFFIX, SEPARATOR};
pub use error::{FrameError, Result};
pub use transport::{PostMessageTransport, Role};
