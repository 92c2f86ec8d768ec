use crate::channel::ChannelId;

/// Separates the channel id from the payload.
pub const SEPARATOR: char = ' ';

/// Suffix of the handshake sentinel sent by the responder.
pub const READY_SUFFIX: &str = "-ready";

/// Encode a payload for `channel`.
///
/// Wire format:
/// ```text
/// <channel id> ' ' <payload>
/// ```
pub fn encode_frame(channel: &ChannelId, payload: &str) -> String {
    format!("{}{SEPARATOR}{payload}", channel.as_str())
}

/// Extract the payload of a frame addressed to `channel`.
///
/// Returns `None` unless `raw` starts with exactly `<channel><separator>`.
pub fn decode_frame<'a>(channel: &ChannelId, raw: &'a str) -> Option<&'a str> {
    raw.strip_prefix(channel.as_str())?.strip_prefix(SEPARATOR)
}

/// The handshake message announcing that the responder is listening.
pub fn ready_sentinel(channel: &ChannelId) -> String {
    format!("{}{READY_SUFFIX}", channel.as_str())
}
