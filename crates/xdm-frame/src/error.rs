/// Errors that can occur when building frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The channel id cannot be used as a frame prefix.
    #[error("invalid channel id '{id}': {reason}")]
    InvalidChannelId { id: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, FrameError>;
