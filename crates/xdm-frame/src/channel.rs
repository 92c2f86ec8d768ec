//! Channel identifiers.
//!
//! A channel id prefixes every frame, so it must be non-empty and free of
//! whitespace. Ids chosen by the initiator default to `default<N>`, where `N`
//! starts at a random offset so that independently loaded copies of this
//! library are unlikely to pick the same ids.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use rand::Rng;

use crate::error::{FrameError, Result};

/// Prefix of generated channel ids.
pub const DEFAULT_PREFIX: &str = "default";

/// Characters stripped from ids received through a location fragment.
const UNSAFE_CHARS: [char; 5] = ['"', '\'', '<', '>', '\\'];

static NEXT_ID: OnceLock<AtomicU32> = OnceLock::new();

/// Identifier of one logical channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    /// Validate an explicit channel id.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(FrameError::InvalidChannelId {
                id,
                reason: "must not be empty",
            });
        }
        if id.chars().any(char::is_whitespace) {
            return Err(FrameError::InvalidChannelId {
                id,
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(id))
    }

    /// Allocate the next `default<N>` id.
    pub fn generate() -> Self {
        let counter =
            NEXT_ID.get_or_init(|| AtomicU32::new(rand::thread_rng().gen_range(0..10_000)));
        let n = counter.fetch_add(1, Ordering::Relaxed);
        Self(format!("{DEFAULT_PREFIX}{n}"))
    }

    /// Validate an id received from the remote side after stripping quote,
    /// angle-bracket and backslash characters.
    pub fn sanitized(raw: &str) -> Result<Self> {
        Self::new(sanitize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remove characters that must never reach markup or script contexts.
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect()
}
