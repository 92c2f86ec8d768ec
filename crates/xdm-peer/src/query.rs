use std::collections::BTreeMap;

use xdm_frame::channel::sanitize;
use xdm_transport::parse_query;

/// Fragment parameter carrying the embedder's origin.
pub const PARAM_EMBEDDER: &str = "xdm_e";
/// Fragment parameter carrying the channel id.
pub const PARAM_CHANNEL: &str = "xdm_c";
/// Fragment parameter marking the context as a hosted provider.
pub const PARAM_PROVIDER: &str = "xdm_p";

/// Connection parameters found in a context's location fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, String>,
}

impl Query {
    pub fn from_location(location: &str) -> Self {
        Self {
            params: parse_query(location),
        }
    }

    /// Whether this context was opened by a host as a provider frame.
    pub fn is_provider(&self) -> bool {
        self.params.contains_key(PARAM_PROVIDER)
    }

    /// The embedder's origin, sanitized.
    pub fn embedder(&self) -> Option<String> {
        self.params.get(PARAM_EMBEDDER).map(|value| sanitize(value))
    }

    /// The raw channel id.
    pub fn channel(&self) -> Option<&str> {
        self.params.get(PARAM_CHANNEL).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
