/// Errors that can occur in transport and origin handling.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A URL argument was missing or empty.
    #[error("url is undefined or empty")]
    EmptyUrl,

    /// The URL uses a scheme that cannot carry cross-context messages.
    #[error("the {0}:// protocol is not supported")]
    UnsupportedScheme(String),

    /// A URL could not be parsed or resolved.
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The browsing context has been closed.
    #[error("browsing context closed: {0}")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
