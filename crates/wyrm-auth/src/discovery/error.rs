//! Client discovery errors.

/// Errors that can occur while resolving a client id.
///
/// Every variant means the same thing to the protocol layer: the client is
/// unknown. The detail is kept for logs.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The client id is not an absolute URL.
    #[error("Invalid client id: {0}")]
    InvalidClientId(String),

    /// The client id scheme is not allowed.
    #[error("Invalid URL scheme: {0} (only HTTPS is allowed)")]
    InvalidScheme(String),

    /// The client id points at a loopback host.
    #[error("Loopback host not allowed: {0}")]
    LoopbackHost(String),

    /// A network error occurred while fetching the document.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The fetch did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The document was served with a status other than 200.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The document exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },

    /// The document has no `h-app` entry.
    #[error("No h-app entry found")]
    MissingApp,

    /// The `h-app` entry or the document lacks a required value.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The document could not be parsed.
    #[error("Failed to parse client document: {0}")]
    ParseError(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl DiscoveryError {
    /// Returns `true` if the client id itself was refused before any fetch.
    #[must_use]
    pub fn is_refused_target(&self) -> bool {
        matches!(
            self,
            Self::InvalidClientId(_) | Self::InvalidScheme(_) | Self::LoopbackHost(_)
        )
    }

    /// Returns `true` if the failure came from the network or remote server.
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::Timeout
                | Self::HttpError(_)
                | Self::ResponseTooLarge { .. }
        )
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}
