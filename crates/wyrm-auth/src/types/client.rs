//! OAuth client metadata recovered from a client-id document.

use serde::{Deserialize, Serialize};

/// A client application, as described by the document at its client id.
///
/// Clients are never registered locally. Every value here comes from the
/// remote document and is only trusted for the duration of one request
/// (or one cache TTL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// The client identifier: the URL the document was fetched from.
    pub client_id: String,

    /// Home page of the client.
    pub url: String,

    /// Display name (`p-name`).
    pub name: String,

    /// Absolute logo URL (`u-logo`, resolved against the client id).
    pub logo: String,

    /// Short description (`p-summary`).
    pub summary: String,

    /// The single redirect URI the client declares (`rel="redirect_uri"`).
    pub redirect_uri: String,
}

impl Client {
    /// Returns `true` if `redirect_uri` is exactly the declared redirect URI.
    ///
    /// No normalization is applied: a trailing slash or a different case
    /// is a mismatch.
    #[must_use]
    pub fn accepts_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uri == redirect_uri
    }
}
