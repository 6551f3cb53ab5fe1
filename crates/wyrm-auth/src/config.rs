//! Authorization server configuration.
//!
//! Every section carries `#[serde(default)]` so a partial configuration file
//! only needs to name the values it changes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root authorization server configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth.oauth]
/// access_token_lifetime = "1h"
/// revoke_superseded_tokens = false
///
/// [auth.discovery]
/// request_timeout = "5s"
/// cache_ttl = "5m"
///
/// [auth.scopes]
/// "shelves" = "Read access to your shelves."
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token and code lifetimes.
    pub oauth: OAuthConfig,

    /// Client-id document fetching.
    pub discovery: DiscoveryConfig,

    /// Browser session handling for the authorization endpoint.
    pub session: SessionConfig,

    /// Additional recognized scopes, mapped to their consent description.
    pub scopes: BTreeMap<String, String>,
}

/// OAuth 2.0 lifetimes and token policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// How long an issued authorization code may be redeemed.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Lifetime of issued access tokens (`expires_in`).
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// How long a pending authorization survives between the GET and
    /// the consent POST.
    #[serde(with = "humantime_serde")]
    pub pending_authorization_lifetime: Duration,

    /// Delete the superseded token record when its refresh token is redeemed.
    /// Disabled by default: the old access token stays valid until it expires.
    pub revoke_superseded_tokens: bool,

    /// Interval between sweeps of expired codes and pending authorizations.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            pending_authorization_lifetime: Duration::from_secs(600),
            revoke_superseded_tokens: false,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

/// Client-id document discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Upper bound for a single client-id document fetch.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long a resolved client stays cached. Zero disables caching.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Largest client-id document body accepted, in bytes.
    pub max_response_size: usize,

    /// Accept `http://` client ids. Only for development.
    pub allow_http: bool,

    /// Accept client ids pointing at loopback or `localhost` hosts.
    pub allow_loopback: bool,

    /// User-Agent sent with discovery requests.
    pub user_agent: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(300), // 5 minutes
            max_response_size: 512 * 1024,
            allow_http: false,
            allow_loopback: false,
            user_agent: concat!("wyrm-auth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Authorization endpoint browser session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the pending authorization id.
    pub cookie_name: String,

    /// Mark cookies `Secure`. Disable only for plain-HTTP development.
    pub secure_cookies: bool,

    /// Where unauthenticated users are sent; receives a `next` parameter.
    pub login_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "wyrm_oauth_pending".to_string(),
            secure_cookies: true,
            login_url: "/login".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a lifetime or timeout is zero
    /// or the response size limit is zero, and `ConfigError::Missing` if the
    /// cookie name or login URL is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetimes = [
            (
                "authorization_code_lifetime",
                self.oauth.authorization_code_lifetime,
            ),
            ("access_token_lifetime", self.oauth.access_token_lifetime),
            (
                "pending_authorization_lifetime",
                self.oauth.pending_authorization_lifetime,
            ),
            ("cleanup_interval", self.oauth.cleanup_interval),
            ("discovery.request_timeout", self.discovery.request_timeout),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.discovery.max_response_size == 0 {
            return Err(ConfigError::InvalidValue(
                "discovery.max_response_size must be > 0".to_string(),
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Missing("session.cookie_name".to_string()));
        }

        if self.session.login_url.trim().is_empty() {
            return Err(ConfigError::Missing("session.login_url".to_string()));
        }

        if let Some(name) = self.scopes.keys().find(|s| !is_valid_scope_token(s)) {
            return Err(ConfigError::InvalidValue(format!(
                "scope name '{name}' must be a non-empty token without spaces"
            )));
        }

        Ok(())
    }
}

/// RFC 6749 scope-token: printable ASCII except space, `"` and `\`.
fn is_valid_scope_token(scope: &str) -> bool {
    !scope.is_empty()
        && scope
            .bytes()
            .all(|b| b == 0x21 || (0x23..=0x5B).contains(&b) || (0x5D..=0x7E).contains(&b))
}
