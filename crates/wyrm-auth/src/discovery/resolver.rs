//! Client id resolution over HTTPS.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use url::{Host, Url};

use crate::config::DiscoveryConfig;
use crate::types::Client;

use super::dns::GuardedResolver;
use super::error::DiscoveryError;
use super::mf2::parse_app_document;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Turns a client id into client metadata.
#[async_trait]
pub trait ClientResolver: Send + Sync {
    /// Resolves `client_id` into a [`Client`].
    ///
    /// # Errors
    ///
    /// Any error means the client is unknown.
    async fn resolve(&self, client_id: &str) -> Result<Client, DiscoveryError>;
}

/// Fetches client-id documents with `reqwest` and reads their `h-app` entry.
pub struct HttpClientResolver {
    http_client: reqwest::Client,
    config: DiscoveryConfig,
}

impl HttpClientResolver {
    /// Creates a resolver with its own HTTP client.
    ///
    /// The client enforces `config.request_timeout` for the whole exchange
    /// and re-checks every redirect hop against the same target rules as the
    /// client id itself. Host names go through [`GuardedResolver`], so a name
    /// pointing at a local address is refused as well.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::Client` if the HTTP client cannot be built.
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let allow_http = config.allow_http;
        let allow_loopback = config.allow_loopback;
        let redirect_policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error(DiscoveryError::NetworkError("too many redirects".to_string()))
            } else if let Err(e) = check_target(attempt.url(), allow_http, allow_loopback) {
                attempt.error(e)
            } else {
                attempt.follow()
            }
        });

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(redirect_policy)
            .dns_resolver(Arc::new(GuardedResolver::new(allow_loopback)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DiscoveryError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Fetches the document body, enforcing the size limit while streaming.
    async fn fetch(&self, url: &Url) -> Result<String, DiscoveryError> {
        let mut response = self
            .http_client
            .get(url.as_str())
            .header("Accept", "text/html")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(DiscoveryError::HttpError(response.status().as_u16()));
        }

        let max_size = self.config.max_response_size;
        if let Some(len) = response.content_length()
            && len as usize > max_size
        {
            return Err(DiscoveryError::ResponseTooLarge { max_size });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > max_size {
                return Err(DiscoveryError::ResponseTooLarge { max_size });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl ClientResolver for HttpClientResolver {
    async fn resolve(&self, client_id: &str) -> Result<Client, DiscoveryError> {
        let url = Url::parse(client_id)
            .map_err(|e| DiscoveryError::InvalidClientId(format!("{client_id}: {e}")))?;
        check_target(&url, self.config.allow_http, self.config.allow_loopback)?;

        tracing::debug!(client_id = %client_id, "Fetching client-id document");
        let body = self.fetch(&url).await?;
        let app = parse_app_document(&body)?;

        let logo = resolve_logo(&url, &app.logo)?;
        let redirect_uri = resolve_reference(&url, &app.redirect_uri)?;

        Ok(Client {
            client_id: client_id.to_string(),
            url: client_id.to_string(),
            name: app.name,
            logo,
            summary: app.summary,
            redirect_uri,
        })
    }
}

/// Refuses client ids the server must never fetch.
///
/// # Errors
///
/// Returns `InvalidScheme` for anything but `https` (or `http` when allowed)
/// and `LoopbackHost` for `localhost` names and loopback or unspecified
/// addresses unless `allow_loopback` is set.
pub fn check_target(url: &Url, allow_http: bool, allow_loopback: bool) -> Result<(), DiscoveryError> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        other => return Err(DiscoveryError::InvalidScheme(other.to_string())),
    }

    if allow_loopback {
        return Ok(());
    }

    let loopback = match url.host() {
        None => return Err(DiscoveryError::InvalidClientId(url.to_string())),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(addr)) => is_loopback_v4(addr),
        Some(Host::Ipv6(addr)) => {
            is_loopback_v6(addr) || addr.to_ipv4_mapped().is_some_and(is_loopback_v4)
        }
    };

    if loopback {
        Err(DiscoveryError::LoopbackHost(url.host_str().unwrap_or_default().to_string()))
    } else {
        Ok(())
    }
}

fn is_loopback_v4(addr: Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified()
}

fn is_loopback_v6(addr: Ipv6Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified()
}

/// Absolute `https://` logos are kept verbatim; anything else is resolved
/// against the client id.
fn resolve_logo(client_id: &Url, logo: &str) -> Result<String, DiscoveryError> {
    if logo.starts_with("https://") {
        return Ok(logo.to_string());
    }
    client_id
        .join(logo)
        .map(String::from)
        .map_err(|e| DiscoveryError::ParseError(format!("logo '{logo}': {e}")))
}

/// Absolute references are kept verbatim so the redirect URI comparison
/// stays an exact string match. Relative ones are resolved.
fn resolve_reference(client_id: &Url, reference: &str) -> Result<String, DiscoveryError> {
    if Url::parse(reference).is_ok() {
        return Ok(reference.to_string());
    }
    client_id
        .join(reference)
        .map(String::from)
        .map_err(|e| DiscoveryError::ParseError(format!("reference '{reference}': {e}")))
}
