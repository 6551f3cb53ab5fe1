//! DNS resolution for client-id fetches.
//!
//! Host names are resolved by the system resolver, then loopback and
//! unspecified addresses are dropped unless `allow_loopback` is set. This
//! covers names that only resolve to a local address, which
//! [`check_target`](super::check_target) cannot see, and it applies to every
//! redirect hop because the HTTP client resolves each one through here.

use std::net::{IpAddr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use super::error::DiscoveryError;

/// `reqwest` resolver that refuses to connect to local addresses.
#[derive(Debug, Clone, Copy)]
pub struct GuardedResolver {
    allow_loopback: bool,
}

impl GuardedResolver {
    /// Creates a resolver; `allow_loopback` disables the filter.
    #[must_use]
    pub fn new(allow_loopback: bool) -> Self {
        Self { allow_loopback }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let allow_loopback = self.allow_loopback;
        Box::pin(async move {
            let host = name.as_str().to_string();
            // Port 0: the connector fills in the real port.
            let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
            let addrs = filter_addrs(&host, resolved, allow_loopback)?;
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(Box::new(addrs.into_iter()))
        })
    }
}

/// Keeps the addresses a client-id fetch may connect to.
///
/// # Errors
///
/// Returns `LoopbackHost` when nothing remains after filtering.
pub fn filter_addrs(
    host: &str,
    addrs: impl IntoIterator<Item = SocketAddr>,
    allow_loopback: bool,
) -> Result<Vec<SocketAddr>, DiscoveryError> {
    let kept: Vec<SocketAddr> = addrs
        .into_iter()
        .filter(|addr| allow_loopback || !is_local(addr.ip()))
        .collect();

    if kept.is_empty() {
        tracing::debug!(host = %host, "Client id host resolves only to local addresses");
        return Err(DiscoveryError::LoopbackHost(host.to_string()));
    }
    Ok(kept)
}

fn is_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| v4.is_loopback() || v4.is_unspecified())
        }
    }
}
