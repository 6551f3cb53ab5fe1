//! Client metadata discovery.
//!
//! Clients are not registered with the server. A client id is an HTTPS URL
//! whose document carries a microformats2 `h-app` entry (name, logo,
//! summary) and a `rel="redirect_uri"` link. This module provides:
//!
//! - [`ClientResolver`] - the lookup seam used by the request validator
//! - [`HttpClientResolver`] - fetches and parses client-id documents
//! - [`CachedClientResolver`] - TTL cache keyed by client id
//! - [`DiscoveryError`] - why a client id could not be resolved
//!
//! # Security Considerations
//!
//! - Only HTTPS client ids are fetched unless `allow_http` is set
//! - Loopback hosts are refused unless `allow_loopback` is set, including on
//!   redirect hops and names that only resolve to local addresses
//! - Every fetch is bounded by a timeout and a response size limit

mod cache;
mod dns;
mod error;
pub mod mf2;
mod resolver;

pub use cache::CachedClientResolver;
pub use dns::{GuardedResolver, filter_addrs};
pub use error::DiscoveryError;
pub use resolver::{ClientResolver, HttpClientResolver, check_target};
