//! Fixtures shared by unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use time::Duration;
use time::macros::datetime;

use crate::clock::{Clock, ManualClock};
use crate::discovery::{ClientResolver, DiscoveryError};
use crate::identity::UserIdentity;
use crate::oauth::authorize::AuthorizationCredentials;
use crate::oauth::code::AuthorizationCode;
use crate::oauth::pkce::PkceChallengeMethod;
use crate::scopes::ScopeSet;
use crate::types::Client;

pub const CLIENT_ID: &str = "https://app.example/id";
pub const REDIRECT_URI: &str = "https://app.example/cb";

/// RFC 7636 Appendix B verifier and its S256 challenge.
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

/// Resolves a fixed set of clients without touching the network.
pub struct StaticResolver {
    clients: HashMap<String, Client>,
}

impl StaticResolver {
    pub fn example() -> Self {
        let client = Client {
            client_id: CLIENT_ID.to_string(),
            url: CLIENT_ID.to_string(),
            name: "Example Reader".to_string(),
            logo: "https://app.example/logo.png".to_string(),
            summary: "Track what you read.".to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
        };
        Self {
            clients: HashMap::from([(CLIENT_ID.to_string(), client)]),
        }
    }
}

#[async_trait]
impl ClientResolver for StaticResolver {
    async fn resolve(&self, client_id: &str) -> Result<Client, DiscoveryError> {
        self.clients
            .get(client_id)
            .cloned()
            .ok_or(DiscoveryError::HttpError(404))
    }
}

pub fn test_clock() -> ManualClock {
    ManualClock::new(datetime!(2024-05-01 09:00 UTC))
}

pub fn alice() -> UserIdentity {
    UserIdentity::new("1", "alice")
}

pub fn credentials() -> AuthorizationCredentials {
    AuthorizationCredentials {
        client_id: CLIENT_ID.to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        state: Some("xyz".to_string()),
        response_type: "code".to_string(),
        code_challenge: CHALLENGE.to_string(),
        code_challenge_method: PkceChallengeMethod::S256,
    }
}

/// A `user`-scoped code for alice, issued at the clock's current time.
pub fn code_for(clock: &ManualClock) -> AuthorizationCode {
    AuthorizationCode::issue(
        &credentials(),
        ScopeSet::parse("user"),
        alice(),
        clock.now(),
        Duration::minutes(10),
    )
}
