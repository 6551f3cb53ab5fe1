//! Request validation for the authorization and token endpoints.
//!
//! Each operation answers one question the protocol engine asks at one step
//! of one grant. Outcomes are explicit [`Validation`] results; storage and
//! resolver errors never escape as errors of their own. Lookups fail closed
//! (a store that cannot answer is a record that does not exist), writes
//! surface as [`ValidationFailure::StorageUnavailable`].

use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::discovery::ClientResolver;
use crate::error::AuthError;
use crate::scopes::{ScopeCatalog, ScopeSet};
use crate::storage::{CodeStorage, TokenStorage};
use crate::token::BearerToken;
use crate::types::Client;

use super::code::AuthorizationCode;
use super::pkce::PkceChallengeMethod;
use super::token::GrantType;

/// Result of a validation step.
pub type Validation<T> = Result<T, ValidationFailure>;

/// Why a validation step refused the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The client id could not be resolved.
    UnknownClient,
    /// The redirect URI differs from the client's declared one.
    RedirectUriMismatch,
    /// No scope was requested.
    MissingScope,
    /// A requested scope is not in the catalog.
    UnknownScope(String),
    /// `response_type` is not `code`.
    UnsupportedResponseType(String),
    /// `grant_type` is neither `authorization_code` nor `refresh_token`.
    UnsupportedGrantType(String),
    /// The code does not exist, was already redeemed, or could not be read.
    UnknownCode,
    /// The code exists but is past its expiry.
    ExpiredCode,
    /// The code or refresh token belongs to another client.
    ClientMismatch,
    /// The token does not exist or could not be read.
    UnknownToken,
    /// The access token is past its expiration date.
    ExpiredToken,
    /// The token lacks a required scope.
    InsufficientScope,
    /// A write to the credential store failed.
    StorageUnavailable,
}

impl ValidationFailure {
    /// Returns `true` if the client or its redirect target cannot be trusted.
    #[must_use]
    pub fn is_fatal_client_error(&self) -> bool {
        matches!(self, Self::UnknownClient | Self::RedirectUriMismatch)
    }

    /// Returns the OAuth 2.0 error code for this failure.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        AuthError::from(self.clone()).oauth_error_code()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClient => f.write_str("Client could not be identified"),
            Self::RedirectUriMismatch => f.write_str("Mismatching redirect URI"),
            Self::MissingScope => f.write_str("Missing scope parameter"),
            Self::UnknownScope(scope) => write!(f, "Unknown scope: {scope}"),
            Self::UnsupportedResponseType(value) => {
                write!(f, "Unsupported response type: {value}")
            }
            Self::UnsupportedGrantType(value) => write!(f, "Unsupported grant type: {value}"),
            Self::UnknownCode | Self::ExpiredCode | Self::ClientMismatch => {
                f.write_str("Invalid authorization grant")
            }
            Self::UnknownToken | Self::ExpiredToken => f.write_str("Invalid token"),
            Self::InsufficientScope => f.write_str("Insufficient scope"),
            Self::StorageUnavailable => f.write_str("Credential store unavailable"),
        }
    }
}

impl From<ValidationFailure> for AuthError {
    fn from(failure: ValidationFailure) -> Self {
        let message = failure.to_string();
        match failure {
            ValidationFailure::UnknownClient => AuthError::invalid_client(message),
            ValidationFailure::RedirectUriMismatch => AuthError::invalid_redirect_uri(message),
            ValidationFailure::MissingScope | ValidationFailure::UnknownScope(_) => {
                AuthError::invalid_scope(message)
            }
            ValidationFailure::UnsupportedResponseType(value) => {
                AuthError::unsupported_response_type(value)
            }
            ValidationFailure::UnsupportedGrantType(value) => {
                AuthError::unsupported_grant_type(value)
            }
            ValidationFailure::UnknownCode
            | ValidationFailure::ExpiredCode
            | ValidationFailure::ClientMismatch
            | ValidationFailure::UnknownToken
            | ValidationFailure::ExpiredToken => AuthError::invalid_grant(message),
            ValidationFailure::InsufficientScope => AuthError::access_denied(message),
            ValidationFailure::StorageUnavailable => AuthError::storage(message),
        }
    }
}

/// Validation operations shared by the authorization and token services.
///
/// Cheap to clone; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct RequestValidator {
    resolver: Arc<dyn ClientResolver>,
    codes: Arc<dyn CodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    clock: Arc<dyn Clock>,
    scopes: Arc<ScopeCatalog>,
}

impl RequestValidator {
    /// Creates a validator over the given collaborators.
    pub fn new(
        resolver: Arc<dyn ClientResolver>,
        codes: Arc<dyn CodeStorage>,
        tokens: Arc<dyn TokenStorage>,
        clock: Arc<dyn Clock>,
        scopes: ScopeCatalog,
    ) -> Self {
        Self {
            resolver,
            codes,
            tokens,
            clock,
            scopes: Arc::new(scopes),
        }
    }

    /// The recognized scope catalog.
    #[must_use]
    pub fn scope_catalog(&self) -> &ScopeCatalog {
        &self.scopes
    }

    /// The clock every expiry decision uses.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // -------------------------------------------------------------------------
    // Authorization request checks
    // -------------------------------------------------------------------------

    /// Succeeds iff the client id resolves.
    pub async fn validate_client(&self, client_id: &str) -> Validation<Client> {
        self.resolve(client_id).await
    }

    /// Succeeds iff `redirect_uri` equals the client's declared redirect URI,
    /// compared as exact strings.
    pub async fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> Validation<()> {
        let client = self.resolve(client_id).await?;
        if client.accepts_redirect_uri(redirect_uri) {
            Ok(())
        } else {
            tracing::debug!(client_id = %client_id, "Redirect URI does not match client document");
            Err(ValidationFailure::RedirectUriMismatch)
        }
    }

    /// Succeeds iff at least one scope is requested and every requested
    /// scope is recognized.
    pub fn validate_scopes(&self, requested: &ScopeSet) -> Validation<()> {
        if requested.is_empty() {
            return Err(ValidationFailure::MissingScope);
        }
        match self.scopes.first_unknown(requested) {
            Some(unknown) => Err(ValidationFailure::UnknownScope(unknown.to_string())),
            None => Ok(()),
        }
    }

    /// PKCE is mandatory for every client.
    #[must_use]
    pub fn pkce_required(&self) -> bool {
        true
    }

    /// Succeeds iff `value` is exactly `code`.
    pub fn validate_response_type(&self, value: &str) -> Validation<()> {
        if value == "code" {
            Ok(())
        } else {
            Err(ValidationFailure::UnsupportedResponseType(value.to_string()))
        }
    }

    /// Succeeds iff `value` is `authorization_code` or `refresh_token`.
    pub fn validate_grant_type(&self, value: &str) -> Validation<GrantType> {
        GrantType::parse(value)
            .ok_or_else(|| ValidationFailure::UnsupportedGrantType(value.to_string()))
    }

    // -------------------------------------------------------------------------
    // Token request checks
    // -------------------------------------------------------------------------

    /// Resolves the client presenting a token request. Fails closed.
    pub async fn authenticate_client(&self, client_id: &str) -> Validation<Client> {
        self.resolve(client_id).await
    }

    /// Looks up `code` for `client_id`, recovering user, scopes and PKCE binding.
    pub async fn validate_code(&self, client_id: &str, code: &str) -> Validation<AuthorizationCode> {
        let record = self.find_code(code).await.ok_or(ValidationFailure::UnknownCode)?;
        if record.client_id != client_id {
            tracing::debug!(client_id = %client_id, "Authorization code presented by another client");
            return Err(ValidationFailure::ClientMismatch);
        }
        if record.is_expired(self.clock.now()) {
            return Err(ValidationFailure::ExpiredCode);
        }
        Ok(record)
    }

    /// Returns `true` only if the stored code matches both `client_id` and
    /// `redirect_uri`.
    pub async fn confirm_redirect_uri(&self, client_id: &str, code: &str, redirect_uri: &str) -> bool {
        self.find_code(code)
            .await
            .is_some_and(|record| record.client_id == client_id && record.redirect_uri == redirect_uri)
    }

    /// The PKCE challenge bound to `code`.
    pub async fn get_code_challenge(&self, code: &str) -> Option<String> {
        self.find_code(code).await.map(|record| record.code_challenge)
    }

    /// The PKCE method bound to `code`.
    pub async fn get_code_challenge_method(&self, code: &str) -> Option<PkceChallengeMethod> {
        self.find_code(code)
            .await
            .map(|record| record.code_challenge_method)
    }

    /// Looks up the token record behind `refresh_token` for `client`.
    pub async fn validate_refresh_token(
        &self,
        refresh_token: &str,
        client: &Client,
    ) -> Validation<BearerToken> {
        let record = self
            .find_by_refresh_token(refresh_token)
            .await
            .ok_or(ValidationFailure::UnknownToken)?;
        if record.client_id != client.client_id {
            tracing::debug!(client_id = %client.client_id, "Refresh token presented by another client");
            return Err(ValidationFailure::ClientMismatch);
        }
        Ok(record)
    }

    /// Succeeds iff the access token exists, has not expired, and carries
    /// every scope in `required`. Extra granted scopes are fine.
    pub async fn validate_bearer_token(
        &self,
        access_token: &str,
        required: &ScopeSet,
    ) -> Validation<BearerToken> {
        let record = match self.tokens.find_by_access_token(access_token).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(ValidationFailure::UnknownToken),
            Err(e) => {
                tracing::warn!(error = %e, "Token lookup failed");
                return Err(ValidationFailure::UnknownToken);
            }
        };
        if record.is_expired(self.clock.now()) {
            return Err(ValidationFailure::ExpiredToken);
        }
        if !required.is_subset_of(&record.scope) {
            return Err(ValidationFailure::InsufficientScope);
        }
        Ok(record)
    }

    /// Scopes of the grant behind `refresh_token`.
    pub async fn get_original_scopes(&self, refresh_token: &str) -> Option<ScopeSet> {
        self.find_by_refresh_token(refresh_token)
            .await
            .map(|record| record.scope)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Persists a newly issued authorization code.
    pub async fn save_authorization_code(&self, code: &AuthorizationCode) -> Validation<()> {
        self.codes.save_code(code).await.map_err(|e| {
            tracing::warn!(error = %e, client_id = %code.client_id, "Failed to store authorization code");
            ValidationFailure::StorageUnavailable
        })
    }

    /// Deletes `code` if it still belongs to `client_id`.
    ///
    /// Atomic: of concurrent redemptions of the same code at most one
    /// succeeds, the others get `UnknownCode`.
    pub async fn invalidate_authorization_code(
        &self,
        client_id: &str,
        code: &str,
    ) -> Validation<AuthorizationCode> {
        match self.codes.take_code(code, client_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(ValidationFailure::UnknownCode),
            Err(e) => {
                tracing::warn!(error = %e, client_id = %client_id, "Failed to invalidate authorization code");
                Err(ValidationFailure::UnknownCode)
            }
        }
    }

    /// Persists a newly minted token.
    pub async fn save_bearer_token(&self, token: &BearerToken) -> Validation<()> {
        self.tokens.save_token(token).await.map_err(|e| {
            tracing::warn!(error = %e, client_id = %token.client_id, "Failed to store bearer token");
            ValidationFailure::StorageUnavailable
        })
    }

    /// Deletes a superseded token record.
    pub async fn revoke_bearer_token(&self, access_token: &str) -> Validation<()> {
        self.tokens
            .delete_token(access_token)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to delete superseded token");
                ValidationFailure::StorageUnavailable
            })
    }

    async fn resolve(&self, client_id: &str) -> Validation<Client> {
        self.resolver.resolve(client_id).await.map_err(|e| {
            tracing::info!(client_id = %client_id, error = %e, "Client resolution failed");
            ValidationFailure::UnknownClient
        })
    }

    async fn find_code(&self, code: &str) -> Option<AuthorizationCode> {
        self.codes.find_code(code).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Authorization code lookup failed");
            None
        })
    }

    async fn find_by_refresh_token(&self, refresh_token: &str) -> Option<BearerToken> {
        self.tokens
            .find_by_refresh_token(refresh_token)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Refresh token lookup failed");
                None
            })
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::identity::UserIdentity;
    use crate::storage::MemoryStore;
    use crate::testing::{CLIENT_ID, REDIRECT_URI, StaticResolver, code_for, test_clock};

    fn validator(store: Arc<MemoryStore>, clock: ManualClock) -> RequestValidator {
        RequestValidator::new(
            Arc::new(StaticResolver::example()),
            store.clone(),
            store,
            Arc::new(clock),
            ScopeCatalog::default(),
        )
    }

    fn token(clock: &ManualClock, scope: &str) -> BearerToken {
        BearerToken::issue(
            CLIENT_ID,
            UserIdentity::new("1", "alice"),
            ScopeSet::parse(scope),
            clock.now(),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_validate_client() {
        let validator = validator(Arc::new(MemoryStore::new()), test_clock());

        let client = validator.validate_client(CLIENT_ID).await.unwrap();
        assert_eq!(client.redirect_uri, REDIRECT_URI);
        assert_eq!(
            validator.validate_client("https://unknown.example/").await,
            Err(ValidationFailure::UnknownClient)
        );
        assert_eq!(
            validator.authenticate_client("https://unknown.example/").await,
            Err(ValidationFailure::UnknownClient)
        );
    }

    #[tokio::test]
    async fn test_redirect_uri_is_exact_match() {
        let validator = validator(Arc::new(MemoryStore::new()), test_clock());

        assert!(validator.validate_redirect_uri(CLIENT_ID, REDIRECT_URI).await.is_ok());
        for candidate in [
            "https://app.example/cb/",
            "https://app.example/cb?x=1",
            "https://APP.example/cb",
            "https://evil.example/cb",
        ] {
            assert_eq!(
                validator.validate_redirect_uri(CLIENT_ID, candidate).await,
                Err(ValidationFailure::RedirectUriMismatch),
                "{candidate}"
            );
        }
    }

    #[test]
    fn test_scope_and_type_checks() {
        let validator = validator(Arc::new(MemoryStore::new()), test_clock());

        assert!(validator.validate_scopes(&ScopeSet::parse("user")).is_ok());
        assert_eq!(
            validator.validate_scopes(&ScopeSet::parse("user admin")),
            Err(ValidationFailure::UnknownScope("admin".to_string()))
        );
        assert_eq!(
            validator.validate_scopes(&ScopeSet::parse("  ")),
            Err(ValidationFailure::MissingScope)
        );

        assert!(validator.pkce_required());
        assert!(validator.validate_response_type("code").is_ok());
        assert!(validator.validate_response_type("token").is_err());
        assert_eq!(
            validator.validate_grant_type("refresh_token"),
            Ok(GrantType::RefreshToken)
        );
        assert_eq!(
            validator.validate_grant_type("client_credentials"),
            Err(ValidationFailure::UnsupportedGrantType("client_credentials".to_string()))
        );
    }

    #[tokio::test]
    async fn test_code_lookups() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = validator(store.clone(), clock.clone());
        let code = code_for(&clock);
        validator.save_authorization_code(&code).await.unwrap();

        let record = validator.validate_code(CLIENT_ID, &code.code).await.unwrap();
        assert_eq!(record.user.username, "alice");
        assert_eq!(
            validator.validate_code("https://other.example/id", &code.code).await,
            Err(ValidationFailure::ClientMismatch)
        );
        assert_eq!(
            validator.validate_code(CLIENT_ID, "nope").await,
            Err(ValidationFailure::UnknownCode)
        );

        assert!(validator.confirm_redirect_uri(CLIENT_ID, &code.code, REDIRECT_URI).await);
        assert!(!validator.confirm_redirect_uri(CLIENT_ID, &code.code, "https://app.example/other").await);
        assert!(!validator.confirm_redirect_uri("https://other.example/id", &code.code, REDIRECT_URI).await);

        assert_eq!(
            validator.get_code_challenge(&code.code).await,
            Some(code.code_challenge.clone())
        );
        assert_eq!(
            validator.get_code_challenge_method(&code.code).await,
            Some(PkceChallengeMethod::S256)
        );
        assert_eq!(validator.get_code_challenge("nope").await, None);
        assert_eq!(validator.get_code_challenge_method("nope").await, None);
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = validator(store, clock.clone());
        let code = code_for(&clock);
        validator.save_authorization_code(&code).await.unwrap();

        clock.advance(Duration::minutes(10));
        assert_eq!(
            validator.validate_code(CLIENT_ID, &code.code).await,
            Err(ValidationFailure::ExpiredCode)
        );
    }

    #[tokio::test]
    async fn test_invalidate_code_once() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = validator(store, clock.clone());
        let code = code_for(&clock);
        validator.save_authorization_code(&code).await.unwrap();

        assert!(validator.invalidate_authorization_code(CLIENT_ID, &code.code).await.is_ok());
        assert_eq!(
            validator.invalidate_authorization_code(CLIENT_ID, &code.code).await,
            Err(ValidationFailure::UnknownCode)
        );
        assert_eq!(
            validator.validate_code(CLIENT_ID, &code.code).await,
            Err(ValidationFailure::UnknownCode)
        );
    }

    #[tokio::test]
    async fn test_bearer_token_scope_subset() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = RequestValidator::new(
            Arc::new(StaticResolver::example()),
            store.clone(),
            store,
            Arc::new(clock.clone()),
            ScopeCatalog::default().with_scope("shelves", "Read your shelves."),
        );
        let token = token(&clock, "user shelves");
        validator.save_bearer_token(&token).await.unwrap();

        for required in ["", "user", "shelves", "user shelves"] {
            assert!(
                validator
                    .validate_bearer_token(&token.token, &ScopeSet::parse(required))
                    .await
                    .is_ok(),
                "{required}"
            );
        }
        assert_eq!(
            validator
                .validate_bearer_token(&token.token, &ScopeSet::parse("user admin"))
                .await,
            Err(ValidationFailure::InsufficientScope)
        );
        assert_eq!(
            validator
                .validate_bearer_token("missing", &ScopeSet::default())
                .await,
            Err(ValidationFailure::UnknownToken)
        );
    }

    #[tokio::test]
    async fn test_bearer_token_expiration_boundary() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = validator(store, clock.clone());
        let token = token(&clock, "user");
        validator.save_bearer_token(&token).await.unwrap();

        clock.set(token.expires_at - Duration::seconds(1));
        assert!(
            validator
                .validate_bearer_token(&token.token, &ScopeSet::parse("user"))
                .await
                .is_ok()
        );

        clock.set(token.expires_at);
        assert_eq!(
            validator
                .validate_bearer_token(&token.token, &ScopeSet::parse("user"))
                .await,
            Err(ValidationFailure::ExpiredToken)
        );
    }

    #[tokio::test]
    async fn test_refresh_token_lookups() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = validator(store, clock.clone());
        let token = token(&clock, "user");
        validator.save_bearer_token(&token).await.unwrap();
        let refresh = token.refresh_token.clone().unwrap();

        let client = validator.authenticate_client(CLIENT_ID).await.unwrap();
        let record = validator.validate_refresh_token(&refresh, &client).await.unwrap();
        assert_eq!(record.user.username, "alice");

        let mut other = client.clone();
        other.client_id = "https://other.example/id".to_string();
        assert_eq!(
            validator.validate_refresh_token(&refresh, &other).await,
            Err(ValidationFailure::ClientMismatch)
        );
        assert_eq!(
            validator.validate_refresh_token("nope", &client).await,
            Err(ValidationFailure::UnknownToken)
        );

        assert_eq!(
            validator.get_original_scopes(&refresh).await,
            Some(ScopeSet::parse("user"))
        );
        assert_eq!(validator.get_original_scopes("nope").await, None);
    }

    #[test]
    fn test_failure_mapping() {
        assert!(ValidationFailure::UnknownClient.is_fatal_client_error());
        assert!(ValidationFailure::RedirectUriMismatch.is_fatal_client_error());
        assert!(!ValidationFailure::UnknownCode.is_fatal_client_error());

        assert_eq!(ValidationFailure::UnknownClient.oauth_error_code(), "invalid_client");
        assert_eq!(ValidationFailure::ExpiredCode.oauth_error_code(), "invalid_grant");
        assert_eq!(ValidationFailure::MissingScope.oauth_error_code(), "invalid_scope");
        assert_eq!(
            ValidationFailure::UnsupportedResponseType("token".into()).oauth_error_code(),
            "unsupported_response_type"
        );
        assert_eq!(ValidationFailure::StorageUnavailable.oauth_error_code(), "server_error");
    }
}
