//! Token endpoint service.
//!
//! Handles the two supported grants:
//!
//! - `authorization_code`: redeem a single-use code plus PKCE verifier
//! - `refresh_token`: mint a new token for the grant behind a refresh token
//!
//! # Security
//!
//! - A code is deleted on every redemption attempt that reaches it, whatever
//!   the outcome, and the deletion is the point of mutual exclusion between
//!   concurrent redemptions
//! - PKCE is always verified
//! - Tokens are never logged

use time::Duration;

use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::oauth::pkce::{PkceChallenge, PkceVerifier};
use crate::oauth::token::{GrantType, TokenRequest, TokenResponse};
use crate::oauth::validator::{RequestValidator, ValidationFailure};
use crate::scopes::ScopeSet;
use crate::types::Client;

use super::BearerToken;

/// Exchanges grants for bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    validator: RequestValidator,
    access_token_lifetime: Duration,
    revoke_superseded_tokens: bool,
}

impl TokenService {
    /// Creates a token service.
    ///
    /// With `revoke_superseded_tokens`, redeeming a refresh token deletes the
    /// record it came from, so the old access token stops working at once.
    /// A refresh whose old record cannot be deleted fails with a server
    /// error.
    #[must_use]
    pub fn new(
        validator: RequestValidator,
        access_token_lifetime: Duration,
        revoke_superseded_tokens: bool,
    ) -> Self {
        Self {
            validator,
            access_token_lifetime,
            revoke_superseded_tokens,
        }
    }

    /// Dispatches a token request on its `grant_type`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for a missing `grant_type`,
    /// `UnsupportedGrantType` for anything but the two supported grants,
    /// and the grant-specific errors of [`exchange_code`](Self::exchange_code)
    /// and [`refresh`](Self::refresh).
    pub async fn exchange(&self, request: &TokenRequest) -> AuthResult<TokenResponse> {
        let grant_type = required(request.grant_type.as_deref(), "grant_type")?;
        match self.validator.validate_grant_type(grant_type)? {
            GrantType::AuthorizationCode => self.exchange_code(request).await,
            GrantType::RefreshToken => self.refresh(request).await,
        }
    }

    /// Exchanges an authorization code for a token.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `client_id`, `code`, `redirect_uri` or `code_verifier` is missing
    /// - The client cannot be resolved (`InvalidClient`)
    /// - The code is unknown, expired, already used, or another client's
    /// - The redirect URI differs from the one the code was issued for
    /// - The verifier does not satisfy the stored challenge
    pub async fn exchange_code(&self, request: &TokenRequest) -> AuthResult<TokenResponse> {
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let code = required(request.code.as_deref(), "code")?;
        let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;
        let code_verifier = required(request.code_verifier.as_deref(), "code_verifier")?;

        let client = self.validator.authenticate_client(client_id).await?;

        let record = match self.validator.validate_code(&client.client_id, code).await {
            Ok(record) => record,
            Err(ValidationFailure::ExpiredCode) => {
                if let Err(failure) = self
                    .validator
                    .invalidate_authorization_code(&client.client_id, code)
                    .await
                {
                    // Left for the sweep; it can never be redeemed anyway.
                    tracing::warn!(
                        client_id = %client.client_id,
                        reason = %failure,
                        "Expired authorization code was not discarded"
                    );
                }
                return Err(ValidationFailure::ExpiredCode.into());
            }
            Err(failure) => return Err(failure.into()),
        };

        let checked = self
            .check_binding(&client, code, redirect_uri, code_verifier)
            .await;

        // Spent whatever the outcome; losing a concurrent redemption
        // surfaces here as an unknown code.
        let taken = self
            .validator
            .invalidate_authorization_code(&client.client_id, code)
            .await;
        checked?;
        taken?;

        let token = BearerToken::issue(
            client.client_id.clone(),
            record.user,
            record.scopes,
            self.validator.clock().now(),
            self.access_token_lifetime,
        );
        self.validator.save_bearer_token(&token).await?;

        tracing::info!(
            client_id = %client.client_id,
            username = %token.user.username,
            scope = %token.scope,
            "Issued token for authorization code"
        );

        Ok(response_for(&token))
    }

    /// Mints a new token from a refresh token.
    ///
    /// The new token keeps the original user. Its scope is the requested
    /// scope when one is given, otherwise the original grant's scope.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `client_id` or `refresh_token` is missing
    /// - The client cannot be resolved (`InvalidClient`)
    /// - The refresh token is unknown or belongs to another client
    /// - The requested scope is not a subset of the original grant
    /// - The superseded record must be revoked and the store refuses
    pub async fn refresh(&self, request: &TokenRequest) -> AuthResult<TokenResponse> {
        let client_id = required(request.client_id.as_deref(), "client_id")?;
        let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;

        let client = self.validator.authenticate_client(client_id).await?;
        // Another client's token reads like an unknown one.
        let previous = self
            .validator
            .validate_refresh_token(refresh_token, &client)
            .await
            .map_err(|_| ValidationFailure::UnknownToken)?;

        let original = self
            .validator
            .get_original_scopes(refresh_token)
            .await
            .ok_or(ValidationFailure::UnknownToken)?;

        let scope = match request.scope.as_deref().map(ScopeSet::parse) {
            Some(requested) if !requested.is_empty() => {
                if !requested.is_subset_of(&original) {
                    return Err(AuthError::invalid_scope(
                        "Requested scope exceeds original grant",
                    ));
                }
                requested
            }
            _ => original,
        };

        // Revoked before issuing: if the old record cannot be removed the
        // refresh fails and nothing new is handed out.
        if self.revoke_superseded_tokens {
            self.validator.revoke_bearer_token(&previous.token).await?;
        }

        let token = BearerToken::issue(
            client.client_id.clone(),
            previous.user.clone(),
            scope,
            self.validator.clock().now(),
            self.access_token_lifetime,
        );
        self.validator.save_bearer_token(&token).await?;

        tracing::info!(
            client_id = %client.client_id,
            username = %token.user.username,
            scope = %token.scope,
            "Issued token for refresh token"
        );

        Ok(response_for(&token))
    }

    /// Redirect URI and PKCE checks for a code that passed `validate_code`.
    ///
    /// Every refusal reads like an unknown code; the reason goes to the
    /// debug log only.
    async fn check_binding(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> AuthResult<()> {
        let refuse = |reason: &str| {
            tracing::debug!(client_id = %client.client_id, reason, "Authorization code refused");
            AuthError::from(ValidationFailure::UnknownCode)
        };

        if !self
            .validator
            .confirm_redirect_uri(&client.client_id, code, redirect_uri)
            .await
        {
            return Err(refuse("redirect URI does not match authorization request"));
        }

        let (Some(challenge), Some(method)) = (
            self.validator.get_code_challenge(code).await,
            self.validator.get_code_challenge_method(code).await,
        ) else {
            return Err(refuse("code vanished during redemption"));
        };

        let challenge =
            PkceChallenge::new(challenge).map_err(|_| refuse("stored PKCE challenge is malformed"))?;
        let verifier = PkceVerifier::new(code_verifier.to_string())
            .map_err(|_| refuse("PKCE verifier is malformed"))?;

        challenge
            .verify(method, &verifier)
            .map_err(|_| refuse("PKCE verification failed"))
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> AuthResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::invalid_request(format!("Missing {name} parameter")))
}

fn response_for(token: &BearerToken) -> TokenResponse {
    let response = TokenResponse::new(
        token.token.clone(),
        token.expires_in(),
        token.scope.to_string(),
        token.user.username.clone(),
    );
    match token.refresh_token {
        Some(ref refresh_token) => response.with_refresh_token(refresh_token.clone()),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::oauth::code::AuthorizationCode;
    use crate::scopes::ScopeCatalog;
    use crate::storage::{CodeStorage, MemoryStore, TokenStorage};
    use crate::testing::{CLIENT_ID, REDIRECT_URI, StaticResolver, VERIFIER, code_for, test_clock};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: ManualClock,
        service: TokenService,
    }

    fn fixture(revoke_superseded_tokens: bool) -> Fixture {
        fixture_with_tokens(revoke_superseded_tokens, |store| store as Arc<dyn TokenStorage>)
    }

    fn fixture_with_tokens(
        revoke_superseded_tokens: bool,
        tokens: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn TokenStorage>,
    ) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = RequestValidator::new(
            Arc::new(StaticResolver::example()),
            store.clone(),
            tokens(store.clone()),
            Arc::new(clock.clone()),
            ScopeCatalog::default().with_scope("shelves", "Read your shelves."),
        );
        Fixture {
            store,
            clock,
            service: TokenService::new(validator, Duration::hours(1), revoke_superseded_tokens),
        }
    }

    /// Token store that can save and read but never delete.
    struct UndeletableTokens(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl TokenStorage for UndeletableTokens {
        async fn save_token(&self, token: &BearerToken) -> AuthResult<()> {
            self.0.save_token(token).await
        }

        async fn find_by_access_token(&self, access_token: &str) -> AuthResult<Option<BearerToken>> {
            self.0.find_by_access_token(access_token).await
        }

        async fn find_by_refresh_token(
            &self,
            refresh_token: &str,
        ) -> AuthResult<Option<BearerToken>> {
            self.0.find_by_refresh_token(refresh_token).await
        }

        async fn delete_token(&self, _access_token: &str) -> AuthResult<bool> {
            Err(AuthError::storage("token table is read-only"))
        }
    }

    fn code_request(code: &str) -> TokenRequest {
        TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            code: Some(code.to_string()),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            code_verifier: Some(VERIFIER.to_string()),
            ..Default::default()
        }
    }

    fn refresh_request(refresh_token: &str, scope: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: Some("refresh_token".to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            refresh_token: Some(refresh_token.to_string()),
            scope: scope.map(str::to_string),
            ..Default::default()
        }
    }

    async fn issued_code(f: &Fixture) -> String {
        let code = code_for(&f.clock);
        f.store.save_code(&code).await.unwrap();
        code.code
    }

    #[tokio::test]
    async fn test_code_exchange_issues_token() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        let response = f.service.exchange(&code_request(&code)).await.unwrap();

        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope, "user");
        assert_eq!(response.username, "alice");
        assert!(response.refresh_token.is_some());

        let stored = f
            .store
            .find_by_access_token(&response.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.expires_at, f.clock.now() + Duration::hours(1));
        assert_eq!(f.store.code_count(), 0);
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        f.service.exchange(&code_request(&code)).await.unwrap();
        let err = f.service.exchange(&code_request(&code)).await.unwrap_err();

        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(f.store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_pkce_mismatch_spends_code() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        let mut request = code_request(&code);
        request.code_verifier = Some("x".repeat(43));
        let err = f.service.exchange(&request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");

        // The correct verifier no longer helps.
        let err = f.service.exchange(&code_request(&code)).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(f.store.token_count(), 0);
    }

    #[tokio::test]
    async fn test_redirect_uri_must_match_code() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        let mut request = code_request(&code);
        request.redirect_uri = Some("https://app.example/cb/".to_string());
        let err = f.service.exchange(&request).await.unwrap_err();

        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(f.store.token_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        f.clock.advance(Duration::minutes(10));
        let err = f.service.exchange(&code_request(&code)).await.unwrap_err();

        assert_eq!(err.oauth_error_code(), "invalid_grant");
        assert_eq!(f.store.code_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_client_is_invalid_client() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        let mut request = code_request(&code);
        request.client_id = Some("https://unknown.example/id".to_string());
        let err = f.service.exchange(&request).await.unwrap_err();

        assert_eq!(err.oauth_error_code(), "invalid_client");
        // Nobody trustworthy presented the code; it stays redeemable.
        assert_eq!(f.store.code_count(), 1);
    }

    #[tokio::test]
    async fn test_grant_type_dispatch() {
        let f = fixture(false);

        let err = f.service.exchange(&TokenRequest::default()).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");

        let request = TokenRequest {
            grant_type: Some("password".to_string()),
            ..Default::default()
        };
        let err = f.service.exchange(&request).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_missing_verifier_is_invalid_request() {
        let f = fixture(false);
        let code = issued_code(&f).await;

        let mut request = code_request(&code);
        request.code_verifier = None;
        let err = f.service.exchange(&request).await.unwrap_err();

        assert_eq!(err.oauth_error_code(), "invalid_request");
        assert_eq!(f.store.code_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_preserves_scope_and_user() {
        let f = fixture(false);
        let code = issued_code(&f).await;
        let first = f.service.exchange(&code_request(&code)).await.unwrap();
        let refresh_token = first.refresh_token.clone().unwrap();

        f.clock.advance(Duration::minutes(30));
        let second = f
            .service
            .exchange(&refresh_request(&refresh_token, None))
            .await
            .unwrap();

        assert_ne!(second.access_token, first.access_token);
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(second.scope, first.scope);
        assert_eq!(second.username, "alice");

        // Superseded token stays valid unless revocation is enabled.
        assert!(
            f.store
                .find_by_access_token(&first.access_token)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_refresh_scope_must_be_subset() {
        let f = fixture(false);
        let code = issued_code(&f).await;
        let first = f.service.exchange(&code_request(&code)).await.unwrap();
        let refresh_token = first.refresh_token.unwrap();

        let err = f
            .service
            .exchange(&refresh_request(&refresh_token, Some("user shelves")))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");

        let narrowed = f
            .service
            .exchange(&refresh_request(&refresh_token, Some("user")))
            .await
            .unwrap();
        assert_eq!(narrowed.scope, "user");
    }

    #[tokio::test]
    async fn test_refresh_can_revoke_superseded_token() {
        let f = fixture(true);
        let code = issued_code(&f).await;
        let first = f.service.exchange(&code_request(&code)).await.unwrap();

        f.service
            .exchange(&refresh_request(first.refresh_token.as_deref().unwrap(), None))
            .await
            .unwrap();

        assert!(
            f.store
                .find_by_access_token(&first.access_token)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(f.store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_token_from_other_client() {
        let f = fixture(false);
        let token = BearerToken::issue(
            "https://other.example/id",
            crate::testing::alice(),
            ScopeSet::parse("user"),
            f.clock.now(),
            Duration::hours(1),
        );
        f.store.save_token(&token).await.unwrap();

        let err = f
            .service
            .exchange(&refresh_request(token.refresh_token.as_deref().unwrap(), None))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");

        let unknown = f
            .service
            .exchange(&refresh_request("never-issued", None))
            .await
            .unwrap_err();
        assert_eq!(err.description(), unknown.description());
    }

    #[tokio::test]
    async fn test_refused_codes_share_one_description() {
        let f = fixture(false);
        let expected = AuthError::from(ValidationFailure::UnknownCode).description();

        let unknown = f
            .service
            .exchange(&code_request("never-issued"))
            .await
            .unwrap_err();

        let mut wrong_redirect = code_request(&issued_code(&f).await);
        wrong_redirect.redirect_uri = Some("https://app.example/other".to_string());
        let wrong_redirect = f.service.exchange(&wrong_redirect).await.unwrap_err();

        let mut wrong_verifier = code_request(&issued_code(&f).await);
        wrong_verifier.code_verifier = Some("x".repeat(43));
        let wrong_verifier = f.service.exchange(&wrong_verifier).await.unwrap_err();

        let mut short_verifier = code_request(&issued_code(&f).await);
        short_verifier.code_verifier = Some("short".to_string());
        let short_verifier = f.service.exchange(&short_verifier).await.unwrap_err();

        for err in [unknown, wrong_redirect, wrong_verifier, short_verifier] {
            assert_eq!(err.oauth_error_code(), "invalid_grant");
            assert_eq!(err.description(), expected);
        }
        assert_eq!(f.store.code_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_issue_one_token() {
        let f = fixture(false);
        let code = issued_code(&f).await;
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = f.service.clone();
                let barrier = barrier.clone();
                let request = code_request(&code);
                tokio::spawn(async move {
                    barrier.wait().await;
                    service.exchange(&request).await
                })
            })
            .collect();

        let mut issued = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => issued += 1,
                Err(err) => assert_eq!(err.oauth_error_code(), "invalid_grant"),
            }
        }

        assert_eq!(issued, 1);
        assert_eq!(f.store.token_count(), 1);
        assert_eq!(f.store.code_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_revocation_fails_refresh() {
        let f = fixture_with_tokens(true, |store| {
            Arc::new(UndeletableTokens(store)) as Arc<dyn TokenStorage>
        });
        let code = issued_code(&f).await;
        let first = f.service.exchange(&code_request(&code)).await.unwrap();

        let err = f
            .service
            .exchange(&refresh_request(first.refresh_token.as_deref().unwrap(), None))
            .await
            .unwrap_err();

        assert_eq!(err.oauth_error_code(), "server_error");
        // Nothing new was issued and the old record is untouched.
        assert_eq!(f.store.token_count(), 1);
        assert!(
            f.store
                .find_by_access_token(&first.access_token)
                .await
                .unwrap()
                .is_some()
        );
    }

    /// Code store whose deletes always fail.
    struct UnremovableCodes(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl CodeStorage for UnremovableCodes {
        async fn save_code(&self, code: &AuthorizationCode) -> AuthResult<()> {
            self.0.save_code(code).await
        }

        async fn find_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
            self.0.find_code(code).await
        }

        async fn take_code(
            &self,
            _code: &str,
            _client_id: &str,
        ) -> AuthResult<Option<AuthorizationCode>> {
            Err(AuthError::storage("code table is read-only"))
        }

        async fn cleanup_expired_codes(&self, now: time::OffsetDateTime) -> AuthResult<u64> {
            self.0.cleanup_expired_codes(now).await
        }
    }

    #[tokio::test]
    async fn test_expired_code_refused_when_discard_fails() {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = RequestValidator::new(
            Arc::new(StaticResolver::example()),
            Arc::new(UnremovableCodes(store.clone())),
            store.clone(),
            Arc::new(clock.clone()),
            ScopeCatalog::default(),
        );
        let service = TokenService::new(validator, Duration::hours(1), false);
        let code = code_for(&clock);
        store.save_code(&code).await.unwrap();

        clock.advance(Duration::minutes(11));
        let err = service.exchange(&code_request(&code.code)).await.unwrap_err();

        assert_eq!(err.oauth_error_code(), "invalid_grant");
        // Still stored; the sweep removes it later.
        assert_eq!(store.code_count(), 1);
        assert_eq!(store.token_count(), 0);
    }

    #[tokio::test]
    async fn test_revocation_not_attempted_when_disabled() {
        let f = fixture_with_tokens(false, |store| {
            Arc::new(UndeletableTokens(store)) as Arc<dyn TokenStorage>
        });
        let code = issued_code(&f).await;
        let first = f.service.exchange(&code_request(&code)).await.unwrap();

        f.service
            .exchange(&refresh_request(first.refresh_token.as_deref().unwrap(), None))
            .await
            .unwrap();
        assert_eq!(f.store.token_count(), 2);
    }
}
