//! Authorization endpoint service.
//!
//! # Flow
//!
//! 1. `begin`: validate the query (client, redirect URI, scope, response
//!    type, PKCE, in that order) and store a [`PendingAuthorization`]
//! 2. The HTTP layer sends the user to log in or renders the consent page
//! 3. `consent` or `cancel`: consume the pending record and answer the
//!    client by redirect
//!
//! Errors before the client and its redirect URI are trusted are
//! [`AuthorizationRejection::Fatal`] and must never be delivered by redirect.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AuthError;
use crate::identity::UserIdentity;
use crate::scopes::ScopeSet;
use crate::storage::PendingAuthorizationStorage;
use crate::types::Client;

use super::authorize::{
    AuthorizationCredentials, AuthorizationError, AuthorizationErrorCode, AuthorizationRequest,
    AuthorizationResponse,
};
use super::code::AuthorizationCode;
use super::pending::PendingAuthorization;
use super::pkce::{PkceChallenge, PkceChallengeMethod};
use super::validator::{RequestValidator, ValidationFailure};

/// Why an authorization step did not produce a code.
#[derive(Debug)]
pub enum AuthorizationRejection {
    /// The client cannot be trusted yet: show an error page.
    Fatal(AuthError),
    /// The client is trusted: send the error back to its redirect URI.
    Redirect {
        /// Verified redirect URI.
        redirect_uri: String,
        /// Error parameters, with the client's state echoed.
        error: AuthorizationError,
    },
}

impl AuthorizationRejection {
    fn redirect(
        redirect_uri: &str,
        code: AuthorizationErrorCode,
        description: impl Into<String>,
        state: Option<&str>,
    ) -> Self {
        Self::Redirect {
            redirect_uri: redirect_uri.to_string(),
            error: AuthorizationError::with_description(
                code,
                description,
                state.map(str::to_string),
            ),
        }
    }

    fn from_failure(
        failure: ValidationFailure,
        redirect_uri: &str,
        state: Option<&str>,
    ) -> Self {
        if failure.is_fatal_client_error() {
            return Self::Fatal(failure.into());
        }
        let code = AuthorizationErrorCode::from_oauth_code(failure.oauth_error_code());
        Self::redirect(redirect_uri, code, failure.to_string(), state)
    }

    /// Redirect URL for `Redirect` rejections, `None` for fatal ones or when
    /// the redirect URI is not an absolute URL.
    #[must_use]
    pub fn redirect_url(&self) -> Option<String> {
        match self {
            Self::Fatal(_) => None,
            Self::Redirect {
                redirect_uri,
                error,
            } => error.to_redirect_url(redirect_uri).ok(),
        }
    }
}

/// What the consent page needs.
#[derive(Debug, Clone)]
pub struct ConsentPrompt {
    /// The stored request, keyed by the id to put in the browser cookie.
    pub pending: PendingAuthorization,
    /// Resolved client metadata.
    pub client: Client,
    /// Requested scopes with their descriptions.
    pub scopes: Vec<(String, String)>,
}

/// Drives the authorization endpoint.
#[derive(Clone)]
pub struct AuthorizationService {
    validator: RequestValidator,
    pending: Arc<dyn PendingAuthorizationStorage>,
    code_lifetime: Duration,
    pending_lifetime: Duration,
}

impl AuthorizationService {
    /// Creates an authorization service.
    #[must_use]
    pub fn new(
        validator: RequestValidator,
        pending: Arc<dyn PendingAuthorizationStorage>,
        code_lifetime: Duration,
        pending_lifetime: Duration,
    ) -> Self {
        Self {
            validator,
            pending,
            code_lifetime,
            pending_lifetime,
        }
    }

    /// Validates an authorization request and stores it as pending.
    ///
    /// # Errors
    ///
    /// `Fatal` for a missing or unresolvable client and a missing or
    /// mismatching redirect URI; `Redirect` for everything after that.
    pub async fn begin(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<ConsentPrompt, AuthorizationRejection> {
        let client_id = non_empty(request.client_id.as_deref()).ok_or_else(|| {
            AuthorizationRejection::Fatal(AuthError::invalid_client("Missing client_id parameter"))
        })?;
        let client = self
            .validator
            .validate_client(client_id)
            .await
            .map_err(|f| AuthorizationRejection::Fatal(f.into()))?;

        let redirect_uri = non_empty(request.redirect_uri.as_deref()).ok_or_else(|| {
            AuthorizationRejection::Fatal(AuthError::invalid_redirect_uri(
                "Missing redirect_uri parameter",
            ))
        })?;
        self.validator
            .validate_redirect_uri(client_id, redirect_uri)
            .await
            .map_err(|f| AuthorizationRejection::Fatal(f.into()))?;

        // From here on the client is trusted with errors.
        let state = request.state.as_deref();
        let reject = |code, description: &str| {
            AuthorizationRejection::redirect(redirect_uri, code, description, state)
        };

        let scopes = ScopeSet::parse(request.scope.as_deref().unwrap_or_default());
        self.validator
            .validate_scopes(&scopes)
            .map_err(|f| AuthorizationRejection::from_failure(f, redirect_uri, state))?;

        let response_type = non_empty(request.response_type.as_deref()).ok_or_else(|| {
            reject(
                AuthorizationErrorCode::InvalidRequest,
                "Missing response_type parameter",
            )
        })?;
        self.validator
            .validate_response_type(response_type)
            .map_err(|f| AuthorizationRejection::from_failure(f, redirect_uri, state))?;

        let (code_challenge, code_challenge_method) = self
            .check_pkce(request)
            .map_err(|description| reject(AuthorizationErrorCode::InvalidRequest, description))?;

        let credentials = AuthorizationCredentials {
            client_id: client.client_id.clone(),
            redirect_uri: redirect_uri.to_string(),
            state: request.state.clone(),
            response_type: response_type.to_string(),
            code_challenge,
            code_challenge_method,
        };
        let pending = PendingAuthorization::new(
            scopes,
            credentials,
            self.validator.clock().now(),
            self.pending_lifetime,
        );
        self.pending.create_pending(&pending).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to store pending authorization");
            AuthorizationRejection::Fatal(e)
        })?;

        tracing::debug!(
            client_id = %client.client_id,
            scope = %pending.scopes,
            "Authorization request validated"
        );

        let scopes = self.describe_scopes(&pending.scopes);
        Ok(ConsentPrompt {
            pending,
            client,
            scopes,
        })
    }

    /// Answers a pending authorization with the user's consent.
    ///
    /// The pending record is consumed whatever the outcome.
    ///
    /// # Errors
    ///
    /// `Fatal` when the record is missing or expired, when nobody is logged
    /// in, or when the client no longer validates. `Redirect` when the
    /// scopes no longer validate or the code cannot be stored.
    pub async fn consent(
        &self,
        pending_id: Option<Uuid>,
        user: Option<UserIdentity>,
    ) -> Result<String, AuthorizationRejection> {
        let pending = self
            .take_pending(pending_id)
            .await
            .map_err(AuthorizationRejection::Fatal)?;
        let credentials = &pending.credentials;
        let redirect_uri = credentials.redirect_uri.as_str();
        let state = credentials.state.as_deref();

        let user = user.ok_or_else(|| {
            AuthorizationRejection::Fatal(AuthError::access_denied("Login required"))
        })?;

        self.validator
            .validate_client(&credentials.client_id)
            .await
            .map_err(|f| AuthorizationRejection::Fatal(f.into()))?;
        self.validator
            .validate_redirect_uri(&credentials.client_id, redirect_uri)
            .await
            .map_err(|f| AuthorizationRejection::Fatal(f.into()))?;
        self.validator
            .validate_scopes(&pending.scopes)
            .map_err(|f| AuthorizationRejection::from_failure(f, redirect_uri, state))?;

        let code = AuthorizationCode::issue(
            credentials,
            pending.scopes.clone(),
            user,
            self.validator.clock().now(),
            self.code_lifetime,
        );
        self.validator
            .save_authorization_code(&code)
            .await
            .map_err(|f| AuthorizationRejection::from_failure(f, redirect_uri, state))?;

        tracing::info!(
            client_id = %code.client_id,
            username = %code.user.username,
            scope = %code.scopes,
            "Issued authorization code"
        );

        AuthorizationResponse::new(code.code, code.state)
            .to_redirect_url(redirect_uri)
            .map_err(|e| {
                AuthorizationRejection::Fatal(AuthError::invalid_redirect_uri(e.to_string()))
            })
    }

    /// Answers a pending authorization with an explicit cancel.
    ///
    /// # Errors
    ///
    /// Returns an error when the record is missing or expired, or its
    /// redirect URI is not an absolute URL.
    pub async fn cancel(&self, pending_id: Option<Uuid>) -> Result<String, AuthError> {
        let pending = self.take_pending(pending_id).await?;
        let credentials = pending.credentials;

        tracing::debug!(client_id = %credentials.client_id, "Authorization cancelled by user");

        AuthorizationError::new(AuthorizationErrorCode::UserCancelled, credentials.state)
            .to_redirect_url(&credentials.redirect_uri)
            .map_err(|e| AuthError::invalid_redirect_uri(e.to_string()))
    }

    /// Drops a pending authorization the browser is abandoning.
    pub async fn discard(&self, pending_id: Uuid) {
        if let Err(e) = self.pending.take_pending(pending_id).await {
            tracing::warn!(error = %e, "Failed to discard pending authorization");
        }
    }

    /// Human-readable descriptions for the consent page.
    #[must_use]
    pub fn describe_scopes(&self, scopes: &ScopeSet) -> Vec<(String, String)> {
        let catalog = self.validator.scope_catalog();
        scopes
            .iter()
            .map(|scope| {
                let description = catalog.describe(scope).unwrap_or(scope);
                (scope.to_string(), description.to_string())
            })
            .collect()
    }

    fn check_pkce(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<(String, PkceChallengeMethod), &'static str> {
        let challenge = non_empty(request.code_challenge.as_deref());
        let challenge = match challenge {
            Some(challenge) => challenge,
            None if self.validator.pkce_required() => return Err("Code challenge required."),
            None => return Err("Code challenge missing."),
        };
        let method = PkceChallengeMethod::parse(request.code_challenge_method.as_deref())
            .map_err(|_| "Transform algorithm not supported.")?;
        let challenge =
            PkceChallenge::new(challenge.to_string()).map_err(|_| "Invalid code challenge.")?;
        Ok((challenge.as_str().to_string(), method))
    }

    async fn take_pending(&self, pending_id: Option<Uuid>) -> Result<PendingAuthorization, AuthError> {
        let expired = || AuthError::invalid_request("Authorization request expired or missing");
        let pending_id = pending_id.ok_or_else(expired)?;
        let pending = self
            .pending
            .take_pending(pending_id)
            .await?
            .ok_or_else(expired)?;
        if pending.is_expired(self.validator.clock().now()) {
            return Err(expired());
        }
        Ok(pending)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scopes::ScopeCatalog;
    use crate::storage::{CodeStorage, MemoryStore};
    use crate::testing::{CHALLENGE, CLIENT_ID, REDIRECT_URI, StaticResolver, alice, test_clock};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: ManualClock,
        service: AuthorizationService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = test_clock();
        let validator = RequestValidator::new(
            Arc::new(StaticResolver::example()),
            store.clone(),
            store.clone(),
            Arc::new(clock.clone()),
            ScopeCatalog::default(),
        );
        Fixture {
            store: store.clone(),
            clock,
            service: AuthorizationService::new(
                validator,
                store,
                Duration::minutes(10),
                Duration::minutes(10),
            ),
        }
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            response_type: Some("code".to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            scope: Some("user".to_string()),
            state: Some("xyz".to_string()),
            code_challenge: Some(CHALLENGE.to_string()),
            code_challenge_method: Some("S256".to_string()),
        }
    }

    fn redirect_of(rejection: AuthorizationRejection) -> String {
        match rejection {
            AuthorizationRejection::Redirect { .. } => rejection.redirect_url().unwrap(),
            AuthorizationRejection::Fatal(e) => panic!("expected redirect, got fatal {e}"),
        }
    }

    #[tokio::test]
    async fn test_begin_stores_pending() {
        let f = fixture();
        let prompt = f.service.begin(&request()).await.unwrap();

        assert_eq!(prompt.client.name, "Example Reader");
        assert_eq!(
            prompt.scopes,
            vec![(
                "user".to_string(),
                "Read/write access to profile info.".to_string()
            )]
        );
        assert_eq!(prompt.pending.credentials.code_challenge, CHALLENGE);
        assert_eq!(
            prompt.pending.credentials.code_challenge_method,
            PkceChallengeMethod::S256
        );
        assert_eq!(f.store.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_client_is_fatal() {
        let f = fixture();
        let mut request = request();
        request.client_id = Some("https://unknown.example/id".to_string());

        let rejection = f.service.begin(&request).await.unwrap_err();
        assert!(matches!(rejection, AuthorizationRejection::Fatal(AuthError::InvalidClient { .. })));
        assert!(rejection.redirect_url().is_none());
        assert_eq!(f.store.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_redirect_mismatch_is_fatal() {
        let f = fixture();
        let mut request = request();
        request.redirect_uri = Some("https://evil.example/cb".to_string());
        // Later errors must not leak to the unverified target.
        request.scope = Some("admin".to_string());

        let rejection = f.service.begin(&request).await.unwrap_err();
        assert!(matches!(
            rejection,
            AuthorizationRejection::Fatal(AuthError::InvalidRedirectUri { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_scope_redirects() {
        let f = fixture();
        let mut request = request();
        request.scope = Some("user admin".to_string());

        let url = redirect_of(f.service.begin(&request).await.unwrap_err());
        assert!(url.starts_with("https://app.example/cb?error=invalid_scope"));
        assert!(url.ends_with("&state=xyz"));
    }

    #[tokio::test]
    async fn test_response_type_checked_after_scope() {
        let f = fixture();
        let mut request = request();
        request.response_type = Some("token".to_string());

        let url = redirect_of(f.service.begin(&request).await.unwrap_err());
        assert!(url.contains("error=unsupported_response_type"));

        request.scope = None;
        let url = redirect_of(f.service.begin(&request).await.unwrap_err());
        assert!(url.contains("error=invalid_scope"));
    }

    #[tokio::test]
    async fn test_pkce_is_required() {
        let f = fixture();
        let mut request = request();
        request.code_challenge = None;

        let url = redirect_of(f.service.begin(&request).await.unwrap_err());
        assert!(url.contains("error=invalid_request"));
        assert!(url.contains("Code+challenge+required"));

        let mut request = self::request();
        request.code_challenge_method = Some("S512".to_string());
        let url = redirect_of(f.service.begin(&request).await.unwrap_err());
        assert!(url.contains("error=invalid_request"));
    }

    #[tokio::test]
    async fn test_missing_method_defaults_to_plain() {
        let f = fixture();
        let mut request = request();
        request.code_challenge = Some("abc".to_string());
        request.code_challenge_method = None;

        let prompt = f.service.begin(&request).await.unwrap();
        assert_eq!(
            prompt.pending.credentials.code_challenge_method,
            PkceChallengeMethod::Plain
        );
    }

    #[tokio::test]
    async fn test_consent_issues_code() {
        let f = fixture();
        let prompt = f.service.begin(&request()).await.unwrap();

        let url = f
            .service
            .consent(Some(prompt.pending.id), Some(alice()))
            .await
            .unwrap();

        let parsed = url::Url::parse(&url).unwrap();
        let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params[0].0, "code");
        assert_eq!(params[1], ("state".to_string(), "xyz".to_string()));

        let code = f.store.find_code(&params[0].1).await.unwrap().unwrap();
        assert_eq!(code.user.username, "alice");
        assert_eq!(code.scopes, ScopeSet::parse("user"));
        assert_eq!(code.code_challenge, CHALLENGE);
        assert_eq!(f.store.pending_count(), 0);
        assert_eq!(f.store.code_count(), 1);
    }

    #[tokio::test]
    async fn test_consent_requires_login_and_consumes_pending() {
        let f = fixture();
        let prompt = f.service.begin(&request()).await.unwrap();

        let rejection = f
            .service
            .consent(Some(prompt.pending.id), None)
            .await
            .unwrap_err();
        assert!(matches!(rejection, AuthorizationRejection::Fatal(_)));
        assert_eq!(f.store.pending_count(), 0);
        assert_eq!(f.store.code_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_pending_is_rejected() {
        let f = fixture();
        let prompt = f.service.begin(&request()).await.unwrap();

        f.clock.advance(Duration::minutes(11));
        let rejection = f
            .service
            .consent(Some(prompt.pending.id), Some(alice()))
            .await
            .unwrap_err();
        assert!(matches!(
            rejection,
            AuthorizationRejection::Fatal(AuthError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_redirects_with_state() {
        let f = fixture();
        let prompt = f.service.begin(&request()).await.unwrap();

        let url = f.service.cancel(Some(prompt.pending.id)).await.unwrap();
        assert_eq!(url, "https://app.example/cb?error=user_cancelled&state=xyz");
        assert_eq!(f.store.pending_count(), 0);

        assert!(f.service.cancel(Some(prompt.pending.id)).await.is_err());
        assert!(f.service.cancel(None).await.is_err());
    }
}
