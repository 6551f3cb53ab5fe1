//! OAuth 2.0 authorization endpoint handlers.
//!
//! # Flow
//!
//! ```text
//! GET /oauth/authorize?client_id=...&redirect_uri=...
//!     ├─► Invalid client/redirect_uri → Render error page (no redirect)
//!     ├─► Invalid scope/response_type/PKCE → Redirect with error
//!     ├─► Anonymous → Store pending, redirect to login with ?next=
//!     └─► Authenticated → Store pending, render consent form
//!
//! POST /oauth/authorize (form data, pending id in cookie)
//!     ├─► cancel → Redirect with error=user_cancelled
//!     └─► approve → Issue code → Redirect with code
//! ```

use std::sync::Arc;

use axum::Form;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::AuthError;
use crate::identity::CurrentUserProvider;
use crate::oauth::authorize::AuthorizationRequest;
use crate::oauth::pending::PendingAuthorization;
use crate::oauth::service::{AuthorizationRejection, AuthorizationService};

use super::templates::{render_consent_form, render_error_page};

/// Path scope of the pending authorization cookie.
const COOKIE_PATH: &str = "/oauth";

/// State for the authorize handlers.
#[derive(Clone)]
pub struct AuthorizeState {
    /// Validation and code issuance.
    pub service: AuthorizationService,
    /// Browser session lookup.
    pub users: Arc<dyn CurrentUserProvider>,
    /// Cookie and login settings.
    pub session: SessionConfig,
}

/// Form data for authorize POST.
#[derive(Debug, Default, Deserialize)]
pub struct ConsentForm {
    /// Present and non-empty when the user pressed cancel.
    #[serde(default)]
    pub cancel: Option<String>,
    /// Present when the user pressed allow.
    #[serde(default)]
    pub approve: Option<String>,
}

impl ConsentForm {
    fn is_cancel(&self) -> bool {
        self.cancel.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// GET /oauth/authorize handler.
pub async fn authorize_get(
    State(state): State<AuthorizeState>,
    jar: CookieJar,
    req: Request,
) -> Response {
    let params = match Query::<AuthorizationRequest>::try_from_uri(req.uri()) {
        Ok(Query(params)) => params,
        Err(e) => {
            return error_page(&AuthError::invalid_request(e.body_text()));
        }
    };
    let (parts, _body) = req.into_parts();

    // A new request supersedes whatever this browser left pending.
    if let Some(previous) = pending_id(&jar, &state.session) {
        state.service.discard(previous).await;
    }

    let prompt = match state.service.begin(&params).await {
        Ok(prompt) => prompt,
        Err(rejection) => return rejection_response(rejection),
    };

    let jar = jar.add(pending_cookie(&prompt.pending, &state.session));

    match state.users.current_user(&parts).await {
        Some(user) => {
            let html = render_consent_form(&prompt.client, &prompt.scopes, &user);
            (jar, Html(html)).into_response()
        }
        None => {
            let login = login_redirect(&state.session.login_url, &prompt.pending.resume_url());
            tracing::debug!(client_id = %prompt.client.client_id, "Deferring authorization to login");
            (jar, Redirect::to(&login)).into_response()
        }
    }
}

/// POST /oauth/authorize handler.
///
/// The pending authorization is consumed and its cookie removed on every
/// outcome.
pub async fn authorize_post(
    State(state): State<AuthorizeState>,
    jar: CookieJar,
    req: Request,
) -> Response {
    let pending_id = pending_id(&jar, &state.session);
    let jar = jar.remove(removal_cookie(&state.session));

    let (parts, body) = req.into_parts();
    let user = state.users.current_user(&parts).await;

    let form = match Form::<ConsentForm>::from_request(Request::from_parts(parts, body), &()).await {
        Ok(Form(form)) => form,
        Err(e) => {
            if let Some(id) = pending_id {
                state.service.discard(id).await;
            }
            return (jar, error_page(&AuthError::invalid_request(e.body_text()))).into_response();
        }
    };

    let response = if form.is_cancel() {
        match state.service.cancel(pending_id).await {
            Ok(url) => Redirect::to(&url).into_response(),
            Err(e) => error_page(&e),
        }
    } else {
        match state.service.consent(pending_id, user).await {
            Ok(url) => Redirect::to(&url).into_response(),
            Err(rejection) => rejection_response(rejection),
        }
    };

    (jar, response).into_response()
}

fn rejection_response(rejection: AuthorizationRejection) -> Response {
    match rejection {
        AuthorizationRejection::Fatal(ref e) => error_page(e),
        AuthorizationRejection::Redirect { ref error, .. } => match rejection.redirect_url() {
            Some(url) => Redirect::to(&url).into_response(),
            None => error_page(&AuthError::invalid_redirect_uri(format!(
                "Cannot redirect {}",
                error.error
            ))),
        },
    }
}

fn error_page(error: &AuthError) -> Response {
    let status = if error.is_server_error() {
        tracing::error!(error = %error, "Authorization endpoint failure");
        StatusCode::INTERNAL_SERVER_ERROR
    } else if matches!(error, AuthError::AccessDenied { .. }) {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Html(render_error_page(error.oauth_error_code(), &error.description())),
    )
        .into_response()
}

fn login_redirect(login_url: &str, resume_url: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", resume_url)
        .finish();
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}{query}")
}

fn pending_id(jar: &CookieJar, session: &SessionConfig) -> Option<Uuid> {
    jar.get(&session.cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn pending_cookie(pending: &PendingAuthorization, session: &SessionConfig) -> Cookie<'static> {
    Cookie::build((session.cookie_name.clone(), pending.id.to_string()))
        .http_only(true)
        .secure(session.secure_cookies)
        .same_site(SameSite::Lax)
        .path(COOKIE_PATH)
        .max_age(pending.expires_at - pending.created_at)
        .build()
}

fn removal_cookie(session: &SessionConfig) -> Cookie<'static> {
    Cookie::build((session.cookie_name.clone(), ""))
        .path(COOKIE_PATH)
        .build()
}
