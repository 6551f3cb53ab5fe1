use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use wyrm_auth::{Identity, OptionalBearer, Scoped, UserScope};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Profile of the token's owner. Requires the `user` scope.
pub async fn me(Scoped(auth, _): Scoped<UserScope>) -> impl IntoResponse {
    Json(json!({
        "id": auth.user.id,
        "username": auth.user.username,
        "display_name": auth.user.display(),
        "client_id": auth.client_id,
        "scope": auth.scope.to_string(),
    }))
}

/// Whoever the passive authentication layer recognized, if anyone.
pub async fn whoami(
    Identity(user): Identity,
    OptionalBearer(bearer): OptionalBearer,
) -> impl IntoResponse {
    match user {
        Some(user) => Json(json!({
            "authenticated": true,
            "username": user.username,
            "client_id": bearer.map(|b| b.client_id),
        })),
        None => Json(json!({ "authenticated": false })),
    }
}
