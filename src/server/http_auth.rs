use super::http_errors::{map_access_error, map_auth_error};
use super::state::AppState;
use crate::application::AuthError;
use crate::domain::Principal;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, header::HeaderMap, request::Parts, StatusCode},
    Json,
};
use chrono::Utc;

pub(super) type Rejection = (StatusCode, Json<serde_json::Value>);

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

fn principal_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Principal, Rejection> {
    let token = extract_bearer_token(headers).ok_or_else(|| {
        let (status, body) = map_auth_error(&AuthError::InvalidToken);
        (status, Json(body))
    })?;
    state.credentials.validate_token(token).map_err(|e| {
        let (status, body) = map_auth_error(&e);
        (status, Json(body))
    })
}

/// Any caller with a valid session token.
pub(super) struct Authenticated(pub(super) Principal);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        principal_from_headers(state, &parts.headers).map(Authenticated)
    }
}

/// A caller that also passed the subscription gate.
pub(super) struct ActiveUser(pub(super) Principal);

#[async_trait]
impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = principal_from_headers(state, &parts.headers)?;
        state
            .gate
            .check(&principal, Utc::now())
            .await
            .map_err(|e| {
                let (status, body) = map_access_error(&e);
                (status, Json(body))
            })?;
        Ok(ActiveUser(principal))
    }
}

/// A caller whose token carries the admin role.
pub(super) struct AdminUser(pub(super) Principal);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = principal_from_headers(state, &parts.headers)?;
        if !principal.is_admin() {
            return Err((
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "Administrator access required" })),
            ));
        }
        Ok(AdminUser(principal))
    }
}
