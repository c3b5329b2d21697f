//! Request authentication.
//!
//! Handlers receive the caller as an explicit [`CurrentUser`] argument,
//! resolved from either a session bearer token or an `X-Api-Key` header.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use database::{api_key, session, user, DatabaseError, User};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// The session token, when the request authenticated with one.
    pub session_token: Option<String>,
}

impl CurrentUser {
    /// Require staff rights.
    pub fn require_staff(&self) -> ApiResult<()> {
        if self.user.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden("staff access required".to_string()))
        }
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
        .filter(|token| !token.is_empty())
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// The client address as reported by a fronting proxy.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

async fn user_for_session(state: &AppState, token: &str) -> ApiResult<User> {
    let invalid = || ApiError::Unauthorized("invalid or expired session token".to_string());

    let user_id = session::get_session_user_id(state.db.pool(), token)
        .await?
        .ok_or_else(invalid)?;

    let user = match user::get_user(state.db.pool(), &user_id).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound { .. }) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    if !user.is_active {
        return Err(ApiError::Unauthorized("account is disabled".to_string()));
    }
    Ok(user)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        if let Some(token) = extract_bearer_token(&parts.headers) {
            let user = user_for_session(&state, token).await?;
            return Ok(CurrentUser {
                user,
                session_token: Some(token.to_string()),
            });
        }

        if let Some(key) = extract_api_key(&parts.headers) {
            let user = api_key::authenticate_api_key(state.db.pool(), key)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("invalid API key".to_string()))?;
            return Ok(CurrentUser {
                user,
                session_token: None,
            });
        }

        Err(ApiError::Unauthorized(
            "authentication credentials were not provided".to_string(),
        ))
    }
}
