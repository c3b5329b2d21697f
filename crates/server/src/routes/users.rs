//! Account routes: registration, sessions, self-service and staff admin.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use database::{session, user, User, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{nullable, required, Message};
use crate::auth::{client_ip, CurrentUser};
use crate::extract::ApiJson;
use crate::error::ApiResult;
use crate::state::AppState;

/// Registration request.
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Partial update of the caller's own details.
#[derive(Deserialize)]
pub struct UpdateMeRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Staff-only account flags.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

/// Register a new account.
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let email = required("email", req.email)?;
    let password = required("password", req.password)?;
    let confirm = required("confirm_password", req.confirm_password)?;

    database::validation::validate_email(&email)?;
    database::validation::validate_passwords_match("confirm_password", &password, &confirm)?;
    state.passwords.policy().check("password", &password, &email)?;

    let password_hash = state.passwords.hash(&password).await?;
    let user = user::create_user(
        state.db.pool(),
        &user::NewUser {
            email,
            username: req.username,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            password_hash,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a new session token.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = required("email", req.email)?;
    let password = required("password", req.password)?;
    let pool = state.db.pool();

    let Some(credentials) = user::get_credentials_by_email(pool, &email).await? else {
        warn!("Login rejected: unknown email");
        return Err(ValidationError::InvalidCredentials.into());
    };

    if !state
        .passwords
        .verify(&password, &credentials.password_hash)
        .await?
    {
        warn!(user_id = %credentials.user_id, "Login rejected: wrong password");
        return Err(ValidationError::InvalidCredentials.into());
    }

    if !credentials.is_active {
        warn!(user_id = %credentials.user_id, "Login rejected: inactive account");
        return Err(ValidationError::InactiveAccount.into());
    }

    let ip = client_ip(&headers);
    user::record_login(pool, &credentials.user_id, ip.as_deref()).await?;
    let token = session::create_session(pool, &credentials.user_id).await?;
    let user = user::get_user(pool, &credentials.user_id).await?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse { token, user }))
}

/// Revoke the session the request was made with.
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Message>> {
    if let Some(token) = &current.session_token {
        session::delete_session(state.db.pool(), token).await?;
    }
    Ok(Json(Message::new("Logged out")))
}

pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<UpdateMeRequest>,
) -> ApiResult<Json<User>> {
    let user = user::update_user(
        state.db.pool(),
        &current.user.id,
        &user::UserUpdate {
            username: req.username,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        },
    )
    .await?;
    Ok(Json(user))
}

/// Change the caller's password. Every other session is revoked.
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Message>> {
    let old_password = required("old_password", req.old_password)?;
    let new_password = required("new_password", req.new_password)?;
    let confirm = required("confirm_password", req.confirm_password)?;
    let pool = state.db.pool();

    let stored = user::get_password_hash(pool, &current.user.id).await?;
    if !state.passwords.verify(&old_password, &stored).await? {
        return Err(ValidationError::IncorrectPassword.into());
    }
    database::validation::validate_passwords_match("confirm_password", &new_password, &confirm)?;
    state
        .passwords
        .policy()
        .check("new_password", &new_password, &current.user.email)?;

    let hash = state.passwords.hash(&new_password).await?;
    user::set_password_hash(pool, &current.user.id, &hash).await?;
    let revoked =
        session::delete_user_sessions(pool, &current.user.id, current.session_token.as_deref())
            .await?;

    info!(user_id = %current.user.id, revoked_sessions = revoked, "Password changed");
    Ok(Json(Message::new("Password changed")))
}

pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<User>>> {
    current.require_staff()?;
    Ok(Json(user::list_users(state.db.pool()).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    current.require_staff()?;
    Ok(Json(user::get_user(state.db.pool(), &id).await?))
}

/// Toggle the active and staff flags of an account.
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    current.require_staff()?;
    let pool = state.db.pool();

    if let Some(active) = req.is_active {
        user::set_active(pool, &id, active).await?;
        if !active {
            session::delete_user_sessions(pool, &id, None).await?;
        }
    }
    if let Some(staff) = req.is_staff {
        user::set_staff(pool, &id, staff).await?;
    }

    Ok(Json(user::get_user(pool, &id).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    current.require_staff()?;
    user::delete_user(state.db.pool(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
