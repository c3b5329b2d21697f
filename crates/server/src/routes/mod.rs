//! Route handlers for the JSON API.

pub mod api_keys;
pub mod health;
pub mod knowledge_bases;
pub mod profile;
pub mod teams;
pub mod users;

use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Acknowledgement body for actions with nothing else to return.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unwrap a field the request body must carry.
pub(crate) fn required<T>(field: &str, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(database::ValidationError::Empty(field.to_string())))
}

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Accounts
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/login", post(users::login))
        .route("/api/users/logout", post(users::logout))
        .route("/api/users/me", get(users::me).put(users::update_me))
        .route("/api/users/change_password", post(users::change_password))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/profile", get(profile::get_profile).put(profile::update_profile))
        // Teams
        .route("/api/teams", get(teams::list_teams).post(teams::create_team))
        .route(
            "/api/teams/:id",
            get(teams::get_team)
                .put(teams::update_team)
                .delete(teams::delete_team),
        )
        .route("/api/teams/:id/members", get(teams::list_members))
        .route("/api/teams/:id/add_member", post(teams::add_member))
        .route("/api/teams/:id/remove_member", delete(teams::remove_member))
        // API keys
        .route(
            "/api/api-keys",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route(
            "/api/api-keys/:id",
            get(api_keys::get_api_key)
                .put(api_keys::update_api_key)
                .delete(api_keys::delete_api_key),
        )
        .route("/api/api-keys/:id/regenerate", post(api_keys::regenerate_api_key))
        // Knowledge bases
        .route(
            "/api/knowledge-bases",
            get(knowledge_bases::list).post(knowledge_bases::create),
        )
        .route("/api/knowledge-bases/public", get(knowledge_bases::public))
        .route(
            "/api/knowledge-bases/shared_with_me",
            get(knowledge_bases::shared_with_me),
        )
        .route(
            "/api/knowledge-bases/:id",
            get(knowledge_bases::get)
                .put(knowledge_bases::update)
                .delete(knowledge_bases::destroy),
        )
        .route("/api/knowledge-bases/:id/share", post(knowledge_bases::share))
        .route("/api/knowledge-bases/:id/unshare", delete(knowledge_bases::unshare))
        .route("/api/knowledge-bases/:id/shares", get(knowledge_bases::shares))
        .route("/api/knowledge-bases/:id/tags", get(knowledge_bases::tags))
        .route("/api/knowledge-bases/:id/add_tag", post(knowledge_bases::add_tag))
        .route("/api/knowledge-bases/:id/remove_tag", delete(knowledge_bases::remove_tag))
        .route(
            "/api/knowledge-bases/:id/settings",
            get(knowledge_bases::get_settings).put(knowledge_bases::update_settings),
        )
        .route(
            "/api/knowledge-bases/:id/update_stats",
            post(knowledge_bases::update_stats),
        )
}

/// Deserialize a field where an explicit `null` differs from an absent key.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: absent is `None`, `null` is `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
