//! Session tokens issued at login.

use sqlx::SqlitePool;

use crate::secret::{generate_secret, hash_secret};
use crate::Result;

/// Issue a new session token for a user. Returns the plaintext token.
pub async fn create_session(pool: &SqlitePool, user_id: &str) -> Result<String> {
    let token = generate_secret();

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (token_hash, user_id)
        VALUES (?, ?)
        "#,
    )
    .bind(hash_secret(&token))
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a session token to the owning user ID.
pub async fn get_session_user_id(pool: &SqlitePool, token: &str) -> Result<Option<String>> {
    let user_id = sqlx::query_scalar::<_, String>(
        r#"
        SELECT user_id FROM auth_tokens
        WHERE token_hash = ?
        "#,
    )
    .bind(hash_secret(token))
    .fetch_optional(pool)
    .await?;

    Ok(user_id)
}

/// Revoke one session token.
///
/// Returns true if a token was deleted.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE token_hash = ?")
        .bind(hash_secret(token))
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Revoke every session of a user except, optionally, one token.
pub async fn delete_user_sessions(
    pool: &SqlitePool,
    user_id: &str,
    keep: Option<&str>,
) -> Result<u64> {
    let keep_hash = keep.map(hash_secret);

    let result = sqlx::query(
        r#"
        DELETE FROM auth_tokens
        WHERE user_id = ? AND (? IS NULL OR token_hash != ?)
        "#,
    )
    .bind(user_id)
    .bind(&keep_hash)
    .bind(&keep_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
