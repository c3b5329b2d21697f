//! API key management.
//!
//! A key's secret is generated when the row is created and is only replaced
//! by an explicit [`regenerate_api_key`].

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{ApiKey, IssuedApiKey, User};
use crate::secret::{generate_secret, hash_secret, secret_prefix};
use crate::validation::{normalize_timestamp, validate_required, MAX_NAME_LENGTH};

const API_KEY_COLUMNS: &str = r#"
    id, user_id, name, key_prefix, is_active, last_used_at, expires_at, created_at, updated_at
"#;

/// Partial API key update. `Some(None)` clears the expiry.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<String>>,
}

/// Issue a new API key for a user.
pub async fn create_api_key(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    expires_at: Option<&str>,
) -> Result<IssuedApiKey> {
    let name = validate_required("name", name, MAX_NAME_LENGTH)?;
    let expires_at = expires_at
        .map(|ts| normalize_timestamp("expires_at", ts))
        .transpose()?;

    let id = uuid::Uuid::new_v4().to_string();
    let secret = generate_secret();

    sqlx::query(
        r#"
        INSERT INTO api_keys (id, user_id, name, key_hash, key_prefix, expires_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(name)
    .bind(hash_secret(&secret))
    .bind(secret_prefix(&secret))
    .bind(&expires_at)
    .execute(pool)
    .await?;

    tracing::info!(api_key_id = %id, user_id = %user_id, "Issued API key");

    Ok(IssuedApiKey {
        api_key: get_api_key(pool, user_id, &id).await?,
        key: secret,
    })
}

/// Get one of a user's API keys. Keys of other users are `NotFound`.
pub async fn get_api_key(pool: &SqlitePool, user_id: &str, id: &str) -> Result<ApiKey> {
    sqlx::query_as::<_, ApiKey>(&format!(
        "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = ? AND user_id = ?"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("ApiKey", id))
}

/// List a user's API keys.
pub async fn list_api_keys(pool: &SqlitePool, user_id: &str) -> Result<Vec<ApiKey>> {
    let keys = sqlx::query_as::<_, ApiKey>(&format!(
        "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Apply a partial update to an API key.
pub async fn update_api_key(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
    update: &ApiKeyUpdate,
) -> Result<ApiKey> {
    let current = get_api_key(pool, user_id, id).await?;

    let name = match update.name.as_deref() {
        Some(name) => validate_required("name", name, MAX_NAME_LENGTH)?.to_string(),
        None => current.name,
    };
    let is_active = update.is_active.unwrap_or(current.is_active);
    let expires_at = match &update.expires_at {
        Some(Some(ts)) => Some(normalize_timestamp("expires_at", ts)?),
        Some(None) => None,
        None => current.expires_at,
    };

    sqlx::query(
        r#"
        UPDATE api_keys
        SET name = ?, is_active = ?, expires_at = ?, updated_at = datetime('now')
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&name)
    .bind(is_active)
    .bind(&expires_at)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    get_api_key(pool, user_id, id).await
}

/// Replace a key's secret in place. Id, name and active flag are kept.
pub async fn regenerate_api_key(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<IssuedApiKey> {
    let secret = generate_secret();

    let result = sqlx::query(
        r#"
        UPDATE api_keys
        SET key_hash = ?, key_prefix = ?, updated_at = datetime('now')
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(hash_secret(&secret))
    .bind(secret_prefix(&secret))
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("ApiKey", id));
    }

    tracing::info!(api_key_id = %id, "Regenerated API key");

    Ok(IssuedApiKey {
        api_key: get_api_key(pool, user_id, id).await?,
        key: secret,
    })
}

/// Delete one of a user's API keys.
pub async fn delete_api_key(pool: &SqlitePool, user_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("ApiKey", id));
    }

    Ok(())
}

/// Resolve a presented secret to its active, unexpired key's owner.
///
/// Stamps `last_used_at` on success. Returns `None` for unknown, inactive
/// or expired keys and for disabled accounts.
pub async fn authenticate_api_key(pool: &SqlitePool, secret: &str) -> Result<Option<User>> {
    let key_id = sqlx::query_scalar::<_, String>(
        r#"
        SELECT k.id
        FROM api_keys k
        JOIN users u ON u.id = k.user_id
        WHERE k.key_hash = ?
          AND k.is_active = 1
          AND u.is_active = 1
          AND (k.expires_at IS NULL OR datetime(k.expires_at) > datetime('now'))
        "#,
    )
    .bind(hash_secret(secret))
    .fetch_optional(pool)
    .await?;

    let Some(key_id) = key_id else {
        return Ok(None);
    };

    let user_id = sqlx::query_scalar::<_, String>(
        r#"
        UPDATE api_keys
        SET last_used_at = datetime('now')
        WHERE id = ?
        RETURNING user_id
        "#,
    )
    .bind(&key_id)
    .fetch_one(pool)
    .await?;

    Ok(Some(crate::user::get_user(pool, &user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;
    use crate::user::tests::make_user;

    #[tokio::test]
    async fn test_issue_and_list() {
        let db = test_db().await;
        let user = make_user(db.pool(), "k@example.com").await;

        let issued = create_api_key(db.pool(), &user.id, "ci", None).await.unwrap();
        assert_eq!(issued.api_key.name, "ci");
        assert!(issued.api_key.is_active);
        assert!(issued.key.starts_with(&issued.api_key.key_prefix));

        let keys = list_api_keys(db.pool(), &user.id).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].id, issued.api_key.id);
    }

    #[tokio::test]
    async fn test_regenerate_keeps_identity() {
        let db = test_db().await;
        let user = make_user(db.pool(), "k@example.com").await;
        let issued = create_api_key(db.pool(), &user.id, "ci", None).await.unwrap();
        update_api_key(
            db.pool(),
            &user.id,
            &issued.api_key.id,
            &ApiKeyUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let regenerated = regenerate_api_key(db.pool(), &user.id, &issued.api_key.id)
            .await
            .unwrap();
        assert_ne!(regenerated.key, issued.key);
        assert_eq!(regenerated.api_key.id, issued.api_key.id);
        assert_eq!(regenerated.api_key.name, "ci");
        assert!(!regenerated.api_key.is_active);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let db = test_db().await;
        let user = make_user(db.pool(), "k@example.com").await;
        let issued = create_api_key(db.pool(), &user.id, "ci", None).await.unwrap();

        let found = authenticate_api_key(db.pool(), &issued.key).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id.clone()));
        let key = get_api_key(db.pool(), &user.id, &issued.api_key.id).await.unwrap();
        assert!(key.last_used_at.is_some());

        // Old secret stops working after regeneration.
        let regenerated = regenerate_api_key(db.pool(), &user.id, &issued.api_key.id)
            .await
            .unwrap();
        assert!(authenticate_api_key(db.pool(), &issued.key).await.unwrap().is_none());
        assert!(authenticate_api_key(db.pool(), &regenerated.key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_and_inactive_keys_rejected() {
        let db = test_db().await;
        let user = make_user(db.pool(), "k@example.com").await;

        let expired = create_api_key(db.pool(), &user.id, "old", Some("2001-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(expired.api_key.expires_at.as_deref(), Some("2001-01-01 00:00:00"));
        assert!(authenticate_api_key(db.pool(), &expired.key).await.unwrap().is_none());

        let future = create_api_key(db.pool(), &user.id, "new", Some("2999-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(authenticate_api_key(db.pool(), &future.key).await.unwrap().is_some());

        update_api_key(
            db.pool(),
            &user.id,
            &future.api_key.id,
            &ApiKeyUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(authenticate_api_key(db.pool(), &future.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_are_private_to_owner() {
        let db = test_db().await;
        let alice = make_user(db.pool(), "a@example.com").await;
        let mallory = make_user(db.pool(), "m@example.com").await;
        let issued = create_api_key(db.pool(), &alice.id, "ci", None).await.unwrap();

        let result = get_api_key(db.pool(), &mallory.id, &issued.api_key.id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        let result = regenerate_api_key(db.pool(), &mallory.id, &issued.api_key.id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        let result = delete_api_key(db.pool(), &mallory.id, &issued.api_key.id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));

        delete_api_key(db.pool(), &alice.id, &issued.api_key.id).await.unwrap();
        assert!(list_api_keys(db.pool(), &alice.id).await.unwrap().is_empty());
    }
}
