//! Knowledge base sharing grants.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{KnowledgeBaseShare, SharePermission};
use crate::validation::{validate_permissions_payload, ValidationError};

const SHARE_SELECT: &str = r#"
    SELECT s.id, s.knowledge_base_id, kb.name AS knowledge_base_name,
           s.shared_with, u.username AS shared_with_name, u.email AS shared_with_email,
           s.permission, s.permissions, s.created_at, s.updated_at
    FROM knowledge_base_shares s
    JOIN knowledge_bases kb ON kb.id = s.knowledge_base_id
    JOIN users u ON u.id = s.shared_with
"#;

/// Grant, or adjust, a user's access to a knowledge base.
///
/// There is at most one share per (knowledge base, recipient); sharing again
/// overwrites the permission level. `permissions` replaces the stored
/// payload only when given.
pub async fn share_knowledge_base(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    recipient_email: &str,
    permission: SharePermission,
    permissions: Option<&serde_json::Value>,
) -> Result<KnowledgeBaseShare> {
    if recipient_email.trim().is_empty() {
        return Err(ValidationError::Empty("user_email".to_string()).into());
    }
    if let Some(payload) = permissions {
        validate_permissions_payload(payload)?;
    }

    let recipient = crate::user::get_user_by_email(pool, recipient_email).await?;
    let owner_id = crate::knowledge_base::get_knowledge_base(pool, knowledge_base_id)
        .await?
        .created_by;
    if recipient.id == owner_id {
        return Err(ValidationError::invalid(
            "user_email",
            "cannot share a knowledge base with its owner",
        )
        .into());
    }

    let payload = permissions.map(|p| p.to_string());

    sqlx::query(
        r#"
        INSERT INTO knowledge_base_shares (id, knowledge_base_id, shared_with, permission, permissions)
        VALUES (?, ?, ?, ?, COALESCE(?, '{}'))
        ON CONFLICT(knowledge_base_id, shared_with) DO UPDATE SET
            permission = excluded.permission,
            permissions = COALESCE(?, knowledge_base_shares.permissions),
            updated_at = datetime('now')
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(knowledge_base_id)
    .bind(&recipient.id)
    .bind(permission)
    .bind(&payload)
    .bind(&payload)
    .execute(pool)
    .await?;

    tracing::info!(
        knowledge_base_id = %knowledge_base_id,
        shared_with = %recipient.id,
        permission = permission.as_str(),
        "Shared knowledge base"
    );

    get_share(pool, knowledge_base_id, &recipient.id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("KnowledgeBaseShare", knowledge_base_id))
}

/// Revoke a user's share on a knowledge base.
pub async fn unshare_knowledge_base(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    recipient_email: &str,
) -> Result<()> {
    if recipient_email.trim().is_empty() {
        return Err(ValidationError::Empty("user_email".to_string()).into());
    }

    let missing = || {
        DatabaseError::not_found(
            "KnowledgeBaseShare",
            format!("{}/{}", knowledge_base_id, recipient_email.trim()),
        )
    };

    let recipient = match crate::user::get_user_by_email(pool, recipient_email).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound { .. }) => return Err(missing()),
        Err(e) => return Err(e),
    };

    let result = sqlx::query(
        r#"
        DELETE FROM knowledge_base_shares
        WHERE knowledge_base_id = ? AND shared_with = ?
        "#,
    )
    .bind(knowledge_base_id)
    .bind(&recipient.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(missing());
    }

    tracing::info!(knowledge_base_id = %knowledge_base_id, shared_with = %recipient.id, "Revoked share");
    Ok(())
}

/// Get the share naming a user on a knowledge base.
pub async fn get_share(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    user_id: &str,
) -> Result<Option<KnowledgeBaseShare>> {
    let share = sqlx::query_as::<_, KnowledgeBaseShare>(&format!(
        "{SHARE_SELECT} WHERE s.knowledge_base_id = ? AND s.shared_with = ?"
    ))
    .bind(knowledge_base_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(share)
}

/// List all shares on a knowledge base.
pub async fn list_shares(
    pool: &SqlitePool,
    knowledge_base_id: &str,
) -> Result<Vec<KnowledgeBaseShare>> {
    let shares = sqlx::query_as::<_, KnowledgeBaseShare>(&format!(
        "{SHARE_SELECT} WHERE s.knowledge_base_id = ? ORDER BY s.created_at, s.rowid"
    ))
    .bind(knowledge_base_id)
    .fetch_all(pool)
    .await?;

    Ok(shares)
}
