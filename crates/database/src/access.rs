//! Knowledge base access control.
//!
//! Every path that lists or loads knowledge bases on behalf of a user goes
//! through the predicates defined here.

use std::fmt;

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{KnowledgeBase, SharePermission};

/// Live knowledge bases the user created or was granted a share on.
///
/// Expects the table alias `kb` and binds the user id twice.
pub(crate) const VISIBLE_TO_USER: &str = r#"
    kb.lifecycle = 'active'
    AND (
        kb.created_by = ?
        OR EXISTS (
            SELECT 1 FROM knowledge_base_shares s
            WHERE s.knowledge_base_id = kb.id AND s.shared_with = ?
        )
    )
"#;

/// Live knowledge bases anyone may read. Expects the table alias `kb`.
pub(crate) const PUBLICLY_VISIBLE: &str = "kb.lifecycle = 'active' AND kb.is_public = 1";

/// What a user may do with a knowledge base, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Read,
    Write,
    Admin,
    Owner,
}

impl From<SharePermission> for Access {
    fn from(permission: SharePermission) -> Self {
        match permission {
            SharePermission::Read => Access::Read,
            SharePermission::Write => Access::Write,
            SharePermission::Admin => Access::Admin,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::Admin => "admin",
            Access::Owner => "owner",
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccessRow {
    created_by: String,
    permission: Option<SharePermission>,
}

/// The access a user holds on a knowledge base through ownership or a share.
///
/// `None` when the knowledge base is missing, soft-deleted or not visible
/// to the user. Public visibility is not considered here.
pub async fn resolve_access(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    user_id: &str,
) -> Result<Option<Access>> {
    let row = sqlx::query_as::<_, AccessRow>(&format!(
        r#"
        SELECT kb.created_by,
               (SELECT s.permission FROM knowledge_base_shares s
                WHERE s.knowledge_base_id = kb.id AND s.shared_with = ?) AS permission
        FROM knowledge_bases kb
        WHERE kb.id = ? AND {VISIBLE_TO_USER}
        "#
    ))
    .bind(user_id)
    .bind(knowledge_base_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|row| {
        if row.created_by == user_id {
            Some(Access::Owner)
        } else {
            row.permission.map(Access::from)
        }
    }))
}

async fn is_publicly_visible(pool: &SqlitePool, knowledge_base_id: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT 1 FROM knowledge_bases kb WHERE kb.id = ? AND {PUBLICLY_VISIBLE}"
    ))
    .bind(knowledge_base_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Load a knowledge base if the user holds at least `required` access.
///
/// Invisible knowledge bases are reported as `NotFound`, exactly like
/// missing ones. Visible ones with too little access yield
/// `PermissionDenied`. Public knowledge bases satisfy `Read` for everyone.
pub async fn authorize(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    user_id: &str,
    required: Access,
) -> Result<KnowledgeBase> {
    match resolve_access(pool, knowledge_base_id, user_id).await? {
        Some(access) if access >= required => {}
        Some(_) => {
            return Err(DatabaseError::PermissionDenied {
                entity: "KnowledgeBase",
                id: knowledge_base_id.to_string(),
                required: required.to_string(),
            })
        }
        None => {
            let public = is_publicly_visible(pool, knowledge_base_id).await?;
            if !public {
                return Err(DatabaseError::not_found("KnowledgeBase", knowledge_base_id));
            }
            if required > Access::Read {
                return Err(DatabaseError::PermissionDenied {
                    entity: "KnowledgeBase",
                    id: knowledge_base_id.to_string(),
                    required: required.to_string(),
                });
            }
        }
    }

    crate::knowledge_base::get_knowledge_base(pool, knowledge_base_id).await
}
