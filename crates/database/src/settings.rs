//! Per-knowledge-base indexing and retrieval settings.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::{KnowledgeBaseSettings, SearchMode};
use crate::validation::{validate_index_schedule, validate_length, MAX_MODEL_LENGTH};
use crate::Result;

/// Partial settings update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub auto_index: Option<bool>,
    pub index_schedule: Option<Option<String>>,
    pub search_mode: Option<SearchMode>,
    pub enable_rerank: Option<bool>,
    pub rerank_model: Option<Option<String>>,
}

fn blank_as_none(value: &Option<Option<String>>) -> Option<Option<&str>> {
    value
        .as_ref()
        .map(|inner| inner.as_deref().map(str::trim).filter(|v| !v.is_empty()))
}

/// Insert the default settings row unless one exists.
pub(crate) async fn insert_default_settings<'e, E>(executor: E, knowledge_base_id: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO knowledge_base_settings (id, knowledge_base_id)
        VALUES (?, ?)
        ON CONFLICT(knowledge_base_id) DO NOTHING
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(knowledge_base_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Get a knowledge base's settings, creating the defaults on first access.
pub async fn get_or_create_settings(
    pool: &SqlitePool,
    knowledge_base_id: &str,
) -> Result<KnowledgeBaseSettings> {
    insert_default_settings(pool, knowledge_base_id).await?;

    let settings = sqlx::query_as::<_, KnowledgeBaseSettings>(
        r#"
        SELECT id, knowledge_base_id, auto_index, index_schedule, search_mode,
               enable_rerank, rerank_model, created_at, updated_at
        FROM knowledge_base_settings
        WHERE knowledge_base_id = ?
        "#,
    )
    .bind(knowledge_base_id)
    .fetch_one(pool)
    .await?;

    Ok(settings)
}

/// Apply a partial update to a knowledge base's settings.
pub async fn update_settings(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    update: &SettingsUpdate,
) -> Result<KnowledgeBaseSettings> {
    let current = get_or_create_settings(pool, knowledge_base_id).await?;

    // A blank schedule or model clears the field.
    let index_schedule = match blank_as_none(&update.index_schedule) {
        Some(Some(schedule)) => {
            validate_index_schedule(schedule)?;
            Some(schedule.to_string())
        }
        Some(None) => None,
        None => current.index_schedule,
    };
    let rerank_model = match blank_as_none(&update.rerank_model) {
        Some(Some(model)) => {
            validate_length("rerank_model", model, MAX_MODEL_LENGTH)?;
            Some(model.to_string())
        }
        Some(None) => None,
        None => current.rerank_model,
    };
    let auto_index = update.auto_index.unwrap_or(current.auto_index);
    let search_mode = update.search_mode.unwrap_or(current.search_mode);
    let enable_rerank = update.enable_rerank.unwrap_or(current.enable_rerank);

    sqlx::query(
        r#"
        UPDATE knowledge_base_settings
        SET auto_index = ?, index_schedule = ?, search_mode = ?,
            enable_rerank = ?, rerank_model = ?, updated_at = datetime('now')
        WHERE knowledge_base_id = ?
        "#,
    )
    .bind(auto_index)
    .bind(&index_schedule)
    .bind(search_mode)
    .bind(enable_rerank)
    .bind(&rerank_model)
    .bind(knowledge_base_id)
    .execute(pool)
    .await?;

    get_or_create_settings(pool, knowledge_base_id).await
}
