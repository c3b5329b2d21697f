//! User profile storage for personal details.

use sqlx::SqlitePool;

use crate::models::UserProfile;
use crate::validation::{validate_length, validate_required, MAX_NAME_LENGTH};
use crate::Result;

const MAX_BIO_LENGTH: usize = 2000;
const MAX_LANGUAGE_LENGTH: usize = 10;
const MAX_TIMEZONE_LENGTH: usize = 50;

/// Partial profile update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub nickname: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub position: Option<Option<String>>,
    pub language: Option<String>,
    pub timezone: Option<String>,
}

/// Get a user's profile, creating the default one on first access.
pub async fn get_or_create_profile(pool: &SqlitePool, user_id: &str) -> Result<UserProfile> {
    sqlx::query(
        r#"
        INSERT INTO user_profiles (id, user_id)
        VALUES (?, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .execute(pool)
    .await?;

    let record = sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT id, user_id, nickname, bio, company, department, position,
               language, timezone, created_at, updated_at
        FROM user_profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

fn merge_optional(
    field: &str,
    update: &Option<Option<String>>,
    current: Option<String>,
    max: usize,
) -> Result<Option<String>> {
    match update {
        Some(Some(value)) => {
            validate_length(field, value, max)?;
            Ok(Some(value.trim().to_string()))
        }
        Some(None) => Ok(None),
        None => Ok(current),
    }
}

/// Apply a partial update to a user's profile.
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<UserProfile> {
    let current = get_or_create_profile(pool, user_id).await?;

    let nickname = merge_optional("nickname", &update.nickname, current.nickname, 50)?;
    let bio = merge_optional("bio", &update.bio, current.bio, MAX_BIO_LENGTH)?;
    let company = merge_optional("company", &update.company, current.company, MAX_NAME_LENGTH)?;
    let department = merge_optional(
        "department",
        &update.department,
        current.department,
        MAX_NAME_LENGTH,
    )?;
    let position = merge_optional("position", &update.position, current.position, MAX_NAME_LENGTH)?;
    let language = match update.language.as_deref() {
        Some(lang) => validate_required("language", lang, MAX_LANGUAGE_LENGTH)?.to_string(),
        None => current.language,
    };
    let timezone = match update.timezone.as_deref() {
        Some(tz) => validate_required("timezone", tz, MAX_TIMEZONE_LENGTH)?.to_string(),
        None => current.timezone,
    };

    sqlx::query(
        r#"
        UPDATE user_profiles
        SET nickname = ?, bio = ?, company = ?, department = ?, position = ?,
            language = ?, timezone = ?, updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(&nickname)
    .bind(&bio)
    .bind(&company)
    .bind(&department)
    .bind(&position)
    .bind(&language)
    .bind(&timezone)
    .bind(user_id)
    .execute(pool)
    .await?;

    get_or_create_profile(pool, user_id).await
}
