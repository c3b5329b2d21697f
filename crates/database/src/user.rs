//! User CRUD operations.

use sqlx::SqlitePool;

use crate::error::{is_unique_violation, DatabaseError, Result};
use crate::models::User;
use crate::validation::{
    normalize_email, validate_email, validate_length, validate_required, ValidationError,
    MAX_NAME_LENGTH, MAX_PHONE_LENGTH,
};

const USER_COLUMNS: &str = r#"
    id, email, username, first_name, last_name, phone,
    is_active, is_staff, is_email_verified, is_phone_verified,
    last_login, last_login_ip, created_at, updated_at
"#;

/// Fields needed to register a user. The password is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub password_hash: String,
}

/// Partial update of a user's own details. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(None)` clears the phone number.
    pub phone: Option<Option<String>>,
}

/// What login needs to verify a password.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credentials {
    pub user_id: String,
    pub password_hash: String,
    pub is_active: bool,
}

/// Create a new user. The email is normalised to lowercase.
pub async fn create_user(pool: &SqlitePool, new: &NewUser) -> Result<User> {
    validate_email(&new.email)?;
    let email = normalize_email(&new.email);

    let username = match new.username.as_deref() {
        Some(name) => validate_required("username", name, MAX_NAME_LENGTH)?.to_string(),
        None => email.clone(),
    };
    validate_length("first_name", &new.first_name, MAX_NAME_LENGTH)?;
    validate_length("last_name", &new.last_name, MAX_NAME_LENGTH)?;
    if let Some(phone) = &new.phone {
        validate_length("phone", phone, MAX_PHONE_LENGTH)?;
    }

    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, phone, password_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&username)
    .bind(new.first_name.trim())
    .bind(new.last_name.trim())
    .bind(&new.phone)
    .bind(&new.password_hash)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return DatabaseError::Validation(ValidationError::Duplicate {
                field: "email".to_string(),
                message: "A user with this email already exists".to_string(),
            });
        }
        DatabaseError::Sqlx(e)
    })?;

    tracing::info!(user_id = %id, "Created user");
    get_user(pool, &id).await
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("User", id))
}

/// Get a user by email (case-insensitive).
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<User> {
    let email = normalize_email(email);
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(&email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("User", email))
}

/// Look up login credentials by email.
pub async fn get_credentials_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<Credentials>> {
    let record = sqlx::query_as::<_, Credentials>(
        r#"
        SELECT id AS user_id, password_hash, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Get the stored password hash of a user.
pub async fn get_password_hash(pool: &SqlitePool, id: &str) -> Result<String> {
    sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User", id))
}

/// Replace a user's password hash.
pub async fn set_password_hash(pool: &SqlitePool, id: &str, password_hash: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(password_hash)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", id));
    }

    Ok(())
}

/// Apply a partial update to a user's details.
pub async fn update_user(pool: &SqlitePool, id: &str, update: &UserUpdate) -> Result<User> {
    let current = get_user(pool, id).await?;

    let username = match update.username.as_deref() {
        Some(name) => validate_required("username", name, MAX_NAME_LENGTH)?.to_string(),
        None => current.username,
    };
    let first_name = match update.first_name.as_deref() {
        Some(name) => {
            validate_length("first_name", name, MAX_NAME_LENGTH)?;
            name.trim().to_string()
        }
        None => current.first_name,
    };
    let last_name = match update.last_name.as_deref() {
        Some(name) => {
            validate_length("last_name", name, MAX_NAME_LENGTH)?;
            name.trim().to_string()
        }
        None => current.last_name,
    };
    let phone = match &update.phone {
        Some(Some(phone)) => {
            validate_length("phone", phone, MAX_PHONE_LENGTH)?;
            Some(phone.trim().to_string())
        }
        Some(None) => None,
        None => current.phone,
    };

    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, first_name = ?, last_name = ?, phone = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(&username)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&phone)
    .bind(id)
    .execute(pool)
    .await?;

    get_user(pool, id).await
}

/// Stamp a successful login.
pub async fn record_login(pool: &SqlitePool, id: &str, ip: Option<&str>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET last_login = datetime('now'), last_login_ip = COALESCE(?, last_login_ip)
        WHERE id = ?
        "#,
    )
    .bind(ip)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Enable or disable an account.
pub async fn set_active(pool: &SqlitePool, id: &str, active: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET is_active = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(active)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", id));
    }

    Ok(())
}

/// Grant or revoke staff rights.
pub async fn set_staff(pool: &SqlitePool, id: &str, staff: bool) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET is_staff = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(staff)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", id));
    }

    Ok(())
}

/// Delete a user by ID. Everything the user owns is removed with it.
pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", id));
    }

    tracing::info!(user_id = %id, "Deleted user");
    Ok(())
}

/// List all users.
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY email"
    ))
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Count total users.
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
