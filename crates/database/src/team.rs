//! Teams and team membership.

use sqlx::SqlitePool;

use crate::error::{is_unique_violation, DatabaseError, Result};
use crate::models::{Team, TeamMember, TeamRole};
use crate::validation::{validate_required, ValidationError, MAX_NAME_LENGTH};

const TEAM_SELECT: &str = r#"
    SELECT t.id, t.name, t.description, t.owner_id, t.is_active,
           (SELECT COUNT(*) FROM team_members m WHERE m.team_id = t.id) AS members_count,
           t.created_at, t.updated_at
    FROM teams t
"#;

const MEMBER_SELECT: &str = r#"
    SELECT m.id, m.team_id, m.user_id, u.email AS user_email, m.role, m.joined_at, m.created_at
    FROM team_members m
    JOIN users u ON u.id = m.user_id
"#;

/// Partial team update.
#[derive(Debug, Clone, Default)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Create a team and make its creator the owner member, atomically.
pub async fn create_team(
    pool: &SqlitePool,
    owner_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Team> {
    let name = validate_required("name", name, MAX_NAME_LENGTH)?;
    let team_id = uuid::Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO teams (id, name, description, owner_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&team_id)
    .bind(name)
    .bind(description)
    .bind(owner_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO team_members (id, team_id, user_id, role)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&team_id)
    .bind(owner_id)
    .bind(TeamRole::Owner)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(team_id = %team_id, owner_id = %owner_id, "Created team");
    get_team(pool, &team_id).await
}

/// Get a team by ID.
pub async fn get_team(pool: &SqlitePool, id: &str) -> Result<Team> {
    sqlx::query_as::<_, Team>(&format!("{TEAM_SELECT} WHERE t.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Team", id))
}

/// Get a user's role in a team, if they are a member.
pub async fn get_member_role(
    pool: &SqlitePool,
    team_id: &str,
    user_id: &str,
) -> Result<Option<TeamRole>> {
    let role = sqlx::query_scalar::<_, TeamRole>(
        r#"
        SELECT role FROM team_members
        WHERE team_id = ? AND user_id = ?
        "#,
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(role)
}

/// Get a team as seen by one of its members.
///
/// Non-members get `NotFound`, the same as for a missing team.
pub async fn get_team_for_member(
    pool: &SqlitePool,
    team_id: &str,
    user_id: &str,
) -> Result<(Team, TeamRole)> {
    let role = get_member_role(pool, team_id, user_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Team", team_id))?;
    let team = get_team(pool, team_id).await?;
    Ok((team, role))
}

/// List the teams a user belongs to.
pub async fn list_user_teams(pool: &SqlitePool, user_id: &str) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>(&format!(
        r#"{TEAM_SELECT}
        WHERE EXISTS (
            SELECT 1 FROM team_members m WHERE m.team_id = t.id AND m.user_id = ?
        )
        ORDER BY t.created_at DESC, t.rowid DESC"#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(teams)
}

/// Apply a partial update to a team.
pub async fn update_team(pool: &SqlitePool, id: &str, update: &TeamUpdate) -> Result<Team> {
    let current = get_team(pool, id).await?;

    let name = match update.name.as_deref() {
        Some(name) => validate_required("name", name, MAX_NAME_LENGTH)?.to_string(),
        None => current.name,
    };
    let description = match &update.description {
        Some(description) => description.clone(),
        None => current.description,
    };
    let is_active = update.is_active.unwrap_or(current.is_active);

    sqlx::query(
        r#"
        UPDATE teams
        SET name = ?, description = ?, is_active = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&description)
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    get_team(pool, id).await
}

/// Delete a team and its memberships.
pub async fn delete_team(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM teams WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Team", id));
    }

    tracing::info!(team_id = %id, "Deleted team");
    Ok(())
}

/// List the members of a team.
pub async fn list_members(pool: &SqlitePool, team_id: &str) -> Result<Vec<TeamMember>> {
    let members = sqlx::query_as::<_, TeamMember>(&format!(
        "{MEMBER_SELECT} WHERE m.team_id = ? ORDER BY m.joined_at, m.rowid"
    ))
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

async fn get_member(pool: &SqlitePool, team_id: &str, user_id: &str) -> Result<TeamMember> {
    sqlx::query_as::<_, TeamMember>(&format!(
        "{MEMBER_SELECT} WHERE m.team_id = ? AND m.user_id = ?"
    ))
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("TeamMember", format!("{}/{}", team_id, user_id)))
}

/// Add a user to a team.
///
/// Fails with `AlreadyExists` if the user is already a member. Ownership
/// cannot be granted this way.
pub async fn add_member(
    pool: &SqlitePool,
    team_id: &str,
    user_id: &str,
    role: TeamRole,
) -> Result<TeamMember> {
    if role == TeamRole::Owner {
        return Err(ValidationError::invalid("role", "a team has exactly one owner").into());
    }

    // Surface a missing user as NotFound rather than a foreign key failure.
    crate::user::get_user(pool, user_id).await?;

    sqlx::query(
        r#"
        INSERT INTO team_members (id, team_id, user_id, role)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(team_id)
    .bind(user_id)
    .bind(role)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return DatabaseError::AlreadyExists {
                entity: "TeamMember",
                id: format!("{}/{}", team_id, user_id),
            };
        }
        DatabaseError::Sqlx(e)
    })?;

    tracing::info!(team_id = %team_id, user_id = %user_id, role = role.as_str(), "Added team member");
    get_member(pool, team_id, user_id).await
}

/// Remove a user from a team. The owner membership cannot be removed.
pub async fn remove_member(pool: &SqlitePool, team_id: &str, user_id: &str) -> Result<()> {
    let role = get_member_role(pool, team_id, user_id).await?.ok_or_else(|| {
        DatabaseError::not_found("TeamMember", format!("{}/{}", team_id, user_id))
    })?;

    if role == TeamRole::Owner {
        return Err(ValidationError::invalid("user_id", "the team owner cannot be removed").into());
    }

    let result = sqlx::query(
        r#"
        DELETE FROM team_members
        WHERE team_id = ? AND user_id = ? AND role != 'owner'
        "#,
    )
    .bind(team_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found(
            "TeamMember",
            format!("{}/{}", team_id, user_id),
        ));
    }

    tracing::info!(team_id = %team_id, user_id = %user_id, "Removed team member");
    Ok(())
}
