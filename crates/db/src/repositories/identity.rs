use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use linekeeper_core::domain::identity::{Profile, ProfileId, Role, UserId, UserRole};

use super::{decode_error, parse_timestamp, IdentityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlIdentityRepository {
    pool: DbPool,
}

impl SqlIdentityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user_role(row: &SqliteRow) -> Result<UserRole, RepositoryError> {
    let role_str: String = row.try_get("role").map_err(decode_error)?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(UserRole {
        user_id: UserId(row.try_get("user_id").map_err(decode_error)?),
        role,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn row_to_profile(row: &SqliteRow) -> Result<Profile, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Profile {
        id: ProfileId(row.try_get("id").map_err(decode_error)?),
        user_id: UserId(row.try_get("user_id").map_err(decode_error)?),
        full_name: row.try_get("full_name").map_err(decode_error)?,
        email: row.try_get("email").map_err(decode_error)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub(crate) async fn fetch_role_rows<'e, E>(
    executor: E,
    user_id: &UserId,
) -> Result<Vec<UserRole>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT user_id, role, created_at FROM user_role WHERE user_id = ? ORDER BY created_at, role",
    )
    .bind(&user_id.0)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_user_role).collect()
}

/// Takes the write lock on the caller's role rows, matched or not.
pub(crate) async fn claim_role_rows<'e, E>(
    executor: E,
    user_id: &UserId,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE user_role SET role = role WHERE user_id = ?")
        .bind(&user_id.0)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn insert_role<'e, E>(
    executor: E,
    user_id: &UserId,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("INSERT INTO user_role (id, user_id, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user_id.0)
        .bind(role.as_str())
        .bind(now.to_rfc3339())
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_roles<'e, E>(executor: E, user_id: &UserId) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM user_role WHERE user_id = ?")
        .bind(&user_id.0)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn fetch_profile<'e, E>(
    executor: E,
    user_id: &UserId,
) -> Result<Option<Profile>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT id, user_id, full_name, email, created_at, updated_at FROM profile WHERE user_id = ?",
    )
    .bind(&user_id.0)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_profile).transpose()
}

/// Inserts the profile, or refreshes name and email when the user already has one.
pub(crate) async fn upsert_profile<'e, E>(executor: E, profile: &Profile) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO profile (id, user_id, full_name, email, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
             full_name = excluded.full_name,
             email = excluded.email,
             updated_at = excluded.updated_at",
    )
    .bind(&profile.id.0)
    .bind(&profile.user_id.0)
    .bind(&profile.full_name)
    .bind(&profile.email)
    .bind(profile.created_at.to_rfc3339())
    .bind(profile.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl IdentityRepository for SqlIdentityRepository {
    async fn role_rows(&self, user_id: &UserId) -> Result<Vec<UserRole>, RepositoryError> {
        fetch_role_rows(&self.pool, user_id).await
    }

    async fn find_profile(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        fetch_profile(&self.pool, user_id).await
    }
}
