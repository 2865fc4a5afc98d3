use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use linekeeper_core::domain::vendor::{Vendor, VendorId};

use super::{decode_count, decode_error, parse_timestamp, RepositoryError, VendorRepository};
use crate::DbPool;

pub(crate) const VENDOR_COLUMNS: &str =
    "id, name, contact_email, contact_phone, total_lines, available_lines, created_at, updated_at";

pub struct SqlVendorRepository {
    pool: DbPool,
}

impl SqlVendorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_vendor(row: &SqliteRow) -> Result<Vendor, RepositoryError> {
    let total_lines: i64 = row.try_get("total_lines").map_err(decode_error)?;
    let available_lines: i64 = row.try_get("available_lines").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Vendor {
        id: VendorId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        contact_email: row.try_get("contact_email").map_err(decode_error)?,
        contact_phone: row.try_get("contact_phone").map_err(decode_error)?,
        total_lines: decode_count("total_lines", total_lines)?,
        available_lines: decode_count("available_lines", available_lines)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub(crate) async fn fetch_vendor<'e, E>(
    executor: E,
    id: &VendorId,
) -> Result<Option<Vendor>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendor WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_vendor).transpose()
}

pub(crate) async fn list_vendors<'e, E>(executor: E) -> Result<Vec<Vendor>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendor ORDER BY name, id"))
        .fetch_all(executor)
        .await?;

    rows.iter().map(row_to_vendor).collect()
}

pub(crate) async fn insert_vendor<'e, E>(executor: E, vendor: &Vendor) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO vendor (id, name, contact_email, contact_phone, total_lines, available_lines, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&vendor.id.0)
    .bind(&vendor.name)
    .bind(&vendor.contact_email)
    .bind(&vendor.contact_phone)
    .bind(i64::from(vendor.total_lines))
    .bind(i64::from(vendor.available_lines))
    .bind(vendor.created_at.to_rfc3339())
    .bind(vendor.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_vendor<'e, E>(executor: E, vendor: &Vendor) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "UPDATE vendor
         SET name = ?, contact_email = ?, contact_phone = ?,
             total_lines = ?, available_lines = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&vendor.name)
    .bind(&vendor.contact_email)
    .bind(&vendor.contact_phone)
    .bind(i64::from(vendor.total_lines))
    .bind(i64::from(vendor.available_lines))
    .bind(vendor.updated_at.to_rfc3339())
    .bind(&vendor.id.0)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete_vendor<'e, E>(executor: E, id: &VendorId) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM vendor WHERE id = ?").bind(&id.0).execute(executor).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn count_vendor_lines<'e, E>(executor: E, id: &VendorId) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(1) FROM phone_line WHERE vendor_id = ?")
        .bind(&id.0)
        .fetch_one(executor)
        .await
}

/// Takes one unit of provisioning headroom. Returns `false` when the vendor
/// is missing or already exhausted; the check and the decrement are one
/// statement.
pub(crate) async fn consume_capacity<'e, E>(
    executor: E,
    id: &VendorId,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE vendor SET available_lines = available_lines - 1, updated_at = ?
         WHERE id = ? AND available_lines > 0",
    )
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn adjust_available_lines<'e, E>(
    executor: E,
    id: &VendorId,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE vendor SET available_lines = available_lines + ?, updated_at = ? WHERE id = ?",
    )
    .bind(delta)
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait::async_trait]
impl VendorRepository for SqlVendorRepository {
    async fn find_by_id(&self, id: &VendorId) -> Result<Option<Vendor>, RepositoryError> {
        fetch_vendor(&self.pool, id).await
    }

    async fn list(&self) -> Result<Vec<Vendor>, RepositoryError> {
        list_vendors(&self.pool).await
    }
}
