use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use linekeeper_core::domain::org::{Facility, FacilityId, Floor, FloorId, Team, TeamId};
use linekeeper_core::projection::DashboardFilter;

use super::{decode_count, decode_error, parse_timestamp, OrgRepository, RepositoryError};
use crate::DbPool;

const FACILITY_COLUMNS: &str = "id, name, address, created_at, updated_at";
const FLOOR_COLUMNS: &str =
    "id, facility_id, name, workstation_range, phone_line_count, created_at, updated_at";
const TEAM_COLUMNS: &str =
    "id, facility_id, floor_id, name, team_size, allocated_lines, created_at, updated_at";

pub struct SqlOrgRepository {
    pool: DbPool,
}

impl SqlOrgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_facility(row: &SqliteRow) -> Result<Facility, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Facility {
        id: FacilityId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        address: row.try_get("address").map_err(decode_error)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_floor(row: &SqliteRow) -> Result<Floor, RepositoryError> {
    let phone_line_count: i64 = row.try_get("phone_line_count").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Floor {
        id: FloorId(row.try_get("id").map_err(decode_error)?),
        facility_id: FacilityId(row.try_get("facility_id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        workstation_range: row.try_get("workstation_range").map_err(decode_error)?,
        phone_line_count: decode_count("phone_line_count", phone_line_count)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_team(row: &SqliteRow) -> Result<Team, RepositoryError> {
    let team_size: i64 = row.try_get("team_size").map_err(decode_error)?;
    let allocated_lines: i64 = row.try_get("allocated_lines").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Team {
        id: TeamId(row.try_get("id").map_err(decode_error)?),
        facility_id: FacilityId(row.try_get("facility_id").map_err(decode_error)?),
        floor_id: FloorId(row.try_get("floor_id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        team_size: decode_count("team_size", team_size)?,
        allocated_lines: decode_count("allocated_lines", allocated_lines)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub(crate) async fn fetch_facility<'e, E>(
    executor: E,
    id: &FacilityId,
) -> Result<Option<Facility>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {FACILITY_COLUMNS} FROM facility WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_facility).transpose()
}

pub(crate) async fn list_facilities<'e, E>(executor: E) -> Result<Vec<Facility>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!("SELECT {FACILITY_COLUMNS} FROM facility ORDER BY name, id"))
        .fetch_all(executor)
        .await?;

    rows.iter().map(row_to_facility).collect()
}

pub(crate) async fn insert_facility<'e, E>(
    executor: E,
    facility: &Facility,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO facility (id, name, address, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&facility.id.0)
    .bind(&facility.name)
    .bind(&facility.address)
    .bind(facility.created_at.to_rfc3339())
    .bind(facility.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_facility<'e, E>(
    executor: E,
    facility: &Facility,
) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE facility SET name = ?, address = ?, updated_at = ? WHERE id = ?")
        .bind(&facility.name)
        .bind(&facility.address)
        .bind(facility.updated_at.to_rfc3339())
        .bind(&facility.id.0)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_facility<'e, E>(executor: E, id: &FacilityId) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM facility WHERE id = ?").bind(&id.0).execute(executor).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn count_floors_in_facility<'e, E>(
    executor: E,
    id: &FacilityId,
) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(1) FROM floor WHERE facility_id = ?")
        .bind(&id.0)
        .fetch_one(executor)
        .await
}

pub(crate) async fn fetch_floor<'e, E>(
    executor: E,
    id: &FloorId,
) -> Result<Option<Floor>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {FLOOR_COLUMNS} FROM floor WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_floor).transpose()
}

pub(crate) async fn list_floors<'e, E>(
    executor: E,
    facility_id: Option<&FacilityId>,
) -> Result<Vec<Floor>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let facility = facility_id.map(|id| id.0.as_str());
    let rows = sqlx::query(&format!(
        "SELECT {FLOOR_COLUMNS} FROM floor
         WHERE (? IS NULL OR facility_id = ?)
         ORDER BY name, id"
    ))
    .bind(facility)
    .bind(facility)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_floor).collect()
}

pub(crate) async fn insert_floor<'e, E>(executor: E, floor: &Floor) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO floor (id, facility_id, name, workstation_range, phone_line_count, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&floor.id.0)
    .bind(&floor.facility_id.0)
    .bind(&floor.name)
    .bind(&floor.workstation_range)
    .bind(i64::from(floor.phone_line_count))
    .bind(floor.created_at.to_rfc3339())
    .bind(floor.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Writes the editable columns only; `phone_line_count` moves through
/// [`adjust_floor_line_count`].
pub(crate) async fn update_floor<'e, E>(executor: E, floor: &Floor) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE floor SET name = ?, workstation_range = ?, updated_at = ? WHERE id = ?")
        .bind(&floor.name)
        .bind(&floor.workstation_range)
        .bind(floor.updated_at.to_rfc3339())
        .bind(&floor.id.0)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_floor<'e, E>(executor: E, id: &FloorId) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM floor WHERE id = ?").bind(&id.0).execute(executor).await?;
    Ok(result.rows_affected())
}

/// Teams plus anchored lines (any status) on the floor.
pub(crate) async fn count_floor_dependents<'e, E>(
    executor: E,
    id: &FloorId,
) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar(
        "SELECT (SELECT COUNT(1) FROM team WHERE floor_id = ?)
              + (SELECT COUNT(1) FROM phone_line WHERE floor_id = ?)",
    )
    .bind(&id.0)
    .bind(&id.0)
    .fetch_one(executor)
    .await
}

pub(crate) async fn adjust_floor_line_count<'e, E>(
    executor: E,
    id: &FloorId,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE floor SET phone_line_count = phone_line_count + ?, updated_at = ? WHERE id = ?",
    )
    .bind(delta)
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn fetch_team<'e, E>(
    executor: E,
    id: &TeamId,
) -> Result<Option<Team>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {TEAM_COLUMNS} FROM team WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_team).transpose()
}

pub(crate) async fn list_teams<'e, E>(
    executor: E,
    floor_id: Option<&FloorId>,
) -> Result<Vec<Team>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let floor = floor_id.map(|id| id.0.as_str());
    let rows = sqlx::query(&format!(
        "SELECT {TEAM_COLUMNS} FROM team
         WHERE (? IS NULL OR floor_id = ?)
         ORDER BY name, id"
    ))
    .bind(floor)
    .bind(floor)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_team).collect()
}

/// Teams matching a dashboard filter. The vendor filter keeps teams that
/// currently hold at least one line from that vendor.
pub(crate) async fn list_dashboard_teams<'e, E>(
    executor: E,
    filter: &DashboardFilter,
) -> Result<Vec<Team>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let facility = filter.facility_id.as_ref().map(|id| id.0.as_str());
    let vendor = filter.vendor_id.as_ref().map(|id| id.0.as_str());
    let team = filter.team_id.as_ref().map(|id| id.0.as_str());

    let rows = sqlx::query(&format!(
        "SELECT {TEAM_COLUMNS} FROM team t
         WHERE (? IS NULL OR t.facility_id = ?)
           AND (? IS NULL OR t.id = ?)
           AND (? IS NULL OR EXISTS (
                SELECT 1 FROM phone_line pl WHERE pl.team_id = t.id AND pl.vendor_id = ?
           ))
         ORDER BY t.name, t.id"
    ))
    .bind(facility)
    .bind(facility)
    .bind(team)
    .bind(team)
    .bind(vendor)
    .bind(vendor)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_team).collect()
}

pub(crate) async fn insert_team<'e, E>(executor: E, team: &Team) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO team (id, facility_id, floor_id, name, team_size, allocated_lines, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&team.id.0)
    .bind(&team.facility_id.0)
    .bind(&team.floor_id.0)
    .bind(&team.name)
    .bind(i64::from(team.team_size))
    .bind(i64::from(team.allocated_lines))
    .bind(team.created_at.to_rfc3339())
    .bind(team.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_team<'e, E>(executor: E, team: &Team) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE team SET name = ?, team_size = ?, updated_at = ? WHERE id = ?")
        .bind(&team.name)
        .bind(i64::from(team.team_size))
        .bind(team.updated_at.to_rfc3339())
        .bind(&team.id.0)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_team<'e, E>(executor: E, id: &TeamId) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM team WHERE id = ?").bind(&id.0).execute(executor).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn count_team_lines<'e, E>(executor: E, id: &TeamId) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(1) FROM phone_line WHERE team_id = ?")
        .bind(&id.0)
        .fetch_one(executor)
        .await
}

pub(crate) async fn adjust_team_allocated<'e, E>(
    executor: E,
    id: &TeamId,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE team SET allocated_lines = allocated_lines + ?, updated_at = ? WHERE id = ?",
    )
    .bind(delta)
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

#[async_trait::async_trait]
impl OrgRepository for SqlOrgRepository {
    async fn find_facility(&self, id: &FacilityId) -> Result<Option<Facility>, RepositoryError> {
        fetch_facility(&self.pool, id).await
    }

    async fn list_facilities(&self) -> Result<Vec<Facility>, RepositoryError> {
        list_facilities(&self.pool).await
    }

    async fn find_floor(&self, id: &FloorId) -> Result<Option<Floor>, RepositoryError> {
        fetch_floor(&self.pool, id).await
    }

    async fn list_floors(
        &self,
        facility_id: Option<&FacilityId>,
    ) -> Result<Vec<Floor>, RepositoryError> {
        list_floors(&self.pool, facility_id).await
    }

    async fn find_team(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError> {
        fetch_team(&self.pool, id).await
    }

    async fn list_teams(&self, floor_id: Option<&FloorId>) -> Result<Vec<Team>, RepositoryError> {
        list_teams(&self.pool, floor_id).await
    }
}
