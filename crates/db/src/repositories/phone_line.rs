use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use linekeeper_core::domain::org::{FacilityId, FloorId, TeamId};
use linekeeper_core::domain::phone_line::{
    LineAssignment, LineSite, PhoneLine, PhoneLineId, PhoneLineStatus,
};
use linekeeper_core::domain::vendor::VendorId;
use linekeeper_core::projection::LineFilter;

use super::{decode_error, parse_timestamp, PhoneLineRepository, RepositoryError};
use crate::DbPool;

const LINE_COLUMNS: &str = "id, vendor_id, phone_line_did, serial_no, status, facility_id, floor_id, \
     team_id, employee_name, extension_no, workstation_code, allocated_at, created_at, updated_at";

pub struct SqlPhoneLineRepository {
    pool: DbPool,
}

impl SqlPhoneLineRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_line(row: &SqliteRow) -> Result<PhoneLine, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let status_str: String = row.try_get("status").map_err(decode_error)?;
    let status = PhoneLineStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown phone line status `{status_str}`")))?;

    let facility_id: Option<String> = row.try_get("facility_id").map_err(decode_error)?;
    let floor_id: Option<String> = row.try_get("floor_id").map_err(decode_error)?;
    let site = match (facility_id, floor_id) {
        (Some(facility_id), Some(floor_id)) => {
            Some(LineSite { facility_id: FacilityId(facility_id), floor_id: FloorId(floor_id) })
        }
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(format!(
                "phone line `{id}` has a partial site anchor"
            )))
        }
    };

    let team_id: Option<String> = row.try_get("team_id").map_err(decode_error)?;
    let allocated_at: Option<String> = row.try_get("allocated_at").map_err(decode_error)?;
    let assignment = match (team_id, allocated_at) {
        (Some(team_id), Some(allocated_at)) => Some(LineAssignment {
            team_id: TeamId(team_id),
            employee_name: row.try_get("employee_name").map_err(decode_error)?,
            extension_no: row.try_get("extension_no").map_err(decode_error)?,
            workstation_code: row.try_get("workstation_code").map_err(decode_error)?,
            allocated_at: parse_timestamp("allocated_at", &allocated_at)?,
        }),
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(format!(
                "phone line `{id}` has a team without an allocation time"
            )))
        }
    };

    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(PhoneLine {
        id: PhoneLineId(id),
        vendor_id: VendorId(row.try_get("vendor_id").map_err(decode_error)?),
        phone_line_did: row.try_get("phone_line_did").map_err(decode_error)?,
        serial_no: row.try_get("serial_no").map_err(decode_error)?,
        status,
        site,
        assignment,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub(crate) async fn fetch_line<'e, E>(
    executor: E,
    id: &PhoneLineId,
) -> Result<Option<PhoneLine>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("SELECT {LINE_COLUMNS} FROM phone_line WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_line).transpose()
}

pub(crate) async fn list_lines<'e, E>(
    executor: E,
    filter: &LineFilter,
) -> Result<Vec<PhoneLine>, RepositoryError>
where
    E: SqliteExecutor<'e>,
{
    let vendor = filter.vendor_id.as_ref().map(|id| id.0.as_str());
    let facility = filter.facility_id.as_ref().map(|id| id.0.as_str());
    let team = filter.team_id.as_ref().map(|id| id.0.as_str());
    let status = filter.status.map(|status| status.as_str());

    let rows = sqlx::query(&format!(
        "SELECT {LINE_COLUMNS} FROM phone_line
         WHERE (? IS NULL OR vendor_id = ?)
           AND (? IS NULL OR facility_id = ?)
           AND (? IS NULL OR team_id = ?)
           AND (? IS NULL OR status = ?)
         ORDER BY phone_line_did, id"
    ))
    .bind(vendor)
    .bind(vendor)
    .bind(facility)
    .bind(facility)
    .bind(team)
    .bind(team)
    .bind(status)
    .bind(status)
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_line).collect()
}

pub(crate) async fn insert_line<'e, E>(executor: E, line: &PhoneLine) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let columns = LineColumns::of(line);
    sqlx::query(&format!(
        "INSERT INTO phone_line ({LINE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&line.id.0)
    .bind(&line.vendor_id.0)
    .bind(&line.phone_line_did)
    .bind(&line.serial_no)
    .bind(line.status.as_str())
    .bind(columns.facility_id)
    .bind(columns.floor_id)
    .bind(columns.team_id)
    .bind(columns.employee_name)
    .bind(columns.extension_no)
    .bind(columns.workstation_code)
    .bind(columns.allocated_at)
    .bind(line.created_at.to_rfc3339())
    .bind(line.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Persists status, site and assignment of an existing line.
pub(crate) async fn write_line<'e, E>(executor: E, line: &PhoneLine) -> Result<u64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let columns = LineColumns::of(line);
    let result = sqlx::query(
        "UPDATE phone_line
         SET status = ?, facility_id = ?, floor_id = ?, team_id = ?, employee_name = ?,
             extension_no = ?, workstation_code = ?, allocated_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(line.status.as_str())
    .bind(columns.facility_id)
    .bind(columns.floor_id)
    .bind(columns.team_id)
    .bind(columns.employee_name)
    .bind(columns.extension_no)
    .bind(columns.workstation_code)
    .bind(columns.allocated_at)
    .bind(line.updated_at.to_rfc3339())
    .bind(&line.id.0)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

struct LineColumns<'a> {
    facility_id: Option<&'a str>,
    floor_id: Option<&'a str>,
    team_id: Option<&'a str>,
    employee_name: Option<&'a str>,
    extension_no: Option<&'a str>,
    workstation_code: Option<&'a str>,
    allocated_at: Option<String>,
}

impl<'a> LineColumns<'a> {
    fn of(line: &'a PhoneLine) -> Self {
        let site = line.site.as_ref();
        let assignment = line.assignment.as_ref();
        Self {
            facility_id: site.map(|site| site.facility_id.0.as_str()),
            floor_id: site.map(|site| site.floor_id.0.as_str()),
            team_id: assignment.map(|assignment| assignment.team_id.0.as_str()),
            employee_name: assignment.and_then(|assignment| assignment.employee_name.as_deref()),
            extension_no: assignment.and_then(|assignment| assignment.extension_no.as_deref()),
            workstation_code: assignment
                .and_then(|assignment| assignment.workstation_code.as_deref()),
            allocated_at: assignment.map(|assignment| assignment.allocated_at.to_rfc3339()),
        }
    }
}

#[async_trait::async_trait]
impl PhoneLineRepository for SqlPhoneLineRepository {
    async fn find_by_id(&self, id: &PhoneLineId) -> Result<Option<PhoneLine>, RepositoryError> {
        fetch_line(&self.pool, id).await
    }

    async fn list(&self, filter: &LineFilter) -> Result<Vec<PhoneLine>, RepositoryError> {
        list_lines(&self.pool, filter).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use linekeeper_core::domain::phone_line::{NewPhoneLine, PhoneLine, PhoneLineStatus};
    use linekeeper_core::domain::vendor::NewVendor;
    use linekeeper_core::projection::LineFilter;

    use super::{insert_line, SqlPhoneLineRepository};
    use crate::repositories::claim_row;
    use crate::repositories::vendor::insert_vendor;
    use crate::repositories::PhoneLineRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn provisioned_line_round_trips_and_filters_by_status() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let vendor = NewVendor {
            name: "Vendor 1".into(),
            contact_email: "noc@vendor1.example".into(),
            contact_phone: "+1 555 0100".into(),
            total_lines: 3,
        }
        .into_vendor(Utc::now())
        .expect("vendor");
        insert_vendor(&pool, &vendor).await.expect("insert vendor");

        let line = PhoneLine::provision(
            NewPhoneLine {
                vendor_id: vendor.id.clone(),
                phone_line_did: "+1 555 0101".into(),
                serial_no: "SN-0101".into(),
            },
            Utc::now(),
        )
        .expect("line");
        insert_line(&pool, &line).await.expect("insert line");

        let repo = SqlPhoneLineRepository::new(pool.clone());
        let loaded = repo.find_by_id(&line.id).await.expect("find").expect("line exists");
        assert_eq!(loaded.status, PhoneLineStatus::Available);
        assert_eq!(loaded.site, None);
        assert_eq!(loaded.assignment, None);

        let available = repo
            .list(&LineFilter {
                status: Some(PhoneLineStatus::Available),
                ..LineFilter::default()
            })
            .await
            .expect("list");
        assert_eq!(available.len(), 1);

        let retired = repo
            .list(&LineFilter { status: Some(PhoneLineStatus::Retired), ..LineFilter::default() })
            .await
            .expect("list");
        assert!(retired.is_empty());

        assert!(claim_row(&pool, "phone_line", &line.id.0).await.expect("claim"));
        assert!(!claim_row(&pool, "phone_line", "missing").await.expect("claim"));
    }

    #[tokio::test]
    async fn duplicate_did_is_a_unique_violation() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let vendor = NewVendor {
            name: "Vendor 1".into(),
            contact_email: "noc@vendor1.example".into(),
            contact_phone: "+1 555 0100".into(),
            total_lines: 3,
        }
        .into_vendor(Utc::now())
        .expect("vendor");
        insert_vendor(&pool, &vendor).await.expect("insert vendor");

        let new_line = |serial: &str| {
            PhoneLine::provision(
                NewPhoneLine {
                    vendor_id: vendor.id.clone(),
                    phone_line_did: "+1 555 0101".into(),
                    serial_no: serial.into(),
                },
                Utc::now(),
            )
            .expect("line")
        };
        insert_line(&pool, &new_line("SN-1")).await.expect("first insert");

        let error = insert_line(&pool, &new_line("SN-2")).await.expect_err("duplicate did");
        let is_unique = matches!(&error, sqlx::Error::Database(db) if db.is_unique_violation());
        assert!(is_unique, "unexpected error: {error}");
    }
}
