use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;
use thiserror::Error;

use linekeeper_core::domain::identity::{Profile, UserId, UserRole};
use linekeeper_core::domain::org::{Facility, FacilityId, Floor, FloorId, Team, TeamId};
use linekeeper_core::domain::phone_line::{PhoneLine, PhoneLineId};
use linekeeper_core::domain::vendor::{Vendor, VendorId};
use linekeeper_core::projection::LineFilter;

pub mod identity;
pub mod org;
pub mod phone_line;
pub mod vendor;

pub use identity::SqlIdentityRepository;
pub use org::SqlOrgRepository;
pub use phone_line::SqlPhoneLineRepository;
pub use vendor::SqlVendorRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Every role row stored for `user_id`; callers decide what more than one means.
    async fn role_rows(&self, user_id: &UserId) -> Result<Vec<UserRole>, RepositoryError>;
    async fn find_profile(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError>;
}

#[async_trait]
pub trait OrgRepository: Send + Sync {
    async fn find_facility(&self, id: &FacilityId) -> Result<Option<Facility>, RepositoryError>;
    async fn list_facilities(&self) -> Result<Vec<Facility>, RepositoryError>;
    async fn find_floor(&self, id: &FloorId) -> Result<Option<Floor>, RepositoryError>;
    async fn list_floors(
        &self,
        facility_id: Option<&FacilityId>,
    ) -> Result<Vec<Floor>, RepositoryError>;
    async fn find_team(&self, id: &TeamId) -> Result<Option<Team>, RepositoryError>;
    async fn list_teams(&self, floor_id: Option<&FloorId>) -> Result<Vec<Team>, RepositoryError>;
}

#[async_trait]
pub trait VendorRepository: Send + Sync {
    async fn find_by_id(&self, id: &VendorId) -> Result<Option<Vendor>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Vendor>, RepositoryError>;
}

#[async_trait]
pub trait PhoneLineRepository: Send + Sync {
    async fn find_by_id(&self, id: &PhoneLineId) -> Result<Option<PhoneLine>, RepositoryError>;
    async fn list(&self, filter: &LineFilter) -> Result<Vec<PhoneLine>, RepositoryError>;
}

/// Touches one row so the enclosing transaction takes SQLite's write lock
/// before it reads anything. `table` is always a literal table name.
/// Returns whether the row exists.
pub(crate) async fn claim_row<'e, E>(
    executor: E,
    table: &'static str,
    id: &str,
) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(&format!("UPDATE {table} SET updated_at = updated_at WHERE id = ?"))
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

/// Counters are stored as SQLite integers; negative values never decode.
pub(crate) fn decode_count(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}
