//! Phone line allocation engine.
//!
//! Each function runs inside a transaction owned by the caller and starts
//! with a write on the row it operates on, so SQLite's writer lock is held
//! before any state is read. A concurrent caller blocks on `busy_timeout`
//! and then reads the committed result of the winner.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use linekeeper_core::domain::org::ensure_hierarchy_path;
use linekeeper_core::domain::phone_line::{
    AllocationTarget, LineAction, LineEffects, PhoneLine, PhoneLineId,
};
use linekeeper_core::errors::{DomainError, EntityKind};

use crate::error::{conflict_on_unique, OperationError};
use crate::repositories::{claim_row, org, phone_line, vendor};

/// Inserts a freshly built line and takes one unit of its vendor's headroom.
pub(crate) async fn provision_line(
    conn: &mut SqliteConnection,
    line: PhoneLine,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    if !vendor::consume_capacity(&mut *conn, &line.vendor_id, now).await? {
        return match vendor::fetch_vendor(&mut *conn, &line.vendor_id).await? {
            Some(_) => Err(DomainError::VendorCapacityExhausted {
                vendor_id: line.vendor_id.0.clone(),
            }
            .into()),
            None => Err(OperationError::not_found(EntityKind::Vendor, line.vendor_id.0.clone())),
        };
    }

    phone_line::insert_line(&mut *conn, &line).await.map_err(|error| {
        conflict_on_unique(
            error,
            format!(
                "a phone line with DID `{}` or serial `{}` already exists",
                line.phone_line_did, line.serial_no
            ),
        )
    })?;

    Ok(line)
}

pub(crate) async fn allocate_line(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
    target: &AllocationTarget,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    let line = claim_line(conn, line_id).await?;
    line.status.transition(LineAction::Allocate, &line.id)?;
    check_target(conn, target).await?;

    let effects = line.allocate(target, now)?;
    apply_effects(conn, &effects, now).await?;
    Ok(effects.line)
}

pub(crate) async fn deallocate_line(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    let line = claim_line(conn, line_id).await?;
    let effects = line.deallocate(now)?;
    apply_effects(conn, &effects, now).await?;
    Ok(effects.line)
}

pub(crate) async fn transfer_line(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
    target: &AllocationTarget,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    let line = claim_line(conn, line_id).await?;
    line.status.transition(LineAction::Transfer, &line.id)?;
    check_target(conn, target).await?;

    let effects = line.transfer(target, now)?;
    apply_effects(conn, &effects, now).await?;
    Ok(effects.line)
}

pub(crate) async fn mark_maintenance(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    let line = claim_line(conn, line_id).await?;
    let effects = line.mark_maintenance(now)?;
    apply_effects(conn, &effects, now).await?;
    Ok(effects.line)
}

pub(crate) async fn restore_line(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    let line = claim_line(conn, line_id).await?;
    let effects = line.restore(now)?;
    apply_effects(conn, &effects, now).await?;
    Ok(effects.line)
}

pub(crate) async fn retire_line(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
    now: DateTime<Utc>,
) -> Result<PhoneLine, OperationError> {
    let line = claim_line(conn, line_id).await?;
    let effects = line.retire(now)?;
    apply_effects(conn, &effects, now).await?;
    Ok(effects.line)
}

async fn claim_line(
    conn: &mut SqliteConnection,
    line_id: &PhoneLineId,
) -> Result<PhoneLine, OperationError> {
    if !claim_row(&mut *conn, "phone_line", &line_id.0).await? {
        return Err(OperationError::not_found(EntityKind::PhoneLine, line_id.0.clone()));
    }

    phone_line::fetch_line(&mut *conn, line_id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::PhoneLine, line_id.0.clone()))
}

/// The target team must sit on the target floor, which must sit in the target facility.
async fn check_target(
    conn: &mut SqliteConnection,
    target: &AllocationTarget,
) -> Result<(), OperationError> {
    let team = org::fetch_team(&mut *conn, &target.team_id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Team, target.team_id.0.clone()))?;
    let floor = org::fetch_floor(&mut *conn, &target.floor_id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Floor, target.floor_id.0.clone()))?;

    ensure_hierarchy_path(&target.facility_id, &floor, &team)?;
    Ok(())
}

async fn apply_effects(
    conn: &mut SqliteConnection,
    effects: &LineEffects,
    now: DateTime<Utc>,
) -> Result<(), OperationError> {
    let line = &effects.line;
    if phone_line::write_line(&mut *conn, line).await? != 1 {
        return Err(missing_counter_row("phone line", &line.id.0, &line.id.0));
    }

    for delta in &effects.team_deltas {
        let touched = org::adjust_team_allocated(&mut *conn, &delta.id, delta.delta, now).await?;
        if touched != 1 {
            return Err(missing_counter_row("team", &delta.id.0, &line.id.0));
        }
    }

    for delta in &effects.floor_deltas {
        let touched = org::adjust_floor_line_count(&mut *conn, &delta.id, delta.delta, now).await?;
        if touched != 1 {
            return Err(missing_counter_row("floor", &delta.id.0, &line.id.0));
        }
    }

    if effects.vendor_delta != 0 {
        let touched =
            vendor::adjust_available_lines(&mut *conn, &line.vendor_id, effects.vendor_delta, now)
                .await?;
        if touched != 1 {
            return Err(missing_counter_row("vendor", &line.vendor_id.0, &line.id.0));
        }
    }

    Ok(())
}

fn missing_counter_row(entity: &str, id: &str, line_id: &str) -> OperationError {
    DomainError::InvariantViolation(format!(
        "{entity} `{id}` referenced by phone line `{line_id}` disappeared mid-transaction"
    ))
    .into()
}
