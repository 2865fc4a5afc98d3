//! Writes over the org hierarchy, vendors and role assignments.
//!
//! Like the line engine, every function runs on a caller-owned transaction
//! and opens with a write on the row it depends on, so the checks that
//! follow see a state no other writer can change before commit.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use linekeeper_core::domain::identity::{Role, UserId, UserRole};
use linekeeper_core::domain::org::{
    Facility, FacilityId, FacilityUpdate, Floor, FloorId, FloorUpdate, NewFacility, NewFloor,
    NewTeam, Team, TeamId, TeamUpdate,
};
use linekeeper_core::domain::vendor::{NewVendor, Vendor, VendorId, VendorUpdate};
use linekeeper_core::errors::{DomainError, EntityKind};

use crate::error::{conflict_on_unique, in_use_on_foreign_key, OperationError};
use crate::repositories::{claim_row, identity, org, vendor};

pub(crate) async fn create_facility(
    conn: &mut SqliteConnection,
    new: NewFacility,
    now: DateTime<Utc>,
) -> Result<Facility, OperationError> {
    let facility = new.into_facility(now)?;
    org::insert_facility(&mut *conn, &facility).await?;
    Ok(facility)
}

pub(crate) async fn update_facility(
    conn: &mut SqliteConnection,
    id: &FacilityId,
    update: FacilityUpdate,
    now: DateTime<Utc>,
) -> Result<Facility, OperationError> {
    ensure_claimed(conn, "facility", EntityKind::Facility, &id.0).await?;
    let mut facility = org::fetch_facility(&mut *conn, id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Facility, id.0.clone()))?;

    facility.apply(update, now)?;
    org::update_facility(&mut *conn, &facility).await?;
    Ok(facility)
}

pub(crate) async fn delete_facility(
    conn: &mut SqliteConnection,
    id: &FacilityId,
) -> Result<(), OperationError> {
    ensure_claimed(conn, "facility", EntityKind::Facility, &id.0).await?;
    if org::count_floors_in_facility(&mut *conn, id).await? > 0 {
        return Err(in_use(EntityKind::Facility, &id.0, "floors"));
    }

    org::delete_facility(&mut *conn, id)
        .await
        .map_err(|error| in_use_on_foreign_key(error, EntityKind::Facility, &id.0, "floors"))?;
    Ok(())
}

pub(crate) async fn create_floor(
    conn: &mut SqliteConnection,
    new: NewFloor,
    now: DateTime<Utc>,
) -> Result<Floor, OperationError> {
    ensure_claimed(conn, "facility", EntityKind::Facility, &new.facility_id.0).await?;
    let floor = new.into_floor(now)?;
    org::insert_floor(&mut *conn, &floor).await?;
    Ok(floor)
}

pub(crate) async fn update_floor(
    conn: &mut SqliteConnection,
    id: &FloorId,
    update: FloorUpdate,
    now: DateTime<Utc>,
) -> Result<Floor, OperationError> {
    ensure_claimed(conn, "floor", EntityKind::Floor, &id.0).await?;
    let mut floor = org::fetch_floor(&mut *conn, id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Floor, id.0.clone()))?;

    floor.apply(update, now)?;
    org::update_floor(&mut *conn, &floor).await?;
    Ok(floor)
}

pub(crate) async fn delete_floor(
    conn: &mut SqliteConnection,
    id: &FloorId,
) -> Result<(), OperationError> {
    const DEPENDENTS: &str = "teams or phone lines";

    ensure_claimed(conn, "floor", EntityKind::Floor, &id.0).await?;
    if org::count_floor_dependents(&mut *conn, id).await? > 0 {
        return Err(in_use(EntityKind::Floor, &id.0, DEPENDENTS));
    }

    org::delete_floor(&mut *conn, id)
        .await
        .map_err(|error| in_use_on_foreign_key(error, EntityKind::Floor, &id.0, DEPENDENTS))?;
    Ok(())
}

pub(crate) async fn create_team(
    conn: &mut SqliteConnection,
    new: NewTeam,
    now: DateTime<Utc>,
) -> Result<Team, OperationError> {
    ensure_claimed(conn, "floor", EntityKind::Floor, &new.floor_id.0).await?;
    let floor = org::fetch_floor(&mut *conn, &new.floor_id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Floor, new.floor_id.0.clone()))?;

    let team = new.into_team(&floor, now)?;
    org::insert_team(&mut *conn, &team).await?;
    Ok(team)
}

pub(crate) async fn update_team(
    conn: &mut SqliteConnection,
    id: &TeamId,
    update: TeamUpdate,
    now: DateTime<Utc>,
) -> Result<Team, OperationError> {
    ensure_claimed(conn, "team", EntityKind::Team, &id.0).await?;
    let mut team = org::fetch_team(&mut *conn, id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Team, id.0.clone()))?;

    team.apply(update, now)?;
    org::update_team(&mut *conn, &team).await?;
    Ok(team)
}

pub(crate) async fn delete_team(
    conn: &mut SqliteConnection,
    id: &TeamId,
) -> Result<(), OperationError> {
    ensure_claimed(conn, "team", EntityKind::Team, &id.0).await?;
    if org::count_team_lines(&mut *conn, id).await? > 0 {
        return Err(in_use(EntityKind::Team, &id.0, "phone lines"));
    }

    org::delete_team(&mut *conn, id)
        .await
        .map_err(|error| in_use_on_foreign_key(error, EntityKind::Team, &id.0, "phone lines"))?;
    Ok(())
}

pub(crate) async fn create_vendor(
    conn: &mut SqliteConnection,
    new: NewVendor,
    now: DateTime<Utc>,
) -> Result<Vendor, OperationError> {
    let vendor = new.into_vendor(now)?;
    vendor::insert_vendor(&mut *conn, &vendor).await?;
    Ok(vendor)
}

/// A capacity change is re-based on the provisioned count read under the claim.
pub(crate) async fn update_vendor(
    conn: &mut SqliteConnection,
    id: &VendorId,
    update: VendorUpdate,
    now: DateTime<Utc>,
) -> Result<Vendor, OperationError> {
    ensure_claimed(conn, "vendor", EntityKind::Vendor, &id.0).await?;
    let mut vendor = vendor::fetch_vendor(&mut *conn, id)
        .await?
        .ok_or_else(|| OperationError::not_found(EntityKind::Vendor, id.0.clone()))?;

    vendor.apply(update, now)?;
    vendor::update_vendor(&mut *conn, &vendor).await?;
    Ok(vendor)
}

pub(crate) async fn delete_vendor(
    conn: &mut SqliteConnection,
    id: &VendorId,
) -> Result<(), OperationError> {
    ensure_claimed(conn, "vendor", EntityKind::Vendor, &id.0).await?;
    if vendor::count_vendor_lines(&mut *conn, id).await? > 0 {
        return Err(in_use(EntityKind::Vendor, &id.0, "phone lines"));
    }

    vendor::delete_vendor(&mut *conn, id)
        .await
        .map_err(|error| in_use_on_foreign_key(error, EntityKind::Vendor, &id.0, "phone lines"))?;
    Ok(())
}

/// Inserts first and counts after, so two concurrent assignments for one
/// user cannot both see an empty table.
pub(crate) async fn assign_role(
    conn: &mut SqliteConnection,
    user_id: &UserId,
    role: Role,
    now: DateTime<Utc>,
) -> Result<UserRole, OperationError> {
    identity::insert_role(&mut *conn, user_id, role, now).await.map_err(|error| {
        conflict_on_unique(error, format!("user `{}` already holds {}", user_id.0, role.as_str()))
    })?;

    let rows = identity::fetch_role_rows(&mut *conn, user_id).await?;
    if rows.len() > 1 {
        return Err(DomainError::Conflict(format!(
            "user `{}` already has a role; revoke it before assigning {}",
            user_id.0,
            role.as_str()
        ))
        .into());
    }

    Ok(UserRole { user_id: user_id.clone(), role, created_at: now })
}

pub(crate) async fn revoke_role(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<(), OperationError> {
    if identity::delete_roles(&mut *conn, user_id).await? == 0 {
        return Err(OperationError::not_found(EntityKind::UserRole, user_id.0.clone()));
    }
    Ok(())
}

async fn ensure_claimed(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: EntityKind,
    id: &str,
) -> Result<(), OperationError> {
    if claim_row(&mut *conn, table, id).await? {
        Ok(())
    } else {
        Err(OperationError::not_found(entity, id))
    }
}

fn in_use(entity: EntityKind, id: &str, dependents: &'static str) -> OperationError {
    DomainError::EntityInUse { entity, id: id.to_string(), dependents }.into()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use linekeeper_core::domain::identity::{Role, UserId};
    use linekeeper_core::domain::org::{
        FacilityId, FacilityUpdate, NewFacility, NewFloor, NewTeam, TeamUpdate,
    };
    use linekeeper_core::domain::vendor::{NewVendor, VendorUpdate};
    use linekeeper_core::errors::ErrorKind;

    use super::{
        assign_role, create_facility, create_floor, create_team, create_vendor, delete_facility,
        delete_floor, delete_team, revoke_role, update_facility, update_team, update_vendor,
    };
    use crate::repositories::org;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn hierarchy_builds_top_down_and_deletes_bottom_up() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let now = Utc::now();

        let facility = create_facility(
            &mut conn,
            NewFacility { name: "Building A".into(), address: "1 Main St".into() },
            now,
        )
        .await
        .expect("facility");
        let floor = create_floor(
            &mut conn,
            NewFloor {
                facility_id: facility.id.clone(),
                name: "3rd Floor".into(),
                workstation_range: "WS-301..WS-360".into(),
            },
            now,
        )
        .await
        .expect("floor");
        let team = create_team(
            &mut conn,
            NewTeam {
                facility_id: facility.id.clone(),
                floor_id: floor.id.clone(),
                name: "Technical Support".into(),
                team_size: 10,
            },
            now,
        )
        .await
        .expect("team");

        let error = delete_facility(&mut conn, &facility.id).await.expect_err("has floors");
        assert_eq!(error.kind(), ErrorKind::EntityInUse);
        let error = delete_floor(&mut conn, &floor.id).await.expect_err("has teams");
        assert_eq!(error.kind(), ErrorKind::EntityInUse);

        delete_team(&mut conn, &team.id).await.expect("delete team");
        delete_floor(&mut conn, &floor.id).await.expect("delete floor");
        delete_facility(&mut conn, &facility.id).await.expect("delete facility");

        let error = delete_facility(&mut conn, &facility.id).await.expect_err("already gone");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn team_on_floor_of_other_facility_is_rejected() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let now = Utc::now();

        let facility = create_facility(
            &mut conn,
            NewFacility { name: "Building A".into(), address: "1 Main St".into() },
            now,
        )
        .await
        .expect("facility");
        let floor = create_floor(
            &mut conn,
            NewFloor {
                facility_id: facility.id.clone(),
                name: "1st Floor".into(),
                workstation_range: "WS-101..WS-140".into(),
            },
            now,
        )
        .await
        .expect("floor");

        let error = create_team(
            &mut conn,
            NewTeam {
                facility_id: FacilityId("building-b".into()),
                floor_id: floor.id.clone(),
                name: "Sales Team".into(),
                team_size: 8,
            },
            now,
        )
        .await
        .expect_err("mismatch");
        assert_eq!(error.kind(), ErrorKind::HierarchyMismatch);

        let error = create_floor(
            &mut conn,
            NewFloor {
                facility_id: FacilityId("missing".into()),
                name: "2nd Floor".into(),
                workstation_range: "WS-201..WS-240".into(),
            },
            now,
        )
        .await
        .expect_err("missing facility");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn updates_validate_and_keep_counters() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let now = Utc::now();

        let facility = create_facility(
            &mut conn,
            NewFacility { name: "Building A".into(), address: "1 Main St".into() },
            now,
        )
        .await
        .expect("facility");
        let error = update_facility(
            &mut conn,
            &facility.id,
            FacilityUpdate { name: Some("   ".into()), address: None },
            now,
        )
        .await
        .expect_err("blank name");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);

        let floor = create_floor(
            &mut conn,
            NewFloor {
                facility_id: facility.id.clone(),
                name: "1st Floor".into(),
                workstation_range: "WS-101..WS-140".into(),
            },
            now,
        )
        .await
        .expect("floor");
        let team = create_team(
            &mut conn,
            NewTeam {
                facility_id: facility.id.clone(),
                floor_id: floor.id.clone(),
                name: "Sales Team".into(),
                team_size: 8,
            },
            now,
        )
        .await
        .expect("team");

        let resized = update_team(
            &mut conn,
            &team.id,
            TeamUpdate { name: None, team_size: Some(12) },
            now,
        )
        .await
        .expect("resize");
        assert_eq!(resized.team_size, 12);
        drop(conn);

        let stored = org::fetch_team(&pool, &team.id).await.expect("fetch").expect("exists");
        assert_eq!(stored.team_size, 12);
        assert_eq!(stored.allocated_lines, 0);
    }

    #[tokio::test]
    async fn vendor_resize_recomputes_headroom() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let now = Utc::now();

        let vendor = create_vendor(
            &mut conn,
            NewVendor {
                name: "Vendor 2".into(),
                contact_email: "noc@vendor2.example".into(),
                contact_phone: "+1 555 0200".into(),
                total_lines: 4,
            },
            now,
        )
        .await
        .expect("vendor");

        let grown = update_vendor(
            &mut conn,
            &vendor.id,
            VendorUpdate { total_lines: Some(6), ..VendorUpdate::default() },
            now,
        )
        .await
        .expect("grow");
        assert_eq!(grown.total_lines, 6);
        assert_eq!(grown.available_lines, 6);
    }

    #[tokio::test]
    async fn second_role_for_a_user_is_a_conflict() {
        let pool = pool().await;
        let user = UserId("user-7".into());

        let mut tx = pool.begin().await.expect("tx");
        assign_role(&mut tx, &user, Role::SupportExecutive, Utc::now()).await.expect("assign");
        tx.commit().await.expect("commit");

        let mut tx = pool.begin().await.expect("tx");
        let error = assign_role(&mut tx, &user, Role::SuperAdmin, Utc::now())
            .await
            .expect_err("second role");
        assert_eq!(error.kind(), ErrorKind::Conflict);
        tx.rollback().await.expect("rollback");

        let mut tx = pool.begin().await.expect("tx");
        let error = assign_role(&mut tx, &user, Role::SupportExecutive, Utc::now())
            .await
            .expect_err("same role");
        assert_eq!(error.kind(), ErrorKind::Conflict);
        tx.rollback().await.expect("rollback");

        let mut conn = pool.acquire().await.expect("conn");
        revoke_role(&mut conn, &user).await.expect("revoke");
        let error = revoke_role(&mut conn, &user).await.expect_err("nothing left");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
