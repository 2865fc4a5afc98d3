//! The gated entry point to line allocation storage.
//!
//! Every method resolves the caller's role from `user_role` rows and passes it
//! through [`authorize`] before touching anything else. Writes do this inside
//! their own transaction. Nothing outside this type can reach the write paths.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};

use linekeeper_core::access::{authorize, Operation};
use linekeeper_core::domain::identity::{resolve_role, Profile, Role, Session, UserId, UserRole};
use linekeeper_core::domain::org::{
    Facility, FacilityId, FacilityUpdate, Floor, FloorId, FloorUpdate, NewFacility, NewFloor,
    NewTeam, Team, TeamId, TeamUpdate,
};
use linekeeper_core::domain::phone_line::{
    AllocationTarget, NewPhoneLine, PhoneLine, PhoneLineId,
};
use linekeeper_core::domain::vendor::{NewVendor, Vendor, VendorId, VendorUpdate};
use linekeeper_core::errors::EntityKind;
use linekeeper_core::projection::{
    Dashboard, DashboardFilter, HealthThresholds, LineFilter, VendorCapacity,
};

use crate::connection::DbPool;
use crate::error::OperationError;
use crate::integrity::IntegrityReport;
use crate::repositories::{
    identity, IdentityRepository, OrgRepository, PhoneLineRepository, SqlIdentityRepository,
    SqlOrgRepository, SqlPhoneLineRepository, SqlVendorRepository, VendorRepository,
};
use crate::{admin, dashboard, engine, integrity};

pub struct LineDesk {
    pool: DbPool,
    thresholds: HealthThresholds,
    identities: SqlIdentityRepository,
    orgs: SqlOrgRepository,
    vendors: SqlVendorRepository,
    lines: SqlPhoneLineRepository,
}

impl LineDesk {
    pub fn new(pool: DbPool) -> Self {
        Self {
            thresholds: HealthThresholds::default(),
            identities: SqlIdentityRepository::new(pool.clone()),
            orgs: SqlOrgRepository::new(pool.clone()),
            vendors: SqlVendorRepository::new(pool.clone()),
            lines: SqlPhoneLineRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// The caller's role as stored right now. Never cached.
    pub async fn resolve_role(&self, session: &Session) -> Result<Role, OperationError> {
        let rows = self.identities.role_rows(&session.user_id).await?;
        Ok(resolve_role(&session.user_id, &rows)?)
    }

    /// Read-path gate. Mutations go through [`Self::begin_authorized`].
    async fn authorize(
        &self,
        session: &Session,
        operation: Operation,
    ) -> Result<Role, OperationError> {
        let checked = match self.resolve_role(session).await {
            Ok(role) => authorize(role, operation).map(|()| role).map_err(OperationError::from),
            Err(error) => Err(error),
        };

        if let Err(error) = &checked {
            log_refusal(session, operation, error);
        }
        checked
    }

    /// Opens the write transaction and resolves the caller's role inside it.
    ///
    /// The caller's `user_role` rows are claimed before they are read, so a
    /// concurrent assign or revoke either commits first or waits until this
    /// transaction ends. The check and the write it guards see the same rows.
    async fn begin_authorized(
        &self,
        session: &Session,
        operation: Operation,
    ) -> Result<Transaction<'static, Sqlite>, OperationError> {
        let mut tx = self.pool.begin().await?;
        let checked = match identity::claim_role_rows(&mut *tx, &session.user_id).await {
            Ok(()) => match identity::fetch_role_rows(&mut *tx, &session.user_id).await {
                Ok(rows) => resolve_role(&session.user_id, &rows)
                    .and_then(|role| authorize(role, operation))
                    .map_err(OperationError::from),
                Err(error) => Err(error.into()),
            },
            Err(error) => Err(error.into()),
        };

        match checked {
            Ok(()) => Ok(tx),
            Err(error) => {
                log_refusal(session, operation, &error);
                Err(error)
            }
        }
    }

    /// Commits on success; on failure the dropped transaction rolls back.
    async fn settle<T>(
        &self,
        tx: Transaction<'_, Sqlite>,
        session: &Session,
        operation: Operation,
        result: Result<T, OperationError>,
    ) -> Result<T, OperationError> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(error) => {
                warn!(
                    event_name = "operation.rejected",
                    user_id = %session.user_id.0,
                    operation = operation.as_str(),
                    error_kind = error.kind().as_str(),
                    error = %error,
                    "operation rolled back"
                );
                Err(error)
            }
        }
    }

    // --- identity ---

    /// Signup path: any caller may create or refresh their own profile.
    pub async fn upsert_profile(
        &self,
        user_id: &UserId,
        full_name: &str,
        email: &str,
    ) -> Result<Profile, OperationError> {
        let profile = Profile::new(user_id.clone(), full_name, email, Utc::now())?;

        let mut tx = self.pool.begin().await?;
        identity::upsert_profile(&mut *tx, &profile).await?;
        let stored = identity::fetch_profile(&mut *tx, user_id)
            .await?
            .ok_or_else(|| OperationError::not_found(EntityKind::Profile, user_id.0.clone()))?;
        tx.commit().await?;

        info!(event_name = "profile.upsert.committed", user_id = %user_id.0, "profile saved");
        Ok(stored)
    }

    pub async fn profile(
        &self,
        session: &Session,
        user_id: &UserId,
    ) -> Result<Profile, OperationError> {
        self.authorize(session, Operation::Read).await?;
        self.identities
            .find_profile(user_id)
            .await?
            .ok_or_else(|| OperationError::not_found(EntityKind::Profile, user_id.0.clone()))
    }

    pub async fn assign_role(
        &self,
        session: &Session,
        user_id: &UserId,
        role: Role,
    ) -> Result<UserRole, OperationError> {
        let operation = Operation::AssignRole;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::assign_role(&mut tx, user_id, role, Utc::now()).await;
        let assigned = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "role.assign.committed",
            user_id = %session.user_id.0,
            target_user_id = %user_id.0,
            role = role.as_str(),
            "role assigned"
        );
        Ok(assigned)
    }

    pub async fn revoke_role(
        &self,
        session: &Session,
        user_id: &UserId,
    ) -> Result<(), OperationError> {
        let operation = Operation::RevokeRole;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::revoke_role(&mut tx, user_id).await;
        self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "role.revoke.committed",
            user_id = %session.user_id.0,
            target_user_id = %user_id.0,
            "role revoked"
        );
        Ok(())
    }

    // --- org hierarchy ---

    pub async fn create_facility(
        &self,
        session: &Session,
        new: NewFacility,
    ) -> Result<Facility, OperationError> {
        let operation = Operation::CreateFacility;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::create_facility(&mut tx, new, Utc::now()).await;
        let facility = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "facility.create.committed",
            user_id = %session.user_id.0,
            facility_id = %facility.id.0,
            "facility created"
        );
        Ok(facility)
    }

    pub async fn update_facility(
        &self,
        session: &Session,
        id: &FacilityId,
        update: FacilityUpdate,
    ) -> Result<Facility, OperationError> {
        let operation = Operation::UpdateFacility;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::update_facility(&mut tx, id, update, Utc::now()).await;
        let facility = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "facility.update.committed",
            user_id = %session.user_id.0,
            facility_id = %id.0,
            "facility updated"
        );
        Ok(facility)
    }

    pub async fn delete_facility(
        &self,
        session: &Session,
        id: &FacilityId,
    ) -> Result<(), OperationError> {
        let operation = Operation::DeleteFacility;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::delete_facility(&mut tx, id).await;
        self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "facility.delete.committed",
            user_id = %session.user_id.0,
            facility_id = %id.0,
            "facility deleted"
        );
        Ok(())
    }

    pub async fn create_floor(
        &self,
        session: &Session,
        new: NewFloor,
    ) -> Result<Floor, OperationError> {
        let operation = Operation::CreateFloor;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::create_floor(&mut tx, new, Utc::now()).await;
        let floor = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "floor.create.committed",
            user_id = %session.user_id.0,
            floor_id = %floor.id.0,
            facility_id = %floor.facility_id.0,
            "floor created"
        );
        Ok(floor)
    }

    pub async fn update_floor(
        &self,
        session: &Session,
        id: &FloorId,
        update: FloorUpdate,
    ) -> Result<Floor, OperationError> {
        let operation = Operation::UpdateFloor;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::update_floor(&mut tx, id, update, Utc::now()).await;
        let floor = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "floor.update.committed",
            user_id = %session.user_id.0,
            floor_id = %id.0,
            "floor updated"
        );
        Ok(floor)
    }

    pub async fn delete_floor(&self, session: &Session, id: &FloorId) -> Result<(), OperationError> {
        let operation = Operation::DeleteFloor;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::delete_floor(&mut tx, id).await;
        self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "floor.delete.committed",
            user_id = %session.user_id.0,
            floor_id = %id.0,
            "floor deleted"
        );
        Ok(())
    }

    pub async fn create_team(&self, session: &Session, new: NewTeam) -> Result<Team, OperationError> {
        let operation = Operation::CreateTeam;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::create_team(&mut tx, new, Utc::now()).await;
        let team = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "team.create.committed",
            user_id = %session.user_id.0,
            team_id = %team.id.0,
            floor_id = %team.floor_id.0,
            "team created"
        );
        Ok(team)
    }

    pub async fn update_team(
        &self,
        session: &Session,
        id: &TeamId,
        update: TeamUpdate,
    ) -> Result<Team, OperationError> {
        let operation = Operation::UpdateTeam;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::update_team(&mut tx, id, update, Utc::now()).await;
        let team = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "team.update.committed",
            user_id = %session.user_id.0,
            team_id = %id.0,
            team_size = team.team_size,
            "team updated"
        );
        Ok(team)
    }

    pub async fn delete_team(&self, session: &Session, id: &TeamId) -> Result<(), OperationError> {
        let operation = Operation::DeleteTeam;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::delete_team(&mut tx, id).await;
        self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "team.delete.committed",
            user_id = %session.user_id.0,
            team_id = %id.0,
            "team deleted"
        );
        Ok(())
    }

    // --- vendors ---

    pub async fn create_vendor(
        &self,
        session: &Session,
        new: NewVendor,
    ) -> Result<Vendor, OperationError> {
        let operation = Operation::CreateVendor;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::create_vendor(&mut tx, new, Utc::now()).await;
        let vendor = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "vendor.create.committed",
            user_id = %session.user_id.0,
            vendor_id = %vendor.id.0,
            total_lines = vendor.total_lines,
            "vendor created"
        );
        Ok(vendor)
    }

    pub async fn update_vendor(
        &self,
        session: &Session,
        id: &VendorId,
        update: VendorUpdate,
    ) -> Result<Vendor, OperationError> {
        let operation = Operation::UpdateVendor;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::update_vendor(&mut tx, id, update, Utc::now()).await;
        let vendor = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "vendor.update.committed",
            user_id = %session.user_id.0,
            vendor_id = %id.0,
            total_lines = vendor.total_lines,
            available_lines = vendor.available_lines,
            "vendor updated"
        );
        Ok(vendor)
    }

    pub async fn delete_vendor(&self, session: &Session, id: &VendorId) -> Result<(), OperationError> {
        let operation = Operation::DeleteVendor;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = admin::delete_vendor(&mut tx, id).await;
        self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "vendor.delete.committed",
            user_id = %session.user_id.0,
            vendor_id = %id.0,
            "vendor deleted"
        );
        Ok(())
    }

    // --- phone lines ---

    pub async fn provision_line(
        &self,
        session: &Session,
        new: NewPhoneLine,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::ProvisionLine;
        let mut tx = self.begin_authorized(session, operation).await?;

        let now = Utc::now();
        let line = PhoneLine::provision(new, now)?;
        let result = engine::provision_line(&mut tx, line, now).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.provision.committed",
            user_id = %session.user_id.0,
            line_id = %line.id.0,
            vendor_id = %line.vendor_id.0,
            "phone line provisioned"
        );
        Ok(line)
    }

    pub async fn allocate_line(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
        target: &AllocationTarget,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::AllocateLine;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = engine::allocate_line(&mut tx, line_id, target, Utc::now()).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.allocate.committed",
            user_id = %session.user_id.0,
            line_id = %line_id.0,
            team_id = %target.team_id.0,
            floor_id = %target.floor_id.0,
            "phone line allocated"
        );
        Ok(line)
    }

    pub async fn deallocate_line(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::DeallocateLine;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = engine::deallocate_line(&mut tx, line_id, Utc::now()).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.deallocate.committed",
            user_id = %session.user_id.0,
            line_id = %line_id.0,
            "phone line deallocated"
        );
        Ok(line)
    }

    pub async fn transfer_line(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
        target: &AllocationTarget,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::TransferLine;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = engine::transfer_line(&mut tx, line_id, target, Utc::now()).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.transfer.committed",
            user_id = %session.user_id.0,
            line_id = %line_id.0,
            team_id = %target.team_id.0,
            floor_id = %target.floor_id.0,
            "phone line transferred"
        );
        Ok(line)
    }

    pub async fn set_maintenance(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::SetMaintenance;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = engine::mark_maintenance(&mut tx, line_id, Utc::now()).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.maintenance.committed",
            user_id = %session.user_id.0,
            line_id = %line_id.0,
            "phone line sent to maintenance"
        );
        Ok(line)
    }

    pub async fn restore_line(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::RestoreLine;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = engine::restore_line(&mut tx, line_id, Utc::now()).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.restore.committed",
            user_id = %session.user_id.0,
            line_id = %line_id.0,
            "phone line restored"
        );
        Ok(line)
    }

    pub async fn retire_line(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
    ) -> Result<PhoneLine, OperationError> {
        let operation = Operation::RetireLine;
        let mut tx = self.begin_authorized(session, operation).await?;
        let result = engine::retire_line(&mut tx, line_id, Utc::now()).await;
        let line = self.settle(tx, session, operation, result).await?;

        info!(
            event_name = "line.retire.committed",
            user_id = %session.user_id.0,
            line_id = %line_id.0,
            vendor_id = %line.vendor_id.0,
            "phone line retired"
        );
        Ok(line)
    }

    // --- reads ---

    pub async fn facilities(&self, session: &Session) -> Result<Vec<Facility>, OperationError> {
        self.authorize(session, Operation::Read).await?;
        Ok(self.orgs.list_facilities().await?)
    }

    pub async fn floors(
        &self,
        session: &Session,
        facility_id: Option<&FacilityId>,
    ) -> Result<Vec<Floor>, OperationError> {
        self.authorize(session, Operation::Read).await?;
        Ok(self.orgs.list_floors(facility_id).await?)
    }

    pub async fn teams(
        &self,
        session: &Session,
        floor_id: Option<&FloorId>,
    ) -> Result<Vec<Team>, OperationError> {
        self.authorize(session, Operation::Read).await?;
        Ok(self.orgs.list_teams(floor_id).await?)
    }

    pub async fn vendors(&self, session: &Session) -> Result<Vec<Vendor>, OperationError> {
        self.authorize(session, Operation::Read).await?;
        Ok(self.vendors.list().await?)
    }

    pub async fn phone_line(
        &self,
        session: &Session,
        line_id: &PhoneLineId,
    ) -> Result<PhoneLine, OperationError> {
        self.authorize(session, Operation::Read).await?;
        self.lines
            .find_by_id(line_id)
            .await?
            .ok_or_else(|| OperationError::not_found(EntityKind::PhoneLine, line_id.0.clone()))
    }

    pub async fn phone_lines(
        &self,
        session: &Session,
        filter: &LineFilter,
    ) -> Result<Vec<PhoneLine>, OperationError> {
        self.authorize(session, Operation::Read).await?;
        Ok(self.lines.list(filter).await?)
    }

    pub async fn dashboard(
        &self,
        session: &Session,
        filter: &DashboardFilter,
    ) -> Result<Dashboard, OperationError> {
        self.authorize(session, Operation::Read).await?;

        let mut tx = self.pool.begin().await?;
        let dashboard = dashboard::load_dashboard(&mut tx, filter, &self.thresholds).await?;
        tx.commit().await?;
        Ok(dashboard)
    }

    pub async fn vendor_capacity(
        &self,
        session: &Session,
        vendor_id: Option<&VendorId>,
    ) -> Result<Vec<VendorCapacity>, OperationError> {
        self.authorize(session, Operation::Read).await?;

        let mut conn = self.pool.acquire().await?;
        dashboard::load_vendor_capacity(&mut conn, vendor_id).await
    }

    pub async fn verify_counters(&self, session: &Session) -> Result<IntegrityReport, OperationError> {
        self.authorize(session, Operation::Read).await?;

        let mut tx = self.pool.begin().await?;
        let report = integrity::verify_counters(&mut tx).await?;
        tx.commit().await?;

        if !report.is_consistent() {
            warn!(
                event_name = "integrity.drift_detected",
                user_id = %session.user_id.0,
                drifts = report.drifts.len(),
                "stored counters disagree with phone line rows"
            );
        }
        Ok(report)
    }
}

/// Role refusals and storage failures during the role lookup get separate events.
fn log_refusal(session: &Session, operation: Operation, error: &OperationError) {
    let kind = error.kind();
    if kind.is_access_refusal() {
        warn!(
            event_name = "access.denied",
            user_id = %session.user_id.0,
            operation = operation.as_str(),
            error_kind = kind.as_str(),
            "operation refused before any state was read"
        );
    } else {
        warn!(
            event_name = "access.role_lookup_failed",
            user_id = %session.user_id.0,
            operation = operation.as_str(),
            error_kind = kind.as_str(),
            error = %error,
            "could not resolve the caller's role"
        );
    }
}
