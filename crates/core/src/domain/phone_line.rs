//! Phone line lifecycle.
//!
//! Every lifecycle operation is computed here as a pure function of the
//! current row: the post-transition line plus the counter deltas it implies
//! for teams, floors and the owning vendor. Storage applies the result as
//! one transaction and never decides transitions on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::org::{FacilityId, FloorId, TeamId};
use crate::domain::vendor::VendorId;
use crate::domain::{generate_id, optional_text, require_text};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneLineId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneLineStatus {
    Available,
    Allocated,
    Maintenance,
    Retired,
}

impl PhoneLineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Allocated => "allocated",
            Self::Maintenance => "maintenance",
            Self::Retired => "retired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Some(Self::Available),
            "allocated" => Some(Self::Allocated),
            "maintenance" => Some(Self::Maintenance),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }

    /// Statuses in which a line is charged to a team.
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Allocated | Self::Maintenance)
    }

    /// The transition table. `retired` is terminal for every action.
    pub fn transition(
        self,
        action: LineAction,
        line_id: &PhoneLineId,
    ) -> Result<PhoneLineStatus, DomainError> {
        use LineAction::*;
        use PhoneLineStatus::*;

        match (self, action) {
            (Retired, _) => Err(DomainError::TerminalState { line_id: line_id.0.clone() }),
            (Available, Allocate) => Ok(Allocated),
            (status, Allocate) => {
                Err(DomainError::AlreadyAllocated { line_id: line_id.0.clone(), status })
            }
            (Allocated, Deallocate) => Ok(Available),
            (Allocated, Transfer) => Ok(Allocated),
            (Allocated, MarkMaintenance) => Ok(Maintenance),
            (Maintenance, Restore) => Ok(Available),
            (Available | Maintenance, Retire) => Ok(Retired),
            (Allocated, Retire) => {
                Err(DomainError::MustDeallocateFirst { line_id: line_id.0.clone() })
            }
            (from, action) => {
                Err(DomainError::InvalidTransition { line_id: line_id.0.clone(), from, action })
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineAction {
    Allocate,
    Deallocate,
    Transfer,
    MarkMaintenance,
    Restore,
    Retire,
}

impl LineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocate => "allocate",
            Self::Deallocate => "deallocate",
            Self::Transfer => "transfer",
            Self::MarkMaintenance => "mark_maintenance",
            Self::Restore => "restore",
            Self::Retire => "retire",
        }
    }
}

/// Where a line physically sits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSite {
    pub facility_id: FacilityId,
    pub floor_id: FloorId,
}

/// Who a line is charged to while allocated or under maintenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAssignment {
    pub team_id: TeamId,
    pub employee_name: Option<String>,
    pub extension_no: Option<String>,
    pub workstation_code: Option<String>,
    pub allocated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneLine {
    pub id: PhoneLineId,
    pub vendor_id: VendorId,
    pub phone_line_did: String,
    pub serial_no: String,
    pub status: PhoneLineStatus,
    pub site: Option<LineSite>,
    pub assignment: Option<LineAssignment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoneLine {
    pub vendor_id: VendorId,
    pub phone_line_did: String,
    pub serial_no: String,
}

/// Destination of an allocate or transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub team_id: TeamId,
    pub facility_id: FacilityId,
    pub floor_id: FloorId,
    pub employee_name: Option<String>,
    pub extension_no: Option<String>,
    pub workstation_code: Option<String>,
}

impl AllocationTarget {
    fn site(&self) -> LineSite {
        LineSite { facility_id: self.facility_id.clone(), floor_id: self.floor_id.clone() }
    }

    fn assignment(&self, now: DateTime<Utc>) -> LineAssignment {
        LineAssignment {
            team_id: self.team_id.clone(),
            employee_name: optional_text(self.employee_name.as_deref()),
            extension_no: optional_text(self.extension_no.as_deref()),
            workstation_code: optional_text(self.workstation_code.as_deref()),
            allocated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta<Id> {
    pub id: Id,
    pub delta: i64,
}

/// Everything one transition changes, applied together or not at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEffects {
    pub line: PhoneLine,
    pub team_deltas: Vec<CounterDelta<TeamId>>,
    pub floor_deltas: Vec<CounterDelta<FloorId>>,
    /// Change to the owning vendor's `available_lines`.
    pub vendor_delta: i64,
}

impl LineEffects {
    fn new(line: PhoneLine) -> Self {
        Self { line, team_deltas: Vec::new(), floor_deltas: Vec::new(), vendor_delta: 0 }
    }

    fn team(mut self, id: &TeamId, delta: i64) -> Self {
        merge_delta(&mut self.team_deltas, id, delta);
        self
    }

    fn floor(mut self, id: &FloorId, delta: i64) -> Self {
        merge_delta(&mut self.floor_deltas, id, delta);
        self
    }

    fn vendor(mut self, delta: i64) -> Self {
        self.vendor_delta += delta;
        self
    }
}

fn merge_delta<Id: Clone + PartialEq>(deltas: &mut Vec<CounterDelta<Id>>, id: &Id, delta: i64) {
    match deltas.iter_mut().find(|existing| &existing.id == id) {
        Some(existing) => existing.delta += delta,
        None => deltas.push(CounterDelta { id: id.clone(), delta }),
    }
    deltas.retain(|entry| entry.delta != 0);
}

impl PhoneLine {
    pub fn provision(new: NewPhoneLine, now: DateTime<Utc>) -> Result<Self, DomainError> {
        Ok(Self {
            id: PhoneLineId(generate_id()),
            vendor_id: new.vendor_id,
            phone_line_did: require_text("phone_line_did", &new.phone_line_did)?,
            serial_no: require_text("serial_no", &new.serial_no)?,
            status: PhoneLineStatus::Available,
            site: None,
            assignment: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Site and assignment columns must agree with the status.
    pub fn check_shape(&self) -> Result<(), DomainError> {
        let shape_ok = match self.status {
            PhoneLineStatus::Allocated | PhoneLineStatus::Maintenance => {
                self.site.is_some() && self.assignment.is_some()
            }
            PhoneLineStatus::Available => self.assignment.is_none(),
            PhoneLineStatus::Retired => self.site.is_none() && self.assignment.is_none(),
        };

        if shape_ok {
            return Ok(());
        }
        Err(DomainError::InvariantViolation(format!(
            "phone line `{}` is {} but has site={} assignment={}",
            self.id.0,
            self.status.as_str(),
            self.site.is_some(),
            self.assignment.is_some()
        )))
    }

    pub fn team_id(&self) -> Option<&TeamId> {
        self.assignment.as_ref().map(|assignment| &assignment.team_id)
    }

    pub fn floor_id(&self) -> Option<&FloorId> {
        self.site.as_ref().map(|site| &site.floor_id)
    }

    pub fn allocate(
        &self,
        target: &AllocationTarget,
        now: DateTime<Utc>,
    ) -> Result<LineEffects, DomainError> {
        let status = self.status.transition(LineAction::Allocate, &self.id)?;
        self.check_shape()?;

        let effects = self.moved_to(target, status, now).team(&target.team_id, 1);
        Ok(effects)
    }

    pub fn deallocate(&self, now: DateTime<Utc>) -> Result<LineEffects, DomainError> {
        let status = self.status.transition(LineAction::Deallocate, &self.id)?;
        self.release(status, now)
    }

    /// Deallocate from the current team and allocate to `target` as one step.
    pub fn transfer(
        &self,
        target: &AllocationTarget,
        now: DateTime<Utc>,
    ) -> Result<LineEffects, DomainError> {
        let status = self.status.transition(LineAction::Transfer, &self.id)?;
        let current_team = self.assigned_team()?.clone();

        let effects =
            self.moved_to(target, status, now).team(&current_team, -1).team(&target.team_id, 1);
        Ok(effects)
    }

    pub fn mark_maintenance(&self, now: DateTime<Utc>) -> Result<LineEffects, DomainError> {
        let status = self.status.transition(LineAction::MarkMaintenance, &self.id)?;
        self.check_shape()?;

        let mut line = self.clone();
        line.status = status;
        line.updated_at = now;
        Ok(LineEffects::new(line))
    }

    pub fn restore(&self, now: DateTime<Utc>) -> Result<LineEffects, DomainError> {
        let status = self.status.transition(LineAction::Restore, &self.id)?;
        self.release(status, now)
    }

    /// Retiring frees the vendor unit and every counter the line held.
    pub fn retire(&self, now: DateTime<Utc>) -> Result<LineEffects, DomainError> {
        let status = self.status.transition(LineAction::Retire, &self.id)?;
        self.check_shape()?;

        let mut line = self.clone();
        line.status = status;
        line.site = None;
        line.assignment = None;
        line.updated_at = now;

        let mut effects = LineEffects::new(line).vendor(1);
        if let Some(team_id) = self.team_id() {
            effects = effects.team(team_id, -1);
        }
        if let Some(floor_id) = self.floor_id() {
            effects = effects.floor(floor_id, -1);
        }
        Ok(effects)
    }

    fn moved_to(
        &self,
        target: &AllocationTarget,
        status: PhoneLineStatus,
        now: DateTime<Utc>,
    ) -> LineEffects {
        let mut line = self.clone();
        line.status = status;
        line.site = Some(target.site());
        line.assignment = Some(target.assignment(now));
        line.updated_at = now;

        let mut effects = LineEffects::new(line).floor(&target.floor_id, 1);
        if let Some(previous_floor) = self.floor_id() {
            effects = effects.floor(previous_floor, -1);
        }
        effects
    }

    /// Drops the assignment but keeps the physical anchor.
    fn release(&self, status: PhoneLineStatus, now: DateTime<Utc>) -> Result<LineEffects, DomainError> {
        let team_id = self.assigned_team()?.clone();

        let mut line = self.clone();
        line.status = status;
        line.assignment = None;
        line.updated_at = now;
        Ok(LineEffects::new(line).team(&team_id, -1))
    }

    fn assigned_team(&self) -> Result<&TeamId, DomainError> {
        self.check_shape()?;
        self.team_id().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "phone line `{}` is {} without a team",
                self.id.0,
                self.status.as_str()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        AllocationTarget, CounterDelta, LineAction, NewPhoneLine, PhoneLine, PhoneLineId,
        PhoneLineStatus,
    };
    use crate::domain::org::{FacilityId, FloorId, TeamId};
    use crate::domain::vendor::VendorId;
    use crate::errors::{DomainError, ErrorKind};

    fn line() -> PhoneLine {
        PhoneLine::provision(
            NewPhoneLine {
                vendor_id: VendorId("vendor-1".to_string()),
                phone_line_did: "+1 555 0101".to_string(),
                serial_no: "SN-0001".to_string(),
            },
            Utc::now(),
        )
        .expect("provision")
    }

    fn target(team: &str, floor: &str) -> AllocationTarget {
        AllocationTarget {
            team_id: TeamId(team.to_string()),
            facility_id: FacilityId("fac-a".to_string()),
            floor_id: FloorId(floor.to_string()),
            employee_name: Some("Priya Nair".to_string()),
            extension_no: Some(" 2201 ".to_string()),
            workstation_code: None,
        }
    }

    fn team_delta(team: &str, delta: i64) -> CounterDelta<TeamId> {
        CounterDelta { id: TeamId(team.to_string()), delta }
    }

    fn floor_delta(floor: &str, delta: i64) -> CounterDelta<FloorId> {
        CounterDelta { id: FloorId(floor.to_string()), delta }
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use LineAction::*;
        use PhoneLineStatus::*;

        let id = PhoneLineId("line-1".to_string());
        let cases = [
            (Available, Allocate, Ok(Allocated)),
            (Available, Deallocate, Err(ErrorKind::InvalidTransition)),
            (Available, Transfer, Err(ErrorKind::InvalidTransition)),
            (Available, MarkMaintenance, Err(ErrorKind::InvalidTransition)),
            (Available, Restore, Err(ErrorKind::InvalidTransition)),
            (Available, Retire, Ok(Retired)),
            (Allocated, Allocate, Err(ErrorKind::AlreadyAllocated)),
            (Allocated, Deallocate, Ok(Available)),
            (Allocated, Transfer, Ok(Allocated)),
            (Allocated, MarkMaintenance, Ok(Maintenance)),
            (Allocated, Restore, Err(ErrorKind::InvalidTransition)),
            (Allocated, Retire, Err(ErrorKind::MustDeallocateFirst)),
            (Maintenance, Allocate, Err(ErrorKind::AlreadyAllocated)),
            (Maintenance, Deallocate, Err(ErrorKind::InvalidTransition)),
            (Maintenance, Restore, Ok(Available)),
            (Maintenance, Retire, Ok(Retired)),
        ];

        for (from, action, expected) in cases {
            let actual = from.transition(action, &id).map_err(|error| error.kind());
            assert_eq!(actual, expected, "{from:?} --{action:?}-->");
        }

        for action in [Allocate, Deallocate, Transfer, MarkMaintenance, Restore, Retire] {
            let error = Retired.transition(action, &id).expect_err("retired is terminal");
            assert_eq!(error.kind(), ErrorKind::TerminalState);
        }
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        for status in [
            PhoneLineStatus::Available,
            PhoneLineStatus::Allocated,
            PhoneLineStatus::Maintenance,
            PhoneLineStatus::Retired,
        ] {
            assert_eq!(PhoneLineStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn provision_rejects_blank_identity() {
        let error = PhoneLine::provision(
            NewPhoneLine {
                vendor_id: VendorId("vendor-1".to_string()),
                phone_line_did: " ".to_string(),
                serial_no: "SN-1".to_string(),
            },
            Utc::now(),
        )
        .expect_err("blank did");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn allocate_charges_team_and_anchors_floor() {
        let effects = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");

        assert_eq!(effects.line.status, PhoneLineStatus::Allocated);
        assert_eq!(effects.team_deltas, vec![team_delta("team-1", 1)]);
        assert_eq!(effects.floor_deltas, vec![floor_delta("floor-1", 1)]);
        assert_eq!(effects.vendor_delta, 0);

        let assignment = effects.line.assignment.expect("assignment");
        assert_eq!(assignment.extension_no.as_deref(), Some("2201"));
        assert_eq!(assignment.workstation_code, None);
    }

    #[test]
    fn deallocate_undoes_allocate_counters_and_keeps_anchor() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let released = allocated.line.deallocate(Utc::now()).expect("deallocate");

        assert_eq!(released.line.status, PhoneLineStatus::Available);
        assert_eq!(released.line.assignment, None);
        assert_eq!(released.line.floor_id(), Some(&FloorId("floor-1".to_string())));
        assert_eq!(released.team_deltas, vec![team_delta("team-1", -1)]);
        assert!(released.floor_deltas.is_empty());
    }

    #[test]
    fn reallocating_an_anchored_line_moves_the_floor_count() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let released = allocated.line.deallocate(Utc::now()).expect("deallocate");
        let moved = released.line.allocate(&target("team-2", "floor-2"), Utc::now()).expect("move");

        assert_eq!(moved.floor_deltas, vec![floor_delta("floor-2", 1), floor_delta("floor-1", -1)]);
    }

    #[test]
    fn transfer_moves_team_charge_in_one_step() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let transferred =
            allocated.line.transfer(&target("team-2", "floor-1"), Utc::now()).expect("transfer");

        assert_eq!(transferred.line.team_id(), Some(&TeamId("team-2".to_string())));
        assert_eq!(
            transferred.team_deltas,
            vec![team_delta("team-1", -1), team_delta("team-2", 1)]
        );
        assert!(transferred.floor_deltas.is_empty(), "same floor nets out");
    }

    #[test]
    fn transfer_within_the_same_team_nets_to_zero() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let transferred =
            allocated.line.transfer(&target("team-1", "floor-1"), Utc::now()).expect("transfer");
        assert!(transferred.team_deltas.is_empty());
    }

    #[test]
    fn maintenance_keeps_every_counter() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let maintenance = allocated.line.mark_maintenance(Utc::now()).expect("maintenance");

        assert_eq!(maintenance.line.status, PhoneLineStatus::Maintenance);
        assert!(maintenance.team_deltas.is_empty());
        assert!(maintenance.floor_deltas.is_empty());
        assert_eq!(maintenance.line.team_id(), allocated.line.team_id());

        let restored = maintenance.line.restore(Utc::now()).expect("restore");
        assert_eq!(restored.line.status, PhoneLineStatus::Available);
        assert_eq!(restored.team_deltas, vec![team_delta("team-1", -1)]);
    }

    #[test]
    fn retire_releases_vendor_unit_team_and_floor() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let maintenance = allocated.line.mark_maintenance(Utc::now()).expect("maintenance");
        let retired = maintenance.line.retire(Utc::now()).expect("retire");

        assert_eq!(retired.line.status, PhoneLineStatus::Retired);
        assert_eq!(retired.line.site, None);
        assert_eq!(retired.vendor_delta, 1);
        assert_eq!(retired.team_deltas, vec![team_delta("team-1", -1)]);
        assert_eq!(retired.floor_deltas, vec![floor_delta("floor-1", -1)]);

        let error = retired.line.allocate(&target("team-1", "floor-1"), Utc::now());
        assert!(matches!(error, Err(DomainError::TerminalState { .. })));
    }

    #[test]
    fn allocated_line_must_be_deallocated_before_retire() {
        let allocated = line().allocate(&target("team-1", "floor-1"), Utc::now()).expect("allocate");
        let error = allocated.line.retire(Utc::now()).expect_err("allocated");
        assert_eq!(error.kind(), ErrorKind::MustDeallocateFirst);
    }

    #[test]
    fn malformed_rows_are_rejected_before_transition() {
        let mut broken = line();
        broken.status = PhoneLineStatus::Allocated;
        let error = broken.deallocate(Utc::now()).expect_err("no assignment");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }
}
