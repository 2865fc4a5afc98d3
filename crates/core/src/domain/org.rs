use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{generate_id, require_text};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacilityId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloorId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Floor {
    pub id: FloorId,
    pub facility_id: FacilityId,
    pub name: String,
    pub workstation_range: String,
    /// Lines whose physical anchor is this floor.
    pub phone_line_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub facility_id: FacilityId,
    pub floor_id: FloorId,
    pub name: String,
    pub team_size: u32,
    /// Lines charged to the team: allocated or under maintenance.
    pub allocated_lines: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFacility {
    pub name: String,
    pub address: String,
}

impl NewFacility {
    pub fn into_facility(self, now: DateTime<Utc>) -> Result<Facility, DomainError> {
        Ok(Facility {
            id: FacilityId(generate_id()),
            name: require_text("facility name", &self.name)?,
            address: require_text("facility address", &self.address)?,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Facility {
    pub fn apply(&mut self, update: FacilityUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(name) = update.name {
            self.name = require_text("facility name", &name)?;
        }
        if let Some(address) = update.address {
            self.address = require_text("facility address", &address)?;
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFloor {
    pub facility_id: FacilityId,
    pub name: String,
    pub workstation_range: String,
}

impl NewFloor {
    pub fn into_floor(self, now: DateTime<Utc>) -> Result<Floor, DomainError> {
        Ok(Floor {
            id: FloorId(generate_id()),
            facility_id: self.facility_id,
            name: require_text("floor name", &self.name)?,
            workstation_range: require_text("workstation range", &self.workstation_range)?,
            phone_line_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorUpdate {
    pub name: Option<String>,
    pub workstation_range: Option<String>,
}

impl Floor {
    pub fn apply(&mut self, update: FloorUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(name) = update.name {
            self.name = require_text("floor name", &name)?;
        }
        if let Some(range) = update.workstation_range {
            self.workstation_range = require_text("workstation range", &range)?;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Fails unless this floor sits in `facility_id`.
    pub fn ensure_in_facility(&self, facility_id: &FacilityId) -> Result<(), DomainError> {
        if &self.facility_id == facility_id {
            return Ok(());
        }
        Err(DomainError::HierarchyMismatch(format!(
            "floor `{}` belongs to facility `{}`, not `{}`",
            self.id.0, self.facility_id.0, facility_id.0
        )))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeam {
    pub facility_id: FacilityId,
    pub floor_id: FloorId,
    pub name: String,
    pub team_size: u32,
}

impl NewTeam {
    /// `floor` must be the stored row for `self.floor_id`.
    pub fn into_team(self, floor: &Floor, now: DateTime<Utc>) -> Result<Team, DomainError> {
        floor.ensure_in_facility(&self.facility_id)?;

        Ok(Team {
            id: TeamId(generate_id()),
            facility_id: self.facility_id,
            floor_id: self.floor_id,
            name: require_text("team name", &self.name)?,
            team_size: self.team_size,
            allocated_lines: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub team_size: Option<u32>,
}

impl Team {
    pub fn apply(&mut self, update: TeamUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(name) = update.name {
            self.name = require_text("team name", &name)?;
        }
        if let Some(team_size) = update.team_size {
            self.team_size = team_size;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Checks that `facility_id -> floor -> team` is one path through the tree.
pub fn ensure_hierarchy_path(
    facility_id: &FacilityId,
    floor: &Floor,
    team: &Team,
) -> Result<(), DomainError> {
    floor.ensure_in_facility(facility_id)?;

    if team.floor_id != floor.id || team.facility_id != floor.facility_id {
        return Err(DomainError::HierarchyMismatch(format!(
            "team `{}` sits on floor `{}`, not `{}`",
            team.id.0, team.floor_id.0, floor.id.0
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        ensure_hierarchy_path, FacilityId, FacilityUpdate, NewFacility, NewFloor,
        NewTeam, TeamUpdate,
    };
    use crate::errors::ErrorKind;

    fn floor_in(facility: &str) -> super::Floor {
        NewFloor {
            facility_id: FacilityId(facility.to_string()),
            name: "1st Floor".to_string(),
            workstation_range: "WS-001..WS-040".to_string(),
        }
        .into_floor(Utc::now())
        .expect("floor")
    }

    #[test]
    fn team_creation_rejects_floor_from_another_facility() {
        let floor = floor_in("fac-a");
        let error = NewTeam {
            facility_id: FacilityId("fac-b".to_string()),
            floor_id: floor.id.clone(),
            name: "Sales Team".to_string(),
            team_size: 8,
        }
        .into_team(&floor, Utc::now())
        .expect_err("mismatched facility");

        assert_eq!(error.kind(), ErrorKind::HierarchyMismatch);
    }

    #[test]
    fn team_creation_starts_with_zero_allocated_lines() {
        let floor = floor_in("fac-a");
        let team = NewTeam {
            facility_id: FacilityId("fac-a".to_string()),
            floor_id: floor.id.clone(),
            name: " Customer Support ".to_string(),
            team_size: 13,
        }
        .into_team(&floor, Utc::now())
        .expect("team");

        assert_eq!(team.name, "Customer Support");
        assert_eq!(team.allocated_lines, 0);
    }

    #[test]
    fn hierarchy_path_requires_team_on_the_given_floor() {
        let floor = floor_in("fac-a");
        let other_floor = floor_in("fac-a");
        let team = NewTeam {
            facility_id: FacilityId("fac-a".to_string()),
            floor_id: other_floor.id.clone(),
            name: "Technical Support".to_string(),
            team_size: 10,
        }
        .into_team(&other_floor, Utc::now())
        .expect("team");

        let facility = FacilityId("fac-a".to_string());
        assert!(ensure_hierarchy_path(&facility, &other_floor, &team).is_ok());
        let error = ensure_hierarchy_path(&facility, &floor, &team).expect_err("wrong floor");
        assert_eq!(error.kind(), ErrorKind::HierarchyMismatch);
    }

    #[test]
    fn updates_validate_text_and_keep_counters() {
        let mut facility = NewFacility { name: "Building A".into(), address: "1 Main St".into() }
            .into_facility(Utc::now())
            .expect("facility");
        let error = facility
            .apply(FacilityUpdate { name: Some(" ".into()), address: None }, Utc::now())
            .expect_err("blank name");
        assert_eq!(error.kind(), ErrorKind::InvalidInput);

        let floor = floor_in("fac-a");
        let mut team = NewTeam {
            facility_id: FacilityId("fac-a".to_string()),
            floor_id: floor.id.clone(),
            name: "Sales Team".to_string(),
            team_size: 8,
        }
        .into_team(&floor, Utc::now())
        .expect("team");
        team.allocated_lines = 3;
        team.apply(TeamUpdate { name: None, team_size: Some(12) }, Utc::now()).expect("update");
        assert_eq!(team.team_size, 12);
        assert_eq!(team.allocated_lines, 3);
    }
}
