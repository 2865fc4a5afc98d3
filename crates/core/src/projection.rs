//! Read-side projections over committed state.

use serde::{Deserialize, Serialize};

use crate::domain::org::{Facility, FacilityId, Floor, FloorId, Team, TeamId};
use crate::domain::phone_line::PhoneLineStatus;
use crate::domain::vendor::{Vendor, VendorId};

/// Percentage of a team's seats holding a line. A zero-size team is treated
/// as one seat so the ratio stays defined.
pub fn allocation_percentage(allocated_lines: u32, team_size: u32) -> f64 {
    f64::from(allocated_lines) / f64::from(team_size.max(1)) * 100.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationHealth {
    Good,
    Warning,
    Critical,
}

impl AllocationHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub warning_pct: u32,
    pub critical_pct: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self { warning_pct: 85, critical_pct: 100 }
    }
}

impl HealthThresholds {
    pub fn classify(&self, allocation_pct: f64) -> AllocationHealth {
        if allocation_pct >= f64::from(self.critical_pct) {
            AllocationHealth::Critical
        } else if allocation_pct >= f64::from(self.warning_pct) {
            AllocationHealth::Warning
        } else {
            AllocationHealth::Good
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamAllocationCard {
    pub team_id: TeamId,
    pub team_name: String,
    pub facility_id: FacilityId,
    pub facility_name: String,
    pub floor_id: FloorId,
    pub floor_name: String,
    pub location: String,
    pub team_size: u32,
    pub allocated_lines: u32,
    pub free_seats: u32,
    pub allocation_pct: f64,
    pub health: AllocationHealth,
}

impl TeamAllocationCard {
    pub fn build(
        team: &Team,
        facility: &Facility,
        floor: &Floor,
        thresholds: &HealthThresholds,
    ) -> Self {
        let allocation_pct = allocation_percentage(team.allocated_lines, team.team_size);
        Self {
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            facility_id: facility.id.clone(),
            facility_name: facility.name.clone(),
            floor_id: floor.id.clone(),
            floor_name: floor.name.clone(),
            location: format!("{} - {}", facility.name, floor.name),
            team_size: team.team_size,
            allocated_lines: team.allocated_lines,
            free_seats: team.team_size.saturating_sub(team.allocated_lines),
            allocation_pct,
            health: thresholds.classify(allocation_pct),
        }
    }
}

/// Dashboard narrowing. `None` means "all".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub facility_id: Option<FacilityId>,
    /// Keeps teams holding at least one line from this vendor.
    pub vendor_id: Option<VendorId>,
    pub team_id: Option<TeamId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub teams: usize,
    pub seats: u64,
    pub allocated_lines: u64,
    pub critical_teams: usize,
    pub warning_teams: usize,
}

impl DashboardSummary {
    pub fn from_cards(cards: &[TeamAllocationCard]) -> Self {
        Self {
            teams: cards.len(),
            seats: cards.iter().map(|card| u64::from(card.team_size)).sum(),
            allocated_lines: cards.iter().map(|card| u64::from(card.allocated_lines)).sum(),
            critical_teams: cards
                .iter()
                .filter(|card| card.health == AllocationHealth::Critical)
                .count(),
            warning_teams: cards
                .iter()
                .filter(|card| card.health == AllocationHealth::Warning)
                .count(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub cards: Vec<TeamAllocationCard>,
}

impl Dashboard {
    pub fn new(cards: Vec<TeamAllocationCard>) -> Self {
        Self { summary: DashboardSummary::from_cards(&cards), cards }
    }
}

/// Capacity view of one vendor: headroom plus how provisioned lines are used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCapacity {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub total_lines: u32,
    pub available_lines: u32,
    pub provisioned_lines: u32,
    pub in_service_lines: u32,
    pub idle_lines: u32,
}

impl VendorCapacity {
    pub fn build(vendor: &Vendor, in_service_lines: u32, idle_lines: u32) -> Self {
        Self {
            vendor_id: vendor.id.clone(),
            vendor_name: vendor.name.clone(),
            total_lines: vendor.total_lines,
            available_lines: vendor.available_lines,
            provisioned_lines: vendor.provisioned_lines(),
            in_service_lines,
            idle_lines,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFilter {
    pub vendor_id: Option<VendorId>,
    pub facility_id: Option<FacilityId>,
    pub team_id: Option<TeamId>,
    pub status: Option<PhoneLineStatus>,
}
