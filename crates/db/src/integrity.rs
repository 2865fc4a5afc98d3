//! Recomputes every stored counter from the phone_line rows.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqliteConnection;

use linekeeper_core::domain::phone_line::PhoneLineStatus;
use linekeeper_core::errors::EntityKind;
use linekeeper_core::projection::LineFilter;

use crate::error::OperationError;
use crate::repositories::{org, phone_line, vendor};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CounterDrift {
    pub entity: EntityKind,
    pub id: String,
    pub counter: &'static str,
    pub stored: i64,
    pub expected: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub lines_scanned: usize,
    pub teams_checked: usize,
    pub floors_checked: usize,
    pub vendors_checked: usize,
    pub drifts: Vec<CounterDrift>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty()
    }
}

pub(crate) async fn verify_counters(
    conn: &mut SqliteConnection,
) -> Result<IntegrityReport, OperationError> {
    let lines = phone_line::list_lines(&mut *conn, &LineFilter::default()).await?;
    let teams = org::list_teams(&mut *conn, None).await?;
    let floors = org::list_floors(&mut *conn, None).await?;
    let vendors = vendor::list_vendors(&mut *conn).await?;

    let mut charged: HashMap<&str, i64> = HashMap::new();
    let mut anchored: HashMap<&str, i64> = HashMap::new();
    let mut provisioned: HashMap<&str, i64> = HashMap::new();
    for line in &lines {
        if line.status.is_assigned() {
            if let Some(team_id) = line.team_id() {
                *charged.entry(team_id.0.as_str()).or_default() += 1;
            }
        }
        if let Some(floor_id) = line.floor_id() {
            *anchored.entry(floor_id.0.as_str()).or_default() += 1;
        }
        if line.status != PhoneLineStatus::Retired {
            *provisioned.entry(line.vendor_id.0.as_str()).or_default() += 1;
        }
    }

    let mut drifts = Vec::new();
    for team in &teams {
        let expected = charged.get(team.id.0.as_str()).copied().unwrap_or(0);
        push_drift(
            &mut drifts,
            EntityKind::Team,
            &team.id.0,
            "allocated_lines",
            team.allocated_lines,
            expected,
        );
    }
    for floor in &floors {
        let expected = anchored.get(floor.id.0.as_str()).copied().unwrap_or(0);
        push_drift(
            &mut drifts,
            EntityKind::Floor,
            &floor.id.0,
            "phone_line_count",
            floor.phone_line_count,
            expected,
        );
    }
    for vendor in &vendors {
        let in_use = provisioned.get(vendor.id.0.as_str()).copied().unwrap_or(0);
        let expected = i64::from(vendor.total_lines) - in_use;
        push_drift(
            &mut drifts,
            EntityKind::Vendor,
            &vendor.id.0,
            "available_lines",
            vendor.available_lines,
            expected,
        );
    }

    Ok(IntegrityReport {
        lines_scanned: lines.len(),
        teams_checked: teams.len(),
        floors_checked: floors.len(),
        vendors_checked: vendors.len(),
        drifts,
    })
}

fn push_drift(
    drifts: &mut Vec<CounterDrift>,
    entity: EntityKind,
    id: &str,
    counter: &'static str,
    stored: u32,
    expected: i64,
) {
    let stored = i64::from(stored);
    if stored != expected {
        drifts.push(CounterDrift { entity, id: id.to_string(), counter, stored, expected });
    }
}
