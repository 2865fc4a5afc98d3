use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use linekeeper_core::domain::vendor::VendorId;
use linekeeper_core::errors::DomainError;
use linekeeper_core::projection::{
    Dashboard, DashboardFilter, HealthThresholds, TeamAllocationCard, VendorCapacity,
};

use crate::error::OperationError;
use crate::repositories::vendor::row_to_vendor;
use crate::repositories::{decode_count, decode_error, org, RepositoryError};

/// Builds the team allocation dashboard from one read snapshot.
pub(crate) async fn load_dashboard(
    conn: &mut SqliteConnection,
    filter: &DashboardFilter,
    thresholds: &HealthThresholds,
) -> Result<Dashboard, OperationError> {
    let teams = org::list_dashboard_teams(&mut *conn, filter).await?;
    let facilities: HashMap<_, _> = org::list_facilities(&mut *conn)
        .await?
        .into_iter()
        .map(|facility| (facility.id.clone(), facility))
        .collect();
    let floors: HashMap<_, _> = org::list_floors(&mut *conn, None)
        .await?
        .into_iter()
        .map(|floor| (floor.id.clone(), floor))
        .collect();

    let mut cards = Vec::with_capacity(teams.len());
    for team in &teams {
        let (Some(facility), Some(floor)) =
            (facilities.get(&team.facility_id), floors.get(&team.floor_id))
        else {
            return Err(DomainError::InvariantViolation(format!(
                "team `{}` points at a facility or floor that does not exist",
                team.id.0
            ))
            .into());
        };
        cards.push(TeamAllocationCard::build(team, facility, floor, thresholds));
    }

    Ok(Dashboard::new(cards))
}

/// Headroom and usage per vendor; `vendor_id` narrows to one vendor.
pub(crate) async fn load_vendor_capacity(
    conn: &mut SqliteConnection,
    vendor_id: Option<&VendorId>,
) -> Result<Vec<VendorCapacity>, OperationError> {
    let vendor = vendor_id.map(|id| id.0.as_str());
    let rows = sqlx::query(
        "SELECT v.id, v.name, v.contact_email, v.contact_phone, v.total_lines,
                v.available_lines, v.created_at, v.updated_at,
                COALESCE(SUM(CASE WHEN pl.status IN ('allocated', 'maintenance') THEN 1 ELSE 0 END), 0)
                    AS in_service_lines,
                COALESCE(SUM(CASE WHEN pl.status = 'available' THEN 1 ELSE 0 END), 0) AS idle_lines
         FROM vendor v
         LEFT JOIN phone_line pl ON pl.vendor_id = v.id
         WHERE (? IS NULL OR v.id = ?)
         GROUP BY v.id
         ORDER BY v.name, v.id",
    )
    .bind(vendor)
    .bind(vendor)
    .fetch_all(&mut *conn)
    .await?;

    let capacities = rows.iter().map(row_to_capacity).collect::<Result<Vec<_>, _>>()?;
    Ok(capacities)
}

fn row_to_capacity(row: &SqliteRow) -> Result<VendorCapacity, RepositoryError> {
    let vendor = row_to_vendor(row)?;
    let in_service: i64 = row.try_get("in_service_lines").map_err(decode_error)?;
    let idle: i64 = row.try_get("idle_lines").map_err(decode_error)?;

    Ok(VendorCapacity::build(
        &vendor,
        decode_count("in_service_lines", in_service)?,
        decode_count("idle_lines", idle)?,
    ))
}

#[cfg(test)]
mod tests {
    use linekeeper_core::domain::org::{FacilityId, TeamId};
    use linekeeper_core::domain::vendor::VendorId;
    use linekeeper_core::projection::{AllocationHealth, DashboardFilter, HealthThresholds};

    use super::{load_dashboard, load_vendor_capacity};
    use crate::fixtures::DemoSeedDataset;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoSeedDataset::load(&pool).await.expect("seed");
        pool
    }

    #[tokio::test]
    async fn dashboard_cards_carry_location_and_health() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.expect("conn");

        let dashboard =
            load_dashboard(&mut conn, &DashboardFilter::default(), &HealthThresholds::default())
                .await
                .expect("dashboard");
        assert_eq!(dashboard.summary.teams, 3);

        let support = dashboard
            .cards
            .iter()
            .find(|card| card.team_name == "Customer Support")
            .expect("support card");
        assert_eq!(support.location, "Building A - 1st Floor");
        assert_eq!(support.team_size, 13);
        assert_eq!(support.free_seats, support.team_size - support.allocated_lines);
        assert_eq!(support.health, AllocationHealth::Good);
    }

    #[tokio::test]
    async fn dashboard_filters_narrow_the_cards() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.expect("conn");
        let thresholds = HealthThresholds::default();

        let by_facility = load_dashboard(
            &mut conn,
            &DashboardFilter {
                facility_id: Some(FacilityId("fac-building-b".into())),
                ..DashboardFilter::default()
            },
            &thresholds,
        )
        .await
        .expect("dashboard");
        assert_eq!(by_facility.cards.len(), 1);
        assert_eq!(by_facility.cards[0].team_name, "Sales Team");

        let by_team = load_dashboard(
            &mut conn,
            &DashboardFilter {
                team_id: Some(TeamId("team-technical-support".into())),
                ..DashboardFilter::default()
            },
            &thresholds,
        )
        .await
        .expect("dashboard");
        assert_eq!(by_team.cards.len(), 1);

        let by_vendor = load_dashboard(
            &mut conn,
            &DashboardFilter {
                vendor_id: Some(VendorId("vendor-northwind".into())),
                ..DashboardFilter::default()
            },
            &thresholds,
        )
        .await
        .expect("dashboard");
        assert!(by_vendor.cards.iter().all(|card| card.allocated_lines > 0));
    }

    #[tokio::test]
    async fn vendor_capacity_splits_provisioned_lines() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.expect("conn");

        let capacities = load_vendor_capacity(&mut conn, None).await.expect("capacity");
        assert_eq!(capacities.len(), 2);
        for capacity in &capacities {
            assert_eq!(
                capacity.provisioned_lines,
                capacity.in_service_lines + capacity.idle_lines,
                "no seeded line is retired"
            );
            assert_eq!(capacity.total_lines, capacity.available_lines + capacity.provisioned_lines);
        }

        let one = load_vendor_capacity(&mut conn, Some(&VendorId("vendor-northwind".into())))
            .await
            .expect("capacity");
        assert_eq!(one.len(), 1);
    }
}
