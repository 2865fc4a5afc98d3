use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use linekeeper_core::domain::identity::{Profile, ProfileId, Role, UserId};
use linekeeper_core::domain::org::{Facility, FacilityId, Floor, FloorId, Team, TeamId};
use linekeeper_core::domain::phone_line::{
    AllocationTarget, NewPhoneLine, PhoneLine, PhoneLineId, PhoneLineStatus,
};
use linekeeper_core::domain::vendor::{Vendor, VendorId};
use linekeeper_core::errors::EntityKind;

use crate::connection::DbPool;
use crate::engine;
use crate::error::OperationError;
use crate::repositories::{identity, org, phone_line, vendor};

const SEED_FACILITIES: &[SeedFacility] = &[
    SeedFacility { id: "fac-building-a", name: "Building A", address: "100 Harbor Road" },
    SeedFacility { id: "fac-building-b", name: "Building B", address: "220 Market Street" },
];

const SEED_FLOORS: &[SeedFloor] = &[
    SeedFloor {
        id: "floor-a-1",
        facility_id: "fac-building-a",
        name: "1st Floor",
        workstation_range: "WS-101..WS-160",
    },
    SeedFloor {
        id: "floor-a-3",
        facility_id: "fac-building-a",
        name: "3rd Floor",
        workstation_range: "WS-301..WS-340",
    },
    SeedFloor {
        id: "floor-b-2",
        facility_id: "fac-building-b",
        name: "2nd Floor",
        workstation_range: "WS-201..WS-230",
    },
];

const SEED_TEAMS: &[SeedTeam] = &[
    SeedTeam {
        id: "team-customer-support",
        facility_id: "fac-building-a",
        floor_id: "floor-a-1",
        name: "Customer Support",
        team_size: 13,
    },
    SeedTeam {
        id: "team-technical-support",
        facility_id: "fac-building-a",
        floor_id: "floor-a-3",
        name: "Technical Support",
        team_size: 10,
    },
    SeedTeam {
        id: "team-sales",
        facility_id: "fac-building-b",
        floor_id: "floor-b-2",
        name: "Sales Team",
        team_size: 8,
    },
];

const SEED_VENDORS: &[SeedVendor] = &[
    SeedVendor {
        id: "vendor-northwind",
        name: "Northwind Telecom",
        contact_email: "noc@northwind.example",
        contact_phone: "+1 555 0100",
        total_lines: 12,
    },
    SeedVendor {
        id: "vendor-bluewave",
        name: "Bluewave Networks",
        contact_email: "support@bluewave.example",
        contact_phone: "+1 555 0200",
        total_lines: 8,
    },
];

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        user_id: "user-admin",
        profile_id: "profile-admin",
        full_name: "Avery Admin",
        email: "avery.admin@linekeeper.example",
        role: Role::SuperAdmin,
    },
    SeedUser {
        user_id: "user-support",
        profile_id: "profile-support",
        full_name: "Sam Support",
        email: "sam.support@linekeeper.example",
        role: Role::SupportExecutive,
    },
];

const SEED_LINES: &[SeedLine] = &[
    SeedLine {
        id: "line-nw-01",
        vendor_id: "vendor-northwind",
        did: "+1 555 0101",
        serial_no: "NW-0001",
        seat: Some(SeedSeat {
            team_id: "team-customer-support",
            employee_name: "Priya Nair",
            extension_no: "2101",
            workstation_code: "WS-104",
        }),
        status: PhoneLineStatus::Allocated,
    },
    SeedLine {
        id: "line-nw-02",
        vendor_id: "vendor-northwind",
        did: "+1 555 0102",
        serial_no: "NW-0002",
        seat: Some(SeedSeat {
            team_id: "team-customer-support",
            employee_name: "Marco Silva",
            extension_no: "2102",
            workstation_code: "WS-105",
        }),
        status: PhoneLineStatus::Allocated,
    },
    SeedLine {
        id: "line-nw-03",
        vendor_id: "vendor-northwind",
        did: "+1 555 0103",
        serial_no: "NW-0003",
        seat: Some(SeedSeat {
            team_id: "team-technical-support",
            employee_name: "Lena Fischer",
            extension_no: "3101",
            workstation_code: "WS-302",
        }),
        status: PhoneLineStatus::Allocated,
    },
    SeedLine {
        id: "line-nw-04",
        vendor_id: "vendor-northwind",
        did: "+1 555 0104",
        serial_no: "NW-0004",
        seat: Some(SeedSeat {
            team_id: "team-technical-support",
            employee_name: "Tomas Novak",
            extension_no: "3102",
            workstation_code: "WS-303",
        }),
        status: PhoneLineStatus::Maintenance,
    },
    SeedLine {
        id: "line-nw-05",
        vendor_id: "vendor-northwind",
        did: "+1 555 0105",
        serial_no: "NW-0005",
        seat: None,
        status: PhoneLineStatus::Available,
    },
    SeedLine {
        id: "line-bw-01",
        vendor_id: "vendor-bluewave",
        did: "+1 555 0201",
        serial_no: "BW-0001",
        seat: Some(SeedSeat {
            team_id: "team-sales",
            employee_name: "Omar Haddad",
            extension_no: "4101",
            workstation_code: "WS-203",
        }),
        status: PhoneLineStatus::Allocated,
    },
    SeedLine {
        id: "line-bw-02",
        vendor_id: "vendor-bluewave",
        did: "+1 555 0202",
        serial_no: "BW-0002",
        seat: Some(SeedSeat {
            team_id: "team-sales",
            employee_name: "Grace Kim",
            extension_no: "4102",
            workstation_code: "WS-204",
        }),
        status: PhoneLineStatus::Allocated,
    },
    SeedLine {
        id: "line-bw-03",
        vendor_id: "vendor-bluewave",
        did: "+1 555 0203",
        serial_no: "BW-0003",
        seat: None,
        status: PhoneLineStatus::Available,
    },
];

/// Demo dataset: two buildings, three teams, two vendors, one user per role
/// and a handful of lines in every live state.
///
/// Lines go through the allocation engine, so every counter is the one the
/// engine would have produced.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Loads the dataset in one transaction. A database that already holds
    /// it is left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, OperationError> {
        let mut tx = pool.begin().await?;

        let already_seeded: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facility WHERE id = ?)")
                .bind(SEED_FACILITIES[0].id)
                .fetch_one(&mut *tx)
                .await?;
        if already_seeded == 1 {
            tx.rollback().await?;
            return Ok(SeedResult::counted(false));
        }

        let now = Utc::now();
        Self::insert_org(&mut tx, now).await?;
        Self::insert_users(&mut tx, now).await?;
        for line in SEED_LINES {
            Self::insert_line(&mut tx, line, now).await?;
        }

        tx.commit().await?;
        Ok(SeedResult::counted(true))
    }

    /// Checks that every seeded record exists and each line is in its seeded state.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, OperationError> {
        let mut checks = Vec::new();

        for facility in SEED_FACILITIES {
            let found = org::fetch_facility(pool, &FacilityId(facility.id.into())).await?;
            checks.push((facility.id, found.is_some()));
        }
        for floor in SEED_FLOORS {
            let found = org::fetch_floor(pool, &FloorId(floor.id.into())).await?;
            checks.push((floor.id, found.is_some()));
        }
        for team in SEED_TEAMS {
            let found = org::fetch_team(pool, &TeamId(team.id.into())).await?;
            checks.push((team.id, found.is_some()));
        }
        for seed in SEED_VENDORS {
            let found = vendor::fetch_vendor(pool, &VendorId(seed.id.into())).await?;
            checks.push((seed.id, found.is_some()));
        }
        for user in SEED_USERS {
            let rows = identity::fetch_role_rows(pool, &UserId(user.user_id.into())).await?;
            checks.push((user.user_id, rows.len() == 1 && rows[0].role == user.role));
        }
        for line in SEED_LINES {
            let found = phone_line::fetch_line(pool, &PhoneLineId(line.id.into())).await?;
            checks.push((line.id, found.is_some_and(|stored| stored.status == line.status)));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    async fn insert_org(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> Result<(), OperationError> {
        for seed in SEED_FACILITIES {
            let facility = Facility {
                id: FacilityId(seed.id.into()),
                name: seed.name.into(),
                address: seed.address.into(),
                created_at: now,
                updated_at: now,
            };
            org::insert_facility(&mut *conn, &facility).await?;
        }

        for seed in SEED_FLOORS {
            let floor = Floor {
                id: FloorId(seed.id.into()),
                facility_id: FacilityId(seed.facility_id.into()),
                name: seed.name.into(),
                workstation_range: seed.workstation_range.into(),
                phone_line_count: 0,
                created_at: now,
                updated_at: now,
            };
            org::insert_floor(&mut *conn, &floor).await?;
        }

        for seed in SEED_TEAMS {
            let team = Team {
                id: TeamId(seed.id.into()),
                facility_id: FacilityId(seed.facility_id.into()),
                floor_id: FloorId(seed.floor_id.into()),
                name: seed.name.into(),
                team_size: seed.team_size,
                allocated_lines: 0,
                created_at: now,
                updated_at: now,
            };
            org::insert_team(&mut *conn, &team).await?;
        }

        for seed in SEED_VENDORS {
            let vendor = Vendor {
                id: VendorId(seed.id.into()),
                name: seed.name.into(),
                contact_email: seed.contact_email.into(),
                contact_phone: seed.contact_phone.into(),
                total_lines: seed.total_lines,
                available_lines: seed.total_lines,
                created_at: now,
                updated_at: now,
            };
            vendor::insert_vendor(&mut *conn, &vendor).await?;
        }

        Ok(())
    }

    async fn insert_users(
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
    ) -> Result<(), OperationError> {
        for seed in SEED_USERS {
            let user_id = UserId(seed.user_id.into());
            let mut profile = Profile::new(user_id.clone(), seed.full_name, seed.email, now)?;
            profile.id = ProfileId(seed.profile_id.into());
            identity::upsert_profile(&mut *conn, &profile).await?;
            identity::insert_role(&mut *conn, &user_id, seed.role, now).await?;
        }
        Ok(())
    }

    async fn insert_line(
        conn: &mut SqliteConnection,
        seed: &SeedLine,
        now: DateTime<Utc>,
    ) -> Result<(), OperationError> {
        let mut line = PhoneLine::provision(
            NewPhoneLine {
                vendor_id: VendorId(seed.vendor_id.into()),
                phone_line_did: seed.did.into(),
                serial_no: seed.serial_no.into(),
            },
            now,
        )?;
        line.id = PhoneLineId(seed.id.into());
        let line = engine::provision_line(&mut *conn, line, now).await?;

        let Some(seat) = &seed.seat else {
            return Ok(());
        };
        let team = SEED_TEAMS
            .iter()
            .find(|team| team.id == seat.team_id)
            .ok_or_else(|| OperationError::not_found(EntityKind::Team, seat.team_id))?;
        let target = AllocationTarget {
            team_id: TeamId(team.id.into()),
            facility_id: FacilityId(team.facility_id.into()),
            floor_id: FloorId(team.floor_id.into()),
            employee_name: Some(seat.employee_name.into()),
            extension_no: Some(seat.extension_no.into()),
            workstation_code: Some(seat.workstation_code.into()),
        };
        engine::allocate_line(&mut *conn, &line.id, &target, now).await?;

        if seed.status == PhoneLineStatus::Maintenance {
            engine::mark_maintenance(&mut *conn, &line.id, now).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedFacility {
    id: &'static str,
    name: &'static str,
    address: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedFloor {
    id: &'static str,
    facility_id: &'static str,
    name: &'static str,
    workstation_range: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedTeam {
    id: &'static str,
    facility_id: &'static str,
    floor_id: &'static str,
    name: &'static str,
    team_size: u32,
}

#[derive(Debug, Clone, Copy)]
struct SeedVendor {
    id: &'static str,
    name: &'static str,
    contact_email: &'static str,
    contact_phone: &'static str,
    total_lines: u32,
}

#[derive(Debug, Clone, Copy)]
struct SeedUser {
    user_id: &'static str,
    profile_id: &'static str,
    full_name: &'static str,
    email: &'static str,
    role: Role,
}

#[derive(Debug, Clone, Copy)]
struct SeedSeat {
    team_id: &'static str,
    employee_name: &'static str,
    extension_no: &'static str,
    workstation_code: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedLine {
    id: &'static str,
    vendor_id: &'static str,
    did: &'static str,
    serial_no: &'static str,
    seat: Option<SeedSeat>,
    status: PhoneLineStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    /// `false` when the dataset was already present.
    pub seeded: bool,
    pub facilities: usize,
    pub floors: usize,
    pub teams: usize,
    pub vendors: usize,
    pub users: usize,
    pub lines: usize,
    pub allocated_lines: usize,
}

impl SeedResult {
    fn counted(seeded: bool) -> Self {
        Self {
            seeded,
            facilities: SEED_FACILITIES.len(),
            floors: SEED_FLOORS.len(),
            teams: SEED_TEAMS.len(),
            vendors: SEED_VENDORS.len(),
            users: SEED_USERS.len(),
            lines: SEED_LINES.len(),
            allocated_lines: SEED_LINES
                .iter()
                .filter(|line| line.status == PhoneLineStatus::Allocated)
                .count(),
        }
    }
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
