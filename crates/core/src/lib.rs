pub mod access;
pub mod config;
pub mod domain;
pub mod errors;
pub mod projection;

pub use access::{authorize, Capability, Operation};
pub use domain::identity::{resolve_role, Profile, ProfileId, Role, Session, UserId, UserRole};
pub use domain::org::{
    Facility, FacilityId, FacilityUpdate, Floor, FloorId, FloorUpdate, NewFacility, NewFloor,
    NewTeam, Team, TeamId, TeamUpdate,
};
pub use domain::phone_line::{
    AllocationTarget, LineAction, LineEffects, NewPhoneLine, PhoneLine, PhoneLineId,
    PhoneLineStatus,
};
pub use domain::vendor::{NewVendor, Vendor, VendorId, VendorUpdate};
pub use errors::{ApplicationError, DomainError, EntityKind, ErrorKind, InterfaceError};
pub use projection::{
    AllocationHealth, Dashboard, DashboardFilter, HealthThresholds, LineFilter,
    TeamAllocationCard, VendorCapacity,
};
