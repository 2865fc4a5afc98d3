//! Role capability gate.
//!
//! Every entry point names the `Operation` it performs; `authorize` is the
//! single place that decides whether a role may perform it.

use serde::{Deserialize, Serialize};

use crate::domain::identity::Role;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    ProvisionLine,
    AllocateLine,
    DeallocateLine,
    TransferLine,
    SetMaintenance,
    RestoreLine,
    RetireLine,
    CreateFacility,
    UpdateFacility,
    DeleteFacility,
    CreateFloor,
    UpdateFloor,
    DeleteFloor,
    CreateTeam,
    UpdateTeam,
    DeleteTeam,
    CreateVendor,
    UpdateVendor,
    DeleteVendor,
    AssignRole,
    RevokeRole,
}

impl Operation {
    pub const ALL: [Operation; 22] = [
        Self::Read,
        Self::ProvisionLine,
        Self::AllocateLine,
        Self::DeallocateLine,
        Self::TransferLine,
        Self::SetMaintenance,
        Self::RestoreLine,
        Self::RetireLine,
        Self::CreateFacility,
        Self::UpdateFacility,
        Self::DeleteFacility,
        Self::CreateFloor,
        Self::UpdateFloor,
        Self::DeleteFloor,
        Self::CreateTeam,
        Self::UpdateTeam,
        Self::DeleteTeam,
        Self::CreateVendor,
        Self::UpdateVendor,
        Self::DeleteVendor,
        Self::AssignRole,
        Self::RevokeRole,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::ProvisionLine => "provision_line",
            Self::AllocateLine => "allocate_line",
            Self::DeallocateLine => "deallocate_line",
            Self::TransferLine => "transfer_line",
            Self::SetMaintenance => "set_maintenance",
            Self::RestoreLine => "restore_line",
            Self::RetireLine => "retire_line",
            Self::CreateFacility => "create_facility",
            Self::UpdateFacility => "update_facility",
            Self::DeleteFacility => "delete_facility",
            Self::CreateFloor => "create_floor",
            Self::UpdateFloor => "update_floor",
            Self::DeleteFloor => "delete_floor",
            Self::CreateTeam => "create_team",
            Self::UpdateTeam => "update_team",
            Self::DeleteTeam => "delete_team",
            Self::CreateVendor => "create_vendor",
            Self::UpdateVendor => "update_vendor",
            Self::DeleteVendor => "delete_vendor",
            Self::AssignRole => "assign_role",
            Self::RevokeRole => "revoke_role",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Read => Capability::Read,
            Self::AllocateLine | Self::DeallocateLine | Self::TransferLine => {
                Capability::OperateLines
            }
            Self::SetMaintenance | Self::RestoreLine | Self::RetireLine => {
                Capability::ServiceLines
            }
            Self::UpdateTeam => Capability::EditTeams,
            Self::ProvisionLine
            | Self::CreateFacility
            | Self::UpdateFacility
            | Self::DeleteFacility
            | Self::CreateFloor
            | Self::UpdateFloor
            | Self::DeleteFloor
            | Self::CreateVendor
            | Self::UpdateVendor
            | Self::DeleteVendor => Capability::ManageInventory,
            Self::CreateTeam | Self::DeleteTeam => Capability::ManageTeams,
            Self::AssignRole | Self::RevokeRole => Capability::ManageRoles,
        }
    }
}

/// Coarse grouping of operations that roles are granted against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    OperateLines,
    ServiceLines,
    EditTeams,
    ManageInventory,
    ManageTeams,
    ManageRoles,
}

impl Role {
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::SupportExecutive => matches!(
                capability,
                Capability::Read
                    | Capability::OperateLines
                    | Capability::ServiceLines
                    | Capability::EditTeams
            ),
        }
    }
}

pub fn authorize(role: Role, operation: Operation) -> Result<(), DomainError> {
    if role.grants(operation.capability()) {
        Ok(())
    } else {
        Err(DomainError::Denied { role, operation })
    }
}
