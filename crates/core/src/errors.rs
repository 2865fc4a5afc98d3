use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Operation;
use crate::domain::identity::Role;
use crate::domain::phone_line::{LineAction, PhoneLineStatus};

/// Stable, identifier-free classification of every failure the core can
/// report. The string form is what callers key UI messaging on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoleNotAssigned,
    DuplicateRoleAssignment,
    Denied,
    HierarchyMismatch,
    EntityInUse,
    VendorCapacityExhausted,
    AlreadyAllocated,
    TerminalState,
    MustDeallocateFirst,
    InvalidTransition,
    NotFound,
    InvalidInput,
    Conflict,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleNotAssigned => "role_not_assigned",
            Self::DuplicateRoleAssignment => "duplicate_role_assignment",
            Self::Denied => "denied",
            Self::HierarchyMismatch => "hierarchy_mismatch",
            Self::EntityInUse => "entity_in_use",
            Self::VendorCapacityExhausted => "vendor_capacity_exhausted",
            Self::AlreadyAllocated => "already_allocated",
            Self::TerminalState => "terminal_state",
            Self::MustDeallocateFirst => "must_deallocate_first",
            Self::InvalidTransition => "invalid_transition",
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::Persistence => "persistence",
        }
    }

    /// The caller's role was missing, ambiguous or not enough.
    pub fn is_access_refusal(&self) -> bool {
        matches!(self, Self::RoleNotAssigned | Self::DuplicateRoleAssignment | Self::Denied)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Facility,
    Floor,
    Team,
    Vendor,
    PhoneLine,
    Profile,
    UserRole,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facility => "facility",
            Self::Floor => "floor",
            Self::Team => "team",
            Self::Vendor => "vendor",
            Self::PhoneLine => "phone_line",
            Self::Profile => "profile",
            Self::UserRole => "user_role",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("no role is assigned to user `{user_id}`")]
    RoleNotAssigned { user_id: String },
    #[error("user `{user_id}` has {rows} role assignments; exactly one is allowed")]
    DuplicateRoleAssignment { user_id: String, rows: usize },
    #[error("role {} may not perform {}", .role.as_str(), .operation.as_str())]
    Denied { role: Role, operation: Operation },
    #[error("hierarchy mismatch: {0}")]
    HierarchyMismatch(String),
    #[error("{} `{id}` is still referenced by {dependents}", .entity.as_str())]
    EntityInUse { entity: EntityKind, id: String, dependents: &'static str },
    #[error("vendor `{vendor_id}` has no remaining line capacity")]
    VendorCapacityExhausted { vendor_id: String },
    #[error("phone line `{line_id}` is {} and cannot be allocated", .status.as_str())]
    AlreadyAllocated { line_id: String, status: PhoneLineStatus },
    #[error("phone line `{line_id}` is retired; no further transitions are allowed")]
    TerminalState { line_id: String },
    #[error("phone line `{line_id}` is allocated and must be deallocated first")]
    MustDeallocateFirst { line_id: String },
    #[error("phone line `{line_id}` cannot {} while {}", .action.as_str(), .from.as_str())]
    InvalidTransition { line_id: String, from: PhoneLineStatus, action: LineAction },
    #[error("{} `{id}` was not found", .entity.as_str())]
    NotFound { entity: EntityKind, id: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoleNotAssigned { .. } => ErrorKind::RoleNotAssigned,
            Self::DuplicateRoleAssignment { .. } => ErrorKind::DuplicateRoleAssignment,
            Self::Denied { .. } => ErrorKind::Denied,
            Self::HierarchyMismatch(_) => ErrorKind::HierarchyMismatch,
            Self::EntityInUse { .. } => ErrorKind::EntityInUse,
            Self::VendorCapacityExhausted { .. } => ErrorKind::VendorCapacityExhausted,
            Self::AlreadyAllocated { .. } => ErrorKind::AlreadyAllocated,
            Self::TerminalState { .. } => ErrorKind::TerminalState,
            Self::MustDeallocateFirst { .. } => ErrorKind::MustDeallocateFirst,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Conflict(_) => ErrorKind::Conflict,
            // Stored rows that break the shape rules are a storage fault, not caller input.
            Self::InvariantViolation(_) => ErrorKind::Persistence,
        }
    }

    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(error) => error.kind(),
            Self::Persistence(_) | Self::Configuration(_) => ErrorKind::Persistence,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { kind: ErrorKind, message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { kind, .. } => match kind {
                ErrorKind::RoleNotAssigned | ErrorKind::Denied => {
                    "You do not have permission to perform this action."
                }
                ErrorKind::DuplicateRoleAssignment => {
                    "Your account has conflicting role assignments. Contact an administrator."
                }
                ErrorKind::HierarchyMismatch => {
                    "The selected facility, floor and team do not belong together."
                }
                ErrorKind::EntityInUse => "This record is still in use and cannot be removed.",
                ErrorKind::VendorCapacityExhausted => "This vendor has no line capacity left.",
                ErrorKind::AlreadyAllocated => "This phone line is not available for allocation.",
                ErrorKind::TerminalState => "This phone line has been retired.",
                ErrorKind::MustDeallocateFirst => {
                    "Deallocate this phone line before retiring it."
                }
                ErrorKind::InvalidTransition => {
                    "This action is not possible in the line's current state."
                }
                ErrorKind::NotFound => "The requested record could not be found.",
                ErrorKind::Conflict => "A record with the same identity already exists.",
                ErrorKind::InvalidInput | ErrorKind::Persistence => {
                    "The request could not be processed. Check inputs and try again."
                }
            },
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { kind, .. } => *kind,
            Self::ServiceUnavailable { .. } | Self::Internal { .. } => ErrorKind::Persistence,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::InvariantViolation(message))
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            // Authorization failures deliberately share the validation shape.
            ApplicationError::Domain(error) => Self::BadRequest {
                kind: error.kind(),
                message: error.kind().as_str().to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::access::Operation;
    use crate::domain::identity::Role;
    use crate::domain::phone_line::PhoneLineStatus;
    use crate::errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_with_stable_kind() {
        let interface = ApplicationError::from(DomainError::AlreadyAllocated {
            line_id: "line-1".to_owned(),
            status: PhoneLineStatus::Allocated,
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                kind: ErrorKind::AlreadyAllocated,
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message == "already_allocated"
        ));
    }

    #[test]
    fn denied_is_shaped_like_a_validation_failure() {
        let denied = ApplicationError::from(DomainError::Denied {
            role: Role::SupportExecutive,
            operation: Operation::DeleteFacility,
        })
        .into_interface("req-2");
        let invalid = ApplicationError::from(DomainError::InvalidInput("blank name".to_owned()))
            .into_interface("req-2");

        assert!(matches!(denied, InterfaceError::BadRequest { .. }));
        assert!(matches!(invalid, InterfaceError::BadRequest { .. }));
        assert!(!denied.to_string().contains("facility"));
    }

    #[test]
    fn only_role_failures_count_as_access_refusals() {
        let refusals =
            [ErrorKind::RoleNotAssigned, ErrorKind::DuplicateRoleAssignment, ErrorKind::Denied];
        for kind in refusals {
            assert!(kind.is_access_refusal(), "{}", kind.as_str());
        }
        for kind in [ErrorKind::Persistence, ErrorKind::NotFound, ErrorKind::HierarchyMismatch] {
            assert!(!kind.is_access_refusal(), "{}", kind.as_str());
        }
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad database url".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn error_kind_strings_do_not_embed_identifiers() {
        let error = DomainError::TerminalState { line_id: "line-42".to_owned() };
        assert_eq!(error.kind().as_str(), "terminal_state");
        assert_eq!(
            serde_json::to_string(&error.kind()).expect("serialize kind"),
            "\"terminal_state\""
        );
    }
}
