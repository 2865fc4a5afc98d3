use thiserror::Error;

use linekeeper_core::errors::{ApplicationError, DomainError, EntityKind, ErrorKind};

use crate::repositories::RepositoryError;

/// Failure of one gated operation: either a domain rule said no, or storage did.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OperationError {
    fn from(error: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(error))
    }
}

impl OperationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(error) => error.kind(),
            Self::Repository(_) => ErrorKind::Persistence,
        }
    }

    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::Domain(DomainError::not_found(entity, id))
    }
}

impl From<OperationError> for ApplicationError {
    fn from(error: OperationError) -> Self {
        match error {
            OperationError::Domain(error) => ApplicationError::Domain(error),
            OperationError::Repository(error) => ApplicationError::Persistence(error.to_string()),
        }
    }
}

/// Maps a UNIQUE violation to `Conflict`; everything else stays a storage error.
pub(crate) fn conflict_on_unique(error: sqlx::Error, message: impl Into<String>) -> OperationError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DomainError::Conflict(message.into()).into()
        }
        _ => error.into(),
    }
}

/// Maps a RESTRICT foreign-key violation on delete to `EntityInUse`.
pub(crate) fn in_use_on_foreign_key(
    error: sqlx::Error,
    entity: EntityKind,
    id: &str,
    dependents: &'static str,
) -> OperationError {
    match &error {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            DomainError::EntityInUse { entity, id: id.to_string(), dependents }.into()
        }
        _ => error.into(),
    }
}

#[cfg(test)]
mod tests {
    use linekeeper_core::errors::{ApplicationError, DomainError, ErrorKind};

    use super::OperationError;
    use crate::repositories::RepositoryError;

    #[test]
    fn repository_failures_surface_as_persistence() {
        let error = OperationError::from(RepositoryError::Decode("bad status".into()));
        assert_eq!(error.kind(), ErrorKind::Persistence);
        assert!(matches!(ApplicationError::from(error), ApplicationError::Persistence(_)));
    }

    #[test]
    fn domain_failures_keep_their_kind() {
        let error = OperationError::from(DomainError::TerminalState { line_id: "l-1".into() });
        assert_eq!(error.kind(), ErrorKind::TerminalState);
        assert!(matches!(ApplicationError::from(error), ApplicationError::Domain(_)));
    }
}
