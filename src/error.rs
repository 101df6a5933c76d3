use crate::entry::{EntryId, OwnerId};
use crate::entry_validation::EntryValidationError;
use crate::persistence::PersistenceError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    ValidationFailed,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::Persistence => "persistence",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProgrammeError {
    #[error("owner {0} not found")]
    OwnerNotFound(OwnerId),
    #[error("entry {entry_id} not found in owner {owner_id}")]
    EntryNotFound { owner_id: OwnerId, entry_id: EntryId },
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] EntryValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ProgrammeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProgrammeError::OwnerNotFound(_) | ProgrammeError::EntryNotFound { .. } => {
                ErrorKind::NotFound
            }
            ProgrammeError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            ProgrammeError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            ProgrammeError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        ProgrammeError::PreconditionFailed(message.into())
    }
}

pub type ProgrammeResult<T> = Result<T, ProgrammeError>;
