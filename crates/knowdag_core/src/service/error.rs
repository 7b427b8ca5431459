//! Service error taxonomy.
//!
//! # Responsibility
//! - Name every way a use-case can fail, with the offending ids.
//! - Group failures into `ErrorKind` with stable codes for outer surfaces.
//!
//! # Invariants
//! - Codes and status hints are stable; callers may match on them.

use crate::model::validation::ModelValidationError;
use crate::repo::project_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from hierarchy, graph, project and interchange operations.
#[derive(Debug)]
pub enum ServiceError {
    ProjectNotFound(String),
    ChapterNotFound(String),
    SectionNotFound(String),
    NodeNotFound(String),
    EdgeNotFound {
        source: String,
        target: String,
    },
    /// Caller-supplied parent id does not match where the entity lives.
    ParentMismatch {
        entity_id: String,
        expected_parent: String,
        actual_parent: String,
    },
    /// Another node already uses this name.
    NameConflict(String),
    /// Adding `source -> target` would close a directed cycle.
    CycleDetected {
        source: String,
        target: String,
    },
    /// Submitted order is not a permutation of the current children.
    OrderMismatch {
        parent_id: String,
        expected: usize,
        received: usize,
    },
    /// Interchange document is structurally unusable.
    ImportValidation {
        field: String,
        detail: String,
    },
    /// Aggregate changed since it was loaded.
    Conflict {
        project_id: String,
        expected: u64,
        actual: Option<u64>,
    },
    /// Blank or oversized names, unknown layouts, bad labels or coordinates.
    InvalidInput(String),
    /// Storage failure unrelated to caller input.
    Store(StoreError),
}

/// Coarse error grouping for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ParentMismatch,
    NameConflict,
    CycleDetected,
    OrderMismatch,
    ImportValidation,
    Conflict,
    InvalidInput,
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "ERR_NOT_FOUND",
            Self::ParentMismatch => "ERR_PARENT_MISMATCH",
            Self::NameConflict => "ERR_NAME_CONFLICT",
            Self::CycleDetected => "ERR_CYCLE_DETECTED",
            Self::OrderMismatch => "ERR_ORDER_MISMATCH",
            Self::ImportValidation => "ERR_IMPORT_VALIDATION",
            Self::Conflict => "ERR_CONFLICT",
            Self::InvalidInput => "ERR_INVALID_INPUT",
            Self::Storage => "ERR_STORAGE",
        }
    }

    /// HTTP-style status hint.
    pub fn status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::ParentMismatch
            | Self::CycleDetected
            | Self::OrderMismatch
            | Self::InvalidInput => 400,
            Self::NameConflict | Self::Conflict => 409,
            Self::ImportValidation => 422,
            Self::Storage => 500,
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProjectNotFound(_)
            | Self::ChapterNotFound(_)
            | Self::SectionNotFound(_)
            | Self::NodeNotFound(_)
            | Self::EdgeNotFound { .. } => ErrorKind::NotFound,
            Self::ParentMismatch { .. } => ErrorKind::ParentMismatch,
            Self::NameConflict(_) => ErrorKind::NameConflict,
            Self::CycleDetected { .. } => ErrorKind::CycleDetected,
            Self::OrderMismatch { .. } => ErrorKind::OrderMismatch,
            Self::ImportValidation { .. } => ErrorKind::ImportValidation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Store(_) => ErrorKind::Storage,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn status(&self) -> u16 {
        self.kind().status()
    }

    pub(crate) fn import(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ImportValidation {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::ChapterNotFound(id) => write!(f, "chapter not found: {id}"),
            Self::SectionNotFound(id) => write!(f, "section not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::EdgeNotFound { source, target } => {
                write!(f, "edge not found: {source} -> {target}")
            }
            Self::ParentMismatch {
                entity_id,
                expected_parent,
                actual_parent,
            } => write!(
                f,
                "{entity_id} belongs to {actual_parent}, not {expected_parent}"
            ),
            Self::NameConflict(name) => write!(f, "node name already in use: `{name}`"),
            Self::CycleDetected { source, target } => {
                write!(f, "edge {source} -> {target} would create a cycle")
            }
            Self::OrderMismatch {
                parent_id,
                expected,
                received,
            } => write!(
                f,
                "order for {parent_id} must list each of its {expected} children exactly once (received {received} ids)"
            ),
            Self::ImportValidation { field, detail } => {
                write!(f, "invalid import document at {field}: {detail}")
            }
            Self::Conflict {
                project_id,
                expected,
                actual,
            } => match actual {
                Some(actual) => write!(
                    f,
                    "project {project_id} changed concurrently (expected version {expected}, found {actual})"
                ),
                None => write!(
                    f,
                    "project {project_id} changed concurrently (expected version {expected}, row missing)"
                ),
            },
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(project_id) => Self::ProjectNotFound(project_id),
            StoreError::Conflict {
                project_id,
                expected,
                actual,
            } => Self::Conflict {
                project_id,
                expected,
                actual,
            },
            StoreError::Validation(err) => err.into(),
            other => Self::Store(other),
        }
    }
}

impl From<ModelValidationError> for ServiceError {
    fn from(value: ModelValidationError) -> Self {
        match value {
            ModelValidationError::DuplicateNodeName(name) => Self::NameConflict(name),
            ModelValidationError::CycleDetected { source, target } => {
                Self::CycleDetected { source, target }
            }
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
