//! Engine-level error taxonomy.
//!
//! # Invariants
//! - `Unavailable` is the only "retry later" class; every other variant is a
//!   rejected request that will fail the same way when replayed.
//! - Constraint violations never surface as `Unavailable`.

use crate::model::story::StoryId;
use crate::model::translation::TranslationId;
use crate::model::user::{Language, UserId};
use crate::policy::PolicyAction;
use crate::repo::error::{EntityKind, RepoError};
use crate::stage_machine::StageMachineError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type EngineResult<T> = Result<T, EngineError>;

/// Discriminant of [`EngineError`], for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    NotFound,
    Unauthorized,
    InvalidTransition,
    StageMismatch,
    InvalidAssignee,
    DuplicateFork,
    Conflict,
    InvalidInput,
    Unavailable,
}

#[derive(Debug)]
pub enum EngineError {
    NotFound {
        entity: EntityKind,
        id: Uuid,
    },
    Unauthorized {
        actor_id: UserId,
        action: PolicyAction,
    },
    InvalidTransition(String),
    StageMismatch(String),
    InvalidAssignee(String),
    DuplicateFork {
        story_id: StoryId,
        language: Language,
        existing: TranslationId,
    },
    Conflict(String),
    InvalidInput(String),
    /// Persistence failure; the request may succeed later.
    Unavailable(RepoError),
}

impl EngineError {
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            Self::NotFound { .. } => EngineErrorKind::NotFound,
            Self::Unauthorized { .. } => EngineErrorKind::Unauthorized,
            Self::InvalidTransition(_) => EngineErrorKind::InvalidTransition,
            Self::StageMismatch(_) => EngineErrorKind::StageMismatch,
            Self::InvalidAssignee(_) => EngineErrorKind::InvalidAssignee,
            Self::DuplicateFork { .. } => EngineErrorKind::DuplicateFork,
            Self::Conflict(_) => EngineErrorKind::Conflict,
            Self::InvalidInput(_) => EngineErrorKind::InvalidInput,
            Self::Unavailable(_) => EngineErrorKind::Unavailable,
        }
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            EngineErrorKind::NotFound => "not_found",
            EngineErrorKind::Unauthorized => "unauthorized",
            EngineErrorKind::InvalidTransition => "invalid_transition",
            EngineErrorKind::StageMismatch => "stage_mismatch",
            EngineErrorKind::InvalidAssignee => "invalid_assignee",
            EngineErrorKind::DuplicateFork => "duplicate_fork",
            EngineErrorKind::Conflict => "conflict",
            EngineErrorKind::InvalidInput => "invalid_input",
            EngineErrorKind::Unavailable => "unavailable",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == EngineErrorKind::Unavailable
    }

    pub(crate) fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn stale_version(entity: EntityKind, id: Uuid, expected: i64, actual: i64) -> Self {
        Self::Conflict(format!(
            "{entity} {id} is at version {actual}, caller expected {expected}"
        ))
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Unauthorized { actor_id, action } => {
                write!(f, "user {actor_id} is not permitted to {action}")
            }
            Self::InvalidTransition(message) => write!(f, "invalid transition: {message}"),
            Self::StageMismatch(message) => write!(f, "stage mismatch: {message}"),
            Self::InvalidAssignee(message) => write!(f, "invalid assignee: {message}"),
            Self::DuplicateFork {
                story_id,
                language,
                existing,
            } => write!(
                f,
                "story {story_id} already has an active {language} translation ({existing})"
            ),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Unavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity, id) => Self::NotFound { entity, id },
            RepoError::VersionConflict {
                entity,
                id,
                expected,
            } => Self::Conflict(format!(
                "{entity} {id} changed concurrently (expected version {expected})"
            )),
            RepoError::Db(ref err) if err.is_constraint_violation() => {
                Self::Conflict(format!("constraint violated: {err}"))
            }
            RepoError::StoryValidation(err) => Self::InvalidInput(err.to_string()),
            RepoError::UserValidation(err) => Self::InvalidInput(err.to_string()),
            other => Self::Unavailable(other),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

impl From<StageMachineError> for EngineError {
    fn from(value: StageMachineError) -> Self {
        match value {
            StageMachineError::NoEdge { .. } | StageMachineError::NoActionEdge { .. } => {
                Self::InvalidTransition(value.to_string())
            }
            StageMachineError::MissingAssignee { .. } => Self::InvalidAssignee(value.to_string()),
            StageMachineError::UnexpectedAssignee { .. } => Self::InvalidInput(value.to_string()),
        }
    }
}
