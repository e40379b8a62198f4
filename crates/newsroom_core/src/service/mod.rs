//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into workflow operations.
//! - Re-validate every precondition inside the write transaction that
//!   performs the mutation.
//! - Consult the role policy for every mutation; never infer permissions.
//!
//! # Invariants
//! - One mutation, one transaction, one audit record.
//! - Task reconciliation is best effort and never fails a mutation.

pub mod assignment_service;
pub mod context;
pub mod error;
pub mod stage_service;
pub mod story_service;
pub mod task_service;
pub mod translation_service;
pub mod work_queue_service;

use crate::model::story::StoryStage;
use crate::model::user::{Language, StaffRole, User, UserId, UserType};
use crate::model::workflow::AssignmentSlot;
use crate::policy::{authorize, ActorRelation, Decision, PolicyAction};
use crate::repo::error::EntityKind;
use crate::repo::user_repo::UserRepository;
use crate::service::error::{EngineError, EngineResult};
use uuid::Uuid;

/// Resolved acting user.
#[derive(Debug, Clone)]
pub(crate) struct Actor {
    pub id: UserId,
    pub role: StaffRole,
}

/// Loads the acting user. Absent users are `NotFound`; users that are not
/// active staff cannot perform `action`.
pub(crate) fn load_actor(
    users: &impl UserRepository,
    actor_id: UserId,
    action: PolicyAction,
) -> EngineResult<Actor> {
    let user = users
        .get_user(actor_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::User, actor_id))?;
    match user.active_staff_role() {
        Some(role) => Ok(Actor { id: user.id, role }),
        None => Err(EngineError::Unauthorized { actor_id, action }),
    }
}

/// Fails with `Unauthorized` unless the policy permits `action`.
pub(crate) fn ensure_permitted(
    actor: &Actor,
    action: PolicyAction,
    stage: Option<StoryStage>,
    relation: ActorRelation,
) -> EngineResult<()> {
    if authorize(actor.role, action, stage).permits(relation) {
        Ok(())
    } else {
        Err(EngineError::Unauthorized {
            actor_id: actor.id,
            action,
        })
    }
}

/// Checks that `user` may hold `slot`.
///
/// `language` is the translation target and only applies to the translator
/// slot.
pub(crate) fn check_slot_holder(
    user: &User,
    slot: AssignmentSlot,
    language: Option<Language>,
) -> EngineResult<()> {
    if user.user_type != UserType::Staff {
        return Err(EngineError::InvalidAssignee(format!(
            "user {} is not staff",
            user.id
        )));
    }
    if !user.is_active {
        return Err(EngineError::InvalidAssignee(format!(
            "user {} is inactive",
            user.id
        )));
    }
    let role = user.role.ok_or_else(|| {
        EngineError::InvalidAssignee(format!("user {} has no staff role", user.id))
    })?;
    if authorize(role, PolicyAction::OccupySlot(slot), None) != Decision::Allow {
        return Err(EngineError::InvalidAssignee(format!(
            "role {role} cannot hold the {slot} slot"
        )));
    }
    if let Some(language) = language {
        if user.translation_language != Some(language) {
            return Err(EngineError::InvalidAssignee(format!(
                "user {} does not translate into {language}",
                user.id
            )));
        }
    }
    Ok(())
}

/// Fails with `Conflict` when the caller's version token is stale.
pub(crate) fn check_expected_version(
    entity: EntityKind,
    id: Uuid,
    expected: Option<i64>,
    actual: i64,
) -> EngineResult<()> {
    match expected {
        Some(expected) if expected != actual => {
            Err(EngineError::stale_version(entity, id, expected, actual))
        }
        _ => Ok(()),
    }
}
