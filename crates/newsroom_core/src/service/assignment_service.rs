//! Reviewer, approver and translator (re)assignment.
//!
//! # Invariants
//! - Failure kinds are checked in order: `NotFound` (content),
//!   `StageMismatch`, `InvalidAssignee` (including a target user that does
//!   not exist), `Unauthorized`, `Conflict`.
//! - Assignment never changes stage.
//! - Re-assigning the current holder writes nothing and audits nothing.
//! - The slot write is version-guarded, so it cannot land on a story that
//!   a concurrent transition already moved.

use crate::model::audit::AuditPayload;
use crate::model::story::Story;
use crate::model::task::ContentType;
use crate::model::translation::Translation;
use crate::model::user::{User, UserId};
use crate::model::workflow::AssignmentSlot;
use crate::policy::{ActorRelation, PolicyAction};
use crate::repo::error::EntityKind;
use crate::repo::story_repo::StoryRepository;
use crate::repo::translation_repo::TranslationRepository;
use crate::repo::user_repo::UserRepository;
use crate::service::context::{EngineContext, WriteScope};
use crate::service::error::{EngineError, EngineResult};
use crate::service::task_service::{reconcile_best_effort, ReconcileTarget};
use crate::service::{check_expected_version, check_slot_holder, ensure_permitted, load_actor};
use crate::stage_machine::slot_stage;
use log::info;
use uuid::Uuid;

/// `assign(slot, contentId, targetUserId, actorId[, expectedVersion])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRequest {
    pub slot: AssignmentSlot,
    /// Story id for reviewer/approver, translation id for translator.
    pub content_id: Uuid,
    pub target_user_id: UserId,
    pub actor_id: UserId,
    pub expected_version: Option<i64>,
}

impl AssignRequest {
    pub fn new(
        slot: AssignmentSlot,
        content_id: Uuid,
        target_user_id: UserId,
        actor_id: UserId,
    ) -> Self {
        Self {
            slot,
            content_id,
            target_user_id,
            actor_id,
            expected_version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Assigned {
        slot: AssignmentSlot,
        content_type: ContentType,
        content_id: Uuid,
        previous: Option<UserId>,
        new: UserId,
        version: i64,
    },
    /// Target already holds the slot.
    Unchanged {
        slot: AssignmentSlot,
        content_type: ContentType,
        content_id: Uuid,
        holder: UserId,
    },
}

impl AssignmentOutcome {
    pub fn holder(&self) -> UserId {
        match self {
            Self::Assigned { new, .. } => *new,
            Self::Unchanged { holder, .. } => *holder,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged { .. })
    }
}

pub fn assign(ctx: &EngineContext<'_>, request: &AssignRequest) -> EngineResult<AssignmentOutcome> {
    let outcome = ctx.write("assign", |scope| match request.slot {
        AssignmentSlot::Reviewer | AssignmentSlot::Approver => assign_story_slot(scope, request),
        AssignmentSlot::Translator => assign_translator(scope, request),
    })?;

    match &outcome {
        AssignmentOutcome::Assigned {
            slot,
            content_id,
            previous,
            new,
            ..
        } => info!(
            "event=assign module=assignment_service status=ok slot={} content_id={} previous={} new={}",
            slot,
            content_id,
            previous.map_or_else(|| "none".to_string(), |id| id.to_string()),
            new
        ),
        AssignmentOutcome::Unchanged {
            slot, content_id, ..
        } => info!(
            "event=assign module=assignment_service status=unchanged slot={} content_id={}",
            slot, content_id
        ),
    }
    Ok(outcome)
}

/// A target that does not exist cannot hold the slot.
fn load_target(scope: &WriteScope<'_>, user_id: UserId) -> EngineResult<User> {
    scope
        .users()?
        .get_user(user_id)?
        .ok_or_else(|| EngineError::InvalidAssignee(format!("user {user_id} does not exist")))
}

fn assign_story_slot(
    scope: &WriteScope<'_>,
    request: &AssignRequest,
) -> EngineResult<AssignmentOutcome> {
    let stories = scope.stories()?;
    let story = stories
        .get_story(request.content_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Story, request.content_id))?;

    if slot_stage(request.slot) != Some(story.stage) {
        return Err(EngineError::StageMismatch(format!(
            "cannot assign a {} while story {} is {}",
            request.slot, story.id, story.stage
        )));
    }
    let target = load_target(scope, request.target_user_id)?;
    check_slot_holder(&target, request.slot, None)?;

    let action = PolicyAction::Reassign(request.slot);
    let actor = load_actor(&scope.users()?, request.actor_id, action)?;
    ensure_permitted(
        &actor,
        action,
        Some(story.stage),
        ActorRelation::to_story(&story, actor.id),
    )?;

    let previous = story_slot(&story, request.slot);
    if previous == Some(target.id) {
        return Ok(AssignmentOutcome::Unchanged {
            slot: request.slot,
            content_type: ContentType::Story,
            content_id: story.id,
            holder: target.id,
        });
    }
    check_expected_version(
        EntityKind::Story,
        story.id,
        request.expected_version,
        story.version,
    )?;

    let mut next = story.clone();
    match request.slot {
        AssignmentSlot::Reviewer => next.assigned_reviewer_id = Some(target.id),
        _ => next.assigned_approver_id = Some(target.id),
    }
    next.updated_at = scope.now_ms();
    next.version = stories.update_story(&next)?;
    scope.record(
        actor.id,
        ContentType::Story,
        next.id,
        AuditPayload::Assigned {
            slot: request.slot,
            previous,
            new: target.id,
        },
    )?;
    reconcile_best_effort(scope, actor.id, ReconcileTarget::Story(&next));

    Ok(AssignmentOutcome::Assigned {
        slot: request.slot,
        content_type: ContentType::Story,
        content_id: next.id,
        previous,
        new: target.id,
        version: next.version,
    })
}

fn story_slot(story: &Story, slot: AssignmentSlot) -> Option<UserId> {
    match slot {
        AssignmentSlot::Reviewer => story.assigned_reviewer_id,
        AssignmentSlot::Approver => story.assigned_approver_id,
        AssignmentSlot::Translator => None,
    }
}

fn assign_translator(
    scope: &WriteScope<'_>,
    request: &AssignRequest,
) -> EngineResult<AssignmentOutcome> {
    let translations = scope.translations()?;
    let translation: Translation = translations
        .get_translation(request.content_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Translation, request.content_id))?;

    if !translation.status.accepts_translator_change() {
        return Err(EngineError::StageMismatch(format!(
            "cannot reassign translator while translation {} is {}",
            translation.id, translation.status
        )));
    }
    let target = load_target(scope, request.target_user_id)?;
    check_slot_holder(
        &target,
        AssignmentSlot::Translator,
        Some(translation.target_language),
    )?;

    let action = PolicyAction::Reassign(AssignmentSlot::Translator);
    let actor = load_actor(&scope.users()?, request.actor_id, action)?;
    ensure_permitted(
        &actor,
        action,
        None,
        ActorRelation::to_translation(&translation, actor.id),
    )?;

    if translation.assigned_to_id == target.id {
        return Ok(AssignmentOutcome::Unchanged {
            slot: AssignmentSlot::Translator,
            content_type: ContentType::Translation,
            content_id: translation.id,
            holder: target.id,
        });
    }
    check_expected_version(
        EntityKind::Translation,
        translation.id,
        request.expected_version,
        translation.version,
    )?;

    let previous = translation.assigned_to_id;
    let mut next = translation.clone();
    next.assigned_to_id = target.id;
    next.updated_at = scope.now_ms();
    next.version = translations.update_translation(&next)?;
    scope.record(
        actor.id,
        ContentType::Translation,
        next.id,
        AuditPayload::Assigned {
            slot: AssignmentSlot::Translator,
            previous: Some(previous),
            new: target.id,
        },
    )?;
    reconcile_best_effort(scope, actor.id, ReconcileTarget::Translation(&next));

    Ok(AssignmentOutcome::Assigned {
        slot: AssignmentSlot::Translator,
        content_type: ContentType::Translation,
        content_id: next.id,
        previous: Some(previous),
        new: target.id,
        version: next.version,
    })
}
