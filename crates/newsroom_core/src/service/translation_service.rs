//! Translation forks: creation, progression and completion.
//!
//! # Responsibility
//! - Spawn per-language translations from approved-or-later stories.
//! - Move translations through work and review states.
//! - Record the materialized story when a translation is published.
//!
//! # Invariants
//! - At most one non-rejected translation per `(story, language)`.
//! - `REJECTED` is terminal; a new fork is the only way forward.
//! - `PUBLISHED` is one-way through this service.

use crate::model::audit::AuditPayload;
use crate::model::story::StoryId;
use crate::model::task::ContentType;
use crate::model::translation::{Translation, TranslationId, TranslationStatus};
use crate::model::user::{Language, UserId};
use crate::model::workflow::AssignmentSlot;
use crate::policy::{ActorRelation, PolicyAction};
use crate::repo::error::EntityKind;
use crate::repo::translation_repo::{TranslationListQuery, TranslationRepository};
use crate::repo::user_repo::UserRepository;
use crate::service::context::EngineContext;
use crate::service::error::{EngineError, EngineResult};
use crate::service::story_service::load_story;
use crate::service::task_service::{reconcile_best_effort, ReconcileTarget};
use crate::service::{check_slot_holder, ensure_permitted, load_actor};
use log::info;

/// `forkTranslation(storyId, language, assigneeId)` issued by `actor_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkRequest {
    pub source_story_id: StoryId,
    pub language: Language,
    pub assignee_id: UserId,
    pub actor_id: UserId,
}

/// Result of `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteOutcome {
    pub translation: Translation,
    /// `true` when the translation was already published with this target.
    pub already_published: bool,
}

/// Creates a `PENDING` translation of an approved-or-later story.
///
/// Failure order: `NotFound`, `StageMismatch`, `InvalidInput`,
/// `DuplicateFork`, `InvalidAssignee`, `Unauthorized`.
pub fn fork(ctx: &EngineContext<'_>, request: &ForkRequest) -> EngineResult<Translation> {
    let translation = ctx.write("fork_translation", |scope| {
        let story = load_story(&scope.stories()?, request.source_story_id)?;
        let users = scope.users()?;
        let assignee = users
            .get_user(request.assignee_id)?
            .ok_or_else(|| EngineError::not_found(EntityKind::User, request.assignee_id))?;

        if !story.stage.allows_translation_fork() {
            return Err(EngineError::StageMismatch(format!(
                "story {} is {}; translations fork from APPROVED, READY_TO_PUBLISH or PUBLISHED",
                story.id, story.stage
            )));
        }
        if story.language == request.language {
            return Err(EngineError::InvalidInput(format!(
                "story {} is already written in {}",
                story.id, request.language
            )));
        }

        let translations = scope.translations()?;
        if let Some(existing) = translations.find_active(story.id, request.language)? {
            return Err(EngineError::DuplicateFork {
                story_id: story.id,
                language: request.language,
                existing: existing.id,
            });
        }
        check_slot_holder(&assignee, AssignmentSlot::Translator, Some(request.language))?;

        let actor = load_actor(&users, request.actor_id, PolicyAction::ForkTranslation)?;
        ensure_permitted(
            &actor,
            PolicyAction::ForkTranslation,
            Some(story.stage),
            ActorRelation::to_story(&story, actor.id),
        )?;

        let translation =
            Translation::pending(story.id, request.language, assignee.id, scope.now_ms());
        translations.create_translation(&translation)?;
        scope.record(
            actor.id,
            ContentType::Translation,
            translation.id,
            AuditPayload::TranslationForked {
                source_story_id: story.id,
                language: request.language,
                assignee: assignee.id,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Translation(&translation));
        Ok(translation)
    })?;

    info!(
        "event=translation_fork module=translation_service status=ok translation_id={} story_id={} language={}",
        translation.id, request.source_story_id, request.language
    );
    Ok(translation)
}

/// Moves a translation along its work/review edges.
///
/// The assignee drives `PENDING -> IN_PROGRESS -> NEEDS_REVIEW`; reviewers
/// decide from `NEEDS_REVIEW`.
pub fn advance(
    ctx: &EngineContext<'_>,
    translation_id: TranslationId,
    status: TranslationStatus,
    actor_id: UserId,
) -> EngineResult<Translation> {
    ctx.write("advance_translation", |scope| {
        let translations = scope.translations()?;
        let translation = load_translation(&translations, translation_id)?;
        if !translation.status.can_advance_to(status) {
            return Err(EngineError::InvalidTransition(format!(
                "translation {} cannot move from {} to {}",
                translation.id, translation.status, status
            )));
        }

        let action = if translation.status == TranslationStatus::NeedsReview {
            PolicyAction::ReviewTranslation
        } else {
            PolicyAction::WorkTranslation
        };
        let actor = load_actor(&scope.users()?, actor_id, action)?;
        ensure_permitted(
            &actor,
            action,
            None,
            ActorRelation::to_translation(&translation, actor.id),
        )?;

        let mut next = translation.clone();
        next.status = status;
        next.updated_at = scope.now_ms();
        next.version = translations.update_translation(&next)?;
        scope.record(
            actor.id,
            ContentType::Translation,
            next.id,
            AuditPayload::TranslationStatusChanged {
                from: translation.status,
                to: status,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Translation(&next));
        Ok(next)
    })
}

/// Publishes an approved translation as `target_story_id`.
///
/// Repeating with the same target succeeds without writing; any other
/// attempt on a published translation is `InvalidTransition`.
pub fn complete(
    ctx: &EngineContext<'_>,
    translation_id: TranslationId,
    target_story_id: StoryId,
    actor_id: UserId,
) -> EngineResult<CompleteOutcome> {
    ctx.write("complete_translation", |scope| {
        let translations = scope.translations()?;
        let translation = load_translation(&translations, translation_id)?;
        let target = load_story(&scope.stories()?, target_story_id)?;

        let actor = load_actor(&scope.users()?, actor_id, PolicyAction::CompleteTranslation)?;
        ensure_permitted(
            &actor,
            PolicyAction::CompleteTranslation,
            None,
            ActorRelation::to_translation(&translation, actor.id),
        )?;

        match translation.status {
            TranslationStatus::Published
                if translation.translated_story_id == Some(target.id) =>
            {
                return Ok(CompleteOutcome {
                    translation,
                    already_published: true,
                });
            }
            TranslationStatus::Approved => {}
            other => {
                return Err(EngineError::InvalidTransition(format!(
                    "translation {} is {other}; only APPROVED translations can be completed",
                    translation.id
                )));
            }
        }
        if translation.original_story_id == Some(target.id) {
            return Err(EngineError::InvalidInput(
                "a translation cannot materialize as its own source story".to_string(),
            ));
        }
        if target.language != translation.target_language {
            return Err(EngineError::InvalidInput(format!(
                "story {} is written in {}, translation targets {}",
                target.id, target.language, translation.target_language
            )));
        }

        let mut next = translation.clone();
        next.status = TranslationStatus::Published;
        next.translated_story_id = Some(target.id);
        next.updated_at = scope.now_ms();
        next.version = translations.update_translation(&next)?;
        scope.record(
            actor.id,
            ContentType::Translation,
            next.id,
            AuditPayload::TranslationCompleted {
                from: translation.status,
                translated_story_id: target.id,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Translation(&next));
        Ok(CompleteOutcome {
            translation: next,
            already_published: false,
        })
    })
}

/// Lists translations forked from `story_id`, oldest first.
pub fn list_for_story(
    ctx: &EngineContext<'_>,
    story_id: StoryId,
) -> EngineResult<Vec<Translation>> {
    Ok(ctx.translations()?.list_translations(&TranslationListQuery {
        original_story_id: Some(story_id),
        ..TranslationListQuery::default()
    })?)
}

fn load_translation(
    translations: &impl TranslationRepository,
    translation_id: TranslationId,
) -> EngineResult<Translation> {
    translations
        .get_translation(translation_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Translation, translation_id))
}
