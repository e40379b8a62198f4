//! Story use-cases outside the stage machine.
//!
//! # Responsibility
//! - Create, edit and delete stories.
//! - Schedule and complete post-publication follow-ups.
//! - Normalize titles and derive plain-text summaries from markdown bodies.
//!
//! # Invariants
//! - None of these operations changes `stage`.
//! - Deleting a story referenced by translations requires an explicit
//!   cascade choice.

use crate::model::audit::{AuditPayload, TranslationCascade};
use crate::model::story::{NewStory, Story, StoryId, StoryStage};
use crate::model::task::ContentType;
use crate::model::translation::TranslationId;
use crate::model::user::UserId;
use crate::policy::{ActorRelation, PolicyAction};
use crate::repo::error::EntityKind;
use crate::repo::story_repo::StoryRepository;
use crate::repo::translation_repo::TranslationRepository;
use crate::service::context::EngineContext;
use crate::service::error::{EngineError, EngineResult};
use crate::service::task_service::{reconcile_best_effort, ReconcileTarget};
use crate::service::{check_expected_version, ensure_permitted, load_actor};
use once_cell::sync::Lazy;
use regex::Regex;

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`#>~\-\[\]\(\)!]+"#).expect("valid markdown symbol regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const SUMMARY_MAX_CHARS: usize = 160;
const TITLE_MAX_CHARS: usize = 200;

/// Edit request. `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditStoryRequest {
    pub story_id: StoryId,
    pub actor_id: UserId,
    pub title: Option<String>,
    pub body: Option<String>,
    pub expected_version: Option<i64>,
}

/// Result of a story deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub story_id: StoryId,
    pub cascade: TranslationCascade,
    pub affected_translations: Vec<TranslationId>,
}

/// Collapses whitespace runs and trims. Rejects blank or oversized titles.
pub fn normalize_title(raw: &str) -> EngineResult<String> {
    let normalized = WHITESPACE_RE.replace_all(raw, " ").trim().to_string();
    if normalized.is_empty() {
        return Err(EngineError::InvalidInput(
            "story title must not be blank".to_string(),
        ));
    }
    if normalized.chars().count() > TITLE_MAX_CHARS {
        return Err(EngineError::InvalidInput(format!(
            "story title exceeds {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(normalized)
}

/// Plain-text summary of a markdown body: images dropped, links reduced
/// to their text, symbols stripped, whitespace collapsed, first
/// 160 chars kept.
pub fn derive_summary(body: &str) -> Option<String> {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(body, " ");
    let without_links = MARKDOWN_LINK_RE.replace_all(&without_images, "$1");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_links, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_symbols, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(SUMMARY_MAX_CHARS).collect())
    }
}

/// Creates a draft story authored by `author_id`.
pub fn create_story(
    ctx: &EngineContext<'_>,
    author_id: UserId,
    payload: NewStory,
) -> EngineResult<Story> {
    let title = normalize_title(&payload.title)?;
    ctx.write("create_story", |scope| {
        let actor = load_actor(&scope.users()?, author_id, PolicyAction::CreateStory)?;
        ensure_permitted(
            &actor,
            PolicyAction::CreateStory,
            None,
            ActorRelation::default(),
        )?;

        let story = Story::draft(
            actor.id,
            NewStory { title, ..payload },
            scope.now_ms(),
        );
        scope.stories()?.create_story(&story)?;
        scope.record(
            actor.id,
            ContentType::Story,
            story.id,
            AuditPayload::StoryCreated {
                title: story.title.clone(),
                language: story.language,
            },
        )?;
        Ok(story)
    })
}

/// Replaces title and/or body. Stage is never touched.
///
/// An edit that changes nothing returns the stored story without writing.
pub fn edit_story(ctx: &EngineContext<'_>, request: EditStoryRequest) -> EngineResult<Story> {
    if request.title.is_none() && request.body.is_none() {
        return Err(EngineError::InvalidInput(
            "edit must change title or body".to_string(),
        ));
    }
    let title = request.title.as_deref().map(normalize_title).transpose()?;

    ctx.write("edit_story", |scope| {
        let stories = scope.stories()?;
        let story = load_story(&stories, request.story_id)?;
        let actor = load_actor(&scope.users()?, request.actor_id, PolicyAction::EditContent)?;
        if matches!(story.stage, StoryStage::Published | StoryStage::Archived) {
            return Err(EngineError::StageMismatch(format!(
                "story {} is {} and can no longer be edited",
                story.id, story.stage
            )));
        }
        ensure_permitted(
            &actor,
            PolicyAction::EditContent,
            Some(story.stage),
            ActorRelation::to_story(&story, actor.id),
        )?;
        check_expected_version(
            EntityKind::Story,
            story.id,
            request.expected_version,
            story.version,
        )?;

        let mut next = story.clone();
        if let Some(title) = title {
            next.title = title;
        }
        if let Some(body) = request.body {
            next.body = body;
        }
        if next.title == story.title && next.body == story.body {
            return Ok(story);
        }

        next.updated_at = scope.now_ms();
        next.version = stories.update_story(&next)?;
        scope.record(
            actor.id,
            ContentType::Story,
            next.id,
            AuditPayload::ContentEdited {
                title_before: story.title.clone(),
                title_after: next.title.clone(),
                body_changed: next.body != story.body,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Story(&next));
        Ok(next)
    })
}

/// Hard-deletes a story, handling referencing translations per `cascade`.
pub fn delete_story(
    ctx: &EngineContext<'_>,
    story_id: StoryId,
    actor_id: UserId,
    cascade: TranslationCascade,
) -> EngineResult<DeleteOutcome> {
    ctx.write("delete_story", |scope| {
        let stories = scope.stories()?;
        let story = load_story(&stories, story_id)?;
        let actor = load_actor(&scope.users()?, actor_id, PolicyAction::DeleteStory)?;
        ensure_permitted(
            &actor,
            PolicyAction::DeleteStory,
            Some(story.stage),
            ActorRelation::to_story(&story, actor.id),
        )?;

        let translations = scope.translations()?;
        let referencing = translations.list_referencing_story(story.id)?;
        let affected: Vec<TranslationId> = referencing.iter().map(|t| t.id).collect();
        match cascade {
            TranslationCascade::Refuse if !affected.is_empty() => {
                return Err(EngineError::Conflict(format!(
                    "story {} is referenced by {} translation(s)",
                    story.id,
                    affected.len()
                )));
            }
            TranslationCascade::Refuse => {}
            TranslationCascade::OrphanTranslations => {
                translations.orphan_story_references(story.id, scope.now_ms())?;
            }
            TranslationCascade::DeleteTranslations => {
                translations.delete_referencing_story(story.id)?;
            }
        }

        stories.delete_story(story.id)?;
        scope.record(
            actor.id,
            ContentType::Story,
            story.id,
            AuditPayload::StoryDeleted {
                stage: story.stage,
                cascade,
                affected_translations: affected.clone(),
            },
        )?;

        reconcile_best_effort(
            scope,
            actor.id,
            ReconcileTarget::Removed(ContentType::Story, story.id),
        );
        if cascade == TranslationCascade::DeleteTranslations {
            for translation_id in &affected {
                reconcile_best_effort(
                    scope,
                    actor.id,
                    ReconcileTarget::Removed(ContentType::Translation, *translation_id),
                );
            }
        }

        Ok(DeleteOutcome {
            story_id: story.id,
            cascade,
            affected_translations: affected,
        })
    })
}

/// Sets (or moves) the follow-up reminder and reopens it.
pub fn schedule_follow_up(
    ctx: &EngineContext<'_>,
    story_id: StoryId,
    actor_id: UserId,
    follow_up_date: i64,
) -> EngineResult<Story> {
    if follow_up_date <= 0 {
        return Err(EngineError::InvalidInput(
            "follow-up date must be a positive epoch millisecond value".to_string(),
        ));
    }
    ctx.write("schedule_follow_up", |scope| {
        let stories = scope.stories()?;
        let story = load_story(&stories, story_id)?;
        let actor = load_actor(&scope.users()?, actor_id, PolicyAction::ScheduleFollowUp)?;
        ensure_permitted(
            &actor,
            PolicyAction::ScheduleFollowUp,
            Some(story.stage),
            ActorRelation::to_story(&story, actor.id),
        )?;

        if story.follow_up_date == Some(follow_up_date) && !story.follow_up_completed {
            return Ok(story);
        }
        let mut next = story.clone();
        next.follow_up_date = Some(follow_up_date);
        next.follow_up_completed = false;
        next.updated_at = scope.now_ms();
        next.version = stories.update_story(&next)?;
        scope.record(
            actor.id,
            ContentType::Story,
            next.id,
            AuditPayload::FollowUpScheduled {
                previous: story.follow_up_date,
                new: follow_up_date,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Story(&next));
        Ok(next)
    })
}

/// Marks the follow-up done. Already-completed follow-ups are a no-op.
pub fn complete_follow_up(
    ctx: &EngineContext<'_>,
    story_id: StoryId,
    actor_id: UserId,
) -> EngineResult<Story> {
    ctx.write("complete_follow_up", |scope| {
        let stories = scope.stories()?;
        let story = load_story(&stories, story_id)?;
        let actor = load_actor(&scope.users()?, actor_id, PolicyAction::ScheduleFollowUp)?;
        ensure_permitted(
            &actor,
            PolicyAction::ScheduleFollowUp,
            Some(story.stage),
            ActorRelation::to_story(&story, actor.id),
        )?;
        if story.follow_up_date.is_none() {
            return Err(EngineError::InvalidInput(format!(
                "story {} has no follow-up scheduled",
                story.id
            )));
        }
        if story.follow_up_completed {
            return Ok(story);
        }

        let mut next = story.clone();
        next.follow_up_completed = true;
        next.updated_at = scope.now_ms();
        next.version = stories.update_story(&next)?;
        scope.record(
            actor.id,
            ContentType::Story,
            next.id,
            AuditPayload::FollowUpCompleted {
                follow_up_date: next.follow_up_date,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Story(&next));
        Ok(next)
    })
}

/// Reads one story, failing with `NotFound`.
pub fn get_story(ctx: &EngineContext<'_>, story_id: StoryId) -> EngineResult<Story> {
    load_story(&ctx.stories()?, story_id)
}

pub(crate) fn load_story(stories: &impl StoryRepository, story_id: StoryId) -> EngineResult<Story> {
    stories
        .get_story(story_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Story, story_id))
}
