//! Story domain model.
//!
//! # Responsibility
//! - Define the canonical editorial content record and its stages.
//! - Validate slot/stage coupling before any persistence.
//!
//! # Invariants
//! - `assigned_reviewer_id` is set iff `stage == NeedsJournalistReview`.
//! - `assigned_approver_id` is set iff `stage == NeedsSubEditorApproval`.
//! - `version` increases by one on every persisted write.

use crate::model::user::{Language, UserId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a story.
pub type StoryId = Uuid;

/// Authoritative editorial state of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryStage {
    Draft,
    NeedsJournalistReview,
    NeedsSubEditorApproval,
    Approved,
    ReadyToPublish,
    Published,
    NeedsRevision,
    Archived,
}

impl StoryStage {
    pub const ALL: [StoryStage; 8] = [
        StoryStage::Draft,
        StoryStage::NeedsJournalistReview,
        StoryStage::NeedsSubEditorApproval,
        StoryStage::Approved,
        StoryStage::ReadyToPublish,
        StoryStage::Published,
        StoryStage::NeedsRevision,
        StoryStage::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::NeedsJournalistReview => "NEEDS_JOURNALIST_REVIEW",
            Self::NeedsSubEditorApproval => "NEEDS_SUB_EDITOR_APPROVAL",
            Self::Approved => "APPROVED",
            Self::ReadyToPublish => "READY_TO_PUBLISH",
            Self::Published => "PUBLISHED",
            Self::NeedsRevision => "NEEDS_REVISION",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == value)
    }

    /// Returns whether the author still owns the text in this stage.
    pub fn is_authoring(self) -> bool {
        matches!(self, Self::Draft | Self::NeedsRevision)
    }

    /// Returns whether translations may be forked from a story in this stage.
    pub fn allows_translation_fork(self) -> bool {
        matches!(self, Self::Approved | Self::ReadyToPublish | Self::Published)
    }
}

impl Display for StoryStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical editorial content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    /// Markdown body.
    pub body: String,
    pub stage: StoryStage,
    pub author_id: UserId,
    pub assigned_reviewer_id: Option<UserId>,
    pub assigned_approver_id: Option<UserId>,
    pub category_id: Option<Uuid>,
    pub language: Language,
    /// Epoch ms reminder for post-publication tracking.
    pub follow_up_date: Option<i64>,
    pub follow_up_completed: bool,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub published_at: Option<i64>,
}

/// Creation payload for `create_story`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStory {
    pub title: String,
    pub body: String,
    pub language: Language,
    pub category_id: Option<Uuid>,
}

impl NewStory {
    pub fn new(title: impl Into<String>, body: impl Into<String>, language: Language) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            language,
            category_id: None,
        }
    }
}

/// Story validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryValidationError {
    BlankTitle,
    ReviewerOutsideReviewStage(StoryStage),
    ApproverOutsideApprovalStage(StoryStage),
    MissingReviewer,
    MissingApprover,
    PublishedWithoutTimestamp,
}

impl Display for StoryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "story title must not be blank"),
            Self::ReviewerOutsideReviewStage(stage) => {
                write!(f, "reviewer may only be assigned during review, stage is {stage}")
            }
            Self::ApproverOutsideApprovalStage(stage) => {
                write!(f, "approver may only be assigned during approval, stage is {stage}")
            }
            Self::MissingReviewer => write!(f, "story under review must have a reviewer"),
            Self::MissingApprover => write!(f, "story awaiting approval must have an approver"),
            Self::PublishedWithoutTimestamp => {
                write!(f, "published story must carry published_at")
            }
        }
    }
}

impl Error for StoryValidationError {}

impl Story {
    /// Creates a draft story owned by `author_id`.
    pub fn draft(author_id: UserId, payload: NewStory, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: payload.title,
            body: payload.body,
            stage: StoryStage::Draft,
            author_id,
            assigned_reviewer_id: None,
            assigned_approver_id: None,
            category_id: payload.category_id,
            language: payload.language,
            follow_up_date: None,
            follow_up_completed: false,
            version: 1,
            created_at: now_ms,
            updated_at: now_ms,
            published_at: None,
        }
    }

    /// Checks slot/stage coupling and field-level rules.
    pub fn validate(&self) -> Result<(), StoryValidationError> {
        if self.title.trim().is_empty() {
            return Err(StoryValidationError::BlankTitle);
        }

        match (self.stage, self.assigned_reviewer_id) {
            (StoryStage::NeedsJournalistReview, None) => {
                return Err(StoryValidationError::MissingReviewer)
            }
            (stage, Some(_)) if stage != StoryStage::NeedsJournalistReview => {
                return Err(StoryValidationError::ReviewerOutsideReviewStage(stage))
            }
            _ => {}
        }

        match (self.stage, self.assigned_approver_id) {
            (StoryStage::NeedsSubEditorApproval, None) => {
                return Err(StoryValidationError::MissingApprover)
            }
            (stage, Some(_)) if stage != StoryStage::NeedsSubEditorApproval => {
                return Err(StoryValidationError::ApproverOutsideApprovalStage(stage))
            }
            _ => {}
        }

        if self.stage == StoryStage::Published && self.published_at.is_none() {
            return Err(StoryValidationError::PublishedWithoutTimestamp);
        }

        Ok(())
    }

    /// Returns whether `user_id` currently holds a slot on this story.
    pub fn is_assigned_to(&self, user_id: UserId) -> bool {
        self.assigned_reviewer_id == Some(user_id) || self.assigned_approver_id == Some(user_id)
    }

    /// Returns whether the follow-up reminder is set and still open.
    pub fn has_open_follow_up(&self) -> bool {
        self.follow_up_date.is_some() && !self.follow_up_completed
    }
}
