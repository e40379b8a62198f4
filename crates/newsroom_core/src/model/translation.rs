//! Translation fork model.
//!
//! # Invariants
//! - At most one non-rejected translation exists per `(story, language)`.
//! - `Rejected` and `Published` are terminal for the translation record.

use crate::model::story::StoryId;
use crate::model::user::{Language, UserId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a translation fork.
pub type TranslationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationStatus {
    Pending,
    InProgress,
    NeedsReview,
    Approved,
    Rejected,
    Published,
}

impl TranslationStatus {
    pub const ALL: [TranslationStatus; 6] = [
        TranslationStatus::Pending,
        TranslationStatus::InProgress,
        TranslationStatus::NeedsReview,
        TranslationStatus::Approved,
        TranslationStatus::Rejected,
        TranslationStatus::Published,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Published => "PUBLISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// Active translations count against the per-language uniqueness rule.
    pub fn is_active(self) -> bool {
        self != Self::Rejected
    }

    /// Translator may still be swapped while work has not been submitted.
    pub fn accepts_translator_change(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// Returns whether the translation still represents open work.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Rejected | Self::Published)
    }

    /// Work/review progression edges. Publication goes through `complete`.
    pub fn can_advance_to(self, next: TranslationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::NeedsReview)
                | (Self::NeedsReview, Self::Approved)
                | (Self::NeedsReview, Self::Rejected)
                | (Self::NeedsReview, Self::InProgress)
        )
    }
}

impl Display for TranslationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-language derivative workflow of a source story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: TranslationId,
    /// `None` only after the source was deleted with explicit orphaning.
    pub original_story_id: Option<StoryId>,
    pub assigned_to_id: UserId,
    pub target_language: Language,
    pub status: TranslationStatus,
    pub translated_story_id: Option<StoryId>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Translation {
    pub fn pending(
        original_story_id: StoryId,
        target_language: Language,
        assigned_to_id: UserId,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_story_id: Some(original_story_id),
            assigned_to_id,
            target_language,
            status: TranslationStatus::Pending,
            translated_story_id: None,
            version: 1,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}
