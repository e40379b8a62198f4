//! Append-only audit record model.
//!
//! # Responsibility
//! - Describe one applied mutation with enough data to rebuild before/after
//!   values of the mutated fields.
//!
//! # Invariants
//! - `action` is derived from the payload variant, never stored separately
//!   from it in memory.
//! - Entries are immutable once appended.

use crate::model::story::{StoryId, StoryStage};
use crate::model::task::{ContentType, TaskStatus, TaskType};
use crate::model::translation::TranslationStatus;
use crate::model::user::{Language, UserId};
use crate::model::workflow::{AssignmentSlot, StageAction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What to do with translations when their source story is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationCascade {
    /// Fail with a conflict when any translation references the story.
    Refuse,
    /// Keep translations but clear their source reference.
    OrphanTranslations,
    /// Delete the translations together with the story.
    DeleteTranslations,
}

/// Typed audit payload, one variant per mutating action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditPayload {
    StoryCreated {
        title: String,
        language: Language,
    },
    StageChanged {
        action: StageAction,
        from: StoryStage,
        to: StoryStage,
        reviewer_before: Option<UserId>,
        reviewer_after: Option<UserId>,
        approver_before: Option<UserId>,
        approver_after: Option<UserId>,
    },
    Assigned {
        slot: AssignmentSlot,
        previous: Option<UserId>,
        new: UserId,
    },
    ContentEdited {
        title_before: String,
        title_after: String,
        body_changed: bool,
    },
    StoryDeleted {
        stage: StoryStage,
        cascade: TranslationCascade,
        affected_translations: Vec<Uuid>,
    },
    TranslationForked {
        source_story_id: StoryId,
        language: Language,
        assignee: UserId,
    },
    TranslationStatusChanged {
        from: TranslationStatus,
        to: TranslationStatus,
    },
    TranslationCompleted {
        from: TranslationStatus,
        translated_story_id: StoryId,
    },
    FollowUpScheduled {
        previous: Option<i64>,
        new: i64,
    },
    FollowUpCompleted {
        follow_up_date: Option<i64>,
    },
    TaskCreated {
        task_type: TaskType,
        assignee: UserId,
    },
    TaskStatusChanged {
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl AuditPayload {
    /// Stable action name stored in the `action` column.
    pub fn action(&self) -> &'static str {
        match self {
            Self::StoryCreated { .. } => "story.create",
            Self::StageChanged { .. } => "story.transition",
            Self::Assigned { .. } => "content.assign",
            Self::ContentEdited { .. } => "story.edit",
            Self::StoryDeleted { .. } => "story.delete",
            Self::TranslationForked { .. } => "translation.fork",
            Self::TranslationStatusChanged { .. } => "translation.status",
            Self::TranslationCompleted { .. } => "translation.complete",
            Self::FollowUpScheduled { .. } => "story.follow_up.schedule",
            Self::FollowUpCompleted { .. } => "story.follow_up.complete",
            Self::TaskCreated { .. } => "task.create",
            Self::TaskStatusChanged { .. } => "task.status",
        }
    }
}

/// Audit record about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub user_id: UserId,
    pub target_type: ContentType,
    pub target_id: Uuid,
    pub payload: AuditPayload,
    pub timestamp: i64,
}

/// Persisted audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Monotonic sequence assigned by the store.
    pub id: i64,
    pub user_id: UserId,
    pub action: String,
    pub target_type: ContentType,
    pub target_id: Uuid,
    pub payload: AuditPayload,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::AuditPayload;
    use crate::model::workflow::AssignmentSlot;
    use uuid::Uuid;

    #[test]
    fn payload_serializes_with_kind_tag() {
        let new = Uuid::new_v4();
        let payload = AuditPayload::Assigned {
            slot: AssignmentSlot::Reviewer,
            previous: None,
            new,
        };
        let json = serde_json::to_value(&payload).expect("payload should serialize");
        assert_eq!(json["kind"], "assigned");
        assert_eq!(json["slot"], "reviewer");
        let back: AuditPayload = serde_json::from_value(json).expect("payload should parse");
        assert_eq!(back, payload);
        assert_eq!(back.action(), "content.assign");
    }
}
