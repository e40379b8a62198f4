//! Derived work item model.
//!
//! Tasks are bookkeeping layered on top of story/translation state. They may
//! drift and are repaired by the reconciler; nothing reads stage from them.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    StoryReview,
    StoryApproval,
    StoryTranslate,
    BulletinCreate,
    StoryFollowUp,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoryReview => "STORY_REVIEW",
            Self::StoryApproval => "STORY_APPROVAL",
            Self::StoryTranslate => "STORY_TRANSLATE",
            Self::BulletinCreate => "BULLETIN_CREATE",
            Self::StoryFollowUp => "STORY_FOLLOW_UP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STORY_REVIEW" => Some(Self::StoryReview),
            "STORY_APPROVAL" => Some(Self::StoryApproval),
            "STORY_TRANSLATE" => Some(Self::StoryTranslate),
            "BULLETIN_CREATE" => Some(Self::BulletinCreate),
            "STORY_FOLLOW_UP" => Some(Self::StoryFollowUp),
            _ => None,
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "URGENT" => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        self != Self::Done
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content item a task or audit record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Story,
    Translation,
    Task,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Story => "STORY",
            Self::Translation => "TRANSLATION",
            Self::Task => "TASK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STORY" => Some(Self::Story),
            "TRANSLATION" => Some(Self::Translation),
            "TASK" => Some(Self::Task),
            _ => None,
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of derived work attached to a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub title: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to_id: UserId,
    pub created_by_id: UserId,
    pub content_type: Option<ContentType>,
    pub content_id: Option<Uuid>,
    pub due_date: Option<i64>,
    pub scheduled_for: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

/// Creation payload for manual and reconciler-created tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub task_type: TaskType,
    pub title: String,
    pub priority: TaskPriority,
    pub assigned_to_id: UserId,
    pub content_type: Option<ContentType>,
    pub content_id: Option<Uuid>,
    pub due_date: Option<i64>,
    pub scheduled_for: Option<i64>,
}

impl Task {
    pub fn from_new(new: NewTask, created_by_id: UserId, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: new.task_type,
            title: new.title,
            priority: new.priority,
            status: TaskStatus::Pending,
            assigned_to_id: new.assigned_to_id,
            created_by_id,
            content_type: new.content_type,
            content_id: new.content_id,
            due_date: new.due_date,
            scheduled_for: new.scheduled_for,
            created_at: now_ms,
            updated_at: now_ms,
            completed_at: None,
        }
    }

    /// Timestamp used for urgency bucketing: due date wins over schedule.
    pub fn effective_due(&self) -> Option<i64> {
        self.due_date.or(self.scheduled_for)
    }
}
