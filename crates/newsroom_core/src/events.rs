//! Post-commit workflow notifications.
//!
//! # Responsibility
//! - Describe committed workflow changes as [`WorkflowEvent`]s.
//! - Define the [`EventSink`] contract notification adapters implement.
//!
//! # Invariants
//! - Events are published only after the mutation committed.
//! - A sink failure is reported to the caller's log, never rolled back.

use crate::model::task::ContentType;
use crate::model::user::UserId;
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    StoryCreated,
    StoryEdited,
    StoryDeleted,
    StageChanged,
    Assigned,
    TranslationForked,
    TranslationStatusChanged,
    TranslationCompleted,
    FollowUpScheduled,
    FollowUpCompleted,
    TaskStatusChanged,
    TasksReconciled,
}

impl WorkflowEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoryCreated => "story_created",
            Self::StoryEdited => "story_edited",
            Self::StoryDeleted => "story_deleted",
            Self::StageChanged => "stage_changed",
            Self::Assigned => "assigned",
            Self::TranslationForked => "translation_forked",
            Self::TranslationStatusChanged => "translation_status_changed",
            Self::TranslationCompleted => "translation_completed",
            Self::FollowUpScheduled => "follow_up_scheduled",
            Self::FollowUpCompleted => "follow_up_completed",
            Self::TaskStatusChanged => "task_status_changed",
            Self::TasksReconciled => "tasks_reconciled",
        }
    }
}

impl Display for WorkflowEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed workflow change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowEvent {
    pub kind: WorkflowEventKind,
    /// `None` for engine-wide events such as a full task reconciliation.
    pub target_type: Option<ContentType>,
    pub target_id: Option<Uuid>,
    pub actor_id: UserId,
    pub timestamp: i64,
}

impl WorkflowEvent {
    pub fn for_content(
        kind: WorkflowEventKind,
        target_type: ContentType,
        target_id: Uuid,
        actor_id: UserId,
        timestamp: i64,
    ) -> Self {
        Self {
            kind,
            target_type: Some(target_type),
            target_id: Some(target_id),
            actor_id,
            timestamp,
        }
    }
}

/// Delivery failure reported by a sink.
#[derive(Debug)]
pub struct EventSinkError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl EventSinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl Display for EventSinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "event delivery failed: {}", self.message)
    }
}

impl Error for EventSinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

/// Notification adapter contract.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &WorkflowEvent) -> Result<(), EventSinkError>;
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &WorkflowEvent) -> Result<(), EventSinkError> {
        Ok(())
    }
}

/// Writes every event to the log at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: &WorkflowEvent) -> Result<(), EventSinkError> {
        info!(
            "event=workflow_event module=events status=ok kind={} target_type={} target_id={} actor_id={} ts={}",
            event.kind,
            event
                .target_type
                .map_or("none", |target_type| target_type.as_str()),
            event
                .target_id
                .map_or_else(|| "none".to_string(), |id| id.to_string()),
            event.actor_id,
            event.timestamp
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EventSinkError, WorkflowEvent, WorkflowEventKind};
    use crate::model::task::ContentType;
    use std::error::Error;
    use uuid::Uuid;

    #[test]
    fn event_serializes_with_snake_case_kind() {
        let event = WorkflowEvent::for_content(
            WorkflowEventKind::StageChanged,
            ContentType::Story,
            Uuid::nil(),
            Uuid::nil(),
            42,
        );
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["kind"], "stage_changed");
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn sink_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket closed");
        let err = EventSinkError::with_source("webhook", io);
        assert!(err.to_string().contains("webhook"));
        assert!(err.source().is_some());
        assert!(EventSinkError::new("plain").source().is_none());
    }
}
