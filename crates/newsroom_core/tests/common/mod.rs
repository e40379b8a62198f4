#![allow(dead_code)]

use newsroom_core::db::open_db_in_memory;
use newsroom_core::events::{EventSink, EventSinkError, WorkflowEvent};
use newsroom_core::model::audit::AuditLogEntry;
use newsroom_core::model::story::{NewStory, Story, StoryStage};
use newsroom_core::model::task::ContentType;
use newsroom_core::model::user::{Language, StaffRole, User, UserId};
use newsroom_core::repo::audit_repo::{AuditRepository, SqliteAuditRepository};
use newsroom_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use newsroom_core::service::context::{EngineContext, FixedClock};
use newsroom_core::service::stage_service::{transition_stage, TransitionRequest};
use newsroom_core::service::story_service::create_story;
use rusqlite::Connection;
use std::sync::Mutex;
use uuid::Uuid;

// 2026-03-10T10:00:00Z
pub const NOW: i64 = 1_773_136_800_000;
pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 86_400_000;

/// In-memory newsroom with one user per role that the workflow needs.
pub struct Newsroom {
    pub conn: Connection,
    pub clock: FixedClock,
    pub intern: User,
    pub journalist: User,
    pub reviewer: User,
    pub reviewer2: User,
    pub sub_editor: User,
    pub sub_editor2: User,
    pub editor: User,
    pub translator_af: User,
    pub subscriber: User,
}

impl Newsroom {
    pub fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let newsroom = Self {
            conn,
            clock: FixedClock::new(NOW),
            intern: User::staff("Ivy Intern", StaffRole::Intern),
            journalist: User::staff("Jo Journalist", StaffRole::Journalist),
            reviewer: User::staff("Rae Reviewer", StaffRole::Journalist),
            reviewer2: User::staff("Rio Reviewer", StaffRole::Journalist),
            sub_editor: User::staff("Sam Sub", StaffRole::SubEditor),
            sub_editor2: User::staff("Sid Sub", StaffRole::SubEditor),
            editor: User::staff("Eve Editor", StaffRole::Editor),
            translator_af: User::staff("Tau Translator", StaffRole::Journalist)
                .with_translation_language(Language::Afrikaans),
            subscriber: User::subscriber("Radio Kaya"),
        };
        {
            let users = SqliteUserRepository::try_new(&newsroom.conn).unwrap();
            for user in [
                &newsroom.intern,
                &newsroom.journalist,
                &newsroom.reviewer,
                &newsroom.reviewer2,
                &newsroom.sub_editor,
                &newsroom.sub_editor2,
                &newsroom.editor,
                &newsroom.translator_af,
                &newsroom.subscriber,
            ] {
                users.upsert_user(user).unwrap();
            }
        }
        newsroom
    }

    pub fn ctx(&self) -> EngineContext<'_> {
        EngineContext::new(&self.conn, &self.clock)
    }

    pub fn add_user(&self, user: &User) {
        SqliteUserRepository::try_new(&self.conn)
            .unwrap()
            .upsert_user(user)
            .unwrap();
    }

    /// Draft authored by the journalist.
    pub fn draft(&self, title: &str) -> Story {
        create_story(
            &self.ctx(),
            self.journalist.id,
            NewStory::new(title, "Council **approves** the budget.", Language::English),
        )
        .unwrap()
    }

    /// Story sitting in NEEDS_JOURNALIST_REVIEW with `reviewer` assigned.
    pub fn in_review(&self, title: &str) -> Story {
        let draft = self.draft(title);
        self.move_to(
            &draft,
            StoryStage::NeedsJournalistReview,
            self.journalist.id,
            Some(self.reviewer.id),
        )
    }

    /// Story sitting in NEEDS_SUB_EDITOR_APPROVAL with `sub_editor` assigned.
    pub fn in_approval(&self, title: &str) -> Story {
        let story = self.in_review(title);
        self.move_to(
            &story,
            StoryStage::NeedsSubEditorApproval,
            self.reviewer.id,
            Some(self.sub_editor.id),
        )
    }

    pub fn approved(&self, title: &str) -> Story {
        let story = self.in_approval(title);
        self.move_to(&story, StoryStage::Approved, self.sub_editor.id, None)
    }

    pub fn move_to(
        &self,
        story: &Story,
        target: StoryStage,
        actor: UserId,
        assignee: Option<UserId>,
    ) -> Story {
        let mut request = TransitionRequest::new(story.id, target, actor);
        if let Some(assignee) = assignee {
            request = request.with_assignee(assignee);
        }
        transition_stage(&self.ctx(), &request).unwrap().story
    }

    pub fn audit_for(&self, target_type: ContentType, target_id: Uuid) -> Vec<AuditLogEntry> {
        SqliteAuditRepository::try_new(&self.conn)
            .unwrap()
            .list_for_target(target_type, target_id)
            .unwrap()
    }

    pub fn audit_rows(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log;", [], |row| row.get(0))
            .unwrap()
    }
}

/// Sink that keeps every published event.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &WorkflowEvent) -> Result<(), EventSinkError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Sink whose transport is always down.
#[derive(Default)]
pub struct FailingEventSink;

impl EventSink for FailingEventSink {
    fn publish(&self, _event: &WorkflowEvent) -> Result<(), EventSinkError> {
        Err(EventSinkError::new("notification service unreachable"))
    }
}
