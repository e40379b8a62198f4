//! Command pipeline and engine facade.
//!
//! # Responsibility
//! - Route every inbound workflow command through one ordered middleware
//!   chain into the matching service call.
//! - Publish workflow events after the service's transaction committed.
//! - Expose the read-side work-queue projections next to the commands.
//!
//! # Invariants
//! - Layers run outermost first; the handler runs last.
//! - An event-sink failure is logged and never turns a committed command
//!   into an error.

use crate::config::{EngineConfig, WorkQueueSettings};
use crate::db::open_db_with_settings;
use crate::events::{EventSink, WorkflowEvent, WorkflowEventKind};
use crate::model::audit::TranslationCascade;
use crate::model::story::{NewStory, Story, StoryId, StoryStage};
use crate::model::task::{ContentType, NewTask, Task, TaskId, TaskStatus};
use crate::model::translation::{Translation, TranslationId, TranslationStatus};
use crate::model::user::UserId;
use crate::projection::{StoryQueueItem, UserQueue, Workload};
use crate::repo::error::RepoError;
use crate::service::assignment_service::{self, AssignRequest, AssignmentOutcome};
use crate::service::context::{Clock, EngineContext, SystemClock};
use crate::service::error::{EngineError, EngineResult};
use crate::service::stage_service::{self, TransitionOutcome, TransitionRequest};
use crate::service::story_service::{self, DeleteOutcome, EditStoryRequest};
use crate::service::task_service::{self, ReconcileReport};
use crate::service::translation_service::{self, CompleteOutcome, ForkRequest};
use crate::service::work_queue_service::WorkQueueService;
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Every inbound workflow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateStory {
        author_id: UserId,
        story: NewStory,
    },
    EditStory(EditStoryRequest),
    TransitionStage(TransitionRequest),
    Assign(AssignRequest),
    ForkTranslation(ForkRequest),
    AdvanceTranslation {
        translation_id: TranslationId,
        status: TranslationStatus,
        actor_id: UserId,
    },
    CompleteTranslation {
        translation_id: TranslationId,
        target_story_id: StoryId,
        actor_id: UserId,
    },
    ScheduleFollowUp {
        story_id: StoryId,
        actor_id: UserId,
        follow_up_date: i64,
    },
    CompleteFollowUp {
        story_id: StoryId,
        actor_id: UserId,
    },
    DeleteStory {
        story_id: StoryId,
        actor_id: UserId,
        cascade: TranslationCascade,
    },
    CreateTask {
        actor_id: UserId,
        task: NewTask,
    },
    UpdateTaskStatus {
        task_id: TaskId,
        status: TaskStatus,
        actor_id: UserId,
    },
    ReconcileTasks {
        actor_id: UserId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateStory { .. } => "create_story",
            Self::EditStory(_) => "edit_story",
            Self::TransitionStage(_) => "transition_stage",
            Self::Assign(_) => "assign",
            Self::ForkTranslation(_) => "fork_translation",
            Self::AdvanceTranslation { .. } => "advance_translation",
            Self::CompleteTranslation { .. } => "complete_translation",
            Self::ScheduleFollowUp { .. } => "schedule_follow_up",
            Self::CompleteFollowUp { .. } => "complete_follow_up",
            Self::DeleteStory { .. } => "delete_story",
            Self::CreateTask { .. } => "create_task",
            Self::UpdateTaskStatus { .. } => "update_task_status",
            Self::ReconcileTasks { .. } => "reconcile_tasks",
        }
    }

    pub fn actor_id(&self) -> UserId {
        match self {
            Self::CreateStory { author_id, .. } => *author_id,
            Self::EditStory(request) => request.actor_id,
            Self::TransitionStage(request) => request.actor_id,
            Self::Assign(request) => request.actor_id,
            Self::ForkTranslation(request) => request.actor_id,
            Self::AdvanceTranslation { actor_id, .. }
            | Self::CompleteTranslation { actor_id, .. }
            | Self::ScheduleFollowUp { actor_id, .. }
            | Self::CompleteFollowUp { actor_id, .. }
            | Self::DeleteStory { actor_id, .. }
            | Self::CreateTask { actor_id, .. }
            | Self::UpdateTaskStatus { actor_id, .. }
            | Self::ReconcileTasks { actor_id } => *actor_id,
        }
    }

    /// Shape checks that need no stored state.
    pub fn validate(&self) -> EngineResult<()> {
        require_id("actor_id", self.actor_id())?;
        match self {
            Self::CreateStory { story, .. } => {
                story_service::normalize_title(&story.title)?;
            }
            Self::EditStory(request) => {
                require_id("story_id", request.story_id)?;
                if request.title.is_none() && request.body.is_none() {
                    return Err(EngineError::InvalidInput(
                        "edit must change title or body".to_string(),
                    ));
                }
            }
            Self::TransitionStage(request) => require_id("story_id", request.story_id)?,
            Self::Assign(request) => {
                require_id("content_id", request.content_id)?;
                require_id("target_user_id", request.target_user_id)?;
            }
            Self::ForkTranslation(request) => {
                require_id("source_story_id", request.source_story_id)?;
                require_id("assignee_id", request.assignee_id)?;
            }
            Self::AdvanceTranslation { translation_id, .. } => {
                require_id("translation_id", *translation_id)?
            }
            Self::CompleteTranslation {
                translation_id,
                target_story_id,
                ..
            } => {
                require_id("translation_id", *translation_id)?;
                require_id("target_story_id", *target_story_id)?;
            }
            Self::ScheduleFollowUp {
                story_id,
                follow_up_date,
                ..
            } => {
                require_id("story_id", *story_id)?;
                if *follow_up_date <= 0 {
                    return Err(EngineError::InvalidInput(
                        "follow_up_date must be a positive epoch-ms timestamp".to_string(),
                    ));
                }
            }
            Self::CompleteFollowUp { story_id, .. } | Self::DeleteStory { story_id, .. } => {
                require_id("story_id", *story_id)?
            }
            Self::CreateTask { task, .. } => {
                require_id("assigned_to_id", task.assigned_to_id)?;
                if task.title.trim().is_empty() {
                    return Err(EngineError::InvalidInput(
                        "task title must not be blank".to_string(),
                    ));
                }
            }
            Self::UpdateTaskStatus { task_id, .. } => require_id("task_id", *task_id)?,
            Self::ReconcileTasks { .. } => {}
        }
        Ok(())
    }
}

fn require_id(field: &str, id: Uuid) -> EngineResult<()> {
    if id.is_nil() {
        return Err(EngineError::InvalidInput(format!("{field} must not be nil")));
    }
    Ok(())
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Story(Story),
    Transition(TransitionOutcome),
    Assignment(AssignmentOutcome),
    Translation(Translation),
    TranslationCompleted(CompleteOutcome),
    Deleted(DeleteOutcome),
    Task(Task),
    Reconciled(ReconcileReport),
}

impl Outcome {
    /// Events announcing this outcome. No-op outcomes announce nothing.
    pub fn events(&self, command: &Command, timestamp: i64) -> Vec<WorkflowEvent> {
        let actor_id = command.actor_id();
        let content = |kind, target_type, target_id| {
            vec![WorkflowEvent::for_content(
                kind,
                target_type,
                target_id,
                actor_id,
                timestamp,
            )]
        };

        match (self, command) {
            (Self::Story(story), Command::CreateStory { .. }) => {
                content(WorkflowEventKind::StoryCreated, ContentType::Story, story.id)
            }
            (Self::Story(story), Command::EditStory(_)) => {
                content(WorkflowEventKind::StoryEdited, ContentType::Story, story.id)
            }
            (Self::Story(story), Command::ScheduleFollowUp { .. }) => content(
                WorkflowEventKind::FollowUpScheduled,
                ContentType::Story,
                story.id,
            ),
            (Self::Story(story), Command::CompleteFollowUp { .. }) => content(
                WorkflowEventKind::FollowUpCompleted,
                ContentType::Story,
                story.id,
            ),
            (Self::Transition(outcome), _) => content(
                WorkflowEventKind::StageChanged,
                ContentType::Story,
                outcome.story.id,
            ),
            (
                Self::Assignment(AssignmentOutcome::Assigned {
                    content_type,
                    content_id,
                    ..
                }),
                _,
            ) => content(WorkflowEventKind::Assigned, *content_type, *content_id),
            (Self::Translation(translation), Command::ForkTranslation(_)) => content(
                WorkflowEventKind::TranslationForked,
                ContentType::Translation,
                translation.id,
            ),
            (Self::Translation(translation), Command::AdvanceTranslation { .. }) => content(
                WorkflowEventKind::TranslationStatusChanged,
                ContentType::Translation,
                translation.id,
            ),
            (Self::TranslationCompleted(outcome), _) if !outcome.already_published => content(
                WorkflowEventKind::TranslationCompleted,
                ContentType::Translation,
                outcome.translation.id,
            ),
            (Self::Deleted(outcome), _) => content(
                WorkflowEventKind::StoryDeleted,
                ContentType::Story,
                outcome.story_id,
            ),
            (Self::Task(task), Command::UpdateTaskStatus { .. }) => content(
                WorkflowEventKind::TaskStatusChanged,
                ContentType::Task,
                task.id,
            ),
            (Self::Reconciled(report), _) if !report.is_clean() => vec![WorkflowEvent {
                kind: WorkflowEventKind::TasksReconciled,
                target_type: None,
                target_id: None,
                actor_id,
                timestamp,
            }],
            _ => Vec::new(),
        }
    }
}

type Handler = fn(&EngineContext<'_>, &Command) -> EngineResult<Outcome>;

/// One cross-cutting step around command handling.
pub trait Middleware: Send + Sync {
    fn handle(
        &self,
        ctx: &EngineContext<'_>,
        command: &Command,
        next: Next<'_>,
    ) -> EngineResult<Outcome>;
}

/// Remainder of the chain after the current layer.
pub struct Next<'a> {
    layers: &'a [Box<dyn Middleware>],
    handler: Handler,
}

impl<'a> Next<'a> {
    pub fn run(self, ctx: &EngineContext<'_>, command: &Command) -> EngineResult<Outcome> {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.handle(
                ctx,
                command,
                Next {
                    layers: rest,
                    handler: self.handler,
                },
            ),
            None => (self.handler)(ctx, command),
        }
    }
}

/// Logs one `event=workflow_command` line per command.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLayer;

impl Middleware for LoggingLayer {
    fn handle(
        &self,
        ctx: &EngineContext<'_>,
        command: &Command,
        next: Next<'_>,
    ) -> EngineResult<Outcome> {
        let started = Instant::now();
        let result = next.run(ctx, command);
        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok(_) => info!(
                "event=workflow_command module=pipeline status=ok command={} actor_id={} elapsed_ms={}",
                command.name(),
                command.actor_id(),
                elapsed_ms
            ),
            Err(err) if err.is_retryable() => warn!(
                "event=workflow_command module=pipeline status=error command={} actor_id={} error_code={} elapsed_ms={} error={}",
                command.name(),
                command.actor_id(),
                err.code(),
                elapsed_ms,
                err
            ),
            Err(err) => info!(
                "event=workflow_command module=pipeline status=rejected command={} actor_id={} error_code={} elapsed_ms={}",
                command.name(),
                command.actor_id(),
                err.code(),
                elapsed_ms
            ),
        }
        result
    }
}

/// Rejects malformed commands before any transaction opens.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationLayer;

impl Middleware for ValidationLayer {
    fn handle(
        &self,
        ctx: &EngineContext<'_>,
        command: &Command,
        next: Next<'_>,
    ) -> EngineResult<Outcome> {
        command.validate()?;
        next.run(ctx, command)
    }
}

/// Publishes events for committed commands.
pub struct EventLayer {
    sink: Arc<dyn EventSink>,
}

impl EventLayer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

impl Middleware for EventLayer {
    fn handle(
        &self,
        ctx: &EngineContext<'_>,
        command: &Command,
        next: Next<'_>,
    ) -> EngineResult<Outcome> {
        let outcome = next.run(ctx, command)?;
        for event in outcome.events(command, ctx.now_ms()) {
            if let Err(err) = self.sink.publish(&event) {
                warn!(
                    "event=event_publish module=pipeline status=error command={} kind={} error={}",
                    command.name(),
                    event.kind,
                    err
                );
            }
        }
        Ok(outcome)
    }
}

fn dispatch(ctx: &EngineContext<'_>, command: &Command) -> EngineResult<Outcome> {
    match command {
        Command::CreateStory { author_id, story } => {
            story_service::create_story(ctx, *author_id, story.clone()).map(Outcome::Story)
        }
        Command::EditStory(request) => {
            story_service::edit_story(ctx, request.clone()).map(Outcome::Story)
        }
        Command::TransitionStage(request) => {
            stage_service::transition_stage(ctx, request).map(Outcome::Transition)
        }
        Command::Assign(request) => {
            assignment_service::assign(ctx, request).map(Outcome::Assignment)
        }
        Command::ForkTranslation(request) => {
            translation_service::fork(ctx, request).map(Outcome::Translation)
        }
        Command::AdvanceTranslation {
            translation_id,
            status,
            actor_id,
        } => translation_service::advance(ctx, *translation_id, *status, *actor_id)
            .map(Outcome::Translation),
        Command::CompleteTranslation {
            translation_id,
            target_story_id,
            actor_id,
        } => translation_service::complete(ctx, *translation_id, *target_story_id, *actor_id)
            .map(Outcome::TranslationCompleted),
        Command::ScheduleFollowUp {
            story_id,
            actor_id,
            follow_up_date,
        } => story_service::schedule_follow_up(ctx, *story_id, *actor_id, *follow_up_date)
            .map(Outcome::Story),
        Command::CompleteFollowUp { story_id, actor_id } => {
            story_service::complete_follow_up(ctx, *story_id, *actor_id).map(Outcome::Story)
        }
        Command::DeleteStory {
            story_id,
            actor_id,
            cascade,
        } => story_service::delete_story(ctx, *story_id, *actor_id, *cascade).map(Outcome::Deleted),
        Command::CreateTask { actor_id, task } => {
            task_service::create_task(ctx, *actor_id, task.clone()).map(Outcome::Task)
        }
        Command::UpdateTaskStatus {
            task_id,
            status,
            actor_id,
        } => task_service::update_task_status(ctx, *task_id, *status, *actor_id).map(Outcome::Task),
        Command::ReconcileTasks { actor_id } => {
            task_service::reconcile_all(ctx, *actor_id).map(Outcome::Reconciled)
        }
    }
}

/// Owns the connection, clock and middleware chain.
pub struct Engine {
    conn: Connection,
    clock: Arc<dyn Clock>,
    layers: Vec<Box<dyn Middleware>>,
    work_queue: WorkQueueService,
}

impl Engine {
    /// Engine with the default chain: logging, validation, events.
    pub fn new(
        conn: Connection,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        settings: WorkQueueSettings,
    ) -> Self {
        Self {
            conn,
            clock,
            layers: vec![
                Box::new(LoggingLayer),
                Box::new(ValidationLayer),
                Box::new(EventLayer::new(sink)),
            ],
            work_queue: WorkQueueService::new(settings),
        }
    }

    /// Opens (and migrates) the configured database with the wall clock.
    pub fn from_config(config: &EngineConfig, sink: Arc<dyn EventSink>) -> EngineResult<Self> {
        let conn = open_db_with_settings(&config.database).map_err(RepoError::from)?;
        info!(
            "event=engine_open module=pipeline status=ok in_memory={}",
            config.database.path.is_none()
        );
        Ok(Self::new(
            conn,
            Arc::new(SystemClock),
            sink,
            config.work_queue,
        ))
    }

    /// Appends a layer inside the existing ones, closest to the handler.
    pub fn with_layer(mut self, layer: Box<dyn Middleware>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn context(&self) -> EngineContext<'_> {
        EngineContext::new(&self.conn, self.clock.as_ref())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute(&self, command: Command) -> EngineResult<Outcome> {
        let ctx = self.context();
        Next {
            layers: &self.layers,
            handler: dispatch,
        }
        .run(&ctx, &command)
    }

    pub fn user_queue(&self, user_id: UserId) -> EngineResult<UserQueue> {
        self.work_queue.user_queue(&self.context(), user_id)
    }

    pub fn stage_queues(&self) -> EngineResult<BTreeMap<StoryStage, Vec<StoryQueueItem>>> {
        self.work_queue.stage_queues(&self.context())
    }

    pub fn workloads(&self) -> EngineResult<Vec<Workload>> {
        self.work_queue.workloads(&self.context())
    }
}
