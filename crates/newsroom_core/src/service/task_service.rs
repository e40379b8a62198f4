//! Task bookkeeping: manual task operations and the reconciler.
//!
//! # Responsibility
//! - Create tasks and move them through `PENDING -> IN_PROGRESS -> DONE`.
//! - Derive the open tasks implied by story/translation state and repair
//!   drift between that and the `tasks` table.
//!
//! # Invariants
//! - Only reconciler-managed task types are ever created, reassigned or
//!   closed automatically; `BULLETIN_CREATE` is manual only.
//! - Per-mutation reconciliation runs under a savepoint and never fails the
//!   surrounding mutation.
//! - Reconciling twice in a row changes nothing the second time.

use crate::model::audit::AuditPayload;
use crate::model::story::{Story, StoryStage};
use crate::model::task::{ContentType, NewTask, Task, TaskId, TaskPriority, TaskStatus, TaskType};
use crate::model::translation::Translation;
use crate::model::user::UserId;
use crate::policy::{ActorRelation, PolicyAction};
use crate::repo::error::EntityKind;
use crate::repo::story_repo::{StoryListQuery, StoryRepository};
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::translation_repo::{TranslationListQuery, TranslationRepository};
use crate::repo::user_repo::UserRepository;
use crate::service::context::{EngineContext, WriteScope};
use crate::service::error::{EngineError, EngineResult};
use crate::service::{ensure_permitted, load_actor};
use log::{debug, info, warn};
use std::collections::HashSet;
use uuid::Uuid;

const MANAGED_TASK_TYPES: [TaskType; 4] = [
    TaskType::StoryReview,
    TaskType::StoryApproval,
    TaskType::StoryTranslate,
    TaskType::StoryFollowUp,
];

const RECONCILE_SAVEPOINT: &str = "task_reconcile";

/// Counts of repairs applied by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub reassigned: usize,
    pub rescheduled: usize,
    pub closed: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    fn absorb(&mut self, other: ReconcileReport) {
        self.created += other.created;
        self.reassigned += other.reassigned;
        self.rescheduled += other.rescheduled;
        self.closed += other.closed;
    }
}

/// Open task implied by authoritative state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredTask {
    pub task_type: TaskType,
    pub assignee: UserId,
    pub title: String,
    pub priority: TaskPriority,
    pub due_date: Option<i64>,
}

/// Content whose tasks should be brought in line.
pub(crate) enum ReconcileTarget<'a> {
    Story(&'a Story),
    Translation(&'a Translation),
    /// Content that no longer exists; all its managed tasks close.
    Removed(ContentType, Uuid),
}

/// Tasks a story implies in its current state.
pub fn desired_story_tasks(story: &Story) -> Vec<DesiredTask> {
    let mut desired = Vec::new();
    match (story.stage, story.assigned_reviewer_id, story.assigned_approver_id) {
        (StoryStage::NeedsJournalistReview, Some(reviewer), _) => desired.push(DesiredTask {
            task_type: TaskType::StoryReview,
            assignee: reviewer,
            title: format!("Review \"{}\"", story.title),
            priority: TaskPriority::High,
            due_date: None,
        }),
        (StoryStage::NeedsSubEditorApproval, _, Some(approver)) => desired.push(DesiredTask {
            task_type: TaskType::StoryApproval,
            assignee: approver,
            title: format!("Approve \"{}\"", story.title),
            priority: TaskPriority::High,
            due_date: None,
        }),
        _ => {}
    }
    if story.has_open_follow_up() && story.stage != StoryStage::Archived {
        desired.push(DesiredTask {
            task_type: TaskType::StoryFollowUp,
            assignee: story.author_id,
            title: format!("Follow up \"{}\"", story.title),
            priority: TaskPriority::Medium,
            due_date: story.follow_up_date,
        });
    }
    desired
}

/// Tasks a translation implies in its current state.
pub fn desired_translation_tasks(translation: &Translation) -> Vec<DesiredTask> {
    if !translation.status.is_open() {
        return Vec::new();
    }
    vec![DesiredTask {
        task_type: TaskType::StoryTranslate,
        assignee: translation.assigned_to_id,
        title: format!("Translate into {}", translation.target_language),
        priority: TaskPriority::Medium,
        due_date: None,
    }]
}

/// Reconciles one content item inside the caller's transaction.
///
/// Failures are logged at `warn` and rolled back to a savepoint, leaving the
/// caller's mutation intact.
pub(crate) fn reconcile_best_effort(
    scope: &WriteScope<'_>,
    actor_id: UserId,
    target: ReconcileTarget<'_>,
) {
    let conn = scope.conn();
    if let Err(err) = conn.execute_batch(&format!("SAVEPOINT {RECONCILE_SAVEPOINT};")) {
        warn!(
            "event=task_reconcile module=task_service status=error error_code=savepoint_failed error={}",
            err
        );
        return;
    }

    match reconcile_target(scope, actor_id, &target) {
        Ok(report) => {
            if let Err(err) = conn.execute_batch(&format!("RELEASE {RECONCILE_SAVEPOINT};")) {
                warn!(
                    "event=task_reconcile module=task_service status=error error_code=release_failed error={}",
                    err
                );
                return;
            }
            if !report.is_clean() {
                debug!(
                    "event=task_reconcile module=task_service status=ok created={} reassigned={} rescheduled={} closed={}",
                    report.created, report.reassigned, report.rescheduled, report.closed
                );
            }
        }
        Err(err) => {
            let rollback = conn.execute_batch(&format!(
                "ROLLBACK TO {RECONCILE_SAVEPOINT}; RELEASE {RECONCILE_SAVEPOINT};"
            ));
            warn!(
                "event=task_reconcile module=task_service status=error error_code={} rolled_back={} error={}",
                err.code(),
                rollback.is_ok(),
                err
            );
        }
    }
}

fn reconcile_target(
    scope: &WriteScope<'_>,
    actor_id: UserId,
    target: &ReconcileTarget<'_>,
) -> EngineResult<ReconcileReport> {
    match target {
        ReconcileTarget::Story(story) => reconcile_content(
            scope,
            actor_id,
            ContentType::Story,
            story.id,
            desired_story_tasks(story),
        ),
        ReconcileTarget::Translation(translation) => reconcile_content(
            scope,
            actor_id,
            ContentType::Translation,
            translation.id,
            desired_translation_tasks(translation),
        ),
        ReconcileTarget::Removed(content_type, id) => {
            reconcile_content(scope, actor_id, *content_type, *id, Vec::new())
        }
    }
}

fn is_managed(task: &Task) -> bool {
    MANAGED_TASK_TYPES.contains(&task.task_type)
}

fn reconcile_content(
    scope: &WriteScope<'_>,
    actor_id: UserId,
    content_type: ContentType,
    content_id: Uuid,
    desired: Vec<DesiredTask>,
) -> EngineResult<ReconcileReport> {
    let tasks = scope.tasks()?;
    let now = scope.now_ms();
    let mut open: Vec<Task> = tasks
        .list_tasks(&TaskListQuery {
            content_id: Some(content_id),
            open_only: true,
            ..TaskListQuery::default()
        })?
        .into_iter()
        .filter(|task| is_managed(task) && task.content_type == Some(content_type))
        .collect();

    let mut report = ReconcileReport::default();
    for want in desired {
        match open.iter().position(|task| task.task_type == want.task_type) {
            Some(index) => {
                let mut task = open.remove(index);
                let mut changed = false;
                if task.assigned_to_id != want.assignee {
                    task.assigned_to_id = want.assignee;
                    report.reassigned += 1;
                    changed = true;
                }
                if task.due_date != want.due_date {
                    task.due_date = want.due_date;
                    report.rescheduled += 1;
                    changed = true;
                }
                if task.title != want.title {
                    task.title = want.title;
                    changed = true;
                }
                if changed {
                    task.updated_at = now;
                    tasks.update_task(&task)?;
                }
            }
            None => {
                let task = Task::from_new(
                    NewTask {
                        task_type: want.task_type,
                        title: want.title,
                        priority: want.priority,
                        assigned_to_id: want.assignee,
                        content_type: Some(content_type),
                        content_id: Some(content_id),
                        due_date: want.due_date,
                        scheduled_for: None,
                    },
                    actor_id,
                    now,
                );
                tasks.create_task(&task)?;
                report.created += 1;
            }
        }
    }

    // Leftovers are stale or duplicates.
    for mut task in open {
        close_task(&mut task, now);
        tasks.update_task(&task)?;
        report.closed += 1;
    }
    Ok(report)
}

fn close_task(task: &mut Task, now: i64) {
    task.status = TaskStatus::Done;
    task.completed_at = Some(now);
    task.updated_at = now;
}

/// Rebuilds task bookkeeping for every story and translation.
///
/// Requires an actor with unconditional `ManageTasks`. Errors propagate: this
/// is the explicit repair path.
pub fn reconcile_all(ctx: &EngineContext<'_>, actor_id: UserId) -> EngineResult<ReconcileReport> {
    let report = ctx.write("reconcile_all", |scope| {
        let actor = load_actor(&scope.users()?, actor_id, PolicyAction::ManageTasks)?;
        ensure_permitted(
            &actor,
            PolicyAction::ManageTasks,
            None,
            ActorRelation::default(),
        )?;

        let stories = scope.stories()?.list_stories(&StoryListQuery::default())?;
        let translations = scope
            .translations()?
            .list_translations(&TranslationListQuery::default())?;

        let mut report = ReconcileReport::default();
        let mut known: HashSet<Uuid> = HashSet::new();
        for story in &stories {
            known.insert(story.id);
            report.absorb(reconcile_target(
                scope,
                actor.id,
                &ReconcileTarget::Story(story),
            )?);
        }
        for translation in &translations {
            known.insert(translation.id);
            report.absorb(reconcile_target(
                scope,
                actor.id,
                &ReconcileTarget::Translation(translation),
            )?);
        }

        let tasks = scope.tasks()?;
        let orphaned = tasks
            .list_tasks(&TaskListQuery {
                open_only: true,
                ..TaskListQuery::default()
            })?
            .into_iter()
            .filter(|task| is_managed(task))
            .filter(|task| task.content_id.map_or(true, |id| !known.contains(&id)));
        for mut task in orphaned {
            close_task(&mut task, scope.now_ms());
            tasks.update_task(&task)?;
            report.closed += 1;
        }
        Ok(report)
    })?;

    info!(
        "event=task_reconcile module=task_service status=ok scope=all created={} reassigned={} rescheduled={} closed={}",
        report.created, report.reassigned, report.rescheduled, report.closed
    );
    Ok(report)
}

/// Creates a manual task.
///
/// Staff below SUB_EDITOR may only create tasks assigned to themselves.
pub fn create_task(ctx: &EngineContext<'_>, actor_id: UserId, new: NewTask) -> EngineResult<Task> {
    let title = new.title.trim().to_string();
    if title.is_empty() {
        return Err(EngineError::InvalidInput(
            "task title must not be blank".to_string(),
        ));
    }
    if new.content_id.is_some() != new.content_type.is_some() {
        return Err(EngineError::InvalidInput(
            "content_type and content_id must be set together".to_string(),
        ));
    }
    for (field, value) in [("due_date", new.due_date), ("scheduled_for", new.scheduled_for)] {
        if matches!(value, Some(ms) if ms <= 0) {
            return Err(EngineError::InvalidInput(format!(
                "task {field} must be a positive epoch millisecond value"
            )));
        }
    }

    ctx.write("create_task", |scope| {
        let users = scope.users()?;
        let actor = load_actor(&users, actor_id, PolicyAction::ManageTasks)?;
        let assignee = users
            .get_user(new.assigned_to_id)?
            .ok_or_else(|| EngineError::not_found(EntityKind::User, new.assigned_to_id))?;
        if assignee.active_staff_role().is_none() {
            return Err(EngineError::InvalidAssignee(format!(
                "user {} is not active staff",
                assignee.id
            )));
        }
        if let (Some(content_type), Some(content_id)) = (new.content_type, new.content_id) {
            ensure_content_exists(scope, content_type, content_id)?;
        }
        ensure_permitted(
            &actor,
            PolicyAction::ManageTasks,
            None,
            ActorRelation {
                is_author: false,
                is_assignee: new.assigned_to_id == actor.id,
            },
        )?;

        let task = Task::from_new(NewTask { title, ..new }, actor.id, scope.now_ms());
        scope.tasks()?.create_task(&task)?;
        scope.record(
            actor.id,
            ContentType::Task,
            task.id,
            AuditPayload::TaskCreated {
                task_type: task.task_type,
                assignee: task.assigned_to_id,
            },
        )?;
        Ok(task)
    })
}

/// Moves a task to `status`. Setting the current status is a no-op.
pub fn update_task_status(
    ctx: &EngineContext<'_>,
    task_id: TaskId,
    status: TaskStatus,
    actor_id: UserId,
) -> EngineResult<Task> {
    ctx.write("update_task_status", |scope| {
        let tasks = scope.tasks()?;
        let mut task = tasks
            .get_task(task_id)?
            .ok_or_else(|| EngineError::not_found(EntityKind::Task, task_id))?;
        let actor = load_actor(&scope.users()?, actor_id, PolicyAction::ManageTasks)?;
        ensure_permitted(
            &actor,
            PolicyAction::ManageTasks,
            None,
            ActorRelation {
                is_author: task.created_by_id == actor.id,
                is_assignee: task.assigned_to_id == actor.id,
            },
        )?;

        if task.status == status {
            return Ok(task);
        }
        let from = task.status;
        let now = scope.now_ms();
        task.status = status;
        task.completed_at = if status == TaskStatus::Done {
            Some(now)
        } else {
            None
        };
        task.updated_at = now;
        tasks.update_task(&task)?;
        scope.record(
            actor.id,
            ContentType::Task,
            task.id,
            AuditPayload::TaskStatusChanged { from, to: status },
        )?;
        Ok(task)
    })
}

fn ensure_content_exists(
    scope: &WriteScope<'_>,
    content_type: ContentType,
    content_id: Uuid,
) -> EngineResult<()> {
    let exists = match content_type {
        ContentType::Story => scope.stories()?.get_story(content_id)?.is_some(),
        ContentType::Translation => scope
            .translations()?
            .get_translation(content_id)?
            .is_some(),
        ContentType::Task => scope.tasks()?.get_task(content_id)?.is_some(),
    };
    if exists {
        return Ok(());
    }
    let entity = match content_type {
        ContentType::Story => EntityKind::Story,
        ContentType::Translation => EntityKind::Translation,
        ContentType::Task => EntityKind::Task,
    };
    Err(EngineError::not_found(entity, content_id))
}
