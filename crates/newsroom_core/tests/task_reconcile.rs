mod common;

use common::{Newsroom, DAY_MS, NOW};
use newsroom_core::model::story::StoryStage;
use newsroom_core::model::task::{ContentType, NewTask, Task, TaskPriority, TaskStatus, TaskType};
use newsroom_core::model::user::UserId;
use newsroom_core::model::workflow::AssignmentSlot;
use newsroom_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use newsroom_core::service::assignment_service::{assign, AssignRequest};
use newsroom_core::service::error::EngineErrorKind;
use newsroom_core::service::story_service::{complete_follow_up, get_story, schedule_follow_up};
use newsroom_core::service::task_service::{reconcile_all, update_task_status};
use uuid::Uuid;

fn open_tasks(newsroom: &Newsroom, content_id: Uuid) -> Vec<Task> {
    SqliteTaskRepository::try_new(&newsroom.conn)
        .unwrap()
        .list_tasks(&TaskListQuery {
            content_id: Some(content_id),
            open_only: true,
            ..TaskListQuery::default()
        })
        .unwrap()
}

fn assignees(tasks: &[Task]) -> Vec<(TaskType, UserId)> {
    tasks.iter().map(|t| (t.task_type, t.assigned_to_id)).collect()
}

#[test]
fn tasks_follow_the_slot_holders() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Tracked");
    assert_eq!(
        assignees(&open_tasks(&newsroom, story.id)),
        vec![(TaskType::StoryReview, newsroom.reviewer.id)]
    );

    assign(
        &newsroom.ctx(),
        &AssignRequest::new(
            AssignmentSlot::Reviewer,
            story.id,
            newsroom.reviewer2.id,
            newsroom.editor.id,
        ),
    )
    .unwrap();
    assert_eq!(
        assignees(&open_tasks(&newsroom, story.id)),
        vec![(TaskType::StoryReview, newsroom.reviewer2.id)]
    );

    let story = get_story(&newsroom.ctx(), story.id).unwrap();
    newsroom.move_to(
        &story,
        StoryStage::NeedsSubEditorApproval,
        newsroom.reviewer2.id,
        Some(newsroom.sub_editor.id),
    );
    assert_eq!(
        assignees(&open_tasks(&newsroom, story.id)),
        vec![(TaskType::StoryApproval, newsroom.sub_editor.id)]
    );
}

#[test]
fn follow_up_task_tracks_the_reminder() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Follow me");
    let ctx = newsroom.ctx();

    schedule_follow_up(&ctx, story.id, newsroom.journalist.id, NOW + 2 * DAY_MS).unwrap();
    let tasks = open_tasks(&newsroom, story.id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_type, TaskType::StoryFollowUp);
    assert_eq!(tasks[0].due_date, Some(NOW + 2 * DAY_MS));

    schedule_follow_up(&ctx, story.id, newsroom.journalist.id, NOW + 4 * DAY_MS).unwrap();
    let tasks = open_tasks(&newsroom, story.id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].due_date, Some(NOW + 4 * DAY_MS));

    let completed = complete_follow_up(&ctx, story.id, newsroom.journalist.id).unwrap();
    assert!(completed.follow_up_completed);
    assert_eq!(completed.stage, StoryStage::Draft);
    assert!(open_tasks(&newsroom, story.id).is_empty());
}

#[test]
fn reconcile_all_repairs_drift_and_is_idempotent() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Drifted");

    // Drift: the review task vanished and a stale approval task appeared.
    newsroom
        .conn
        .execute(
            "DELETE FROM tasks WHERE content_id = ?1;",
            [story.id.to_string()],
        )
        .unwrap();
    let stale = Task::from_new(
        NewTask {
            task_type: TaskType::StoryApproval,
            title: "Approve \"Drifted\"".to_string(),
            priority: TaskPriority::High,
            assigned_to_id: newsroom.sub_editor.id,
            content_type: Some(ContentType::Story),
            content_id: Some(story.id),
            due_date: None,
            scheduled_for: None,
        },
        newsroom.editor.id,
        NOW,
    );
    SqliteTaskRepository::try_new(&newsroom.conn)
        .unwrap()
        .create_task(&stale)
        .unwrap();

    let report = reconcile_all(&newsroom.ctx(), newsroom.sub_editor.id).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.closed, 1);
    assert_eq!(
        assignees(&open_tasks(&newsroom, story.id)),
        vec![(TaskType::StoryReview, newsroom.reviewer.id)]
    );

    let again = reconcile_all(&newsroom.ctx(), newsroom.sub_editor.id).unwrap();
    assert!(again.is_clean());
}

#[test]
fn reconcile_all_requires_unconditional_task_management() {
    let newsroom = Newsroom::new();
    let err = reconcile_all(&newsroom.ctx(), newsroom.journalist.id).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::Unauthorized);
}

#[test]
fn broken_task_store_never_blocks_a_transition() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Resilient");
    newsroom.conn.execute_batch("DROP TABLE tasks;").unwrap();

    let moved = newsroom.move_to(
        &story,
        StoryStage::NeedsJournalistReview,
        newsroom.journalist.id,
        Some(newsroom.reviewer.id),
    );
    assert_eq!(moved.stage, StoryStage::NeedsJournalistReview);
    let reloaded = get_story(&newsroom.ctx(), story.id).unwrap();
    assert_eq!(reloaded.version, moved.version);
    assert_eq!(newsroom.audit_rows(), 2);
}

#[test]
fn task_status_changes_are_audited_once() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Status");
    let task = open_tasks(&newsroom, story.id).remove(0);
    let ctx = newsroom.ctx();

    let rows = newsroom.audit_rows();
    let started = update_task_status(&ctx, task.id, TaskStatus::InProgress, newsroom.reviewer.id).unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);
    update_task_status(&ctx, task.id, TaskStatus::InProgress, newsroom.reviewer.id).unwrap();
    assert_eq!(newsroom.audit_rows(), rows + 1);

    let err = update_task_status(&ctx, task.id, TaskStatus::Done, newsroom.reviewer2.id).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::Unauthorized);
}
