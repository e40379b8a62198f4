mod common;

use common::{Newsroom, DAY_MS, HOUR_MS, NOW};
use newsroom_core::config::WorkQueueSettings;
use newsroom_core::model::story::StoryStage;
use newsroom_core::model::task::{NewTask, Task, TaskPriority, TaskStatus, TaskType};
use newsroom_core::model::user::{Language, UserId};
use newsroom_core::projection::UrgencyBucket;
use newsroom_core::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use newsroom_core::service::error::EngineErrorKind;
use newsroom_core::service::task_service::{create_task, update_task_status};
use newsroom_core::service::translation_service::{fork, ForkRequest};
use newsroom_core::service::work_queue_service::WorkQueueService;

fn task_for(assignee: UserId, title: &str, due: Option<i64>) -> NewTask {
    NewTask {
        task_type: TaskType::BulletinCreate,
        title: title.to_string(),
        priority: TaskPriority::Medium,
        assigned_to_id: assignee,
        content_type: None,
        content_id: None,
        due_date: due,
        scheduled_for: None,
    }
}

#[test]
fn tasks_are_bucketed_by_newsroom_day() {
    let newsroom = Newsroom::new();
    let ctx = newsroom.ctx();
    let me = newsroom.journalist.id;
    for (title, due) in [
        ("yesterday", NOW - DAY_MS),
        ("this afternoon", NOW + 3 * HOUR_MS),
        ("next week", NOW + 5 * DAY_MS),
        ("next month", NOW + 30 * DAY_MS),
    ] {
        create_task(&ctx, me, task_for(me, title, Some(due))).unwrap();
    }

    let queue = WorkQueueService::default().user_queue(&ctx, me).unwrap();
    let titles = |bucket: UrgencyBucket| -> Vec<String> {
        queue
            .tasks
            .bucket(bucket)
            .iter()
            .map(|item| item.task.title.clone())
            .collect()
    };
    assert_eq!(titles(UrgencyBucket::Overdue), vec!["yesterday"]);
    assert_eq!(titles(UrgencyBucket::DueToday), vec!["this afternoon"]);
    assert_eq!(titles(UrgencyBucket::DueSoon), vec!["next week"]);
    assert_eq!(titles(UrgencyBucket::Upcoming), vec!["next month"]);
    assert_eq!(queue.tasks.overdue[0].days_until, Some(-1));
    assert_eq!(queue.tasks.due_soon[0].days_until, Some(5));
}

#[test]
fn offset_moves_the_day_boundary() {
    let newsroom = Newsroom::new();
    let ctx = newsroom.ctx();
    let me = newsroom.journalist.id;
    // 10:00Z + 3h is 13:00Z: still today in UTC, tomorrow at +12:00.
    create_task(&ctx, me, task_for(me, "late", Some(NOW + 3 * HOUR_MS))).unwrap();

    let service = WorkQueueService::new(WorkQueueSettings {
        utc_offset_minutes: 12 * 60,
        due_soon_days: 7,
    });
    let queue = service.user_queue(&ctx, me).unwrap();
    assert_eq!(queue.tasks.due_soon.len(), 1);
    assert!(queue.tasks.due_today.is_empty());
}

#[test]
fn done_tasks_leave_the_queue() {
    let newsroom = Newsroom::new();
    let ctx = newsroom.ctx();
    let me = newsroom.journalist.id;
    let task = create_task(&ctx, me, task_for(me, "finish", Some(NOW))).unwrap();
    update_task_status(&ctx, task.id, TaskStatus::Done, me).unwrap();

    let queue = WorkQueueService::default().user_queue(&ctx, me).unwrap();
    assert!(queue.tasks.is_empty());
}

#[test]
fn user_queue_follows_story_slots() {
    let newsroom = Newsroom::new();
    let draft = newsroom.draft("Mine");
    let in_review = newsroom.in_review("Review me");
    let in_approval = newsroom.in_approval("Approve me");
    let service = WorkQueueService::default();
    let ctx = newsroom.ctx();

    let author = service.user_queue(&ctx, newsroom.journalist.id).unwrap();
    assert_eq!(author.my_drafts.len(), 1);
    assert_eq!(author.my_drafts[0].id, draft.id);

    let reviewer = service.user_queue(&ctx, newsroom.reviewer.id).unwrap();
    assert_eq!(reviewer.needs_my_review.len(), 1);
    assert_eq!(reviewer.needs_my_review[0].id, in_review.id);
    // The review task created for the slot holder is undated.
    assert_eq!(reviewer.tasks.upcoming.len(), 1);
    assert_eq!(reviewer.tasks.upcoming[0].task.task_type, TaskType::StoryReview);

    let approver = service.user_queue(&ctx, newsroom.sub_editor.id).unwrap();
    assert_eq!(approver.needs_my_approval.len(), 1);
    assert_eq!(approver.needs_my_approval[0].id, in_approval.id);
}

#[test]
fn stage_queues_and_workloads_cover_the_newsroom() {
    let newsroom = Newsroom::new();
    newsroom.draft("One");
    newsroom.in_review("Two");
    let approved = newsroom.approved("Three");
    fork(
        &newsroom.ctx(),
        &ForkRequest {
            source_story_id: approved.id,
            language: Language::Afrikaans,
            assignee_id: newsroom.translator_af.id,
            actor_id: newsroom.sub_editor.id,
        },
    )
    .unwrap();

    let service = WorkQueueService::default();
    let ctx = newsroom.ctx();
    let queues = service.stage_queues(&ctx).unwrap();
    assert_eq!(queues[&StoryStage::Draft].len(), 1);
    assert_eq!(queues[&StoryStage::NeedsJournalistReview].len(), 1);
    assert_eq!(queues[&StoryStage::Approved].len(), 1);
    assert!(queues[&StoryStage::Published].is_empty());

    let workloads = service.workloads(&ctx).unwrap();
    let of = |user: UserId| workloads.iter().find(|w| w.user_id == user).copied().unwrap();
    assert_eq!(of(newsroom.journalist.id).drafts, 1);
    assert_eq!(of(newsroom.reviewer.id).reviewing, 1);
    assert_eq!(of(newsroom.translator_af.id).translating, 1);
    assert_eq!(of(newsroom.translator_af.id).open_tasks, 1);
}

#[test]
fn non_positive_task_dates_are_rejected() {
    let newsroom = Newsroom::new();
    let ctx = newsroom.ctx();
    let me = newsroom.journalist.id;

    let err = create_task(&ctx, me, task_for(me, "ancient", Some(i64::MIN))).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::InvalidInput);

    let mut scheduled = task_for(me, "epoch", None);
    scheduled.scheduled_for = Some(0);
    let err = create_task(&ctx, me, scheduled).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::InvalidInput);

    let queue = WorkQueueService::default().user_queue(&ctx, me).unwrap();
    assert!(queue.tasks.is_empty());
}

#[test]
fn extreme_stored_dates_still_project() {
    let newsroom = Newsroom::new();
    let ctx = newsroom.ctx();
    let me = newsroom.journalist.id;

    let repo = SqliteTaskRepository::try_new(&newsroom.conn).unwrap();
    for (title, due) in [("min", i64::MIN), ("max", i64::MAX)] {
        let task = Task::from_new(task_for(me, title, Some(due)), me, NOW);
        repo.create_task(&task).unwrap();
    }

    let queue = WorkQueueService::default().user_queue(&ctx, me).unwrap();
    assert_eq!(queue.tasks.overdue.len(), 1);
    assert_eq!(queue.tasks.upcoming.len(), 1);
    assert!(queue.tasks.overdue[0].days_until.unwrap() < 0);
    assert!(queue.tasks.upcoming[0].days_until.unwrap() > 0);

    let workloads = WorkQueueService::default().workloads(&ctx).unwrap();
    let mine = workloads.iter().find(|w| w.user_id == me).unwrap();
    assert_eq!(mine.overdue_tasks, 1);
}
