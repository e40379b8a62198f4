//! Read-only work-queue projections.
//!
//! # Responsibility
//! - Derive per-user queues, per-stage queues and workload counts from a
//!   snapshot of stories, translations and tasks.
//! - Bucket tasks by urgency relative to newsroom-local day boundaries.
//!
//! # Invariants
//! - Pure: nothing here reads the database or the clock.
//! - Never consulted by transitions or assignments.
//! - `DONE` tasks never appear in a projection.

use crate::config::WorkQueueSettings;
use crate::model::story::{Story, StoryId, StoryStage};
use crate::model::task::Task;
use crate::model::translation::Translation;
use crate::model::user::{Language, UserId};
use crate::service::story_service::derive_summary;
use chrono::{FixedOffset, Offset, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const DAY_MS: i64 = 86_400_000;

/// Committed state a projection is computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub stories: Vec<Story>,
    pub translations: Vec<Translation>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyBucket {
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

impl UrgencyBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::DueToday => "due_today",
            Self::DueSoon => "due_soon",
            Self::Upcoming => "upcoming",
        }
    }
}

impl Display for UrgencyBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day boundaries around "now" in the newsroom's UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    now_ms: i64,
    start_of_today: i64,
    due_soon_days: u32,
}

impl DayWindow {
    pub fn new(now_ms: i64, settings: &WorkQueueSettings) -> Self {
        let offset = FixedOffset::east_opt(settings.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        Self {
            now_ms,
            start_of_today: start_of_local_day(now_ms, offset),
            due_soon_days: settings.due_soon_days,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn start_of_today(&self) -> i64 {
        self.start_of_today
    }

    pub fn end_of_today(&self) -> i64 {
        self.start_of_today + DAY_MS
    }

    /// Exclusive upper bound of the `due_soon` bucket.
    pub fn due_soon_end(&self) -> i64 {
        self.start_of_today + i64::from(self.due_soon_days) * DAY_MS
    }

    /// Buckets a due timestamp; undated work is `upcoming`.
    pub fn bucket_for(&self, due: Option<i64>) -> UrgencyBucket {
        let Some(due) = due else {
            return UrgencyBucket::Upcoming;
        };
        if due < self.start_of_today {
            UrgencyBucket::Overdue
        } else if due < self.end_of_today() {
            UrgencyBucket::DueToday
        } else if due < self.due_soon_end() {
            UrgencyBucket::DueSoon
        } else {
            UrgencyBucket::Upcoming
        }
    }
}

fn start_of_local_day(now_ms: i64, offset: FixedOffset) -> i64 {
    Utc.timestamp_millis_opt(now_ms)
        .single()
        .map(|now| now.with_timezone(&offset).date_naive())
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|midnight| midnight.timestamp_millis())
        .unwrap_or_else(|| now_ms - now_ms.rem_euclid(DAY_MS))
}

/// `ceil((due - now) / 1 day)`, saturating at the `i64` range.
pub fn days_until(due_ms: i64, now_ms: i64) -> i64 {
    let delta = due_ms.saturating_sub(now_ms);
    let days = delta.div_euclid(DAY_MS);
    if delta.rem_euclid(DAY_MS) == 0 {
        days
    } else {
        days + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskQueueItem {
    pub task: Task,
    pub bucket: UrgencyBucket,
    pub days_until: Option<i64>,
}

impl TaskQueueItem {
    fn new(task: &Task, window: &DayWindow) -> Self {
        let due = task.effective_due();
        Self {
            task: task.clone(),
            bucket: window.bucket_for(due),
            days_until: due.map(|due| days_until(due, window.now_ms())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskBuckets {
    pub overdue: Vec<TaskQueueItem>,
    pub due_today: Vec<TaskQueueItem>,
    pub due_soon: Vec<TaskQueueItem>,
    pub upcoming: Vec<TaskQueueItem>,
}

impl TaskBuckets {
    fn push(&mut self, item: TaskQueueItem) {
        match item.bucket {
            UrgencyBucket::Overdue => self.overdue.push(item),
            UrgencyBucket::DueToday => self.due_today.push(item),
            UrgencyBucket::DueSoon => self.due_soon.push(item),
            UrgencyBucket::Upcoming => self.upcoming.push(item),
        }
    }

    pub fn bucket(&self, bucket: UrgencyBucket) -> &[TaskQueueItem] {
        match bucket {
            UrgencyBucket::Overdue => &self.overdue,
            UrgencyBucket::DueToday => &self.due_today,
            UrgencyBucket::DueSoon => &self.due_soon,
            UrgencyBucket::Upcoming => &self.upcoming,
        }
    }

    pub fn len(&self) -> usize {
        self.overdue.len() + self.due_today.len() + self.due_soon.len() + self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sort(&mut self) {
        for items in [
            &mut self.overdue,
            &mut self.due_today,
            &mut self.due_soon,
            &mut self.upcoming,
        ] {
            items.sort_by_key(|item| {
                (
                    item.task.effective_due().is_none(),
                    item.task.effective_due(),
                    item.task.created_at,
                    item.task.id,
                )
            });
        }
    }
}

/// Story row as shown on dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryQueueItem {
    pub id: StoryId,
    pub title: String,
    pub stage: StoryStage,
    pub language: Language,
    pub author_id: UserId,
    pub summary: Option<String>,
    pub follow_up_date: Option<i64>,
    pub updated_at: i64,
}

impl From<&Story> for StoryQueueItem {
    fn from(story: &Story) -> Self {
        Self {
            id: story.id,
            title: story.title.clone(),
            stage: story.stage,
            language: story.language,
            author_id: story.author_id,
            summary: derive_summary(&story.body),
            follow_up_date: story.follow_up_date.filter(|_| story.has_open_follow_up()),
            updated_at: story.updated_at,
        }
    }
}

/// "My work" view for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserQueue {
    pub user_id: UserId,
    pub my_drafts: Vec<StoryQueueItem>,
    pub needs_my_review: Vec<StoryQueueItem>,
    pub needs_my_approval: Vec<StoryQueueItem>,
    pub my_translations: Vec<Translation>,
    pub tasks: TaskBuckets,
}

pub fn user_queue(snapshot: &Snapshot, user_id: UserId, window: &DayWindow) -> UserQueue {
    let stories_where = |keep: &dyn Fn(&Story) -> bool| -> Vec<StoryQueueItem> {
        let mut items: Vec<StoryQueueItem> = snapshot
            .stories
            .iter()
            .filter(|story| keep(story))
            .map(StoryQueueItem::from)
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        items
    };

    let my_drafts = stories_where(&|story| story.author_id == user_id && story.stage.is_authoring());
    let needs_my_review = stories_where(&|story| {
        story.stage == StoryStage::NeedsJournalistReview
            && story.assigned_reviewer_id == Some(user_id)
    });
    let needs_my_approval = stories_where(&|story| {
        story.stage == StoryStage::NeedsSubEditorApproval
            && story.assigned_approver_id == Some(user_id)
    });

    let mut my_translations: Vec<Translation> = snapshot
        .translations
        .iter()
        .filter(|t| t.assigned_to_id == user_id && t.status.is_open())
        .cloned()
        .collect();
    my_translations.sort_by_key(|t| (t.created_at, t.id));

    let mut tasks = TaskBuckets::default();
    for task in snapshot
        .tasks
        .iter()
        .filter(|task| task.assigned_to_id == user_id && task.status.is_open())
    {
        tasks.push(TaskQueueItem::new(task, window));
    }
    tasks.sort();

    UserQueue {
        user_id,
        my_drafts,
        needs_my_review,
        needs_my_approval,
        my_translations,
        tasks,
    }
}

/// Stories grouped by stage. Every stage is present, possibly empty.
pub fn stage_queues(snapshot: &Snapshot) -> BTreeMap<StoryStage, Vec<StoryQueueItem>> {
    let mut queues: BTreeMap<StoryStage, Vec<StoryQueueItem>> = StoryStage::ALL
        .into_iter()
        .map(|stage| (stage, Vec::new()))
        .collect();
    for story in &snapshot.stories {
        queues
            .entry(story.stage)
            .or_default()
            .push(StoryQueueItem::from(story));
    }
    for items in queues.values_mut() {
        items.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
    }
    queues
}

/// Open work per user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Workload {
    pub user_id: UserId,
    pub drafts: usize,
    pub reviewing: usize,
    pub approving: usize,
    pub translating: usize,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
}

impl Workload {
    fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Items waiting on this user; tasks are counted separately.
    pub fn content_items(&self) -> usize {
        self.drafts + self.reviewing + self.approving + self.translating
    }
}

/// Workload counts for every user that appears in the snapshot.
pub fn workloads(snapshot: &Snapshot, window: &DayWindow) -> Vec<Workload> {
    let mut by_user: BTreeMap<UserId, Workload> = BTreeMap::new();

    for story in &snapshot.stories {
        if story.stage.is_authoring() {
            workload_of(&mut by_user, story.author_id).drafts += 1;
        }
        match (story.stage, story.assigned_reviewer_id, story.assigned_approver_id) {
            (StoryStage::NeedsJournalistReview, Some(reviewer), _) => {
                workload_of(&mut by_user, reviewer).reviewing += 1;
            }
            (StoryStage::NeedsSubEditorApproval, _, Some(approver)) => {
                workload_of(&mut by_user, approver).approving += 1;
            }
            _ => {}
        }
    }
    for translation in snapshot.translations.iter().filter(|t| t.status.is_open()) {
        workload_of(&mut by_user, translation.assigned_to_id).translating += 1;
    }
    for task in snapshot.tasks.iter().filter(|task| task.status.is_open()) {
        let workload = workload_of(&mut by_user, task.assigned_to_id);
        workload.open_tasks += 1;
        if window.bucket_for(task.effective_due()) == UrgencyBucket::Overdue {
            workload.overdue_tasks += 1;
        }
    }

    by_user.into_values().collect()
}

fn workload_of(by_user: &mut BTreeMap<UserId, Workload>, user_id: UserId) -> &mut Workload {
    by_user
        .entry(user_id)
        .or_insert_with(|| Workload::empty(user_id))
}
