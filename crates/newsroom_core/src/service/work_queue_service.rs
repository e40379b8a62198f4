//! Work-queue read service.
//!
//! # Responsibility
//! - Load one consistent snapshot of stories, translations and open tasks.
//! - Hand it to the pure projector with the configured day window.
//!
//! # Invariants
//! - Read-only: the snapshot transaction is always rolled back.
//! - Holds no state between calls, so there is nothing to invalidate.

use crate::config::WorkQueueSettings;
use crate::model::story::StoryStage;
use crate::model::user::UserId;
use crate::projection::{
    stage_queues, user_queue, workloads, DayWindow, Snapshot, StoryQueueItem, UserQueue, Workload,
};
use crate::repo::story_repo::{SqliteStoryRepository, StoryListQuery, StoryRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use crate::repo::translation_repo::{
    SqliteTranslationRepository, TranslationListQuery, TranslationRepository,
};
use crate::service::context::EngineContext;
use crate::service::error::EngineResult;
use log::debug;
use rusqlite::{Transaction, TransactionBehavior};
use std::collections::BTreeMap;

/// Read-side entry point for dashboards.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkQueueService {
    settings: WorkQueueSettings,
}

impl WorkQueueService {
    pub fn new(settings: WorkQueueSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WorkQueueSettings {
        &self.settings
    }

    /// "My work" for `user_id` as of the context clock.
    pub fn user_queue(&self, ctx: &EngineContext<'_>, user_id: UserId) -> EngineResult<UserQueue> {
        let snapshot = load_snapshot(ctx)?;
        Ok(user_queue(&snapshot, user_id, &self.window(ctx)))
    }

    pub fn stage_queues(
        &self,
        ctx: &EngineContext<'_>,
    ) -> EngineResult<BTreeMap<StoryStage, Vec<StoryQueueItem>>> {
        let snapshot = load_snapshot(ctx)?;
        Ok(stage_queues(&snapshot))
    }

    pub fn workloads(&self, ctx: &EngineContext<'_>) -> EngineResult<Vec<Workload>> {
        let snapshot = load_snapshot(ctx)?;
        Ok(workloads(&snapshot, &self.window(ctx)))
    }

    fn window(&self, ctx: &EngineContext<'_>) -> DayWindow {
        DayWindow::new(ctx.now_ms(), &self.settings)
    }
}

/// Reads stories, translations and open tasks inside one deferred
/// transaction so all three lists describe the same committed state.
pub fn load_snapshot(ctx: &EngineContext<'_>) -> EngineResult<Snapshot> {
    let tx = Transaction::new_unchecked(ctx.conn(), TransactionBehavior::Deferred)?;
    let stories = SqliteStoryRepository::try_new(&tx)?.list_stories(&StoryListQuery::default())?;
    let translations = SqliteTranslationRepository::try_new(&tx)?
        .list_translations(&TranslationListQuery::default())?;
    let tasks = SqliteTaskRepository::try_new(&tx)?.list_tasks(&TaskListQuery {
        open_only: true,
        ..TaskListQuery::default()
    })?;
    tx.rollback()?;

    debug!(
        "event=work_queue_snapshot module=work_queue_service status=ok stories={} translations={} tasks={}",
        stories.len(),
        translations.len(),
        tasks.len()
    );
    Ok(Snapshot {
        stories,
        translations,
        tasks,
    })
}
