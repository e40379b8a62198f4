//! Task repository contracts and SQLite implementation.

use crate::model::task::{ContentType, Task, TaskId, TaskPriority, TaskStatus, TaskType};
use crate::model::user::UserId;
use crate::repo::error::{
    ensure_connection_ready, parse_enum, parse_optional_uuid, parse_uuid, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    task_type,
    title,
    priority,
    status,
    assigned_to_id,
    created_by_id,
    content_type,
    content_id,
    due_date,
    scheduled_for,
    created_at,
    updated_at,
    completed_at
FROM tasks";

/// Query options for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub assigned_to_id: Option<UserId>,
    pub content_id: Option<Uuid>,
    pub task_type: Option<TaskType>,
    pub open_only: bool,
}

pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["tasks", "users"])?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        validate_task(task)?;
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                task_type,
                title,
                priority,
                status,
                assigned_to_id,
                created_by_id,
                content_type,
                content_id,
                due_date,
                scheduled_for,
                created_at,
                updated_at,
                completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                task.id.to_string(),
                task.task_type.as_str(),
                task.title.as_str(),
                task.priority.as_str(),
                task.status.as_str(),
                task.assigned_to_id.to_string(),
                task.created_by_id.to_string(),
                task.content_type.map(ContentType::as_str),
                task.content_id.map(|id| id.to_string()),
                task.due_date,
                task.scheduled_for,
                task.created_at,
                task.updated_at,
                task.completed_at,
            ],
        )?;
        Ok(task.id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(assignee) = query.assigned_to_id {
            sql.push_str(" AND assigned_to_id = ?");
            bind_values.push(Value::Text(assignee.to_string()));
        }
        if let Some(content_id) = query.content_id {
            sql.push_str(" AND content_id = ?");
            bind_values.push(Value::Text(content_id.to_string()));
        }
        if let Some(task_type) = query.task_type {
            sql.push_str(" AND task_type = ?");
            bind_values.push(Value::Text(task_type.as_str().to_string()));
        }
        if query.open_only {
            sql.push_str(" AND status <> 'DONE'");
        }
        sql.push_str(" ORDER BY COALESCE(due_date, scheduled_for) IS NULL, COALESCE(due_date, scheduled_for) ASC, created_at ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        validate_task(task)?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                title = ?1,
                priority = ?2,
                status = ?3,
                assigned_to_id = ?4,
                due_date = ?5,
                scheduled_for = ?6,
                updated_at = ?7,
                completed_at = ?8
             WHERE id = ?9;",
            params![
                task.title.as_str(),
                task.priority.as_str(),
                task.status.as_str(),
                task.assigned_to_id.to_string(),
                task.due_date,
                task.scheduled_for,
                task.updated_at,
                task.completed_at,
                task.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Task, task.id));
        }
        Ok(())
    }
}

fn validate_task(task: &Task) -> RepoResult<()> {
    if task.title.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "task {} has a blank title",
            task.id
        )));
    }
    if task.content_id.is_some() != task.content_type.is_some() {
        return Err(RepoError::InvalidData(format!(
            "task {} must set content_type and content_id together",
            task.id
        )));
    }
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let type_text: String = row.get("task_type")?;
    let priority_text: String = row.get("priority")?;
    let status_text: String = row.get("status")?;
    let assignee_text: String = row.get("assigned_to_id")?;
    let creator_text: String = row.get("created_by_id")?;

    Ok(Task {
        id: parse_uuid(&id_text, "tasks.id")?,
        task_type: parse_enum(&type_text, "tasks.task_type", TaskType::parse)?,
        title: row.get("title")?,
        priority: parse_enum(&priority_text, "tasks.priority", TaskPriority::parse)?,
        status: parse_enum(&status_text, "tasks.status", TaskStatus::parse)?,
        assigned_to_id: parse_uuid(&assignee_text, "tasks.assigned_to_id")?,
        created_by_id: parse_uuid(&creator_text, "tasks.created_by_id")?,
        content_type: row
            .get::<_, Option<String>>("content_type")?
            .map(|value| parse_enum(&value, "tasks.content_type", ContentType::parse))
            .transpose()?,
        content_id: parse_optional_uuid(row.get("content_id")?, "tasks.content_id")?,
        due_date: row.get("due_date")?,
        scheduled_for: row.get("scheduled_for")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    })
}
