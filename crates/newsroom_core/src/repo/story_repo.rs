//! Story repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over canonical `stories` storage.
//! - Guard every update with the row's optimistic `version`.
//!
//! # Invariants
//! - Write paths call `Story::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `update_story` succeeds only when the stored version equals
//!   `story.version`, and bumps it by one.

use crate::model::story::{Story, StoryId, StoryStage};
use crate::model::user::{Language, UserId};
use crate::repo::error::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_enum, parse_optional_uuid, parse_uuid,
    EntityKind, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const STORY_SELECT_SQL: &str = "SELECT
    id,
    title,
    body,
    stage,
    author_id,
    assigned_reviewer_id,
    assigned_approver_id,
    category_id,
    language,
    follow_up_date,
    follow_up_completed,
    version,
    created_at,
    updated_at,
    published_at
FROM stories";

/// Query options for listing stories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryListQuery {
    pub stage: Option<StoryStage>,
    pub author_id: Option<UserId>,
    pub reviewer_id: Option<UserId>,
    pub approver_id: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for story persistence.
pub trait StoryRepository {
    fn create_story(&self, story: &Story) -> RepoResult<StoryId>;
    fn get_story(&self, id: StoryId) -> RepoResult<Option<Story>>;
    fn list_stories(&self, query: &StoryListQuery) -> RepoResult<Vec<Story>>;
    /// Writes `story` if the stored version still equals `story.version`.
    /// Returns the new version.
    fn update_story(&self, story: &Story) -> RepoResult<i64>;
    fn delete_story(&self, id: StoryId) -> RepoResult<()>;
}

/// SQLite-backed story repository.
pub struct SqliteStoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStoryRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["stories", "users"])?;
        Ok(Self { conn })
    }
}

impl StoryRepository for SqliteStoryRepository<'_> {
    fn create_story(&self, story: &Story) -> RepoResult<StoryId> {
        story.validate()?;

        self.conn.execute(
            "INSERT INTO stories (
                id,
                title,
                body,
                stage,
                author_id,
                assigned_reviewer_id,
                assigned_approver_id,
                category_id,
                language,
                follow_up_date,
                follow_up_completed,
                version,
                created_at,
                updated_at,
                published_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                story.id.to_string(),
                story.title.as_str(),
                story.body.as_str(),
                story.stage.as_str(),
                story.author_id.to_string(),
                story.assigned_reviewer_id.map(|id| id.to_string()),
                story.assigned_approver_id.map(|id| id.to_string()),
                story.category_id.map(|id| id.to_string()),
                story.language.as_str(),
                story.follow_up_date,
                bool_to_int(story.follow_up_completed),
                story.version,
                story.created_at,
                story.updated_at,
                story.published_at,
            ],
        )?;

        Ok(story.id)
    }

    fn get_story(&self, id: StoryId) -> RepoResult<Option<Story>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STORY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_story_row(row)?));
        }
        Ok(None)
    }

    fn list_stories(&self, query: &StoryListQuery) -> RepoResult<Vec<Story>> {
        let mut sql = format!("{STORY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(stage) = query.stage {
            sql.push_str(" AND stage = ?");
            bind_values.push(Value::Text(stage.as_str().to_string()));
        }
        if let Some(author_id) = query.author_id {
            sql.push_str(" AND author_id = ?");
            bind_values.push(Value::Text(author_id.to_string()));
        }
        if let Some(reviewer_id) = query.reviewer_id {
            sql.push_str(" AND assigned_reviewer_id = ?");
            bind_values.push(Value::Text(reviewer_id.to_string()));
        }
        if let Some(approver_id) = query.approver_id {
            sql.push_str(" AND assigned_approver_id = ?");
            bind_values.push(Value::Text(approver_id.to_string()));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut stories = Vec::new();
        while let Some(row) = rows.next()? {
            stories.push(parse_story_row(row)?);
        }
        Ok(stories)
    }

    fn update_story(&self, story: &Story) -> RepoResult<i64> {
        story.validate()?;

        let next_version = story.version + 1;
        let changed = self.conn.execute(
            "UPDATE stories
             SET
                title = ?1,
                body = ?2,
                stage = ?3,
                assigned_reviewer_id = ?4,
                assigned_approver_id = ?5,
                category_id = ?6,
                language = ?7,
                follow_up_date = ?8,
                follow_up_completed = ?9,
                version = ?10,
                updated_at = ?11,
                published_at = ?12
             WHERE id = ?13
               AND version = ?14;",
            params![
                story.title.as_str(),
                story.body.as_str(),
                story.stage.as_str(),
                story.assigned_reviewer_id.map(|id| id.to_string()),
                story.assigned_approver_id.map(|id| id.to_string()),
                story.category_id.map(|id| id.to_string()),
                story.language.as_str(),
                story.follow_up_date,
                bool_to_int(story.follow_up_completed),
                next_version,
                story.updated_at,
                story.published_at,
                story.id.to_string(),
                story.version,
            ],
        )?;

        if changed == 0 {
            return Err(missing_or_conflict(self.conn, story.id, story.version)?);
        }
        Ok(next_version)
    }

    fn delete_story(&self, id: StoryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM stories WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Story, id));
        }
        Ok(())
    }
}

fn missing_or_conflict(conn: &Connection, id: StoryId, expected: i64) -> RepoResult<RepoError> {
    let exists = conn
        .query_row(
            "SELECT version FROM stories WHERE id = ?1;",
            [id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(match exists {
        Some(_) => RepoError::VersionConflict {
            entity: EntityKind::Story,
            id,
            expected,
        },
        None => RepoError::NotFound(EntityKind::Story, id),
    })
}

fn parse_story_row(row: &Row<'_>) -> RepoResult<Story> {
    let id_text: String = row.get("id")?;
    let stage_text: String = row.get("stage")?;
    let author_text: String = row.get("author_id")?;
    let language_text: String = row.get("language")?;

    let story = Story {
        id: parse_uuid(&id_text, "stories.id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        stage: parse_enum(&stage_text, "stories.stage", StoryStage::parse)?,
        author_id: parse_uuid(&author_text, "stories.author_id")?,
        assigned_reviewer_id: parse_optional_uuid(
            row.get("assigned_reviewer_id")?,
            "stories.assigned_reviewer_id",
        )?,
        assigned_approver_id: parse_optional_uuid(
            row.get("assigned_approver_id")?,
            "stories.assigned_approver_id",
        )?,
        category_id: parse_optional_uuid(row.get("category_id")?, "stories.category_id")?,
        language: parse_enum(&language_text, "stories.language", Language::parse)?,
        follow_up_date: row.get("follow_up_date")?,
        follow_up_completed: parse_bool(
            row.get("follow_up_completed")?,
            "stories.follow_up_completed",
        )?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        published_at: row.get("published_at")?,
    };
    story.validate()?;
    Ok(story)
}
