//! Translation repository contracts and SQLite implementation.
//!
//! # Invariants
//! - The partial unique index `idx_translations_active_language` backs the
//!   one-active-fork-per-language rule; callers still check first so the
//!   failure surfaces as a semantic error.
//! - Updates are guarded by the row `version`.

use crate::model::story::StoryId;
use crate::model::translation::{Translation, TranslationId, TranslationStatus};
use crate::model::user::{Language, UserId};
use crate::repo::error::{
    ensure_connection_ready, parse_enum, parse_optional_uuid, parse_uuid, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const TRANSLATION_SELECT_SQL: &str = "SELECT
    id,
    original_story_id,
    assigned_to_id,
    target_language,
    status,
    translated_story_id,
    version,
    created_at,
    updated_at
FROM translations";

/// Query options for listing translations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationListQuery {
    pub original_story_id: Option<StoryId>,
    pub assigned_to_id: Option<UserId>,
    pub status: Option<TranslationStatus>,
    /// Excludes `REJECTED` and `PUBLISHED` rows.
    pub open_only: bool,
}

pub trait TranslationRepository {
    fn create_translation(&self, translation: &Translation) -> RepoResult<TranslationId>;
    fn get_translation(&self, id: TranslationId) -> RepoResult<Option<Translation>>;
    /// Returns the non-rejected translation for `(story, language)`, if any.
    fn find_active(
        &self,
        story_id: StoryId,
        language: Language,
    ) -> RepoResult<Option<Translation>>;
    fn list_translations(&self, query: &TranslationListQuery) -> RepoResult<Vec<Translation>>;
    /// Writes `translation` if the stored version still matches. Returns the
    /// new version.
    fn update_translation(&self, translation: &Translation) -> RepoResult<i64>;
    /// Lists translations whose source or materialized story is `story_id`.
    fn list_referencing_story(&self, story_id: StoryId) -> RepoResult<Vec<Translation>>;
    /// Clears every reference to `story_id`. Returns affected rows.
    fn orphan_story_references(&self, story_id: StoryId, now_ms: i64) -> RepoResult<usize>;
    /// Deletes every translation referencing `story_id`. Returns affected rows.
    fn delete_referencing_story(&self, story_id: StoryId) -> RepoResult<usize>;
}

pub struct SqliteTranslationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTranslationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["translations", "stories"])?;
        Ok(Self { conn })
    }
}

impl TranslationRepository for SqliteTranslationRepository<'_> {
    fn create_translation(&self, translation: &Translation) -> RepoResult<TranslationId> {
        validate_translation(translation)?;
        self.conn.execute(
            "INSERT INTO translations (
                id,
                original_story_id,
                assigned_to_id,
                target_language,
                status,
                translated_story_id,
                version,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                translation.id.to_string(),
                translation.original_story_id.map(|id| id.to_string()),
                translation.assigned_to_id.to_string(),
                translation.target_language.as_str(),
                translation.status.as_str(),
                translation.translated_story_id.map(|id| id.to_string()),
                translation.version,
                translation.created_at,
                translation.updated_at,
            ],
        )?;
        Ok(translation.id)
    }

    fn get_translation(&self, id: TranslationId) -> RepoResult<Option<Translation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRANSLATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_translation_row(row)?));
        }
        Ok(None)
    }

    fn find_active(
        &self,
        story_id: StoryId,
        language: Language,
    ) -> RepoResult<Option<Translation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRANSLATION_SELECT_SQL}
             WHERE original_story_id = ?1
               AND target_language = ?2
               AND status <> 'REJECTED'
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![story_id.to_string(), language.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_translation_row(row)?));
        }
        Ok(None)
    }

    fn list_translations(&self, query: &TranslationListQuery) -> RepoResult<Vec<Translation>> {
        let mut sql = format!("{TRANSLATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(story_id) = query.original_story_id {
            sql.push_str(" AND original_story_id = ?");
            bind_values.push(Value::Text(story_id.to_string()));
        }
        if let Some(assignee) = query.assigned_to_id {
            sql.push_str(" AND assigned_to_id = ?");
            bind_values.push(Value::Text(assignee.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if query.open_only {
            sql.push_str(" AND status NOT IN ('REJECTED', 'PUBLISHED')");
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut translations = Vec::new();
        while let Some(row) = rows.next()? {
            translations.push(parse_translation_row(row)?);
        }
        Ok(translations)
    }

    fn update_translation(&self, translation: &Translation) -> RepoResult<i64> {
        validate_translation(translation)?;
        let next_version = translation.version + 1;
        let changed = self.conn.execute(
            "UPDATE translations
             SET
                original_story_id = ?1,
                assigned_to_id = ?2,
                status = ?3,
                translated_story_id = ?4,
                version = ?5,
                updated_at = ?6
             WHERE id = ?7
               AND version = ?8;",
            params![
                translation.original_story_id.map(|id| id.to_string()),
                translation.assigned_to_id.to_string(),
                translation.status.as_str(),
                translation.translated_story_id.map(|id| id.to_string()),
                next_version,
                translation.updated_at,
                translation.id.to_string(),
                translation.version,
            ],
        )?;

        if changed == 0 {
            let exists = self
                .conn
                .query_row(
                    "SELECT 1 FROM translations WHERE id = ?1;",
                    [translation.id.to_string()],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            return Err(match exists {
                Some(_) => RepoError::VersionConflict {
                    entity: EntityKind::Translation,
                    id: translation.id,
                    expected: translation.version,
                },
                None => RepoError::NotFound(EntityKind::Translation, translation.id),
            });
        }
        Ok(next_version)
    }

    fn list_referencing_story(&self, story_id: StoryId) -> RepoResult<Vec<Translation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRANSLATION_SELECT_SQL}
             WHERE original_story_id = ?1
                OR translated_story_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([story_id.to_string()])?;
        let mut translations = Vec::new();
        while let Some(row) = rows.next()? {
            translations.push(parse_translation_row(row)?);
        }
        Ok(translations)
    }

    fn orphan_story_references(&self, story_id: StoryId, now_ms: i64) -> RepoResult<usize> {
        let id = story_id.to_string();
        let changed = self.conn.execute(
            "UPDATE translations
             SET
                original_story_id = CASE WHEN original_story_id = ?1 THEN NULL ELSE original_story_id END,
                translated_story_id = CASE WHEN translated_story_id = ?1 THEN NULL ELSE translated_story_id END,
                version = version + 1,
                updated_at = ?2
             WHERE original_story_id = ?1
                OR translated_story_id = ?1;",
            params![id, now_ms],
        )?;
        Ok(changed)
    }

    fn delete_referencing_story(&self, story_id: StoryId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM translations
             WHERE original_story_id = ?1
                OR translated_story_id = ?1;",
            [story_id.to_string()],
        )?;
        Ok(changed)
    }
}

fn validate_translation(translation: &Translation) -> RepoResult<()> {
    if translation.status == TranslationStatus::Published
        && translation.translated_story_id.is_none()
    {
        return Err(RepoError::InvalidData(format!(
            "published translation {} has no translated story",
            translation.id
        )));
    }
    Ok(())
}

fn parse_translation_row(row: &Row<'_>) -> RepoResult<Translation> {
    let id_text: String = row.get("id")?;
    let assignee_text: String = row.get("assigned_to_id")?;
    let language_text: String = row.get("target_language")?;
    let status_text: String = row.get("status")?;

    Ok(Translation {
        id: parse_uuid(&id_text, "translations.id")?,
        original_story_id: parse_optional_uuid(
            row.get("original_story_id")?,
            "translations.original_story_id",
        )?,
        assigned_to_id: parse_uuid(&assignee_text, "translations.assigned_to_id")?,
        target_language: parse_enum(
            &language_text,
            "translations.target_language",
            Language::parse,
        )?,
        status: parse_enum(&status_text, "translations.status", TranslationStatus::parse)?,
        translated_story_id: parse_optional_uuid(
            row.get("translated_story_id")?,
            "translations.translated_story_id",
        )?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
