//! User repository contracts and SQLite implementation.
//!
//! Accounts are owned by the external identity system; the engine only
//! mirrors them. `upsert_user` is the provisioning path.

use crate::model::user::{Language, StaffRole, User, UserId, UserType};
use crate::repo::error::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_enum, parse_uuid, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    display_name,
    user_type,
    role,
    translation_language,
    is_active
FROM users";

/// Repository interface for user lookups.
pub trait UserRepository {
    fn upsert_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Lists active staff, optionally restricted to one role.
    fn list_active_staff(&self, role: Option<StaffRole>) -> RepoResult<Vec<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn upsert_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        self.conn.execute(
            "INSERT INTO users (
                id,
                display_name,
                user_type,
                role,
                translation_language,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                user_type = excluded.user_type,
                role = excluded.role,
                translation_language = excluded.translation_language,
                is_active = excluded.is_active;",
            params![
                user.id.to_string(),
                user.display_name.as_str(),
                user.user_type.as_str(),
                user.role.map(StaffRole::as_str),
                user.translation_language.map(Language::as_str),
                bool_to_int(user.is_active),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let raw = stmt
            .query_row([id.to_string()], RawUser::from_row)
            .optional()?;
        raw.map(RawUser::into_user).transpose()
    }

    fn list_active_staff(&self, role: Option<StaffRole>) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}
             WHERE user_type = 'STAFF'
               AND is_active = 1
               AND (?1 IS NULL OR role = ?1)
             ORDER BY display_name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([role.map(StaffRole::as_str)])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(RawUser::from_row(row)?.into_user()?);
        }
        Ok(users)
    }
}

struct RawUser {
    id: String,
    display_name: String,
    user_type: String,
    role: Option<String>,
    translation_language: Option<String>,
    is_active: i64,
}

impl RawUser {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            display_name: row.get("display_name")?,
            user_type: row.get("user_type")?,
            role: row.get("role")?,
            translation_language: row.get("translation_language")?,
            is_active: row.get("is_active")?,
        })
    }

    fn into_user(self) -> RepoResult<User> {
        let user = User {
            id: parse_uuid(&self.id, "users.id")?,
            display_name: self.display_name,
            user_type: parse_enum(&self.user_type, "users.user_type", UserType::parse)?,
            role: self
                .role
                .map(|value| parse_enum(&value, "users.role", StaffRole::parse))
                .transpose()?,
            translation_language: self
                .translation_language
                .map(|value| parse_enum(&value, "users.translation_language", Language::parse))
                .transpose()?,
            is_active: parse_bool(self.is_active, "users.is_active")?,
        };
        user.validate()?;
        Ok(user)
    }
}
