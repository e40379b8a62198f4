//! Append-only audit log repository.
//!
//! # Invariants
//! - The trait exposes no update or delete path.
//! - The schema triggers abort any UPDATE/DELETE on `audit_log`.
//! - Append runs on the caller's connection so it joins the caller's
//!   transaction.

use crate::model::audit::{AuditLogEntry, AuditPayload, NewAuditEntry};
use crate::model::task::ContentType;
use crate::model::user::UserId;
use crate::repo::error::{ensure_connection_ready, parse_enum, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

pub trait AuditRepository {
    /// Appends one entry and returns its sequence id.
    fn append(&self, entry: &NewAuditEntry) -> RepoResult<i64>;
    /// Entries for one target, oldest first.
    fn list_for_target(&self, target_type: ContentType, target_id: Uuid)
        -> RepoResult<Vec<AuditLogEntry>>;
    /// Entries written by one user, newest first.
    fn list_by_user(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<AuditLogEntry>>;
}

pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["audit_log"])?;
        Ok(Self { conn })
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn append(&self, entry: &NewAuditEntry) -> RepoResult<i64> {
        let metadata = serde_json::to_string(&entry.payload).map_err(|err| {
            RepoError::InvalidData(format!("audit payload failed to serialize: {err}"))
        })?;
        self.conn.execute(
            "INSERT INTO audit_log (
                user_id,
                action,
                target_type,
                target_id,
                metadata,
                timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                entry.user_id.to_string(),
                entry.payload.action(),
                entry.target_type.as_str(),
                entry.target_id.to_string(),
                metadata,
                entry.timestamp,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_for_target(
        &self,
        target_type: ContentType,
        target_id: Uuid,
    ) -> RepoResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, action, target_type, target_id, metadata, timestamp
             FROM audit_log
             WHERE target_type = ?1
               AND target_id = ?2
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query(params![target_type.as_str(), target_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }

    fn list_by_user(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, action, target_type, target_id, metadata, timestamp
             FROM audit_log
             WHERE user_id = ?1
             ORDER BY id DESC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![user_id.to_string(), i64::from(limit)])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditLogEntry> {
    let user_text: String = row.get("user_id")?;
    let target_type_text: String = row.get("target_type")?;
    let target_text: String = row.get("target_id")?;
    let metadata: String = row.get("metadata")?;
    let action: String = row.get("action")?;

    let payload: AuditPayload = serde_json::from_str(&metadata).map_err(|err| {
        RepoError::InvalidData(format!("invalid audit_log.metadata payload: {err}"))
    })?;
    if payload.action() != action {
        return Err(RepoError::InvalidData(format!(
            "audit_log.action `{action}` does not match payload kind `{}`",
            payload.action()
        )));
    }

    Ok(AuditLogEntry {
        id: row.get("id")?,
        user_id: parse_uuid(&user_text, "audit_log.user_id")?,
        action,
        target_type: parse_enum(&target_type_text, "audit_log.target_type", ContentType::parse)?,
        target_id: parse_uuid(&target_text, "audit_log.target_id")?,
        payload,
        timestamp: row.get("timestamp")?,
    })
}
