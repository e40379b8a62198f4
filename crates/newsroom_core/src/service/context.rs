//! Explicit engine handle and write-transaction scope.
//!
//! # Responsibility
//! - Carry the connection and clock into every service call.
//! - Run each mutation inside one `BEGIN IMMEDIATE` transaction together
//!   with its audit record.
//!
//! # Invariants
//! - Nothing commits unless the whole closure succeeds.
//! - Repositories built from a [`WriteScope`] share its transaction.

use crate::model::audit::{AuditPayload, NewAuditEntry};
use crate::model::task::ContentType;
use crate::model::user::UserId;
use crate::repo::audit_repo::{AuditRepository, SqliteAuditRepository};
use crate::repo::story_repo::SqliteStoryRepository;
use crate::repo::task_repo::SqliteTaskRepository;
use crate::repo::translation_repo::SqliteTranslationRepository;
use crate::repo::user_repo::SqliteUserRepository;
use crate::service::error::{EngineError, EngineResult};
use chrono::Utc;
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock {
    now_ms: AtomicI64,
}

impl FixedClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Handle threaded through every service call.
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
}

impl<'a> EngineContext<'a> {
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock) -> Self {
        Self { conn, clock }
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Runs `op` inside one immediate write transaction.
    ///
    /// The transaction rolls back when `op` fails or when commit fails.
    pub fn write<T>(
        &self,
        op_name: &'static str,
        op: impl FnOnce(&WriteScope<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let scope = WriteScope {
            conn: &tx,
            now_ms: self.clock.now_ms(),
        };
        let value = match op(&scope) {
            Ok(value) => value,
            Err(err) => {
                debug!(
                    "event=write_tx module=service status=rollback op={} error_code={}",
                    op_name,
                    err.code()
                );
                return Err(err);
            }
        };
        if let Err(err) = tx.commit() {
            warn!(
                "event=write_tx module=service status=error op={} error_code=commit_failed error={}",
                op_name, err
            );
            return Err(err.into());
        }
        Ok(value)
    }

    pub fn users(&self) -> EngineResult<SqliteUserRepository<'a>> {
        Ok(SqliteUserRepository::try_new(self.conn)?)
    }

    pub fn stories(&self) -> EngineResult<SqliteStoryRepository<'a>> {
        Ok(SqliteStoryRepository::try_new(self.conn)?)
    }

    pub fn translations(&self) -> EngineResult<SqliteTranslationRepository<'a>> {
        Ok(SqliteTranslationRepository::try_new(self.conn)?)
    }

    pub fn tasks(&self) -> EngineResult<SqliteTaskRepository<'a>> {
        Ok(SqliteTaskRepository::try_new(self.conn)?)
    }

    pub fn audit(&self) -> EngineResult<SqliteAuditRepository<'a>> {
        Ok(SqliteAuditRepository::try_new(self.conn)?)
    }
}

/// Repositories and timestamp bound to one open write transaction.
pub struct WriteScope<'tx> {
    conn: &'tx Connection,
    now_ms: i64,
}

impl<'tx> WriteScope<'tx> {
    /// Timestamp stamped on every row touched by this transaction.
    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn conn(&self) -> &'tx Connection {
        self.conn
    }

    pub fn users(&self) -> EngineResult<SqliteUserRepository<'tx>> {
        Ok(SqliteUserRepository::try_new(self.conn)?)
    }

    pub fn stories(&self) -> EngineResult<SqliteStoryRepository<'tx>> {
        Ok(SqliteStoryRepository::try_new(self.conn)?)
    }

    pub fn translations(&self) -> EngineResult<SqliteTranslationRepository<'tx>> {
        Ok(SqliteTranslationRepository::try_new(self.conn)?)
    }

    pub fn tasks(&self) -> EngineResult<SqliteTaskRepository<'tx>> {
        Ok(SqliteTaskRepository::try_new(self.conn)?)
    }

    /// Appends the audit record for this mutation. A failure here fails the
    /// whole transaction.
    pub fn record(
        &self,
        user_id: UserId,
        target_type: ContentType,
        target_id: Uuid,
        payload: AuditPayload,
    ) -> EngineResult<i64> {
        let repo = SqliteAuditRepository::try_new(self.conn)?;
        let entry = NewAuditEntry {
            user_id,
            target_type,
            target_id,
            payload,
            timestamp: self.now_ms,
        };
        repo.append(&entry).map_err(EngineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, EngineContext, FixedClock};
    use crate::db::open_db_in_memory;
    use crate::service::error::{EngineError, EngineErrorKind};

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 150);
        clock.set(7);
        assert_eq!(clock.now_ms(), 7);
    }

    #[test]
    fn failed_write_rolls_back() {
        let conn = open_db_in_memory().expect("open db");
        let clock = FixedClock::new(1);
        let ctx = EngineContext::new(&conn, &clock);

        let result: Result<(), EngineError> = ctx.write("test", |scope| {
            scope.conn().execute(
                "INSERT INTO users (id, display_name, user_type, role, is_active)
                 VALUES ('u1', 'Ayanda', 'STAFF', 'EDITOR', 1);",
                [],
            )?;
            Err(EngineError::InvalidInput("boom".to_string()))
        });
        assert_eq!(
            result.expect_err("closure error should propagate").kind(),
            EngineErrorKind::InvalidInput
        );

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
            .expect("count users");
        assert_eq!(count, 0);
    }
}
