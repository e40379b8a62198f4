//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from workflow orchestration.
//!
//! # Invariants
//! - Repositories never open transactions of their own; they run on the
//!   connection or transaction handed to them so a service can make a
//!   mutation and its audit record atomic.
//! - Repository APIs return semantic errors (`NotFound`, `VersionConflict`)
//!   in addition to DB transport errors.

pub mod audit_repo;
pub mod error;
pub mod story_repo;
pub mod task_repo;
pub mod translation_repo;
pub mod user_repo;
