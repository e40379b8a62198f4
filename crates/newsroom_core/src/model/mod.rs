//! Editorial domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the workflow engine.
//! - Keep wire/storage names for enums in one place (`as_str`/`parse`).
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Timestamps are Unix epoch milliseconds.

pub mod audit;
pub mod story;
pub mod task;
pub mod translation;
pub mod user;
pub mod workflow;
