//! Editorial content lifecycle engine.
//! Stage machine, role policy, assignment, translation forks and
//! work-queue projections over a SQLite store.

pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod projection;
pub mod repo;
pub mod service;
pub mod stage_machine;

pub use config::{ConfigError, EngineConfig};
pub use events::{EventSink, EventSinkError, LogEventSink, NoopEventSink, WorkflowEvent};
pub use logging::{default_log_level, init_from_settings, init_logging, logging_status};
pub use model::story::{NewStory, Story, StoryId, StoryStage};
pub use model::translation::{Translation, TranslationStatus};
pub use model::user::{Language, StaffRole, User, UserId};
pub use model::workflow::{AssignmentSlot, StageAction};
pub use pipeline::{Command, Engine, Middleware, Next, Outcome};
pub use repo::error::{RepoError, RepoResult};
pub use service::context::{Clock, EngineContext, FixedClock, SystemClock};
pub use service::error::{EngineError, EngineErrorKind, EngineResult};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
