//! Core attendance ledger.
//! This crate is the single source of truth for session storage and
//! attendance aggregation invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, LedgerConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_options, DbError, DbOptions};
pub use error::{ErrorKind, LedgerError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::course::{Course, RosterEntry};
pub use model::roster::{Faculty, FacultyId, Student};
pub use model::session::{
    AttendanceSession, DateWindow, HalfDayMarks, PresenceInput, PresencePolicy, SessionDate,
    SessionEntry,
};
pub use repo::course_repo::{CourseRepository, SqliteCourseRepository};
pub use repo::roster_repo::{RosterRepository, SqliteRosterRepository};
pub use repo::session_repo::{SessionRepository, SqliteSessionRepository};
pub use repo::{RepoError, RepoResult};
pub use service::aggregation_service::{
    AggregationMode, AggregationQuery, AggregationService, CourseSummary, StudentCourseSummary,
    StudentSessionRecord, StudentSummary,
};
pub use service::course_service::{CourseService, RosterSelection};
pub use service::query_context::{QueryContext, Requester, RequesterRole};
pub use service::roster_service::RosterService;
pub use service::session_service::{SessionService, UpsertSessionRequest};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
