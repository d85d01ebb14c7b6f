//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for rosters, courses
//!   and attendance sessions.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (course/session not found,
//!   duplicate course or email) in addition to DB transport errors.
//! - Session writes mutate one session row and its entry rows; no write
//!   rewrites a whole course.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::roster::FacultyId;
use crate::model::session::SessionDate;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod course_repo;
pub mod roster_repo;
pub mod session_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level error shared by all ledger repositories.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    CourseNotFound(String),
    SessionNotFound {
        course_code: String,
        date: SessionDate,
    },
    FacultyNotFound(FacultyId),
    /// Course code already taken.
    DuplicateCourse(String),
    /// Email already registered to another student or faculty record.
    DuplicateEmail(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::CourseNotFound(code) => write!(f, "course not found: {code}"),
            Self::SessionNotFound { course_code, date } => {
                write!(f, "no attendance session for {course_code} on {date}")
            }
            Self::FacultyNotFound(id) => write!(f, "faculty not found: {id}"),
            Self::DuplicateCourse(code) => write!(f, "course already exists: {code}"),
            Self::DuplicateEmail(email) => write!(f, "email already registered: {email}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "ledger repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "ledger repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted ledger data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Verifies a connection is migrated and carries the given tables.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

/// Returns whether a course row exists.
pub(crate) fn course_exists(conn: &Connection, course_code: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM courses WHERE course_code = ?1);",
        [course_code],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn ensure_course_exists(conn: &Connection, course_code: &str) -> RepoResult<()> {
    if course_exists(conn, course_code)? {
        Ok(())
    } else {
        Err(RepoError::CourseNotFound(course_code.to_string()))
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
