//! Service-boundary error taxonomy.
//!
//! # Responsibility
//! - Collapse model/repository failures into the ledger's four categories.
//! - Give every failure an HTTP-equivalent status and a short
//!   machine-readable reason string for callers.
//!
//! # Invariants
//! - `reason()` values are stable snake_case identifiers.
//! - Storage failures never leak as `NotFound`/`Validation` and vice versa.

use crate::model::course::CourseValidationError;
use crate::model::roster::{FacultyId, RosterValidationError};
use crate::model::session::{SessionDate, SessionValidationError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP-equivalent status code.
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }
}

/// Error returned by every ledger service operation.
#[derive(Debug)]
pub enum LedgerError {
    CourseNotFound(String),
    SessionNotFound {
        course_code: String,
        date: SessionDate,
    },
    StudentNotFound(String),
    FacultyNotFound(String),
    InvalidSession(SessionValidationError),
    InvalidCourse(CourseValidationError),
    InvalidRoster(RosterValidationError),
    /// A roster selection named no students.
    EmptyStudentSelection,
    DuplicateCourse(String),
    /// Email already registered to another record.
    DuplicateEmail(String),
    /// Storage-layer failure.
    Repo(RepoError),
}

impl LedgerError {
    pub(crate) fn faculty_not_found(id: FacultyId) -> Self {
        Self::FacultyNotFound(id.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CourseNotFound(_)
            | Self::SessionNotFound { .. }
            | Self::StudentNotFound(_)
            | Self::FacultyNotFound(_) => ErrorKind::NotFound,
            Self::InvalidSession(SessionValidationError::PresenceOutOfRange { .. }) => {
                ErrorKind::Conflict
            }
            Self::InvalidSession(_)
            | Self::InvalidCourse(_)
            | Self::InvalidRoster(_)
            | Self::EmptyStudentSelection => ErrorKind::Validation,
            Self::DuplicateCourse(_) | Self::DuplicateEmail(_) => ErrorKind::Conflict,
            Self::Repo(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Short machine-readable reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CourseNotFound(_) => "course_not_found",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::StudentNotFound(_) => "student_not_found",
            Self::FacultyNotFound(_) => "faculty_not_found",
            Self::InvalidSession(err) => err.reason(),
            Self::InvalidCourse(err) => err.reason(),
            Self::InvalidRoster(err) => err.reason(),
            Self::EmptyStudentSelection => "empty_student_selection",
            Self::DuplicateCourse(_) => "duplicate_course",
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::Repo(_) => "storage_failure",
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CourseNotFound(code) => write!(f, "course not found: {code}"),
            Self::SessionNotFound { course_code, date } => {
                write!(f, "no attendance found for {course_code} on {date}")
            }
            Self::StudentNotFound(enrollment) => write!(f, "student not found: {enrollment}"),
            Self::FacultyNotFound(key) => write!(f, "faculty not found: {key}"),
            Self::InvalidSession(err) => write!(f, "{err}"),
            Self::InvalidCourse(err) => write!(f, "{err}"),
            Self::InvalidRoster(err) => write!(f, "{err}"),
            Self::EmptyStudentSelection => write!(f, "at least one student must be selected"),
            Self::DuplicateCourse(code) => write!(f, "course already exists: {code}"),
            Self::DuplicateEmail(email) => write!(f, "email already registered: {email}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSession(err) => Some(err),
            Self::InvalidCourse(err) => Some(err),
            Self::InvalidRoster(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::CourseNotFound(code) => Self::CourseNotFound(code),
            RepoError::SessionNotFound { course_code, date } => {
                Self::SessionNotFound { course_code, date }
            }
            RepoError::FacultyNotFound(id) => Self::faculty_not_found(id),
            RepoError::DuplicateCourse(code) => Self::DuplicateCourse(code),
            RepoError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            other => Self::Repo(other),
        }
    }
}

impl From<SessionValidationError> for LedgerError {
    fn from(value: SessionValidationError) -> Self {
        Self::InvalidSession(value)
    }
}

impl From<CourseValidationError> for LedgerError {
    fn from(value: CourseValidationError) -> Self {
        Self::InvalidCourse(value)
    }
}

impl From<RosterValidationError> for LedgerError {
    fn from(value: RosterValidationError) -> Self {
        Self::InvalidRoster(value)
    }
}
