//! Course aggregate model.
//!
//! # Responsibility
//! - Define the course record and its denormalized roster snapshot.
//!
//! # Invariants
//! - `course_code` is the unique, non-blank course key.
//! - The roster is a point-in-time copy replaced wholesale, never merged.
//! - `faculty_id` is a weak reference; the course never owns the faculty.

use crate::model::roster::FacultyId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Denormalized student snapshot stored with a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub enrollment_number: String,
    pub name: String,
    pub email: String,
    pub batch: String,
}

/// Course record with its current roster snapshot.
///
/// Sessions are loaded separately through the session repository so that
/// writes stay scoped to one session at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_code: String,
    pub course_name: String,
    pub faculty_id: Option<FacultyId>,
    pub roster: Vec<RosterEntry>,
}

impl Course {
    /// Creates an unassigned course with an empty roster.
    pub fn new(course_code: impl Into<String>, course_name: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into().trim().to_string(),
            course_name: course_name.into().trim().to_string(),
            faculty_id: None,
            roster: Vec::new(),
        }
    }

    pub fn roster_entry(&self, enrollment_number: &str) -> Option<&RosterEntry> {
        self.roster
            .iter()
            .find(|entry| entry.enrollment_number == enrollment_number)
    }

    pub fn validate(&self) -> Result<(), CourseValidationError> {
        if self.course_code.trim().is_empty() {
            return Err(CourseValidationError::BlankCourseCode);
        }
        if self.course_name.trim().is_empty() {
            return Err(CourseValidationError::BlankCourseName);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseValidationError {
    BlankCourseCode,
    BlankCourseName,
}

impl CourseValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BlankCourseCode => "blank_course_code",
            Self::BlankCourseName => "blank_course_name",
        }
    }
}

impl Display for CourseValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankCourseCode => write!(f, "course code must not be blank"),
            Self::BlankCourseName => write!(f, "course name must not be blank"),
        }
    }
}

impl Error for CourseValidationError {}
