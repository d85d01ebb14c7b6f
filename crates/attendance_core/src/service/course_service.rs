//! Course administration use-cases.
//!
//! # Responsibility
//! - Create, inspect, rename and delete courses.
//! - Assign faculty and replace roster snapshots from roster lookups.
//!
//! # Invariants
//! - Roster selection replaces the snapshot wholesale (never merges).
//! - Roster changes never touch recorded session entries.

use crate::error::LedgerError;
use crate::model::course::{Course, RosterEntry};
use crate::model::roster::FacultyId;
use crate::repo::course_repo::CourseRepository;
use crate::repo::roster_repo::RosterRepository;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of a roster selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSelection {
    /// New roster snapshot, in enrollment order.
    pub roster: Vec<RosterEntry>,
    /// Requested enrollment numbers unknown to the roster store.
    pub missing: Vec<String>,
}

/// Use-case service for course records.
pub struct CourseService<C: CourseRepository, R: RosterRepository> {
    courses: C,
    roster: R,
}

impl<C: CourseRepository, R: RosterRepository> CourseService<C, R> {
    pub fn new(courses: C, roster: R) -> Self {
        Self { courses, roster }
    }

    /// Creates an empty course with no faculty.
    pub fn create_course(&self, course_code: &str, course_name: &str) -> Result<Course, LedgerError> {
        let course = Course::new(course_code, course_name);
        course.validate()?;
        self.courses.create_course(&course)?;
        info!(
            "event=course_create module=ledger status=ok course_code={}",
            course.course_code
        );
        Ok(course)
    }

    pub fn get_course(&self, course_code: &str) -> Result<Course, LedgerError> {
        let course_code = course_code.trim();
        self.courses
            .get_course(course_code)?
            .ok_or_else(|| LedgerError::CourseNotFound(course_code.to_string()))
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, LedgerError> {
        Ok(self.courses.list_courses()?)
    }

    /// Changes a course's code and name; roster and sessions follow the
    /// new code.
    pub fn update_course(
        &self,
        course_code: &str,
        new_course_code: &str,
        new_course_name: &str,
    ) -> Result<Course, LedgerError> {
        let course_code = course_code.trim();
        let renamed = Course::new(new_course_code, new_course_name);
        renamed.validate()?;
        self.courses.update_course(course_code, &renamed)?;
        info!(
            "event=course_update module=ledger status=ok course_code={} new_course_code={}",
            course_code, renamed.course_code
        );
        self.get_course(&renamed.course_code)
    }

    /// Deletes a course together with its roster and every session.
    pub fn delete_course(&self, course_code: &str) -> Result<(), LedgerError> {
        let course_code = course_code.trim();
        self.courses.delete_course(course_code)?;
        info!("event=course_delete module=ledger status=ok course_code={course_code}");
        Ok(())
    }

    pub fn assign_faculty(
        &self,
        course_code: &str,
        faculty_id: FacultyId,
    ) -> Result<Course, LedgerError> {
        let course_code = course_code.trim();
        self.courses.assign_faculty(course_code, faculty_id)?;
        info!("event=course_assign_faculty module=ledger status=ok course_code={course_code}");
        self.get_course(course_code)
    }

    /// Replaces the roster snapshot with the selected students.
    ///
    /// Unknown enrollment numbers are skipped and reported in
    /// `RosterSelection::missing`.
    pub fn select_students(
        &self,
        course_code: &str,
        enrollment_numbers: &[String],
    ) -> Result<RosterSelection, LedgerError> {
        let course_code = course_code.trim();
        let requested: BTreeSet<String> = enrollment_numbers
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Err(LedgerError::EmptyStudentSelection);
        }

        let students = self.roster.find_students_by_enrollment(&requested)?;
        let found: BTreeSet<&str> = students
            .iter()
            .map(|student| student.enrollment_number.as_str())
            .collect();
        let missing: Vec<String> = requested
            .iter()
            .filter(|value| !found.contains(value.as_str()))
            .cloned()
            .collect();
        let roster: Vec<RosterEntry> = students.iter().map(|student| student.to_roster_entry()).collect();

        self.courses.replace_roster(course_code, &roster)?;
        info!(
            "event=roster_replace module=ledger status=ok course_code={} selected={} missing={}",
            course_code,
            roster.len(),
            missing.len()
        );
        Ok(RosterSelection { roster, missing })
    }

    pub fn courses_for_faculty(&self, faculty_id: FacultyId) -> Result<Vec<Course>, LedgerError> {
        Ok(self.courses.list_courses_for_faculty(faculty_id)?)
    }

    /// Courses whose current roster lists the student.
    pub fn courses_for_student(&self, enrollment_number: &str) -> Result<Vec<Course>, LedgerError> {
        Ok(self
            .courses
            .list_courses_for_student(enrollment_number.trim())?)
    }
}
