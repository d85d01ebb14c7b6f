//! Attendance aggregation engine.
//!
//! # Responsibility
//! - Derive per-student and per-course attendance statistics from sessions.
//! - Provide roll-ups across courses for student and faculty views.
//!
//! # Invariants
//! - A session without an entry for a student contributes nothing to that
//!   student's numerator or denominator.
//! - `percentage` is `None` when no session recorded the student.
//! - Results depend only on session contents, never on iteration order.
//! - Percentages round half-up; ranking compares exact ratios.

use crate::error::LedgerError;
use crate::model::course::Course;
use crate::model::roster::FacultyId;
use crate::model::session::{AttendanceSession, DateWindow, SessionDate, SessionValidationError};
use crate::repo::course_repo::CourseRepository;
use crate::repo::session_repo::SessionRepository;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Which students a course summary covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Everyone with at least one entry, plus current roster members.
    #[default]
    AllHistorical,
    /// Current roster members only.
    CurrentRoster,
}

/// Options shared by course-level aggregation calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationQuery {
    pub mode: AggregationMode,
    pub window: DateWindow,
    /// Keep only students with a defined percentage at or above this value.
    pub min_percentage: Option<u32>,
}

/// Attendance statistics for one student in one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub enrollment_number: String,
    pub name: Option<String>,
    pub on_roster: bool,
    pub sessions_counted: u32,
    pub units_attended: u64,
    pub units_possible: u64,
    /// Rounded whole percent; `None` means no recorded sessions.
    pub percentage: Option<u32>,
}

impl StudentSummary {
    /// Full-precision attendance ratio in `0.0..=1.0`.
    pub fn ratio(&self) -> Option<f64> {
        (self.units_possible > 0).then(|| self.units_attended as f64 / self.units_possible as f64)
    }
}

/// Attendance statistics for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_code: String,
    pub course_name: String,
    pub mode: AggregationMode,
    pub sessions_held: u32,
    pub units_offered: u64,
    /// Sorted by enrollment number.
    pub students: Vec<StudentSummary>,
}

impl CourseSummary {
    /// Students ordered by attendance ratio descending.
    ///
    /// Ties break on enrollment number; students without data come last.
    pub fn ranked(&self) -> Vec<&StudentSummary> {
        let mut ranked: Vec<&StudentSummary> = self.students.iter().collect();
        ranked.sort_by(|left, right| {
            compare_ratio_desc(left, right)
                .then_with(|| left.enrollment_number.cmp(&right.enrollment_number))
        });
        ranked
    }
}

/// One session as seen by one student (report/export row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSessionRecord {
    pub date: SessionDate,
    pub class_duration: u32,
    pub total_presents: u32,
}

/// Student summary tagged with its course, for cross-course views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseSummary {
    pub course_code: String,
    pub course_name: String,
    /// Course-level totals over the same window, for every student.
    pub sessions_held: u32,
    pub units_offered: u64,
    pub summary: StudentSummary,
}

/// Use-case service for attendance aggregation.
pub struct AggregationService<C: CourseRepository, S: SessionRepository> {
    courses: C,
    sessions: S,
}

impl<C: CourseRepository, S: SessionRepository> AggregationService<C, S> {
    pub fn new(courses: C, sessions: S) -> Self {
        Self { courses, sessions }
    }

    /// Summarizes one student's attendance in one course.
    pub fn compute_student_summary(
        &self,
        course_code: &str,
        enrollment_number: &str,
        window: &DateWindow,
    ) -> Result<StudentSummary, LedgerError> {
        let enrollment_number = require_enrollment(enrollment_number)?;
        window.validate()?;
        let course = self.load_course(course_code)?;
        let sessions = self.sessions.list_sessions(&course.course_code)?;
        Ok(summarize_student(&course, &sessions, enrollment_number, window))
    }

    /// Summarizes every student of one course.
    pub fn compute_course_summary(
        &self,
        course_code: &str,
        query: &AggregationQuery,
    ) -> Result<CourseSummary, LedgerError> {
        query.window.validate()?;
        let course = self.load_course(course_code)?;
        let sessions = self.sessions.list_sessions(&course.course_code)?;
        Ok(summarize_course(&course, &sessions, query))
    }

    /// Lists per-session rows for one student, date ascending.
    ///
    /// Sessions without an entry for the student are omitted.
    pub fn student_records(
        &self,
        course_code: &str,
        enrollment_number: &str,
        window: &DateWindow,
    ) -> Result<Vec<StudentSessionRecord>, LedgerError> {
        let enrollment_number = require_enrollment(enrollment_number)?;
        window.validate()?;
        let course = self.load_course(course_code)?;
        let sessions = self.sessions.list_sessions(&course.course_code)?;

        Ok(sessions
            .iter()
            .filter(|session| window.contains(session.date))
            .filter_map(|session| {
                session
                    .entry(enrollment_number)
                    .map(|entry| StudentSessionRecord {
                        date: session.date,
                        class_duration: session.class_duration_units,
                        total_presents: entry.present_units,
                    })
            })
            .collect())
    }

    /// Per-course summaries for one student across every course that lists
    /// them on the roster or holds entries for them.
    pub fn student_rollup(
        &self,
        enrollment_number: &str,
        window: &DateWindow,
    ) -> Result<Vec<StudentCourseSummary>, LedgerError> {
        let enrollment_number = require_enrollment(enrollment_number)?;
        window.validate()?;

        let mut course_codes: BTreeSet<String> = self
            .courses
            .list_courses_for_student(enrollment_number)?
            .into_iter()
            .map(|course| course.course_code)
            .collect();
        course_codes.extend(self.sessions.course_codes_with_entries_for(enrollment_number)?);

        let mut rollup = Vec::with_capacity(course_codes.len());
        for course_code in course_codes {
            let course = self.load_course(&course_code)?;
            let sessions = self.sessions.list_sessions(&course_code)?;
            let (sessions_held, units_offered) = course_totals(&sessions, window);
            rollup.push(StudentCourseSummary {
                sessions_held,
                units_offered,
                summary: summarize_student(&course, &sessions, enrollment_number, window),
                course_code: course.course_code,
                course_name: course.course_name,
            });
        }
        Ok(rollup)
    }

    /// Course summaries for every course assigned to a faculty member.
    pub fn faculty_rollup(
        &self,
        faculty_id: FacultyId,
        query: &AggregationQuery,
    ) -> Result<Vec<CourseSummary>, LedgerError> {
        query.window.validate()?;
        let courses = self.courses.list_courses_for_faculty(faculty_id)?;
        let mut rollup = Vec::with_capacity(courses.len());
        for course in courses {
            let sessions = self.sessions.list_sessions(&course.course_code)?;
            rollup.push(summarize_course(&course, &sessions, query));
        }
        Ok(rollup)
    }

    fn load_course(&self, course_code: &str) -> Result<Course, LedgerError> {
        let course_code = course_code.trim();
        self.courses
            .get_course(course_code)?
            .ok_or_else(|| LedgerError::CourseNotFound(course_code.to_string()))
    }
}

#[derive(Debug, Default)]
struct Tally {
    sessions_counted: u32,
    units_attended: u64,
    units_possible: u64,
    latest_name: Option<(SessionDate, String)>,
}

impl Tally {
    fn record(&mut self, date: SessionDate, class_duration_units: u32, present_units: u32, name: &str) {
        self.sessions_counted += 1;
        self.units_attended += u64::from(present_units);
        self.units_possible += u64::from(class_duration_units);
        if !name.is_empty() && self.latest_name.as_ref().map_or(true, |(seen, _)| date >= *seen) {
            self.latest_name = Some((date, name.to_string()));
        }
    }
}

/// Rounds `100 × attended / possible` half-up; `None` when nothing is possible.
pub fn round_half_up_percent(units_attended: u64, units_possible: u64) -> Option<u32> {
    if units_possible == 0 {
        return None;
    }
    let attended = u128::from(units_attended);
    let possible = u128::from(units_possible);
    let rounded = (200 * attended + possible) / (2 * possible);
    Some(u32::try_from(rounded).unwrap_or(u32::MAX))
}

/// Summarizes one student against an already-loaded session set.
pub fn summarize_student(
    course: &Course,
    sessions: &[AttendanceSession],
    enrollment_number: &str,
    window: &DateWindow,
) -> StudentSummary {
    let mut tally = Tally::default();
    for session in sessions.iter().filter(|session| window.contains(session.date)) {
        if let Some(entry) = session.entry(enrollment_number) {
            tally.record(
                session.date,
                session.class_duration_units,
                entry.present_units,
                &entry.name,
            );
        }
    }
    finish_summary(course, enrollment_number, tally)
}

/// Summarizes a whole course against an already-loaded session set.
pub fn summarize_course(
    course: &Course,
    sessions: &[AttendanceSession],
    query: &AggregationQuery,
) -> CourseSummary {
    let (sessions_held, units_offered) = course_totals(sessions, &query.window);
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

    for session in sessions.iter().filter(|session| query.window.contains(session.date)) {
        for entry in &session.entries {
            tallies.entry(entry.enrollment_number.as_str()).or_default().record(
                session.date,
                session.class_duration_units,
                entry.present_units,
                &entry.name,
            );
        }
    }

    let mut covered: BTreeSet<&str> = course
        .roster
        .iter()
        .map(|entry| entry.enrollment_number.as_str())
        .collect();
    if query.mode == AggregationMode::AllHistorical {
        covered.extend(tallies.keys().copied());
    }

    let students = covered
        .into_iter()
        .map(|enrollment_number| {
            let tally = tallies.remove(enrollment_number).unwrap_or_default();
            finish_summary(course, enrollment_number, tally)
        })
        .filter(|summary| match query.min_percentage {
            Some(threshold) => summary.percentage.is_some_and(|value| value >= threshold),
            None => true,
        })
        .collect();

    CourseSummary {
        course_code: course.course_code.clone(),
        course_name: course.course_name.clone(),
        mode: query.mode,
        sessions_held,
        units_offered,
        students,
    }
}

/// Sessions held and units offered inside the window.
fn course_totals(sessions: &[AttendanceSession], window: &DateWindow) -> (u32, u64) {
    sessions
        .iter()
        .filter(|session| window.contains(session.date))
        .fold((0, 0), |(held, offered), session| {
            (held + 1, offered + u64::from(session.class_duration_units))
        })
}

fn finish_summary(course: &Course, enrollment_number: &str, tally: Tally) -> StudentSummary {
    let roster_entry = course.roster_entry(enrollment_number);
    let name = roster_entry
        .map(|entry| entry.name.clone())
        .filter(|name| !name.is_empty())
        .or_else(|| tally.latest_name.map(|(_, name)| name));

    StudentSummary {
        enrollment_number: enrollment_number.to_string(),
        name,
        on_roster: roster_entry.is_some(),
        sessions_counted: tally.sessions_counted,
        units_attended: tally.units_attended,
        units_possible: tally.units_possible,
        percentage: round_half_up_percent(tally.units_attended, tally.units_possible),
    }
}

fn compare_ratio_desc(left: &StudentSummary, right: &StudentSummary) -> Ordering {
    match (left.units_possible, right.units_possible) {
        (0, 0) => Ordering::Equal,
        (0, _) => Ordering::Greater,
        (_, 0) => Ordering::Less,
        (left_possible, right_possible) => {
            let left_scaled = u128::from(left.units_attended) * u128::from(right_possible);
            let right_scaled = u128::from(right.units_attended) * u128::from(left_possible);
            right_scaled.cmp(&left_scaled)
        }
    }
}

fn require_enrollment(enrollment_number: &str) -> Result<&str, LedgerError> {
    let trimmed = enrollment_number.trim();
    if trimmed.is_empty() {
        Err(SessionValidationError::BlankEnrollmentNumber.into())
    } else {
        Ok(trimmed)
    }
}
