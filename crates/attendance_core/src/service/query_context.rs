//! Payload handed to the natural-language query adapter.
//!
//! # Responsibility
//! - Bundle requester identity, the raw question and the relevant course
//!   summaries into one serializable document.
//!
//! # Invariants
//! - Only aggregated figures are included; no per-session rows or emails.

use crate::model::roster::{Faculty, Student};
use crate::service::aggregation_service::{CourseSummary, StudentCourseSummary};
use serde::{Deserialize, Serialize};

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Student,
    Faculty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub role: RequesterRole,
    pub name: String,
    pub department: String,
}

/// `{context, query, courses}` document for the query adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    pub context: Requester,
    pub query: String,
    pub courses: Vec<CourseSummary>,
}

impl QueryContext {
    /// Student view: each course narrowed to the student's own summary.
    pub fn for_student(
        student: &Student,
        query: impl Into<String>,
        rollup: &[StudentCourseSummary],
    ) -> Self {
        let courses = rollup
            .iter()
            .map(|item| CourseSummary {
                course_code: item.course_code.clone(),
                course_name: item.course_name.clone(),
                mode: Default::default(),
                sessions_held: item.sessions_held,
                units_offered: item.units_offered,
                students: vec![item.summary.clone()],
            })
            .collect();

        Self {
            context: Requester {
                role: RequesterRole::Student,
                name: student.name.clone(),
                department: student.department.clone(),
            },
            query: query.into(),
            courses,
        }
    }

    /// Faculty view: full summaries of every assigned course.
    pub fn for_faculty(faculty: &Faculty, query: impl Into<String>, courses: Vec<CourseSummary>) -> Self {
        Self {
            context: Requester {
                role: RequesterRole::Faculty,
                name: faculty.name.clone(),
                department: faculty.department.clone(),
            },
            query: query.into(),
            courses,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::QueryContext;
    use crate::model::roster::{Faculty, Student};
    use crate::service::aggregation_service::{
        AggregationMode, CourseSummary, StudentCourseSummary, StudentSummary,
    };

    #[test]
    fn student_context_keeps_course_totals() {
        let student = Student {
            enrollment_number: "E1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.edu".to_string(),
            department: "CSE".to_string(),
            batch: "2024".to_string(),
        };
        let rollup = vec![StudentCourseSummary {
            course_code: "CS101".to_string(),
            course_name: "Intro".to_string(),
            sessions_held: 3,
            units_offered: 6,
            summary: StudentSummary {
                enrollment_number: "E1".to_string(),
                name: Some("Asha".to_string()),
                on_roster: true,
                sessions_counted: 2,
                units_attended: 3,
                units_possible: 4,
                percentage: Some(75),
            },
        }];

        let context = QueryContext::for_student(&student, "am I on track?", &rollup);
        let course = &context.courses[0];
        assert_eq!(course.sessions_held, 3);
        assert_eq!(course.units_offered, 6);
        assert_eq!(course.students[0].sessions_counted, 2);
        assert_eq!(course.students[0].units_possible, 4);
    }

    #[test]
    fn faculty_context_serializes_camel_case() {
        let faculty = Faculty::new("Dr. Rao", "Rao@Example.edu", "CSE");
        let summary = CourseSummary {
            course_code: "CS101".to_string(),
            course_name: "Intro".to_string(),
            mode: AggregationMode::CurrentRoster,
            sessions_held: 1,
            units_offered: 2,
            students: vec![StudentSummary {
                enrollment_number: "E1".to_string(),
                name: None,
                on_roster: true,
                sessions_counted: 1,
                units_attended: 1,
                units_possible: 2,
                percentage: Some(50),
            }],
        };
        let context = QueryContext::for_faculty(&faculty, "who is below 75%?", vec![summary]);
        let value: serde_json::Value =
            serde_json::from_str(&context.to_json_pretty().unwrap()).unwrap();

        assert_eq!(value["context"]["role"], "faculty");
        assert_eq!(value["context"]["department"], "CSE");
        assert_eq!(value["courses"][0]["courseCode"], "CS101");
        assert_eq!(value["courses"][0]["mode"], "current_roster");
        assert_eq!(value["courses"][0]["students"][0]["enrollmentNumber"], "E1");
        assert_eq!(value["courses"][0]["students"][0]["percentage"], 50);
    }
}
