//! Roster identity records (students and faculty).
//!
//! The ledger only reads these records, except when copying student
//! snapshots into a course roster.

use crate::model::course::RosterEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static EMAIL_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable faculty identifier.
pub type FacultyId = Uuid;

/// Student identity keyed by enrollment number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub enrollment_number: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub batch: String,
}

impl Student {
    /// Copies the fields a course roster keeps.
    pub fn to_roster_entry(&self) -> RosterEntry {
        RosterEntry {
            enrollment_number: self.enrollment_number.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            batch: self.batch.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), RosterValidationError> {
        require_present("enrollment_number", &self.enrollment_number)?;
        require_present("name", &self.name)?;
        require_present("department", &self.department)?;
        require_present("batch", &self.batch)?;
        validate_email(&self.email)
    }
}

/// Faculty identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
    pub email: String,
    pub department: String,
}

impl Faculty {
    /// Creates a faculty record with a generated id.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: email.into().trim().to_ascii_lowercase(),
            department: department.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), RosterValidationError> {
        require_present("name", &self.name)?;
        require_present("department", &self.department)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterValidationError {
    BlankField(&'static str),
    InvalidEmail(String),
}

impl RosterValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BlankField(_) => "blank_roster_field",
            Self::InvalidEmail(_) => "invalid_email",
        }
    }
}

impl Display for RosterValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
        }
    }
}

impl Error for RosterValidationError {}

fn require_present(field: &'static str, value: &str) -> Result<(), RosterValidationError> {
    if value.trim().is_empty() {
        Err(RosterValidationError::BlankField(field))
    } else {
        Ok(())
    }
}

fn validate_email(value: &str) -> Result<(), RosterValidationError> {
    if EMAIL_SHAPE_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(RosterValidationError::InvalidEmail(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Faculty, RosterValidationError, Student};

    fn student() -> Student {
        Student {
            enrollment_number: "E1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.edu".to_string(),
            department: "CSE".to_string(),
            batch: "2024".to_string(),
        }
    }

    #[test]
    fn valid_student_passes() {
        assert!(student().validate().is_ok());
    }

    #[test]
    fn blank_department_is_rejected() {
        let mut value = student();
        value.department = " ".to_string();
        assert_eq!(
            value.validate().unwrap_err(),
            RosterValidationError::BlankField("department")
        );
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut value = student();
        value.email = "asha-at-example".to_string();
        assert_eq!(value.validate().unwrap_err().reason(), "invalid_email");
    }

    #[test]
    fn faculty_email_is_normalized() {
        let faculty = Faculty::new("R. Iyer", " R.Iyer@Example.edu ", "CSE");
        assert_eq!(faculty.email, "r.iyer@example.edu");
        assert!(faculty.validate().is_ok());
    }

    #[test]
    fn roster_entry_copies_snapshot_fields() {
        let entry = student().to_roster_entry();
        assert_eq!(entry.enrollment_number, "E1");
        assert_eq!(entry.batch, "2024");
    }
}
