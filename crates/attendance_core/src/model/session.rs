//! Attendance session domain model.
//!
//! # Responsibility
//! - Define the per-date attendance record owned by one course.
//! - Normalize calendar dates and presence counts at the engine boundary.
//!
//! # Invariants
//! - A session is identified by `(course_code, date)`; dates carry no time.
//! - `class_duration_units` is strictly positive.
//! - Every entry satisfies `present_units <= class_duration_units`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Canonical storage and wire format for session dates.
pub const SESSION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date identifying one attendance session.
///
/// Timestamps are accepted on input and reduced to their UTC calendar date,
/// so two writes on the same day always address the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionDate(NaiveDate);

impl SessionDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Builds a date from year/month/day, returning `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parses `YYYY-MM-DD` or an RFC 3339 timestamp.
    ///
    /// # Errors
    /// - `MissingDate` when the input is blank.
    /// - `InvalidDate` when neither format matches.
    pub fn parse(input: &str) -> Result<Self, SessionValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SessionValidationError::MissingDate);
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, SESSION_DATE_FORMAT) {
            return Ok(Self(date));
        }

        DateTime::parse_from_rfc3339(trimmed)
            .map(|timestamp| Self(timestamp.with_timezone(&Utc).date_naive()))
            .map_err(|_| SessionValidationError::InvalidDate(trimmed.to_string()))
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl Display for SessionDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(SESSION_DATE_FORMAT))
    }
}

impl FromStr for SessionDate {
    type Err = SessionValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SessionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

/// Inclusive date window used to restrict reads to a period.
///
/// An absent bound is open on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<SessionDate>,
    pub to: Option<SessionDate>,
}

impl DateWindow {
    /// Window covering every date.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: SessionDate, to: SessionDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, date: SessionDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// Rejects windows whose lower bound is after the upper bound.
    pub fn validate(&self) -> Result<(), SessionValidationError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => {
                Err(SessionValidationError::InvertedDateWindow { from, to })
            }
            _ => Ok(()),
        }
    }
}

/// Handling of presence counts outside `0..=class_duration_units`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresencePolicy {
    /// Clamp the count into range and accept the write.
    #[default]
    Clamp,
    /// Refuse the whole write.
    Reject,
}

/// Validation failures for session writes and reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    MissingDate,
    InvalidDate(String),
    InvertedDateWindow {
        from: SessionDate,
        to: SessionDate,
    },
    NonPositiveDuration(i64),
    BlankEnrollmentNumber,
    PresenceOutOfRange {
        enrollment_number: String,
        present_units: i64,
        class_duration_units: u32,
    },
}

impl SessionValidationError {
    /// Short machine-readable reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingDate => "missing_date",
            Self::InvalidDate(_) => "invalid_date",
            Self::InvertedDateWindow { .. } => "invalid_date_window",
            Self::NonPositiveDuration(_) => "invalid_class_duration",
            Self::BlankEnrollmentNumber => "blank_enrollment_number",
            Self::PresenceOutOfRange { .. } => "presence_out_of_range",
        }
    }
}

impl Display for SessionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDate => write!(f, "session date is required"),
            Self::InvalidDate(value) => write!(f, "invalid session date `{value}`"),
            Self::InvertedDateWindow { from, to } => {
                write!(f, "date window starts at {from} after it ends at {to}")
            }
            Self::NonPositiveDuration(value) => {
                write!(f, "class duration must be a positive number of units, got {value}")
            }
            Self::BlankEnrollmentNumber => write!(f, "enrollment number must not be blank"),
            Self::PresenceOutOfRange {
                enrollment_number,
                present_units,
                class_duration_units,
            } => write!(
                f,
                "present units {present_units} for `{enrollment_number}` outside 0..={class_duration_units}"
            ),
        }
    }
}

impl Error for SessionValidationError {}

/// Validates a requested class duration and narrows it to storage width.
pub fn validate_class_duration(units: i64) -> Result<u32, SessionValidationError> {
    match u32::try_from(units) {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(SessionValidationError::NonPositiveDuration(units)),
    }
}

/// Brings one requested presence count into `0..=class_duration_units`.
///
/// Under `PresencePolicy::Reject` an out-of-range count is an error instead.
pub fn normalize_present_units(
    enrollment_number: &str,
    present_units: i64,
    class_duration_units: u32,
    policy: PresencePolicy,
) -> Result<u32, SessionValidationError> {
    let upper = i64::from(class_duration_units);
    if (0..=upper).contains(&present_units) {
        // In range, so the narrowing cannot truncate.
        return Ok(present_units as u32);
    }

    match policy {
        PresencePolicy::Clamp => Ok(present_units.clamp(0, upper) as u32),
        PresencePolicy::Reject => Err(SessionValidationError::PresenceOutOfRange {
            enrollment_number: enrollment_number.to_string(),
            present_units,
            class_duration_units,
        }),
    }
}

/// One student's recorded presence within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub enrollment_number: String,
    /// Name as supplied by the marking client; may be empty.
    pub name: String,
    pub present_units: u32,
}

/// One date's attendance record for a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub course_code: String,
    pub date: SessionDate,
    pub class_duration_units: u32,
    /// Sorted by enrollment number.
    pub entries: Vec<SessionEntry>,
}

impl AttendanceSession {
    pub fn entry(&self, enrollment_number: &str) -> Option<&SessionEntry> {
        self.entries
            .iter()
            .find(|entry| entry.enrollment_number == enrollment_number)
    }

    /// Checks the per-session invariants.
    pub fn validate(&self) -> Result<(), SessionValidationError> {
        if self.class_duration_units == 0 {
            return Err(SessionValidationError::NonPositiveDuration(0));
        }
        for entry in &self.entries {
            if entry.enrollment_number.trim().is_empty() {
                return Err(SessionValidationError::BlankEnrollmentNumber);
            }
            if entry.present_units > self.class_duration_units {
                return Err(SessionValidationError::PresenceOutOfRange {
                    enrollment_number: entry.enrollment_number.clone(),
                    present_units: i64::from(entry.present_units),
                    class_duration_units: self.class_duration_units,
                });
            }
        }
        Ok(())
    }
}

/// Caller-supplied presence for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceInput {
    pub enrollment_number: String,
    #[serde(default)]
    pub name: String,
    /// Signed so out-of-range input reaches the normalization policy.
    pub present_units: i64,
}

impl PresenceInput {
    pub fn new(
        enrollment_number: impl Into<String>,
        name: impl Into<String>,
        present_units: i64,
    ) -> Self {
        Self {
            enrollment_number: enrollment_number.into(),
            name: name.into(),
            present_units,
        }
    }
}

/// Half-day checkbox representation used by marking clients.
///
/// `second` is only meaningful for sessions of two or more units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfDayMarks {
    pub first: bool,
    pub second: bool,
}

impl HalfDayMarks {
    pub fn to_present_units(self, class_duration_units: u32) -> u32 {
        let first = u32::from(self.first);
        if class_duration_units >= 2 {
            first + u32::from(self.second)
        } else {
            first.min(class_duration_units)
        }
    }

    pub fn from_present_units(present_units: u32, class_duration_units: u32) -> Self {
        if class_duration_units >= 2 {
            Self {
                first: present_units >= 1,
                second: present_units >= 2,
            }
        } else {
            Self {
                first: present_units >= 1,
                second: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_present_units, validate_class_duration, DateWindow, HalfDayMarks,
        PresencePolicy, SessionDate, SessionValidationError,
    };

    #[test]
    fn parse_accepts_plain_dates_and_timestamps() {
        let plain = SessionDate::parse("2024-11-01").unwrap();
        assert_eq!(plain.to_string(), "2024-11-01");

        let stamped = SessionDate::parse("2024-11-01T18:45:00Z").unwrap();
        assert_eq!(stamped, plain);
    }

    #[test]
    fn parse_reduces_offset_timestamps_to_utc_date() {
        let date = SessionDate::parse("2024-11-02T01:30:00+05:30").unwrap();
        assert_eq!(date.to_string(), "2024-11-01");
    }

    #[test]
    fn parse_rejects_blank_and_malformed_input() {
        assert_eq!(
            SessionDate::parse("  ").unwrap_err(),
            SessionValidationError::MissingDate
        );
        assert!(matches!(
            SessionDate::parse("2024-02-30").unwrap_err(),
            SessionValidationError::InvalidDate(_)
        ));
        assert!(matches!(
            SessionDate::parse("yesterday").unwrap_err(),
            SessionValidationError::InvalidDate(_)
        ));
    }

    #[test]
    fn duration_must_be_positive() {
        assert_eq!(validate_class_duration(2).unwrap(), 2);
        assert_eq!(
            validate_class_duration(0).unwrap_err(),
            SessionValidationError::NonPositiveDuration(0)
        );
        assert!(validate_class_duration(-1).is_err());
    }

    #[test]
    fn clamp_policy_bounds_presence() {
        assert_eq!(normalize_present_units("E1", 5, 2, PresencePolicy::Clamp).unwrap(), 2);
        assert_eq!(normalize_present_units("E1", -3, 2, PresencePolicy::Clamp).unwrap(), 0);
        assert_eq!(normalize_present_units("E1", 1, 2, PresencePolicy::Clamp).unwrap(), 1);
    }

    #[test]
    fn reject_policy_refuses_out_of_range_presence() {
        let err = normalize_present_units("E1", 3, 2, PresencePolicy::Reject).unwrap_err();
        assert_eq!(err.reason(), "presence_out_of_range");
        assert_eq!(normalize_present_units("E1", 2, 2, PresencePolicy::Reject).unwrap(), 2);
    }

    #[test]
    fn half_day_marks_map_to_units() {
        let both = HalfDayMarks {
            first: true,
            second: true,
        };
        assert_eq!(both.to_present_units(2), 2);
        assert_eq!(both.to_present_units(1), 1);

        let second_only = HalfDayMarks {
            first: false,
            second: true,
        };
        assert_eq!(second_only.to_present_units(2), 1);
        assert_eq!(second_only.to_present_units(1), 0);

        assert_eq!(
            HalfDayMarks::from_present_units(1, 2),
            HalfDayMarks {
                first: true,
                second: false
            }
        );
        assert_eq!(HalfDayMarks::from_present_units(1, 1).to_present_units(1), 1);
    }

    #[test]
    fn date_window_is_inclusive() {
        let from = SessionDate::parse("2024-11-01").unwrap();
        let to = SessionDate::parse("2024-11-03").unwrap();
        let window = DateWindow::between(from, to);
        assert!(window.contains(from));
        assert!(window.contains(to));
        assert!(!window.contains(SessionDate::parse("2024-11-04").unwrap()));
        assert!(DateWindow::between(to, from).validate().is_err());
        assert!(DateWindow::all().contains(to));
    }
}
