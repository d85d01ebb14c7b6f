//! Session upsert, query and delete engines.
//!
//! # Responsibility
//! - Validate and normalize raw marking input at the engine boundary.
//! - Delegate atomic per-session writes to the session repository.
//! - Emit metadata-only diagnostics for every write.
//!
//! # Invariants
//! - Presence counts reach storage already bounded by the class duration.
//! - An upsert never removes entries for students it does not name.
//! - Deletion is not idempotent: a missing session is `SessionNotFound`.

use crate::error::LedgerError;
use crate::model::session::{
    normalize_present_units, validate_class_duration, AttendanceSession, PresenceInput,
    PresencePolicy, SessionDate, SessionValidationError,
};
use crate::repo::session_repo::{EntryWrite, SessionRepository, SessionWrite};
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

/// Raw upsert request as received from a marking client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertSessionRequest {
    pub course_code: String,
    /// `YYYY-MM-DD` or RFC 3339 timestamp.
    pub date: String,
    pub class_duration_units: i64,
    pub presences: Vec<PresenceInput>,
}

/// Use-case service for attendance session writes and point reads.
pub struct SessionService<R: SessionRepository> {
    repo: R,
    policy: PresencePolicy,
}

impl<R: SessionRepository> SessionService<R> {
    /// Creates a service that clamps out-of-range presence counts.
    pub fn new(repo: R) -> Self {
        Self::with_policy(repo, PresencePolicy::default())
    }

    pub fn with_policy(repo: R, policy: PresencePolicy) -> Self {
        Self { repo, policy }
    }

    /// Creates or repairs the session for one course and date.
    ///
    /// # Contract
    /// - Unknown course: `CourseNotFound`.
    /// - Bad date / non-positive duration / blank enrollment: validation error.
    /// - Existing session: duration is overwritten, named entries are
    ///   updated or created, every other entry is preserved.
    /// - Returns the session as stored after the write.
    pub fn upsert_session(
        &self,
        request: &UpsertSessionRequest,
    ) -> Result<AttendanceSession, LedgerError> {
        let started_at = Instant::now();
        let write = match build_session_write(request, self.policy) {
            Ok(write) => write,
            Err(err) => {
                warn!(
                    "event=session_upsert module=ledger status=rejected reason={} presences={}",
                    err.reason(),
                    request.presences.len()
                );
                return Err(err.into());
            }
        };

        match self.repo.upsert_session(&write) {
            Ok(report) => {
                info!(
                    "event=session_upsert module=ledger status=ok course_code={} date={} duration_units={} created={} entries_written={} entries_clamped={} duration_ms={}",
                    write.course_code,
                    write.date,
                    write.class_duration_units,
                    report.created,
                    write.entries.len(),
                    report.entries_clamped,
                    started_at.elapsed().as_millis()
                );
                Ok(report.session)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                warn!(
                    "event=session_upsert module=ledger status=error course_code={} date={} reason={} duration_ms={}",
                    write.course_code,
                    write.date,
                    err.reason(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    /// Gets the session held on a calendar date, if any.
    ///
    /// `Ok(None)` is the normal "no class held" answer.
    pub fn get_session(
        &self,
        course_code: &str,
        date: &str,
    ) -> Result<Option<AttendanceSession>, LedgerError> {
        let date = SessionDate::parse(date)?;
        Ok(self.repo.get_session(course_code.trim(), date)?)
    }

    /// Lists every session of a course ordered by date.
    pub fn list_sessions(&self, course_code: &str) -> Result<Vec<AttendanceSession>, LedgerError> {
        Ok(self.repo.list_sessions(course_code.trim())?)
    }

    /// Removes the whole session for a calendar date.
    pub fn delete_session(&self, course_code: &str, date: &str) -> Result<(), LedgerError> {
        let course_code = course_code.trim();
        let date = SessionDate::parse(date)?;

        match self.repo.delete_session(course_code, date) {
            Ok(()) => {
                info!(
                    "event=session_delete module=ledger status=ok course_code={course_code} date={date}"
                );
                Ok(())
            }
            Err(err) => {
                let err = LedgerError::from(err);
                warn!(
                    "event=session_delete module=ledger status=error course_code={} date={} reason={}",
                    course_code,
                    date,
                    err.reason()
                );
                Err(err)
            }
        }
    }
}

/// Validates a raw request and normalizes it into a storage write.
///
/// Rules:
/// - The date is reduced to its UTC calendar date.
/// - Presence counts are clamped (or rejected) against the duration.
/// - A repeated enrollment number keeps its last occurrence.
pub fn build_session_write(
    request: &UpsertSessionRequest,
    policy: PresencePolicy,
) -> Result<SessionWrite, SessionValidationError> {
    let date = SessionDate::parse(&request.date)?;
    let class_duration_units = validate_class_duration(request.class_duration_units)?;

    let mut entries: BTreeMap<String, EntryWrite> = BTreeMap::new();
    for presence in &request.presences {
        let enrollment_number = presence.enrollment_number.trim();
        if enrollment_number.is_empty() {
            return Err(SessionValidationError::BlankEnrollmentNumber);
        }
        let present_units = normalize_present_units(
            enrollment_number,
            presence.present_units,
            class_duration_units,
            policy,
        )?;
        entries.insert(
            enrollment_number.to_string(),
            EntryWrite {
                enrollment_number: enrollment_number.to_string(),
                name: presence.name.trim().to_string(),
                present_units,
            },
        );
    }

    Ok(SessionWrite {
        course_code: request.course_code.trim().to_string(),
        date,
        class_duration_units,
        entries: entries.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::{build_session_write, UpsertSessionRequest};
    use crate::model::session::{PresenceInput, PresencePolicy, SessionValidationError};

    fn request(duration: i64, presences: Vec<PresenceInput>) -> UpsertSessionRequest {
        UpsertSessionRequest {
            course_code: " CS101 ".to_string(),
            date: "2024-11-01T09:00:00Z".to_string(),
            class_duration_units: duration,
            presences,
        }
    }

    #[test]
    fn write_is_normalized_and_clamped() {
        let write = build_session_write(
            &request(
                2,
                vec![
                    PresenceInput::new("E2", "Ravi", 7),
                    PresenceInput::new(" E1 ", "Asha", -1),
                ],
            ),
            PresencePolicy::Clamp,
        )
        .unwrap();

        assert_eq!(write.course_code, "CS101");
        assert_eq!(write.date.to_string(), "2024-11-01");
        let units: Vec<(&str, u32)> = write
            .entries
            .iter()
            .map(|entry| (entry.enrollment_number.as_str(), entry.present_units))
            .collect();
        assert_eq!(units, vec![("E1", 0), ("E2", 2)]);
    }

    #[test]
    fn repeated_enrollment_keeps_last_occurrence() {
        let write = build_session_write(
            &request(
                2,
                vec![
                    PresenceInput::new("E1", "Asha", 2),
                    PresenceInput::new("E1", "Asha", 1),
                ],
            ),
            PresencePolicy::Clamp,
        )
        .unwrap();
        assert_eq!(write.entries.len(), 1);
        assert_eq!(write.entries[0].present_units, 1);
    }

    #[test]
    fn blank_enrollment_is_rejected() {
        let err = build_session_write(
            &request(1, vec![PresenceInput::new("  ", "", 1)]),
            PresencePolicy::Clamp,
        )
        .unwrap_err();
        assert_eq!(err, SessionValidationError::BlankEnrollmentNumber);
    }

    #[test]
    fn reject_policy_fails_the_whole_write() {
        let err = build_session_write(
            &request(
                1,
                vec![
                    PresenceInput::new("E1", "", 1),
                    PresenceInput::new("E2", "", 2),
                ],
            ),
            PresencePolicy::Reject,
        )
        .unwrap_err();
        assert_eq!(err.reason(), "presence_out_of_range");
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = build_session_write(&request(0, Vec::new()), PresencePolicy::Clamp).unwrap_err();
        assert_eq!(err, SessionValidationError::NonPositiveDuration(0));
    }
}
