//! Attendance session contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert, load and delete one `(course, date)` session at a time.
//! - Keep entry writes partial: students not named in a write are untouched.
//!
//! # Invariants
//! - `UNIQUE(course_code, session_date)` backs the one-session-per-date rule.
//! - Each write runs in one `BEGIN IMMEDIATE` transaction scoped to a single
//!   session row and its entry rows; date-disjoint writers never touch each
//!   other's rows and same-date writers only overlap on the entries they name.
//! - Entries are upserted per `(session_id, enrollment_number)`, so
//!   concurrent writers on disjoint students both persist.
//! - Lowering a session's duration clamps stored entries in the same
//!   transaction; a trigger rejects any entry above the duration.

use crate::model::session::{AttendanceSession, SessionDate, SessionEntry};
use crate::repo::{ensure_connection_ready, ensure_course_exists, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

/// One normalized entry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWrite {
    pub enrollment_number: String,
    pub name: String,
    /// Already bounded by `SessionWrite::class_duration_units`.
    pub present_units: u32,
}

/// Normalized session upsert payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWrite {
    pub course_code: String,
    pub date: SessionDate,
    pub class_duration_units: u32,
    /// Unique by enrollment number.
    pub entries: Vec<EntryWrite>,
}

/// Result of one session upsert, read back inside the write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWriteReport {
    pub session: AttendanceSession,
    /// `true` when the write created the session.
    pub created: bool,
    /// Entries outside the write that were clamped to a lowered duration.
    pub entries_clamped: usize,
}

/// Repository interface for attendance sessions.
pub trait SessionRepository {
    /// Creates or repairs the session for `(course_code, date)` atomically.
    fn upsert_session(&self, write: &SessionWrite) -> RepoResult<SessionWriteReport>;
    /// Loads one session; `Ok(None)` when the course has none on that date.
    fn get_session(
        &self,
        course_code: &str,
        date: SessionDate,
    ) -> RepoResult<Option<AttendanceSession>>;
    /// Lists all sessions of one course ordered by date ascending.
    fn list_sessions(&self, course_code: &str) -> RepoResult<Vec<AttendanceSession>>;
    /// Removes one whole session; `SessionNotFound` when absent.
    fn delete_session(&self, course_code: &str, date: SessionDate) -> RepoResult<()>;
    /// Course codes whose sessions hold at least one entry for the student.
    fn course_codes_with_entries_for(&self, enrollment_number: &str) -> RepoResult<Vec<String>>;
}

/// SQLite-backed session repository.
pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["courses", "attendance_sessions", "session_entries"])?;
        Ok(Self { conn })
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn upsert_session(&self, write: &SessionWrite) -> RepoResult<SessionWriteReport> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_course_exists(&tx, &write.course_code)?;

        let date_text = write.date.to_string();
        let existing_id = find_session_id(&tx, &write.course_code, &date_text)?;

        tx.execute(
            "INSERT INTO attendance_sessions (course_code, session_date, class_duration_units)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(course_code, session_date) DO UPDATE SET
                class_duration_units = excluded.class_duration_units,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                write.course_code.as_str(),
                date_text.as_str(),
                write.class_duration_units,
            ],
        )?;
        let session_id = find_session_id(&tx, &write.course_code, &date_text)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "session {} {} missing after upsert",
                write.course_code, date_text
            ))
        })?;

        let entries_clamped = tx.execute(
            "UPDATE session_entries
             SET present_units = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE session_id = ?1
               AND present_units > ?2;",
            params![session_id, write.class_duration_units],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO session_entries (
                    session_id,
                    enrollment_number,
                    student_name,
                    present_units
                ) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(session_id, enrollment_number) DO UPDATE SET
                    student_name = CASE
                        WHEN excluded.student_name = '' THEN session_entries.student_name
                        ELSE excluded.student_name
                    END,
                    present_units = excluded.present_units,
                    updated_at = (strftime('%s', 'now') * 1000);",
            )?;
            for entry in &write.entries {
                stmt.execute(params![
                    session_id,
                    entry.enrollment_number.as_str(),
                    entry.name.as_str(),
                    entry.present_units,
                ])?;
            }
        }

        let session = load_session(&tx, session_id)?;
        tx.commit()?;

        Ok(SessionWriteReport {
            session,
            created: existing_id.is_none(),
            entries_clamped,
        })
    }

    fn get_session(
        &self,
        course_code: &str,
        date: SessionDate,
    ) -> RepoResult<Option<AttendanceSession>> {
        ensure_course_exists(self.conn, course_code)?;
        match find_session_id(self.conn, course_code, &date.to_string())? {
            Some(session_id) => Ok(Some(load_session(self.conn, session_id)?)),
            None => Ok(None),
        }
    }

    fn list_sessions(&self, course_code: &str) -> RepoResult<Vec<AttendanceSession>> {
        ensure_course_exists(self.conn, course_code)?;

        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM attendance_sessions
             WHERE course_code = ?1
             ORDER BY session_date ASC;",
        )?;
        let mut rows = stmt.query([course_code])?;
        let mut session_ids = Vec::new();
        while let Some(row) = rows.next()? {
            session_ids.push(row.get::<_, i64>(0)?);
        }

        session_ids
            .into_iter()
            .map(|session_id| load_session(self.conn, session_id))
            .collect()
    }

    fn delete_session(&self, course_code: &str, date: SessionDate) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_course_exists(&tx, course_code)?;

        let changed = tx.execute(
            "DELETE FROM attendance_sessions
             WHERE course_code = ?1
               AND session_date = ?2;",
            params![course_code, date.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::SessionNotFound {
                course_code: course_code.to_string(),
                date,
            });
        }

        tx.commit()?;
        Ok(())
    }

    fn course_codes_with_entries_for(&self, enrollment_number: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT s.course_code
             FROM session_entries e
             INNER JOIN attendance_sessions s ON s.id = e.session_id
             WHERE e.enrollment_number = ?1
             ORDER BY s.course_code ASC;",
        )?;
        let mut rows = stmt.query([enrollment_number])?;
        let mut codes = Vec::new();
        while let Some(row) = rows.next()? {
            codes.push(row.get(0)?);
        }
        Ok(codes)
    }
}

fn find_session_id(conn: &Connection, course_code: &str, date_text: &str) -> RepoResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id
             FROM attendance_sessions
             WHERE course_code = ?1
               AND session_date = ?2;",
            params![course_code, date_text],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn load_session(conn: &Connection, session_id: i64) -> RepoResult<AttendanceSession> {
    let (course_code, date_text, class_duration_units): (String, String, i64) = conn.query_row(
        "SELECT course_code, session_date, class_duration_units
         FROM attendance_sessions
         WHERE id = ?1;",
        [session_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let date = SessionDate::parse(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in attendance_sessions.session_date"
        ))
    })?;
    let class_duration_units = u32::try_from(class_duration_units).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid duration `{class_duration_units}` in attendance_sessions.class_duration_units"
        ))
    })?;

    let mut stmt = conn.prepare(
        "SELECT enrollment_number, student_name, present_units
         FROM session_entries
         WHERE session_id = ?1
         ORDER BY enrollment_number ASC;",
    )?;
    let mut rows = stmt.query([session_id])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }

    let session = AttendanceSession {
        course_code,
        date,
        class_duration_units,
        entries,
    };
    session
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("session {session_id}: {err}")))?;
    Ok(session)
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<SessionEntry> {
    let present_units: i64 = row.get("present_units")?;
    let present_units = u32::try_from(present_units).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid present_units `{present_units}` in session_entries.present_units"
        ))
    })?;

    Ok(SessionEntry {
        enrollment_number: row.get("enrollment_number")?,
        name: row.get("student_name")?,
        present_units,
    })
}
