//! Roster store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist student and faculty identity records.
//! - Serve the lookups used to build course roster snapshots.
//!
//! # Invariants
//! - Students are keyed by enrollment number, faculty by UUID.
//! - Emails are unique per table, compared case-insensitively.
//! - Batch lookups return rows ordered by enrollment number.
//! - Deleting a faculty unassigns it from its courses.

use crate::model::roster::{Faculty, FacultyId, Student};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::collections::BTreeSet;
use uuid::Uuid;

const STUDENT_SELECT_SQL: &str = "SELECT
    enrollment_number,
    name,
    email,
    department,
    batch
FROM students";

const FACULTY_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    department
FROM faculties";

/// Repository interface for roster identity records.
pub trait RosterRepository {
    /// Inserts or replaces one student keyed by enrollment number.
    fn upsert_student(&self, student: &Student) -> RepoResult<()>;
    fn get_student(&self, enrollment_number: &str) -> RepoResult<Option<Student>>;
    /// Resolves a set of enrollment numbers; unknown numbers are skipped.
    fn find_students_by_enrollment(
        &self,
        enrollment_numbers: &BTreeSet<String>,
    ) -> RepoResult<Vec<Student>>;
    fn find_students_by_department(&self, department: &str) -> RepoResult<Vec<Student>>;
    /// Inserts or replaces one faculty record keyed by id.
    fn upsert_faculty(&self, faculty: &Faculty) -> RepoResult<()>;
    fn get_faculty(&self, id: FacultyId) -> RepoResult<Option<Faculty>>;
    fn get_faculty_by_email(&self, email: &str) -> RepoResult<Option<Faculty>>;
    /// Faculty of one department ordered by name, then email.
    fn find_faculty_by_department(&self, department: &str) -> RepoResult<Vec<Faculty>>;
    /// Removes one faculty record and returns it; `None` when absent.
    fn delete_faculty_by_email(&self, email: &str) -> RepoResult<Option<Faculty>>;
}

/// SQLite-backed roster repository.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["students", "faculties"])?;
        Ok(Self { conn })
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn upsert_student(&self, student: &Student) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO students (enrollment_number, name, email, department, batch)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(enrollment_number) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                department = excluded.department,
                batch = excluded.batch,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                student.enrollment_number.trim(),
                student.name.trim(),
                student.email.trim(),
                student.department.trim(),
                student.batch.trim(),
            ],
        )
        .map_err(|err| map_email_conflict(err, student.email.trim()))?;
        Ok(())
    }

    fn get_student(&self, enrollment_number: &str) -> RepoResult<Option<Student>> {
        let student = self
            .conn
            .query_row(
                &format!("{STUDENT_SELECT_SQL} WHERE enrollment_number = ?1;"),
                [enrollment_number],
                parse_student_row,
            )
            .optional()?;
        Ok(student)
    }

    fn find_students_by_enrollment(
        &self,
        enrollment_numbers: &BTreeSet<String>,
    ) -> RepoResult<Vec<Student>> {
        if enrollment_numbers.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; enrollment_numbers.len()].join(", ");
        let sql = format!(
            "{STUDENT_SELECT_SQL}
             WHERE enrollment_number IN ({placeholders})
             ORDER BY enrollment_number ASC;"
        );
        let bind_values: Vec<Value> = enrollment_numbers
            .iter()
            .map(|value| Value::Text(value.clone()))
            .collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn find_students_by_department(&self, department: &str) -> RepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE department = ?1
             ORDER BY enrollment_number ASC;"
        ))?;
        let mut rows = stmt.query([department.trim()])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn upsert_faculty(&self, faculty: &Faculty) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO faculties (id, name, email, department)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                department = excluded.department,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                faculty.id.to_string(),
                faculty.name.trim(),
                faculty.email.trim(),
                faculty.department.trim(),
            ],
        )
        .map_err(|err| map_email_conflict(err, faculty.email.trim()))?;
        Ok(())
    }

    fn get_faculty(&self, id: FacultyId) -> RepoResult<Option<Faculty>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FACULTY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_faculty_row(row)?));
        }
        Ok(None)
    }

    fn get_faculty_by_email(&self, email: &str) -> RepoResult<Option<Faculty>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FACULTY_SELECT_SQL} WHERE email = ?1 COLLATE NOCASE;"
        ))?;
        let mut rows = stmt.query([email.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_faculty_row(row)?));
        }
        Ok(None)
    }

    fn find_faculty_by_department(&self, department: &str) -> RepoResult<Vec<Faculty>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FACULTY_SELECT_SQL}
             WHERE department = ?1
             ORDER BY name ASC, email ASC;"
        ))?;
        let mut rows = stmt.query([department.trim()])?;
        let mut faculties = Vec::new();
        while let Some(row) = rows.next()? {
            faculties.push(parse_faculty_row(row)?);
        }
        Ok(faculties)
    }

    fn delete_faculty_by_email(&self, email: &str) -> RepoResult<Option<Faculty>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing = self.get_faculty_by_email(email)?;
        if let Some(faculty) = &existing {
            tx.execute(
                "DELETE FROM faculties WHERE id = ?1;",
                [faculty.id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(existing)
    }
}

/// Lifts a UNIQUE violation on an `email` column into `DuplicateEmail`.
fn map_email_conflict(err: rusqlite::Error, email: &str) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation
                && message.starts_with("UNIQUE")
                && message.ends_with(".email") =>
        {
            RepoError::DuplicateEmail(email.to_string())
        }
        _ => err.into(),
    }
}

fn parse_student_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        enrollment_number: row.get("enrollment_number")?,
        name: row.get("name")?,
        email: row.get("email")?,
        department: row.get("department")?,
        batch: row.get("batch")?,
    })
}

fn parse_faculty_row(row: &Row<'_>) -> RepoResult<Faculty> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in faculties.id"))
    })?;

    Ok(Faculty {
        id,
        name: row.get("name")?,
        email: row.get("email")?,
        department: row.get("department")?,
    })
}
