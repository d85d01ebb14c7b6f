//! Course store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist course records, faculty assignment and roster snapshots.
//! - Keep roster replacement atomic (delete + insert in one transaction).
//!
//! # Invariants
//! - Course listings are ordered by `course_code ASC`.
//! - Roster rows keep the order they were written in (`position ASC`).
//! - Deleting a course cascades to its roster and sessions.
//! - Renaming a course code carries its roster and sessions along
//!   (`ON UPDATE CASCADE`).

use crate::model::course::{Course, RosterEntry};
use crate::model::roster::FacultyId;
use crate::repo::{course_exists, ensure_connection_ready, ensure_course_exists};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const COURSE_SELECT_SQL: &str = "SELECT
    course_code,
    course_name,
    faculty_id
FROM courses";

/// Repository interface for course records and roster snapshots.
pub trait CourseRepository {
    /// Inserts a new course with its roster; fails on duplicate code.
    fn create_course(&self, course: &Course) -> RepoResult<()>;
    fn get_course(&self, course_code: &str) -> RepoResult<Option<Course>>;
    fn list_courses(&self) -> RepoResult<Vec<Course>>;
    fn list_courses_for_faculty(&self, faculty_id: FacultyId) -> RepoResult<Vec<Course>>;
    /// Courses whose current roster contains the student.
    fn list_courses_for_student(&self, enrollment_number: &str) -> RepoResult<Vec<Course>>;
    /// Sets the course faculty, replacing any previous assignment.
    fn assign_faculty(&self, course_code: &str, faculty_id: FacultyId) -> RepoResult<()>;
    /// Changes code and name of an existing course; fails when the new
    /// code belongs to another course.
    fn update_course(&self, course_code: &str, renamed: &Course) -> RepoResult<()>;
    /// Replaces the whole roster snapshot.
    fn replace_roster(&self, course_code: &str, roster: &[RosterEntry]) -> RepoResult<()>;
    /// Deletes a course together with its roster and sessions.
    fn delete_course(&self, course_code: &str) -> RepoResult<()>;
}

/// SQLite-backed course repository.
pub struct SqliteCourseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCourseRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["courses", "course_roster"])?;
        Ok(Self { conn })
    }

    fn load_courses(&self, sql: &str, param: Option<&str>) -> RepoResult<Vec<Course>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match param {
            Some(value) => stmt.query([value])?,
            None => stmt.query([])?,
        };

        let mut courses = Vec::new();
        while let Some(row) = rows.next()? {
            courses.push(parse_course_row(self.conn, row)?);
        }
        Ok(courses)
    }
}

impl CourseRepository for SqliteCourseRepository<'_> {
    fn create_course(&self, course: &Course) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if course_exists(&tx, &course.course_code)? {
            return Err(RepoError::DuplicateCourse(course.course_code.clone()));
        }

        tx.execute(
            "INSERT INTO courses (course_code, course_name, faculty_id)
             VALUES (?1, ?2, ?3);",
            params![
                course.course_code.as_str(),
                course.course_name.as_str(),
                course.faculty_id.map(|id| id.to_string()),
            ],
        )?;
        insert_roster_rows(&tx, &course.course_code, &course.roster)?;

        tx.commit()?;
        Ok(())
    }

    fn get_course(&self, course_code: &str) -> RepoResult<Option<Course>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COURSE_SELECT_SQL} WHERE course_code = ?1;"))?;
        let mut rows = stmt.query([course_code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_course_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_courses(&self) -> RepoResult<Vec<Course>> {
        self.load_courses(
            &format!("{COURSE_SELECT_SQL} ORDER BY course_code ASC;"),
            None,
        )
    }

    fn list_courses_for_faculty(&self, faculty_id: FacultyId) -> RepoResult<Vec<Course>> {
        let id_text = faculty_id.to_string();
        self.load_courses(
            &format!("{COURSE_SELECT_SQL} WHERE faculty_id = ?1 ORDER BY course_code ASC;"),
            Some(id_text.as_str()),
        )
    }

    fn list_courses_for_student(&self, enrollment_number: &str) -> RepoResult<Vec<Course>> {
        self.load_courses(
            &format!(
                "{COURSE_SELECT_SQL}
                 WHERE course_code IN (
                    SELECT course_code FROM course_roster WHERE enrollment_number = ?1
                 )
                 ORDER BY course_code ASC;"
            ),
            Some(enrollment_number),
        )
    }

    fn assign_faculty(&self, course_code: &str, faculty_id: FacultyId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let faculty_known: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM faculties WHERE id = ?1);",
            [faculty_id.to_string()],
            |row| row.get(0),
        )?;
        if faculty_known != 1 {
            return Err(RepoError::FacultyNotFound(faculty_id));
        }

        let changed = tx.execute(
            "UPDATE courses
             SET faculty_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE course_code = ?1;",
            params![course_code, faculty_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::CourseNotFound(course_code.to_string()));
        }

        tx.commit()?;
        Ok(())
    }

    fn update_course(&self, course_code: &str, renamed: &Course) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_course_exists(&tx, course_code)?;
        if renamed.course_code != course_code && course_exists(&tx, &renamed.course_code)? {
            return Err(RepoError::DuplicateCourse(renamed.course_code.clone()));
        }

        tx.execute(
            "UPDATE courses
             SET course_code = ?2,
                 course_name = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE course_code = ?1;",
            params![
                course_code,
                renamed.course_code.as_str(),
                renamed.course_name.as_str(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn replace_roster(&self, course_code: &str, roster: &[RosterEntry]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_course_exists(&tx, course_code)?;

        tx.execute(
            "DELETE FROM course_roster WHERE course_code = ?1;",
            [course_code],
        )?;
        insert_roster_rows(&tx, course_code, roster)?;
        tx.execute(
            "UPDATE courses
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE course_code = ?1;",
            [course_code],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn delete_course(&self, course_code: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM courses WHERE course_code = ?1;", [course_code])?;
        if changed == 0 {
            return Err(RepoError::CourseNotFound(course_code.to_string()));
        }
        Ok(())
    }
}

fn insert_roster_rows(conn: &Connection, course_code: &str, roster: &[RosterEntry]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO course_roster (
            course_code,
            position,
            enrollment_number,
            name,
            email,
            batch
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(course_code, enrollment_number) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            batch = excluded.batch;",
    )?;
    for (position, entry) in roster.iter().enumerate() {
        stmt.execute(params![
            course_code,
            position as i64,
            entry.enrollment_number.as_str(),
            entry.name.as_str(),
            entry.email.as_str(),
            entry.batch.as_str(),
        ])?;
    }
    Ok(())
}

fn load_roster(conn: &Connection, course_code: &str) -> RepoResult<Vec<RosterEntry>> {
    let mut stmt = conn.prepare(
        "SELECT enrollment_number, name, email, batch
         FROM course_roster
         WHERE course_code = ?1
         ORDER BY position ASC, enrollment_number ASC;",
    )?;
    let mut rows = stmt.query([course_code])?;
    let mut roster = Vec::new();
    while let Some(row) = rows.next()? {
        roster.push(RosterEntry {
            enrollment_number: row.get("enrollment_number")?,
            name: row.get("name")?,
            email: row.get("email")?,
            batch: row.get("batch")?,
        });
    }
    Ok(roster)
}

fn parse_course_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Course> {
    let course_code: String = row.get("course_code")?;
    let faculty_id = row
        .get::<_, Option<String>>("faculty_id")?
        .map(|value| {
            Uuid::parse_str(&value).map_err(|_| {
                RepoError::InvalidData(format!("invalid uuid `{value}` in courses.faculty_id"))
            })
        })
        .transpose()?;
    let roster = load_roster(conn, &course_code)?;

    Ok(Course {
        course_name: row.get("course_name")?,
        course_code,
        faculty_id,
        roster,
    })
}
