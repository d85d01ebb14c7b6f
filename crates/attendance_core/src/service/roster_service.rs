//! Roster store use-cases for students and faculty.

use crate::error::LedgerError;
use crate::model::roster::{Faculty, FacultyId, RosterValidationError, Student};
use crate::repo::roster_repo::RosterRepository;
use log::info;
use std::collections::BTreeSet;

/// Use-case service for roster identity records.
pub struct RosterService<R: RosterRepository> {
    repo: R,
}

impl<R: RosterRepository> RosterService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Inserts or replaces a student keyed by enrollment number.
    pub fn register_student(&self, student: &Student) -> Result<(), LedgerError> {
        student.validate()?;
        self.repo.upsert_student(student)?;
        info!("event=student_register module=roster status=ok");
        Ok(())
    }

    /// Inserts or replaces a faculty record keyed by id.
    pub fn register_faculty(&self, faculty: &Faculty) -> Result<(), LedgerError> {
        faculty.validate()?;
        self.repo.upsert_faculty(faculty)?;
        info!(
            "event=faculty_register module=roster status=ok faculty_id={}",
            faculty.id
        );
        Ok(())
    }

    pub fn get_student(&self, enrollment_number: &str) -> Result<Student, LedgerError> {
        let enrollment_number = enrollment_number.trim();
        self.repo
            .get_student(enrollment_number)?
            .ok_or_else(|| LedgerError::StudentNotFound(enrollment_number.to_string()))
    }

    pub fn get_faculty(&self, id: FacultyId) -> Result<Faculty, LedgerError> {
        self.repo
            .get_faculty(id)?
            .ok_or_else(|| LedgerError::faculty_not_found(id))
    }

    /// Case-insensitive lookup by email.
    pub fn get_faculty_by_email(&self, email: &str) -> Result<Faculty, LedgerError> {
        let email = email.trim();
        self.repo
            .get_faculty_by_email(email)?
            .ok_or_else(|| LedgerError::FacultyNotFound(email.to_string()))
    }

    /// Faculty of one department; an empty department is a validation error,
    /// an empty result is not.
    pub fn find_faculty_by_department(&self, department: &str) -> Result<Vec<Faculty>, LedgerError> {
        let department = department.trim();
        if department.is_empty() {
            return Err(RosterValidationError::BlankField("department").into());
        }
        Ok(self.repo.find_faculty_by_department(department)?)
    }

    /// Deletes a faculty record by email; its courses become unassigned.
    pub fn delete_faculty(&self, email: &str) -> Result<Faculty, LedgerError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RosterValidationError::BlankField("email").into());
        }
        let removed = self
            .repo
            .delete_faculty_by_email(email)?
            .ok_or_else(|| LedgerError::FacultyNotFound(email.to_string()))?;
        info!(
            "event=faculty_delete module=roster status=ok faculty_id={}",
            removed.id
        );
        Ok(removed)
    }

    pub fn find_students_by_enrollment(
        &self,
        enrollment_numbers: &BTreeSet<String>,
    ) -> Result<Vec<Student>, LedgerError> {
        Ok(self.repo.find_students_by_enrollment(enrollment_numbers)?)
    }

    pub fn find_students_by_department(&self, department: &str) -> Result<Vec<Student>, LedgerError> {
        Ok(self.repo.find_students_by_department(department.trim())?)
    }
}
