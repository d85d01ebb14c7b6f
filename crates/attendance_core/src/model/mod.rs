//! Domain model for courses, rosters and attendance sessions.
//!
//! # Responsibility
//! - Define canonical data structures used by the ledger engines.
//! - Own pure validation and normalization rules for those structures.
//!
//! # Invariants
//! - At most one session exists per course per calendar date.
//! - Presence counts never exceed the session's class duration.
//! - Sessions reference students by enrollment number, not by roster
//!   membership.

pub mod course;
pub mod roster;
pub mod session;
