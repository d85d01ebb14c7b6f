//! Ledger use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into engine-level APIs.
//! - Map every failure into `LedgerError` at this boundary.

pub mod aggregation_service;
pub mod course_service;
pub mod query_context;
pub mod roster_service;
pub mod session_service;
