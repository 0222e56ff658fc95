//! Core domain logic for the time and attendance engine.
//!
//! This crate contains the fundamental types and services for:
//! - Time math: 3-minute rounding, elapsed time, overlap and split checks
//! - Validation: field-level rules with stable, operator-facing messages
//! - Cost codes: job requirement flags and cost code verification
//! - Clocking: the one-open-session-per-employee state machine
//! - Audit: an append-only trail of every field mutation
//!
//! Persistence is abstracted behind per-service store traits; [`TimeClock`]
//! composes the services into a single front door.

pub mod audit;
pub mod clocking;
pub mod costcode;
mod facade;
pub mod session;
pub mod timecalc;
pub mod types;
pub mod validation;

pub use audit::{AuditEntry, AuditStore, AuditTrailService, NewAuditEntry};
pub use clocking::{
    ClockError, ClockInRequest, ClockOutRequest, ClockingService, ClockingStore,
};
pub use costcode::{
    CostCode, CostCodeService, CostCodeStore, JobAssignment, JobRequirements,
};
pub use facade::{ClockFailure, ClockOutcome, TimeClock};
pub use session::{FieldChange, NewSession, SessionEdit, SessionPatch, WorkSession};
pub use types::{
    Actor, EmployeeNumber, JobCode, SessionId, StoreError, TypeError, ValidationOutcome,
};
