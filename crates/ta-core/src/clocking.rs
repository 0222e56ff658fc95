//! The clock-in/clock-out state machine.
//!
//! Per employee the machine has two states: CLOSED (no open session) and
//! OPEN (exactly one open session). Clock-in transitions CLOSED to OPEN;
//! clock-out and the administrative force-clock-out transition OPEN back to
//! CLOSED. Business failures are values, never panics.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{NewSession, SessionPatch, WorkSession};
use crate::timecalc;
use crate::types::{EmployeeNumber, SessionId, StoreError, ValidationOutcome};
use crate::validation;

/// Persistence required by the clocking service.
///
/// `create_session` is the atomic claim on "one open session per employee":
/// implementations must reject a second open session for the same employee
/// with [`StoreError::OpenSessionExists`] rather than relying on callers to
/// have checked first.
pub trait ClockingStore {
    /// The employee's open session, if any.
    fn find_open_session(
        &self,
        emp_num: EmployeeNumber,
    ) -> Result<Option<WorkSession>, StoreError>;

    /// Creates a new open session, assigning its id.
    fn create_session(&self, session: NewSession) -> Result<WorkSession, StoreError>;

    /// Applies a partial update to an existing session.
    fn update_session(
        &self,
        id: &SessionId,
        patch: SessionPatch,
    ) -> Result<WorkSession, StoreError>;
}

impl<S: ClockingStore> ClockingStore for &S {
    fn find_open_session(
        &self,
        emp_num: EmployeeNumber,
    ) -> Result<Option<WorkSession>, StoreError> {
        (**self).find_open_session(emp_num)
    }

    fn create_session(&self, session: NewSession) -> Result<WorkSession, StoreError> {
        (**self).create_session(session)
    }

    fn update_session(
        &self,
        id: &SessionId,
        patch: SessionPatch,
    ) -> Result<WorkSession, StoreError> {
        (**self).update_session(id, patch)
    }
}

/// Business failures of clock operations. Messages are stable; the
/// transport layer may surface them verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Employee is already clocked in")]
    AlreadyClockedIn,

    #[error("No active clock in found for employee")]
    NoOpenSession,

    #[error("Clock out time must be after clock in time")]
    OutBeforeIn,

    /// Correctable input problems, joined from validation errors.
    #[error("{}", .0.join(", "))]
    Invalid(Vec<String>),

    /// Infrastructure failure; detail is logged, not leaked.
    #[error("An error occurred during {operation}")]
    StoreFailure { operation: &'static str },
}

/// A clock-in request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockInRequest {
    pub emp_num: EmployeeNumber,
    /// Operation number of the job being clocked onto.
    pub job_code: u32,
    pub clocked_time: NaiveDateTime,
    pub cost_code: Option<String>,
    pub job_desc: Option<String>,
}

/// A clock-out request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockOutRequest {
    pub emp_num: EmployeeNumber,
    pub clocked_time: NaiveDateTime,
    pub units: Option<String>,
    pub split: Option<String>,
    #[serde(default)]
    pub break_flag: i32,
}

/// The clocking state machine over a [`ClockingStore`].
#[derive(Debug)]
pub struct ClockingService<S> {
    store: S,
}

impl<S: ClockingStore> ClockingService<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Clocks an employee in, creating a new open session.
    ///
    /// Valid only from CLOSED: an existing open session (whether seen by the
    /// read or reported by the store's atomic claim) rejects the request.
    /// The recorded time-in is rounded; the actual time is kept alongside.
    pub fn clock_in(&self, request: &ClockInRequest) -> Result<WorkSession, ClockError> {
        if request.job_code == 0 {
            return Err(ClockError::Invalid(vec![
                "Operation number is required".to_string(),
            ]));
        }

        let existing = self
            .store
            .find_open_session(request.emp_num)
            .map_err(|error| store_failure("clock in", &error))?;
        if existing.is_some() {
            return Err(ClockError::AlreadyClockedIn);
        }

        let rounded = timecalc::round_time(request.clocked_time);
        let session = NewSession {
            emp_num: request.emp_num,
            job_code: request.job_code,
            job_desc: request.job_desc.clone(),
            time_in: rounded,
            actual_time_in: request.clocked_time,
            cost_code: request.cost_code.clone(),
            break_flag: 0,
        };

        self.store.create_session(session).map_err(|error| {
            if error == StoreError::OpenSessionExists {
                // Lost the race: another request claimed the open slot.
                ClockError::AlreadyClockedIn
            } else {
                store_failure("clock in", &error)
            }
        })
    }

    /// Clocks an employee out, closing the open session.
    ///
    /// Valid only from OPEN. The rounded clock-out must be strictly after
    /// the session's rounded clock-in; elapsed minutes are computed from the
    /// rounded pair.
    pub fn clock_out(&self, request: &ClockOutRequest) -> Result<WorkSession, ClockError> {
        let open = self
            .store
            .find_open_session(request.emp_num)
            .map_err(|error| store_failure("clock out", &error))?
            .ok_or(ClockError::NoOpenSession)?;

        let mut outcome = ValidationOutcome::valid();
        if let Some(units) = request.units.as_deref() {
            outcome.merge(validation::validate_units(units));
        }
        if let Some(split) = request.split.as_deref() {
            outcome.merge(validation::validate_split(split));
        }
        if !outcome.is_valid {
            return Err(ClockError::Invalid(outcome.errors));
        }

        let rounded = timecalc::round_time(request.clocked_time);
        if rounded <= open.time_in {
            return Err(ClockError::OutBeforeIn);
        }

        let elapsed = timecalc::elapsed_minutes(open.time_in, Some(rounded), rounded);
        let patch = SessionPatch {
            time_out: Some(rounded),
            actual_time_out: Some(request.clocked_time),
            quantity: request.units.clone(),
            split_code: request.split.clone(),
            break_flag: Some(request.break_flag),
            elapsed_minutes: Some(elapsed),
            ..SessionPatch::default()
        };

        self.store
            .update_session(&open.id, patch)
            .map_err(|error| store_failure("clock out", &error))
    }

    /// Administrative override: closes the open session at the given time
    /// without the chronology check, stamping the manager's name and
    /// flagging the record as edited.
    ///
    /// An open session must still exist.
    pub fn force_clock_out(
        &self,
        emp_num: EmployeeNumber,
        clock_out_time: NaiveDateTime,
        manager_name: &str,
    ) -> Result<WorkSession, ClockError> {
        let open = self
            .store
            .find_open_session(emp_num)
            .map_err(|error| store_failure("force clock out", &error))?
            .ok_or(ClockError::NoOpenSession)?;

        let elapsed = timecalc::elapsed_minutes(open.time_in, Some(clock_out_time), clock_out_time);
        let patch = SessionPatch {
            time_out: Some(clock_out_time),
            actual_time_out: Some(clock_out_time),
            elapsed_minutes: Some(elapsed),
            manager_name: Some(manager_name.to_string()),
            is_edited: Some(true),
            ..SessionPatch::default()
        };

        self.store
            .update_session(&open.id, patch)
            .map_err(|error| store_failure("force clock out", &error))
    }

    /// Whether the employee currently has an open session.
    ///
    /// A store failure reads as "not clocked in" and is logged; this is a
    /// pure read, not a gate.
    pub fn is_clocked_in(&self, emp_num: EmployeeNumber) -> bool {
        match self.store.find_open_session(emp_num) {
            Ok(session) => session.is_some(),
            Err(error) => {
                tracing::error!(%emp_num, %error, "failed to check clock status");
                false
            }
        }
    }

    /// The employee's open session, if any.
    pub fn open_session(&self, emp_num: EmployeeNumber) -> Option<WorkSession> {
        match self.store.find_open_session(emp_num) {
            Ok(session) => session,
            Err(error) => {
                tracing::error!(%emp_num, %error, "failed to fetch open session");
                None
            }
        }
    }

    /// Pre-flight validation for a clock-in request without mutating state.
    ///
    /// Collects input errors, timestamp sanity warnings, and the
    /// already-clocked-in check into one outcome.
    pub fn validate_clock_operation(
        &self,
        request: &ClockInRequest,
        now: NaiveDateTime,
    ) -> ValidationOutcome {
        let mut result = ValidationOutcome::valid();

        if request.job_code == 0 {
            result.push_error("Operation number must be positive");
        }

        result.merge(validation::validate_time_instant(request.clocked_time, now));

        if self.is_clocked_in(request.emp_num) {
            result.push_error("Employee is already clocked in");
        }

        result
    }
}

fn store_failure(operation: &'static str, error: &StoreError) -> ClockError {
    tracing::error!(%error, operation, "store failure during clock operation");
    ClockError::StoreFailure { operation }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};

    /// Single-employee in-memory store for exercising the state machine.
    #[derive(Default)]
    struct FakeStore {
        open: RefCell<Option<WorkSession>>,
        closed: RefCell<Vec<WorkSession>>,
        next_id: Cell<u32>,
        reject_create: Cell<bool>,
        fail_reads: Cell<bool>,
    }

    impl ClockingStore for FakeStore {
        fn find_open_session(
            &self,
            emp_num: EmployeeNumber,
        ) -> Result<Option<WorkSession>, StoreError> {
            if self.fail_reads.get() {
                return Err(StoreError::Unavailable("down".to_string()));
            }
            Ok(self
                .open
                .borrow()
                .clone()
                .filter(|s| s.emp_num == emp_num))
        }

        fn create_session(&self, session: NewSession) -> Result<WorkSession, StoreError> {
            if self.reject_create.get() || self.open.borrow().is_some() {
                return Err(StoreError::OpenSessionExists);
            }
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            let session = WorkSession {
                id: SessionId::new(format!("sess-{id}")).unwrap(),
                emp_num: session.emp_num,
                job_code: session.job_code,
                job_desc: session.job_desc,
                time_in: session.time_in,
                actual_time_in: session.actual_time_in,
                time_out: None,
                actual_time_out: None,
                cost_code: session.cost_code,
                quantity: None,
                split_code: None,
                break_flag: session.break_flag,
                elapsed_minutes: 0,
                manager_approval: false,
                manager_name: None,
                is_edited: false,
            };
            *self.open.borrow_mut() = Some(session.clone());
            Ok(session)
        }

        fn update_session(
            &self,
            id: &SessionId,
            patch: SessionPatch,
        ) -> Result<WorkSession, StoreError> {
            let mut open = self.open.borrow_mut();
            let mut session = open
                .take()
                .filter(|s| &s.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if let Some(v) = patch.time_out {
                session.time_out = Some(v);
            }
            if let Some(v) = patch.actual_time_out {
                session.actual_time_out = Some(v);
            }
            if let Some(v) = patch.quantity {
                session.quantity = Some(v);
            }
            if let Some(v) = patch.split_code {
                session.split_code = Some(v);
            }
            if let Some(v) = patch.break_flag {
                session.break_flag = v;
            }
            if let Some(v) = patch.elapsed_minutes {
                session.elapsed_minutes = v;
            }
            if let Some(v) = patch.manager_name {
                session.manager_name = Some(v);
            }
            if let Some(v) = patch.is_edited {
                session.is_edited = v;
            }
            if session.is_open() {
                *open = Some(session.clone());
            } else {
                self.closed.borrow_mut().push(session.clone());
            }
            Ok(session)
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn emp() -> EmployeeNumber {
        EmployeeNumber::new(42).unwrap()
    }

    fn clock_in_request(time: NaiveDateTime) -> ClockInRequest {
        ClockInRequest {
            emp_num: emp(),
            job_code: 10,
            clocked_time: time,
            cost_code: None,
            job_desc: Some("Welding".to_string()),
        }
    }

    #[test]
    fn clock_in_rounds_and_records_actual_time() {
        let service = ClockingService::new(FakeStore::default());
        let session = service.clock_in(&clock_in_request(at(8, 1, 10))).unwrap();

        assert_eq!(session.time_in, at(8, 0, 0));
        assert_eq!(session.actual_time_in, at(8, 1, 10));
        assert!(session.is_open());
        assert!(service.is_clocked_in(emp()));
    }

    #[test]
    fn second_clock_in_rejected_while_open() {
        let service = ClockingService::new(FakeStore::default());
        service.clock_in(&clock_in_request(at(8, 0, 0))).unwrap();

        let err = service.clock_in(&clock_in_request(at(9, 0, 0))).unwrap_err();
        assert_eq!(err, ClockError::AlreadyClockedIn);
        assert_eq!(err.to_string(), "Employee is already clocked in");
        // No second session was created.
        assert!(service.store.closed.borrow().is_empty());
    }

    #[test]
    fn store_claim_rejection_maps_to_already_clocked_in() {
        // The check-then-act read can race; the store's unique claim is the
        // real guard and must surface as the same business error.
        let store = FakeStore::default();
        store.reject_create.set(true);
        let service = ClockingService::new(store);

        let err = service.clock_in(&clock_in_request(at(8, 0, 0))).unwrap_err();
        assert_eq!(err, ClockError::AlreadyClockedIn);
    }

    #[test]
    fn clock_in_requires_operation_number() {
        let service = ClockingService::new(FakeStore::default());
        let mut request = clock_in_request(at(8, 0, 0));
        request.job_code = 0;
        let err = service.clock_in(&request).unwrap_err();
        assert_eq!(
            err,
            ClockError::Invalid(vec!["Operation number is required".to_string()])
        );
    }

    #[test]
    fn clock_out_closes_session_and_computes_minutes() {
        let service = ClockingService::new(FakeStore::default());
        service.clock_in(&clock_in_request(at(8, 1, 10))).unwrap();

        let session = service
            .clock_out(&ClockOutRequest {
                emp_num: emp(),
                clocked_time: at(12, 0, 0),
                units: Some("150".to_string()),
                split: None,
                break_flag: 0,
            })
            .unwrap();

        assert_eq!(session.time_out, Some(at(12, 0, 0)));
        assert_eq!(session.actual_time_out, Some(at(12, 0, 0)));
        assert_eq!(session.elapsed_minutes, 240);
        assert_eq!(session.quantity.as_deref(), Some("150"));
        assert!(!session.is_open());
        assert!(!service.is_clocked_in(emp()));
    }

    #[test]
    fn clock_out_without_open_session_fails() {
        let service = ClockingService::new(FakeStore::default());
        let err = service
            .clock_out(&ClockOutRequest {
                emp_num: emp(),
                clocked_time: at(12, 0, 0),
                units: None,
                split: None,
                break_flag: 0,
            })
            .unwrap_err();
        assert_eq!(err, ClockError::NoOpenSession);
        assert_eq!(err.to_string(), "No active clock in found for employee");
    }

    #[test]
    fn clock_out_must_round_strictly_after_clock_in() {
        let service = ClockingService::new(FakeStore::default());
        service.clock_in(&clock_in_request(at(8, 0, 0))).unwrap();

        // 08:01:10 rounds back to 08:00:00, equal to the rounded time-in.
        let err = service
            .clock_out(&ClockOutRequest {
                emp_num: emp(),
                clocked_time: at(8, 1, 10),
                units: None,
                split: None,
                break_flag: 0,
            })
            .unwrap_err();
        assert_eq!(err, ClockError::OutBeforeIn);

        // Session is still open after the rejection.
        assert!(service.is_clocked_in(emp()));
    }

    #[test]
    fn clock_out_validates_units_and_split() {
        let service = ClockingService::new(FakeStore::default());
        service.clock_in(&clock_in_request(at(8, 0, 0))).unwrap();

        let err = service
            .clock_out(&ClockOutRequest {
                emp_num: emp(),
                clocked_time: at(12, 0, 0),
                units: Some("-4".to_string()),
                split: Some("WAYTOOLONGCODE".to_string()),
                break_flag: 0,
            })
            .unwrap_err();
        let ClockError::Invalid(errors) = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert!(errors.contains(&"Units cannot be negative".to_string()));
        assert!(errors.contains(&"Split code is too long (max 10 characters)".to_string()));
    }

    #[test]
    fn force_clock_out_skips_chronology_and_stamps_manager() {
        let service = ClockingService::new(FakeStore::default());
        service.clock_in(&clock_in_request(at(8, 0, 0))).unwrap();

        // A time that normal clock-out would reject.
        let session = service.force_clock_out(emp(), at(8, 0, 0), "Pat").unwrap();
        assert_eq!(session.time_out, Some(at(8, 0, 0)));
        assert_eq!(session.manager_name.as_deref(), Some("Pat"));
        assert!(session.is_edited);
        assert_eq!(session.elapsed_minutes, 0);
    }

    #[test]
    fn force_clock_out_still_requires_open_session() {
        let service = ClockingService::new(FakeStore::default());
        let err = service.force_clock_out(emp(), at(12, 0, 0), "Pat").unwrap_err();
        assert_eq!(err, ClockError::NoOpenSession);
    }

    #[test]
    fn reads_degrade_on_store_failure() {
        let store = FakeStore::default();
        store.fail_reads.set(true);
        let service = ClockingService::new(store);
        assert!(!service.is_clocked_in(emp()));
        assert!(service.open_session(emp()).is_none());
    }

    #[test]
    fn validate_clock_operation_collects_issues() {
        let service = ClockingService::new(FakeStore::default());
        service.clock_in(&clock_in_request(at(8, 0, 0))).unwrap();

        let mut request = clock_in_request(at(8, 30, 0));
        request.job_code = 0;
        let result = service.validate_clock_operation(&request, at(9, 0, 0));
        assert!(!result.is_valid);
        assert!(result.errors.contains(&"Operation number must be positive".to_string()));
        assert!(result.errors.contains(&"Employee is already clocked in".to_string()));
    }

    #[test]
    fn validate_clock_operation_warns_on_stale_time() {
        let service = ClockingService::new(FakeStore::default());
        let request = clock_in_request(at(8, 0, 0) - chrono::Duration::days(400));
        let result = service.validate_clock_operation(&request, at(8, 0, 0));
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Time is more than a year ago"]);
    }
}
