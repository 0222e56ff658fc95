//! The front door: clock operations with validation, requirement checks,
//! and audit trailing composed into one call.
//!
//! Ordering matters and is load-bearing. Validation runs before any
//! mutation; the audit append runs after the mutation has committed, so an
//! audit failure can no longer fail the operation and is surfaced as a
//! warning instead.

use chrono::{NaiveDateTime, Utc};

use crate::audit::{AuditEntry, AuditStore, AuditTrailService, SESSIONS_COLLECTION};
use crate::clocking::{
    ClockError, ClockInRequest, ClockOutRequest, ClockingService, ClockingStore,
};
use crate::costcode::{CostCodeService, CostCodeStore, JobRequirements};
use crate::session::WorkSession;
use crate::timecalc;
use crate::types::{Actor, EmployeeNumber, SessionId, ValidationOutcome};

/// A successful clock operation, with any non-blocking warnings gathered
/// along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockOutcome {
    pub session: WorkSession,
    pub warnings: Vec<String>,
}

/// A rejected clock operation. `errors` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockFailure {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ClockFailure {
    fn from_error(error: &ClockError, warnings: Vec<String>) -> Self {
        let errors = match error {
            ClockError::Invalid(messages) => messages.clone(),
            other => vec![other.to_string()],
        };
        Self { errors, warnings }
    }
}

/// Clocking, cost code, and audit services behind a single interface.
#[derive(Debug)]
pub struct TimeClock<C, K, A> {
    clocking: ClockingService<C>,
    cost_codes: CostCodeService<K>,
    audit: AuditTrailService<A>,
}

impl<C, K, A> TimeClock<C, K, A>
where
    C: ClockingStore,
    K: CostCodeStore,
    A: AuditStore,
{
    pub const fn new(clocking_store: C, cost_code_store: K, audit_store: A) -> Self {
        Self {
            clocking: ClockingService::new(clocking_store),
            cost_codes: CostCodeService::new(cost_code_store),
            audit: AuditTrailService::new(audit_store),
        }
    }

    /// Clocks an employee in, end to end.
    ///
    /// Validation and requirement checks run first and gate the mutation.
    /// The audit append runs after the session exists; its failure is
    /// reported as a warning on the successful outcome.
    pub fn execute_clock_in(
        &self,
        request: &ClockInRequest,
        actor: &Actor,
    ) -> Result<ClockOutcome, ClockFailure> {
        self.execute_clock_in_at(request, actor, Utc::now().naive_utc())
    }

    /// [`Self::execute_clock_in`] with an explicit "now" for the timestamp
    /// sanity checks.
    pub fn execute_clock_in_at(
        &self,
        request: &ClockInRequest,
        actor: &Actor,
        now: NaiveDateTime,
    ) -> Result<ClockOutcome, ClockFailure> {
        let mut outcome = self.clocking.validate_clock_operation(request, now);

        let code_required = self
            .cost_codes
            .is_cost_code_required(request.emp_num, request.job_code);
        match request.cost_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                outcome.merge(self.cost_codes.validate_cost_code(code, request.job_code));
            }
            _ if code_required => {
                outcome.push_error("Cost code is required for this job");
            }
            _ => {}
        }

        if !outcome.is_valid {
            return Err(ClockFailure {
                errors: outcome.errors,
                warnings: outcome.warnings,
            });
        }

        let session = self
            .clocking
            .clock_in(request)
            .map_err(|error| ClockFailure::from_error(&error, outcome.warnings.clone()))?;

        let mut warnings = outcome.warnings;
        let recorded = self.audit.append_change(
            &session.id,
            session.emp_num,
            "clockIn",
            SESSIONS_COLLECTION,
            "",
            &format!("Clocked in at {}", timecalc::format_time(session.time_in)),
            "Employee clocked in",
            actor,
        );
        if let Err(error) = recorded {
            tracing::warn!(session_id = %session.id, %error, "clock in succeeded but audit append failed");
            warnings.push("Clock in recorded but could not be audited".to_string());
        }

        Ok(ClockOutcome { session, warnings })
    }

    /// Clocks an employee out, end to end.
    pub fn execute_clock_out(
        &self,
        request: &ClockOutRequest,
        actor: &Actor,
    ) -> Result<ClockOutcome, ClockFailure> {
        let open = self
            .clocking
            .open_session(request.emp_num)
            .ok_or_else(|| ClockFailure {
                errors: vec![ClockError::NoOpenSession.to_string()],
                warnings: Vec::new(),
            })?;

        let mut outcome = ValidationOutcome::valid();
        let requirements = self
            .cost_codes
            .job_requirements(request.emp_num, open.job_code);
        if requirements.quantity_required
            && request.units.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            outcome.push_error("Units are required for this job");
        }
        if requirements.split_code_required
            && request.split.as_deref().is_none_or(|s| s.trim().is_empty())
        {
            outcome.push_error("Split code is required for this job");
        }
        if !outcome.is_valid {
            return Err(ClockFailure {
                errors: outcome.errors,
                warnings: outcome.warnings,
            });
        }

        let session = self
            .clocking
            .clock_out(request)
            .map_err(|error| ClockFailure::from_error(&error, outcome.warnings.clone()))?;

        let mut warnings = outcome.warnings;
        let time_out = session.time_out.map(timecalc::format_time).unwrap_or_default();
        let recorded = self.audit.append_change(
            &session.id,
            session.emp_num,
            "clockOut",
            SESSIONS_COLLECTION,
            "Clocked in",
            &format!("Clocked out at {time_out}"),
            "Employee clocked out",
            actor,
        );
        if let Err(error) = recorded {
            tracing::warn!(session_id = %session.id, %error, "clock out succeeded but audit append failed");
            warnings.push("Clock out recorded but could not be audited".to_string());
        }

        Ok(ClockOutcome { session, warnings })
    }

    /// Pre-flight check for a clock-in without mutating anything.
    pub fn validate_operation(
        &self,
        request: &ClockInRequest,
        now: NaiveDateTime,
    ) -> ValidationOutcome {
        let mut outcome = self.clocking.validate_clock_operation(request, now);
        if let Some(code) = request.cost_code.as_deref() {
            if !code.trim().is_empty() {
                outcome.merge(self.cost_codes.validate_cost_code(code, request.job_code));
            }
        }
        outcome
    }

    /// Whether the employee currently has an open session.
    pub fn is_clocked_in(&self, emp_num: EmployeeNumber) -> bool {
        self.clocking.is_clocked_in(emp_num)
    }

    /// The employee's open session, if any.
    pub fn open_session(&self, emp_num: EmployeeNumber) -> Option<WorkSession> {
        self.clocking.open_session(emp_num)
    }

    /// Requirement flags for an (employee, job) pair.
    pub fn job_requirements(&self, emp_num: EmployeeNumber, job_code: u32) -> JobRequirements {
        self.cost_codes.job_requirements(emp_num, job_code)
    }

    /// Audit history for one session.
    pub fn session_history(&self, session_id: &SessionId) -> Vec<AuditEntry> {
        self.audit.session_history(session_id)
    }

    /// Audit history for one employee.
    pub fn employee_history(&self, emp_num: EmployeeNumber) -> Vec<AuditEntry> {
        self.audit.employee_history(emp_num)
    }

    pub const fn clocking(&self) -> &ClockingService<C> {
        &self.clocking
    }

    pub const fn cost_codes(&self) -> &CostCodeService<K> {
        &self.cost_codes
    }

    pub const fn audit(&self) -> &AuditTrailService<A> {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NewAuditEntry;
    use crate::costcode::{CostCode, JobAssignment};
    use crate::session::{NewSession, SessionPatch};
    use crate::types::StoreError;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};

    /// One store playing all three roles, like the real database does.
    #[derive(Default)]
    struct FakeStore {
        open: RefCell<Option<WorkSession>>,
        closed: RefCell<Vec<WorkSession>>,
        codes: RefCell<Vec<CostCode>>,
        assignment: Cell<Option<JobAssignment>>,
        audit: RefCell<Vec<AuditEntry>>,
        fail_audit: Cell<bool>,
        next_id: Cell<u32>,
    }

    impl ClockingStore for FakeStore {
        fn find_open_session(
            &self,
            emp_num: EmployeeNumber,
        ) -> Result<Option<WorkSession>, StoreError> {
            Ok(self.open.borrow().clone().filter(|s| s.emp_num == emp_num))
        }

        fn create_session(&self, session: NewSession) -> Result<WorkSession, StoreError> {
            if self.open.borrow().is_some() {
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
            if let Some(v) = patch.elapsed_minutes {
                session.elapsed_minutes = v;
            }
            self.closed.borrow_mut().push(session.clone());
            Ok(session)
        }
    }

    impl CostCodeStore for FakeStore {
        fn find_cost_codes_by_job(&self, _job_code: u32) -> Result<Vec<CostCode>, StoreError> {
            Ok(self.codes.borrow().clone())
        }

        fn find_assignment(
            &self,
            _emp_num: EmployeeNumber,
            _job_code: u32,
        ) -> Result<Option<JobAssignment>, StoreError> {
            Ok(self.assignment.get())
        }
    }

    impl AuditStore for FakeStore {
        fn create_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
            if self.fail_audit.get() {
                return Err(StoreError::Unavailable("down".to_string()));
            }
            let entry = AuditEntry {
                id: format!("audit-{}", self.audit.borrow().len() + 1),
                collection: entry.collection,
                field_changed: entry.field_changed,
                session_id: entry.session_id,
                emp_num: entry.emp_num,
                old_data: entry.old_data,
                new_data: entry.new_data,
                description: entry.description,
                actor: entry.actor,
                changed_at: entry.changed_at,
            };
            self.audit.borrow_mut().push(entry.clone());
            Ok(entry)
        }

        fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<AuditEntry>, StoreError> {
            Ok(self
                .audit
                .borrow()
                .iter()
                .filter(|e| &e.session_id == session_id)
                .cloned()
                .collect())
        }

        fn find_by_employee(&self, emp_num: EmployeeNumber) -> Result<Vec<AuditEntry>, StoreError> {
            Ok(self
                .audit
                .borrow()
                .iter()
                .filter(|e| e.emp_num == emp_num)
                .cloned()
                .collect())
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

    fn actor() -> Actor {
        Actor::new("Terminal 3", "kiosk")
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

    fn time_clock(store: &FakeStore) -> TimeClock<&FakeStore, &FakeStore, &FakeStore> {
        TimeClock::new(store, store, store)
    }

    #[test]
    fn clock_in_then_out_leaves_an_audit_trail() {
        let store = FakeStore::default();
        let clock = time_clock(&store);

        let outcome = clock
            .execute_clock_in_at(&clock_in_request(at(8, 1, 10)), &actor(), at(8, 1, 10))
            .unwrap();
        assert_eq!(outcome.session.time_in, at(8, 0, 0));
        assert!(outcome.warnings.is_empty());

        let outcome = clock
            .execute_clock_out(
                &ClockOutRequest {
                    emp_num: emp(),
                    clocked_time: at(12, 0, 0),
                    units: Some("150".to_string()),
                    split: None,
                    break_flag: 0,
                },
                &actor(),
            )
            .unwrap();
        assert_eq!(outcome.session.elapsed_minutes, 240);

        let trail = clock.session_history(&outcome.session.id);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].field_changed, "clockIn");
        assert_eq!(trail[0].new_data, "Clocked in at 2025-06-02T08:00:00");
        assert_eq!(trail[0].description, "Employee clocked in");
        assert_eq!(trail[1].field_changed, "clockOut");
        assert_eq!(trail[1].old_data, "Clocked in");
        assert_eq!(trail[1].new_data, "Clocked out at 2025-06-02T12:00:00");
    }

    #[test]
    fn missing_required_cost_code_blocks_clock_in() {
        let store = FakeStore::default();
        store.assignment.set(Some(JobAssignment {
            clockable: true,
            requires_cost_code: true,
            ask_quantity: false,
            ask_split_code: false,
        }));
        let clock = time_clock(&store);

        let failure = clock
            .execute_clock_in_at(&clock_in_request(at(8, 0, 0)), &actor(), at(8, 0, 0))
            .unwrap_err();
        assert_eq!(failure.errors, vec!["Cost code is required for this job"]);
        assert!(!clock.is_clocked_in(emp()));
        // Nothing to audit when nothing changed.
        assert!(store.audit.borrow().is_empty());
    }

    #[test]
    fn supplied_cost_code_is_validated_against_the_job() {
        let store = FakeStore::default();
        store.codes.borrow_mut().push(CostCode {
            job_code: 10,
            job_sfx: "A".to_string(),
            bom_item: "001".to_string(),
            sequence: "010".to_string(),
            active: true,
        });
        let clock = time_clock(&store);

        let mut request = clock_in_request(at(8, 0, 0));
        request.cost_code = Some("Z\\999\\999".to_string());
        let failure = clock
            .execute_clock_in_at(&request, &actor(), at(8, 0, 0))
            .unwrap_err();
        assert_eq!(failure.errors, vec!["Cost code does not exist for this job"]);

        request.cost_code = Some("A\\001\\010".to_string());
        let outcome = clock
            .execute_clock_in_at(&request, &actor(), at(8, 0, 0))
            .unwrap();
        assert_eq!(outcome.session.cost_code.as_deref(), Some("A\\001\\010"));
    }

    #[test]
    fn audit_failure_after_clock_in_is_a_warning_not_a_rollback() {
        let store = FakeStore::default();
        store.fail_audit.set(true);
        let clock = time_clock(&store);

        let outcome = clock
            .execute_clock_in_at(&clock_in_request(at(8, 0, 0)), &actor(), at(8, 0, 0))
            .unwrap();
        // The session exists despite the audit failure.
        assert!(clock.is_clocked_in(emp()));
        assert_eq!(
            outcome.warnings,
            vec!["Clock in recorded but could not be audited"]
        );
    }

    #[test]
    fn validation_failure_before_mutation_audits_nothing() {
        // The asymmetry: errors before the mutation block it entirely,
        // while an audit error after the mutation only warns.
        let store = FakeStore::default();
        let clock = time_clock(&store);

        let mut request = clock_in_request(at(8, 0, 0));
        request.job_code = 0;
        let failure = clock
            .execute_clock_in_at(&request, &actor(), at(8, 0, 0))
            .unwrap_err();
        assert!(failure
            .errors
            .contains(&"Operation number must be positive".to_string()));
        assert!(!clock.is_clocked_in(emp()));
        assert!(store.audit.borrow().is_empty());
    }

    #[test]
    fn clock_out_enforces_quantity_and_split_requirements() {
        let store = FakeStore::default();
        let clock = time_clock(&store);
        clock
            .execute_clock_in_at(&clock_in_request(at(8, 0, 0)), &actor(), at(8, 0, 0))
            .unwrap();

        store.assignment.set(Some(JobAssignment {
            clockable: true,
            requires_cost_code: false,
            ask_quantity: true,
            ask_split_code: true,
        }));

        let failure = clock
            .execute_clock_out(
                &ClockOutRequest {
                    emp_num: emp(),
                    clocked_time: at(12, 0, 0),
                    units: None,
                    split: None,
                    break_flag: 0,
                },
                &actor(),
            )
            .unwrap_err();
        assert!(failure.errors.contains(&"Units are required for this job".to_string()));
        assert!(failure
            .errors
            .contains(&"Split code is required for this job".to_string()));
        assert!(clock.is_clocked_in(emp()));
    }

    #[test]
    fn clock_out_without_open_session_reports_business_error() {
        let store = FakeStore::default();
        let clock = time_clock(&store);
        let failure = clock
            .execute_clock_out(
                &ClockOutRequest {
                    emp_num: emp(),
                    clocked_time: at(12, 0, 0),
                    units: None,
                    split: None,
                    break_flag: 0,
                },
                &actor(),
            )
            .unwrap_err();
        assert_eq!(failure.errors, vec!["No active clock in found for employee"]);
    }
}
