//! Cost code formats, job requirement flags, and their store-backed service.

use serde::{Deserialize, Serialize};

use crate::types::{EmployeeNumber, StoreError, ValidationOutcome};
use crate::validation;

/// A cost code: three-segment identifier tying worked time to an
/// accounting bucket, scoped to one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCode {
    pub job_code: u32,
    pub job_sfx: String,
    pub bom_item: String,
    pub sequence: String,
    pub active: bool,
}

impl CostCode {
    /// The wire format: `suffix\item\sequence`.
    #[must_use]
    pub fn code_string(&self) -> String {
        build_cost_code(&self.job_sfx, &self.bom_item, &self.sequence)
    }
}

/// Per (employee, job) configuration controlling what a clock operation
/// must supply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub clockable: bool,
    pub requires_cost_code: bool,
    pub ask_quantity: bool,
    pub ask_split_code: bool,
}

/// Aggregate of all requirement flags for one (employee, job) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequirements {
    pub cost_code_required: bool,
    pub quantity_required: bool,
    pub split_code_required: bool,
    pub clockable: bool,
}

impl From<JobAssignment> for JobRequirements {
    fn from(assignment: JobAssignment) -> Self {
        Self {
            cost_code_required: assignment.requires_cost_code,
            quantity_required: assignment.ask_quantity,
            split_code_required: assignment.ask_split_code,
            clockable: assignment.clockable,
        }
    }
}

/// Read access to registered cost codes and job assignments.
pub trait CostCodeStore {
    /// All cost codes registered for a job, active or not.
    fn find_cost_codes_by_job(&self, job_code: u32) -> Result<Vec<CostCode>, StoreError>;

    /// The assignment row for an (employee, job) pair, if configured.
    fn find_assignment(
        &self,
        emp_num: EmployeeNumber,
        job_code: u32,
    ) -> Result<Option<JobAssignment>, StoreError>;
}

impl<S: CostCodeStore> CostCodeStore for &S {
    fn find_cost_codes_by_job(&self, job_code: u32) -> Result<Vec<CostCode>, StoreError> {
        (**self).find_cost_codes_by_job(job_code)
    }

    fn find_assignment(
        &self,
        emp_num: EmployeeNumber,
        job_code: u32,
    ) -> Result<Option<JobAssignment>, StoreError> {
        (**self).find_assignment(emp_num, job_code)
    }
}

/// Builds the `suffix\item\sequence` string from components.
#[must_use]
pub fn build_cost_code(job_sfx: &str, bom_item: &str, sequence: &str) -> String {
    format!("{job_sfx}\\{bom_item}\\{sequence}")
}

/// Parses a cost code string into its (suffix, item, sequence) components.
///
/// Returns `None` unless there are exactly three segments.
#[must_use]
pub fn parse_cost_code(code: &str) -> Option<(String, String, String)> {
    let mut parts = code.split('\\');
    let job_sfx = parts.next()?.to_string();
    let bom_item = parts.next()?.to_string();
    let sequence = parts.next()?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some((job_sfx, bom_item, sequence))
}

/// Cost code lookups and requirement checks backed by a [`CostCodeStore`].
///
/// Requirement reads fail open: a missing assignment or a failed lookup
/// reads as "not required" / "not clockable". This mirrors the shop-floor
/// policy that a configuration gap must not stop an employee clocking in.
#[derive(Debug)]
pub struct CostCodeService<S> {
    store: S,
}

impl<S: CostCodeStore> CostCodeService<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether the job demands a cost code for this employee.
    pub fn is_cost_code_required(&self, emp_num: EmployeeNumber, job_code: u32) -> bool {
        self.assignment_flag(emp_num, job_code, |a| a.requires_cost_code)
    }

    /// Whether the job asks for a produced quantity on clock-out.
    pub fn is_quantity_required(&self, emp_num: EmployeeNumber, job_code: u32) -> bool {
        self.assignment_flag(emp_num, job_code, |a| a.ask_quantity)
    }

    /// Whether the job asks for a split code on clock-out.
    pub fn is_split_code_required(&self, emp_num: EmployeeNumber, job_code: u32) -> bool {
        self.assignment_flag(emp_num, job_code, |a| a.ask_split_code)
    }

    /// Whether the employee may clock onto this job at all.
    pub fn is_job_clockable(&self, emp_num: EmployeeNumber, job_code: u32) -> bool {
        self.assignment_flag(emp_num, job_code, |a| a.clockable)
    }

    fn assignment_flag(
        &self,
        emp_num: EmployeeNumber,
        job_code: u32,
        flag: impl Fn(&JobAssignment) -> bool,
    ) -> bool {
        match self.store.find_assignment(emp_num, job_code) {
            Ok(Some(assignment)) => flag(&assignment),
            Ok(None) => false,
            Err(error) => {
                tracing::warn!(%emp_num, job_code, %error, "assignment lookup failed, defaulting to not required");
                false
            }
        }
    }

    /// All requirement flags for an (employee, job) pair, fail-open.
    pub fn job_requirements(&self, emp_num: EmployeeNumber, job_code: u32) -> JobRequirements {
        match self.store.find_assignment(emp_num, job_code) {
            Ok(Some(assignment)) => assignment.into(),
            Ok(None) => JobRequirements::default(),
            Err(error) => {
                tracing::warn!(%emp_num, job_code, %error, "assignment lookup failed, defaulting requirements");
                JobRequirements::default()
            }
        }
    }

    /// The assignment row itself, if it exists and is readable.
    pub fn assignment(&self, emp_num: EmployeeNumber, job_code: u32) -> Option<JobAssignment> {
        match self.store.find_assignment(emp_num, job_code) {
            Ok(assignment) => assignment,
            Err(error) => {
                tracing::warn!(%emp_num, job_code, %error, "assignment lookup failed");
                None
            }
        }
    }

    /// Active cost codes registered for a job.
    pub fn cost_codes_for_job(&self, job_code: u32) -> Vec<CostCode> {
        match self.store.find_cost_codes_by_job(job_code) {
            Ok(codes) => codes.into_iter().filter(|cc| cc.active).collect(),
            Err(error) => {
                tracing::warn!(job_code, %error, "cost code lookup failed");
                Vec::new()
            }
        }
    }

    /// Validates a cost code string against a job.
    ///
    /// Format is checked first; only a well-formed code is checked for
    /// existence among the job's active cost codes. A lookup failure during
    /// the existence check degrades to a warning so a transient read failure
    /// never blocks a clock operation.
    pub fn validate_cost_code(&self, code: &str, job_code: u32) -> ValidationOutcome {
        let mut result = validation::validate_cost_code_format(code);
        if !result.is_valid {
            return result;
        }

        let Some((job_sfx, bom_item, sequence)) = parse_cost_code(code) else {
            result.push_error("Cost code must be in format \"suffix\\item\\sequence\"");
            return result;
        };

        match self.store.find_cost_codes_by_job(job_code) {
            Ok(codes) => {
                let exists = codes.iter().any(|cc| {
                    cc.active
                        && cc.job_sfx == job_sfx
                        && cc.bom_item == bom_item
                        && cc.sequence == sequence
                });
                if !exists {
                    result.push_error("Cost code does not exist for this job");
                }
            }
            Err(error) => {
                tracing::warn!(job_code, %error, "cost code existence check failed");
                result.push_warning("Could not verify cost code existence");
            }
        }
        result
    }

    /// Finds a registered cost code by its formatted string.
    pub fn find_by_string(&self, job_code: u32, code: &str) -> Option<CostCode> {
        self.cost_codes_for_job(job_code)
            .into_iter()
            .find(|cc| cc.code_string() == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// In-memory store with switchable failure modes.
    struct FakeStore {
        codes: Vec<CostCode>,
        assignment: Option<JobAssignment>,
        fail_codes: Cell<bool>,
        fail_assignment: Cell<bool>,
        code_lookups: Cell<usize>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                codes: Vec::new(),
                assignment: None,
                fail_codes: Cell::new(false),
                fail_assignment: Cell::new(false),
                code_lookups: Cell::new(0),
            }
        }
    }

    impl CostCodeStore for FakeStore {
        fn find_cost_codes_by_job(&self, _job_code: u32) -> Result<Vec<CostCode>, StoreError> {
            self.code_lookups.set(self.code_lookups.get() + 1);
            if self.fail_codes.get() {
                return Err(StoreError::Unavailable("boom".to_string()));
            }
            Ok(self.codes.clone())
        }

        fn find_assignment(
            &self,
            _emp_num: EmployeeNumber,
            _job_code: u32,
        ) -> Result<Option<JobAssignment>, StoreError> {
            if self.fail_assignment.get() {
                return Err(StoreError::Unavailable("boom".to_string()));
            }
            Ok(self.assignment)
        }
    }

    fn emp() -> EmployeeNumber {
        EmployeeNumber::new(42).unwrap()
    }

    fn code(sfx: &str, item: &str, seq: &str, active: bool) -> CostCode {
        CostCode {
            job_code: 10,
            job_sfx: sfx.to_string(),
            bom_item: item.to_string(),
            sequence: seq.to_string(),
            active,
        }
    }

    #[test]
    fn build_parse_are_symmetric() {
        let built = build_cost_code("A", "001", "010");
        assert_eq!(built, "A\\001\\010");
        assert_eq!(
            parse_cost_code(&built),
            Some(("A".to_string(), "001".to_string(), "010".to_string()))
        );
        assert_eq!(parse_cost_code("A\\001"), None);
        assert_eq!(parse_cost_code("A\\001\\010\\X"), None);
    }

    #[test]
    fn missing_assignment_fails_open() {
        // A missing assignment reads as "nothing required, not clockable".
        // Deliberate policy preserved from the shop floor; see DESIGN.md.
        let service = CostCodeService::new(FakeStore::new());
        assert!(!service.is_cost_code_required(emp(), 10));
        assert!(!service.is_quantity_required(emp(), 10));
        assert!(!service.is_split_code_required(emp(), 10));
        assert!(!service.is_job_clockable(emp(), 10));
        assert_eq!(service.job_requirements(emp(), 10), JobRequirements::default());
    }

    #[test]
    fn lookup_failure_also_fails_open() {
        let store = FakeStore::new();
        store.fail_assignment.set(true);
        let service = CostCodeService::new(store);
        assert!(!service.is_cost_code_required(emp(), 10));
        assert!(service.assignment(emp(), 10).is_none());
    }

    #[test]
    fn assignment_flags_pass_through() {
        let mut store = FakeStore::new();
        store.assignment = Some(JobAssignment {
            clockable: true,
            requires_cost_code: true,
            ask_quantity: false,
            ask_split_code: true,
        });
        let service = CostCodeService::new(store);
        assert!(service.is_cost_code_required(emp(), 10));
        assert!(!service.is_quantity_required(emp(), 10));
        assert!(service.is_split_code_required(emp(), 10));
        assert!(service.is_job_clockable(emp(), 10));

        let req = service.job_requirements(emp(), 10);
        assert!(req.cost_code_required);
        assert!(req.clockable);
        assert!(!req.quantity_required);
    }

    #[test]
    fn validate_checks_format_before_existence() {
        let store = FakeStore::new();
        let service = CostCodeService::new(store);

        // Two segments: rejected by format, no store lookup performed.
        let result = service.validate_cost_code("A\\001", 10);
        assert!(!result.is_valid);
        assert_eq!(service.store.code_lookups.get(), 0);
    }

    #[test]
    fn validate_requires_active_exact_match() {
        let mut store = FakeStore::new();
        store.codes = vec![code("A", "001", "010", true), code("B", "002", "020", false)];
        let service = CostCodeService::new(store);

        assert!(service.validate_cost_code("A\\001\\010", 10).is_valid);

        let missing = service.validate_cost_code("C\\003\\030", 10);
        assert!(!missing.is_valid);
        assert_eq!(missing.errors, vec!["Cost code does not exist for this job"]);

        // Inactive codes do not satisfy the existence check.
        let inactive = service.validate_cost_code("B\\002\\020", 10);
        assert!(!inactive.is_valid);
    }

    #[test]
    fn existence_lookup_failure_degrades_to_warning() {
        let store = FakeStore::new();
        store.fail_codes.set(true);
        let service = CostCodeService::new(store);

        let result = service.validate_cost_code("A\\001\\010", 10);
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Could not verify cost code existence"]);
    }

    #[test]
    fn active_filter_on_job_codes() {
        let mut store = FakeStore::new();
        store.codes = vec![code("A", "001", "010", true), code("B", "002", "020", false)];
        let service = CostCodeService::new(store);

        let active = service.cost_codes_for_job(10);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].job_sfx, "A");

        assert!(service.find_by_string(10, "A\\001\\010").is_some());
        assert!(service.find_by_string(10, "B\\002\\020").is_none());
    }
}
