//! Field-level validation rules for session edits and clock operations.
//!
//! Every rule returns a [`ValidationOutcome`] value. Hard failures land in
//! `errors`; soft anomalies (blank optional fields, suspicious timestamps)
//! land in `warnings` and never block the operation.

use chrono::{Duration, NaiveDateTime};

use crate::session::SessionEdit;
use crate::timecalc;
use crate::types::{JobCode, ValidationOutcome};

/// Maximum length of a split code.
const MAX_SPLIT_LEN: usize = 10;

/// An editable field on a work session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoursField {
    JobCode,
    CostCode,
    Units,
    Split,
    TimeIn,
    TimeOut,
}

impl HoursField {
    /// The field name used in audit entries and edit payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::JobCode => "jobCode",
            Self::CostCode => "costCode",
            Self::Units => "units",
            Self::Split => "split",
            Self::TimeIn => "timeIn",
            Self::TimeOut => "timeOut",
        }
    }
}

impl std::str::FromStr for HoursField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jobCode" => Ok(Self::JobCode),
            "costCode" => Ok(Self::CostCode),
            "units" => Ok(Self::Units),
            "split" => Ok(Self::Split),
            "timeIn" => Ok(Self::TimeIn),
            "timeOut" => Ok(Self::TimeOut),
            _ => Err(format!("unknown field: {s}")),
        }
    }
}

impl std::fmt::Display for HoursField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a new value for one field of a session edit.
#[must_use]
pub fn validate_field(edit: &SessionEdit, field: HoursField, new_value: &str) -> ValidationOutcome {
    match field {
        HoursField::JobCode => validate_job_code(new_value),
        HoursField::CostCode => validate_cost_code_format(new_value),
        HoursField::Units => validate_units(new_value),
        HoursField::Split => validate_split(new_value),
        HoursField::TimeIn | HoursField::TimeOut => validate_time_edit(edit, field, new_value),
    }
}

/// Job code is required and must be `"<positive integer> - <description>"`.
#[must_use]
pub fn validate_job_code(value: &str) -> ValidationOutcome {
    if value.trim().is_empty() {
        return ValidationOutcome::invalid("Job code is required");
    }
    match value.parse::<JobCode>() {
        Ok(_) => ValidationOutcome::valid(),
        Err(_) => ValidationOutcome::invalid("Job code must be in format \"123 - Description\""),
    }
}

/// Cost code is required and must be three non-empty backslash-separated
/// segments. Format only; existence is checked by the cost code service.
#[must_use]
pub fn validate_cost_code_format(value: &str) -> ValidationOutcome {
    if value.trim().is_empty() {
        return ValidationOutcome::invalid("Cost code is required");
    }
    let parts: Vec<&str> = value.split('\\').collect();
    if parts.len() != 3 {
        return ValidationOutcome::invalid(
            "Cost code must be in format \"suffix\\item\\sequence\"",
        );
    }
    if parts.iter().any(|part| part.trim().is_empty()) {
        return ValidationOutcome::invalid("All cost code parts must be filled");
    }
    ValidationOutcome::valid()
}

/// Units are optional (blank warns) but must parse as a non-negative number.
#[must_use]
pub fn validate_units(value: &str) -> ValidationOutcome {
    let mut result = ValidationOutcome::valid();
    if value.trim().is_empty() {
        result.push_warning("Units not specified");
        return result;
    }
    match value.trim().parse::<f64>() {
        Ok(quantity) if quantity < 0.0 => {
            result.push_error("Units cannot be negative");
        }
        Ok(_) => {}
        Err(_) => {
            result.push_error("Units must be a valid number");
        }
    }
    result
}

/// Split code is optional (blank warns) with a 10-character cap.
#[must_use]
pub fn validate_split(value: &str) -> ValidationOutcome {
    let mut result = ValidationOutcome::valid();
    if value.trim().is_empty() {
        result.push_warning("Split code not specified");
        return result;
    }
    if value.len() > MAX_SPLIT_LEN {
        result.push_error("Split code is too long (max 10 characters)");
    }
    result
}

/// Time-in must precede the session's time-out and vice versa.
fn validate_time_edit(edit: &SessionEdit, field: HoursField, new_value: &str) -> ValidationOutcome {
    if new_value.trim().is_empty() {
        return ValidationOutcome::invalid("Time cannot be empty");
    }
    let Some(new_time) = timecalc::parse_time(new_value) else {
        return ValidationOutcome::invalid("Invalid time format");
    };

    let mut result = ValidationOutcome::valid();
    match field {
        HoursField::TimeIn => {
            if let Some(time_out) = timecalc::parse_time(&edit.time_out) {
                if new_time >= time_out {
                    result.push_error("Time in must be before time out");
                }
            }
        }
        HoursField::TimeOut => {
            if let Some(time_in) = timecalc::parse_time(&edit.time_in) {
                if new_time <= time_in {
                    result.push_error("Time out must be after time in");
                }
            }
        }
        _ => {}
    }
    result
}

/// Employee numbers must parse as positive integers.
#[must_use]
pub fn validate_employee_number(value: &str) -> ValidationOutcome {
    match value.trim().parse::<i64>() {
        Ok(num) if num > 0 => ValidationOutcome::valid(),
        Ok(_) => ValidationOutcome::invalid("Employee number must be positive"),
        Err(_) => ValidationOutcome::invalid("Employee number must be a valid number"),
    }
}

/// Validates a time entry string: must parse; warns (never errors) when
/// more than a year in the past or beyond the next calendar day.
#[must_use]
pub fn validate_time_entry(value: &str, now: NaiveDateTime) -> ValidationOutcome {
    if value.trim().is_empty() {
        return ValidationOutcome::invalid("Time cannot be empty");
    }
    let Some(time) = timecalc::parse_time(value) else {
        return ValidationOutcome::invalid("Invalid time format");
    };
    validate_time_instant(time, now)
}

/// Sanity-checks an already-parsed instant against "now".
#[must_use]
pub fn validate_time_instant(time: NaiveDateTime, now: NaiveDateTime) -> ValidationOutcome {
    let mut result = ValidationOutcome::valid();
    let one_year_ago = now - Duration::days(365);
    let tomorrow = now + Duration::days(1);
    if time < one_year_ago {
        result.push_warning("Time is more than a year ago");
    }
    if time > tomorrow {
        result.push_warning("Time is in the future");
    }
    result
}

/// Membership check for an operation number against the employee's valid
/// operations.
#[must_use]
pub fn validate_operation_number(op_num: u32, valid_operations: &[u32]) -> bool {
    valid_operations.contains(&op_num)
}

/// Editing is permitted only for managers and only while "now" falls inside
/// the administrative edit window.
#[must_use]
pub fn can_edit_hours(
    is_manager: bool,
    window_start: Option<NaiveDateTime>,
    window_end: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> bool {
    if !is_manager {
        return false;
    }
    match (window_start, window_end) {
        (Some(start), Some(end)) => now >= start && now <= end,
        _ => false,
    }
}
