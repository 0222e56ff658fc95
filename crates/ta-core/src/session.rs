//! Work session records and the editing projection.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::timecalc;
use crate::types::{EmployeeNumber, SessionId};

/// One clock record for an employee.
///
/// A session with `time_out` unset is *open*: the employee is currently
/// clocked in and the session is still accruing time. At most one open
/// session may exist per employee at any instant; the store enforces this
/// with an atomic claim. Closed sessions are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: SessionId,
    pub emp_num: EmployeeNumber,
    pub job_code: u32,
    pub job_desc: Option<String>,
    /// Clock-in time rounded to the 3-minute boundary.
    pub time_in: NaiveDateTime,
    /// Clock-in time as actually recorded.
    pub actual_time_in: NaiveDateTime,
    /// Rounded clock-out time; `None` while the session is open.
    pub time_out: Option<NaiveDateTime>,
    pub actual_time_out: Option<NaiveDateTime>,
    pub cost_code: Option<String>,
    pub quantity: Option<String>,
    pub split_code: Option<String>,
    pub break_flag: i32,
    /// Whole minutes between rounded in and out, set on clock-out.
    pub elapsed_minutes: i64,
    pub manager_approval: bool,
    pub manager_name: Option<String>,
    pub is_edited: bool,
}

impl WorkSession {
    /// Whether the employee is still clocked in on this session.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.time_out.is_none()
    }
}

/// A session about to be created by clock-in. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub emp_num: EmployeeNumber,
    pub job_code: u32,
    pub job_desc: Option<String>,
    pub time_in: NaiveDateTime,
    pub actual_time_in: NaiveDateTime,
    pub cost_code: Option<String>,
    pub break_flag: i32,
}

/// A partial update applied to an existing session.
///
/// `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub time_out: Option<NaiveDateTime>,
    pub actual_time_out: Option<NaiveDateTime>,
    pub quantity: Option<String>,
    pub split_code: Option<String>,
    pub break_flag: Option<i32>,
    pub elapsed_minutes: Option<i64>,
    pub manager_approval: Option<bool>,
    pub manager_name: Option<String>,
    pub is_edited: Option<bool>,
}

/// One field-level change detected by the editing projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: String,
    pub new: String,
}

/// An editing projection of a [`WorkSession`].
///
/// Carries the current editable values alongside shadow "old" copies taken
/// when the projection was built, so pending edits can be diffed and audited
/// before they are committed. All values are strings because that is what
/// the edit surface exchanges; validation happens in [`crate::validation`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEdit {
    pub id: String,
    pub emp_num: i64,
    pub job_code: String,
    pub old_job_code: String,
    pub cost_code: String,
    pub old_cost_code: String,
    pub units: String,
    pub old_units: String,
    pub split: String,
    pub old_split: String,
    pub time_in: String,
    pub old_time_in: String,
    pub time_out: String,
    pub old_time_out: String,
    /// Display hours, derived from elapsed minutes.
    pub hours: String,
}

impl SessionEdit {
    /// Builds a projection from a session, shadow values equal to current.
    #[must_use]
    pub fn from_session(session: &WorkSession) -> Self {
        let job_code = session.job_desc.as_ref().map_or_else(
            || session.job_code.to_string(),
            |desc| format!("{} - {desc}", session.job_code),
        );
        let time_in = timecalc::format_time(session.time_in);
        let time_out = session
            .time_out
            .map(timecalc::format_time)
            .unwrap_or_default();
        let cost_code = session.cost_code.clone().unwrap_or_default();
        let units = session.quantity.clone().unwrap_or_default();
        let split = session.split_code.clone().unwrap_or_default();
        Self {
            id: session.id.to_string(),
            emp_num: session.emp_num.value(),
            old_job_code: job_code.clone(),
            job_code,
            old_cost_code: cost_code.clone(),
            cost_code,
            old_units: units.clone(),
            units,
            old_split: split.clone(),
            split,
            old_time_in: time_in.clone(),
            time_in,
            old_time_out: time_out.clone(),
            time_out,
            hours: timecalc::minutes_to_hours(session.elapsed_minutes).to_string(),
        }
    }

    /// Diffs current values against their shadows.
    ///
    /// Returns one entry per changed field, keyed by the audit field name.
    /// The map is ordered so audit batches are deterministic.
    #[must_use]
    pub fn changes(&self) -> BTreeMap<&'static str, FieldChange> {
        let mut changes = BTreeMap::new();
        let pairs: [(&'static str, &str, &str); 6] = [
            ("jobCode", &self.old_job_code, &self.job_code),
            ("costCode", &self.old_cost_code, &self.cost_code),
            ("units", &self.old_units, &self.units),
            ("split", &self.old_split, &self.split),
            ("timeIn", &self.old_time_in, &self.time_in),
            ("timeOut", &self.old_time_out, &self.time_out),
        ];
        for (field, old, new) in pairs {
            if old != new {
                changes.insert(
                    field,
                    FieldChange {
                        old: old.to_string(),
                        new: new.to_string(),
                    },
                );
            }
        }
        changes
    }

    /// Whether any editable field differs from its shadow.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.changes().is_empty()
    }
}
