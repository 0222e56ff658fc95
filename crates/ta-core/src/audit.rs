//! Append-only audit trail of field mutations.
//!
//! Entries are immutable once written: there is no update or delete surface,
//! only appends and reads. Writing is skipped (and reported as success) when
//! a value did not actually change.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{FieldChange, WorkSession};
use crate::types::{Actor, EmployeeNumber, SessionId, StoreError};

/// The collection name recorded on session mutations.
pub const SESSIONS_COLLECTION: &str = "EmployeeHours";

/// Persistence for audit entries. Append and read only.
pub trait AuditStore {
    /// Writes one entry, assigning its id.
    fn create_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError>;

    /// All entries for one session, oldest first.
    fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<AuditEntry>, StoreError>;

    /// All entries for one employee, oldest first.
    fn find_by_employee(&self, emp_num: EmployeeNumber) -> Result<Vec<AuditEntry>, StoreError>;
}

impl<S: AuditStore> AuditStore for &S {
    fn create_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        (**self).create_entry(entry)
    }

    fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).find_by_session(session_id)
    }

    fn find_by_employee(&self, emp_num: EmployeeNumber) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).find_by_employee(emp_num)
    }
}

/// One immutable record of a field-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub collection: String,
    pub field_changed: String,
    pub session_id: SessionId,
    pub emp_num: EmployeeNumber,
    pub old_data: String,
    pub new_data: String,
    pub description: String,
    /// `"name - role"` of whoever made the change.
    pub actor: String,
    pub changed_at: NaiveDateTime,
}

/// An entry about to be appended. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub collection: String,
    pub field_changed: String,
    pub session_id: SessionId,
    pub emp_num: EmployeeNumber,
    pub old_data: String,
    pub new_data: String,
    pub description: String,
    pub actor: String,
    pub changed_at: NaiveDateTime,
}

/// Result of a best-effort batch append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub errors: Vec<String>,
}

impl BatchOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Append-only history of field mutations over an [`AuditStore`].
#[derive(Debug)]
pub struct AuditTrailService<S> {
    store: S,
}

impl<S: AuditStore> AuditTrailService<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends one field change.
    ///
    /// Returns `Ok(None)` without writing when `old_data == new_data`.
    #[allow(clippy::too_many_arguments)]
    pub fn append_change(
        &self,
        session_id: &SessionId,
        emp_num: EmployeeNumber,
        field_changed: &str,
        collection: &str,
        old_data: &str,
        new_data: &str,
        description: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        self.append_change_at(
            session_id,
            emp_num,
            field_changed,
            collection,
            old_data,
            new_data,
            description,
            actor,
            Utc::now().naive_utc(),
        )
    }

    /// [`Self::append_change`] with an explicit timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn append_change_at(
        &self,
        session_id: &SessionId,
        emp_num: EmployeeNumber,
        field_changed: &str,
        collection: &str,
        old_data: &str,
        new_data: &str,
        description: &str,
        actor: &Actor,
        changed_at: NaiveDateTime,
    ) -> Result<Option<AuditEntry>, StoreError> {
        if old_data == new_data {
            return Ok(None);
        }
        let entry = NewAuditEntry {
            collection: collection.to_string(),
            field_changed: field_changed.to_string(),
            session_id: session_id.clone(),
            emp_num,
            old_data: old_data.to_string(),
            new_data: new_data.to_string(),
            description: description.to_string(),
            actor: actor.to_string(),
            changed_at,
        };
        self.store.create_entry(entry).map(Some)
    }

    /// Records a time-in modification.
    pub fn track_time_in(
        &self,
        session: &WorkSession,
        new_time_in: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        self.append_change(
            &session.id,
            session.emp_num,
            "timeIn",
            SESSIONS_COLLECTION,
            &crate::timecalc::format_time(session.time_in),
            new_time_in,
            "Time in modified",
            actor,
        )
    }

    /// Records a time-out modification.
    pub fn track_time_out(
        &self,
        session: &WorkSession,
        new_time_out: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        let old = session
            .time_out
            .map(crate::timecalc::format_time)
            .unwrap_or_default();
        self.append_change(
            &session.id,
            session.emp_num,
            "timeOut",
            SESSIONS_COLLECTION,
            &old,
            new_time_out,
            "Time out modified",
            actor,
        )
    }

    /// Records a cost code modification.
    pub fn track_cost_code(
        &self,
        session: &WorkSession,
        new_cost_code: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        self.append_change(
            &session.id,
            session.emp_num,
            "costCode",
            SESSIONS_COLLECTION,
            session.cost_code.as_deref().unwrap_or_default(),
            new_cost_code,
            "Cost code modified",
            actor,
        )
    }

    /// Records a quantity modification.
    pub fn track_quantity(
        &self,
        session: &WorkSession,
        new_quantity: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        self.append_change(
            &session.id,
            session.emp_num,
            "units",
            SESSIONS_COLLECTION,
            session.quantity.as_deref().unwrap_or_default(),
            new_quantity,
            "Quantity modified",
            actor,
        )
    }

    /// Records a split code modification.
    pub fn track_split_code(
        &self,
        session: &WorkSession,
        new_split_code: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        self.append_change(
            &session.id,
            session.emp_num,
            "split",
            SESSIONS_COLLECTION,
            session.split_code.as_deref().unwrap_or_default(),
            new_split_code,
            "Split code modified",
            actor,
        )
    }

    /// Records a manager approving the session.
    pub fn track_approval(
        &self,
        session: &WorkSession,
        manager_name: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        let old = if session.manager_approval {
            "Approved"
        } else {
            "Not Approved"
        };
        self.append_change(
            &session.id,
            session.emp_num,
            "approve",
            SESSIONS_COLLECTION,
            old,
            "Approved",
            &format!("Approved by {manager_name}"),
            actor,
        )
    }

    /// Records a manager removing approval.
    pub fn track_unapproval(
        &self,
        session: &WorkSession,
        manager_name: &str,
        actor: &Actor,
    ) -> Result<Option<AuditEntry>, StoreError> {
        self.append_change(
            &session.id,
            session.emp_num,
            "unapprove",
            SESSIONS_COLLECTION,
            "Approved",
            "Not Approved",
            &format!("Approval removed by {manager_name}"),
            actor,
        )
    }

    /// Appends one entry per changed field, best effort.
    ///
    /// A failed append is collected and the remaining entries are still
    /// attempted; the batch never aborts midway.
    pub fn track_multiple_changes(
        &self,
        session_id: &SessionId,
        emp_num: EmployeeNumber,
        changes: &BTreeMap<&str, FieldChange>,
        actor: &Actor,
        description: &str,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (field, change) in changes {
            let result = self.append_change(
                session_id,
                emp_num,
                field,
                SESSIONS_COLLECTION,
                &change.old,
                &change.new,
                description,
                actor,
            );
            if let Err(error) = result {
                tracing::warn!(%session_id, field, %error, "audit append failed");
                outcome
                    .errors
                    .push(format!("Failed to track change for {field}: {error}"));
            }
        }
        outcome
    }

    /// History for one session. A failed read degrades to empty, logged.
    pub fn session_history(&self, session_id: &SessionId) -> Vec<AuditEntry> {
        match self.store.find_by_session(session_id) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::error!(%session_id, %error, "failed to read audit history");
                Vec::new()
            }
        }
    }

    /// History for one employee across all sessions.
    pub fn employee_history(&self, emp_num: EmployeeNumber) -> Vec<AuditEntry> {
        match self.store.find_by_employee(emp_num) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::error!(%emp_num, %error, "failed to read employee audit history");
                Vec::new()
            }
        }
    }
}
