//! Storage layer for the time and attendance engine.
//!
//! Provides persistence for work sessions, cost codes, job assignments,
//! and the audit log using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in the timezone-naive format
//! `2025-06-02T08:00:00`. Lexicographic ordering matches chronological
//! ordering, so range queries compare strings directly. There is no
//! timezone component by design: the shop floor runs on wall-clock time.
//!
//! ## The Open-Session Invariant
//!
//! "At most one open session per employee" is enforced by the database
//! itself via a partial unique index on `emp_num` over rows where
//! `time_out IS NULL`. Concurrent clock-ins race on the insert and the
//! loser gets a constraint violation, which surfaces as
//! [`StoreError::OpenSessionExists`]. Application code must never rely
//! on a read-then-insert check alone.

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use uuid::Uuid;

use ta_core::audit::{AuditEntry, AuditStore, NewAuditEntry};
use ta_core::clocking::ClockingStore;
use ta_core::costcode::{CostCode, CostCodeStore, JobAssignment};
use ta_core::session::{NewSession, SessionPatch, WorkSession};
use ta_core::timecalc;
use ta_core::types::{EmployeeNumber, SessionId, StoreError};

// SQLite reports a violation of the partial unique index by the indexed
// column, not the index name: "UNIQUE constraint failed: work_sessions.emp_num".
const OPEN_SESSION_CONSTRAINT: &str = "work_sessions.emp_num";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
#[error("invalid timestamp in column: {0}")]
struct BadTimestamp(String);

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        tracing::debug!(path = %path.display(), "opening database");
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- Work sessions: one row per clock-in, closed by setting time_out.
            -- time_in/time_out hold the 3-minute-rounded times; the actual_*
            -- columns keep what the clock really saw.
            CREATE TABLE IF NOT EXISTS work_sessions (
                id TEXT PRIMARY KEY,
                emp_num INTEGER NOT NULL,
                job_code INTEGER NOT NULL,
                job_desc TEXT,
                time_in TEXT NOT NULL,
                actual_time_in TEXT NOT NULL,
                time_out TEXT,
                actual_time_out TEXT,
                cost_code TEXT,
                quantity TEXT,
                split_code TEXT,
                break_flag INTEGER NOT NULL DEFAULT 0,
                elapsed_minutes INTEGER NOT NULL DEFAULT 0,
                manager_approval INTEGER NOT NULL DEFAULT 0,
                manager_name TEXT,
                is_edited INTEGER NOT NULL DEFAULT 0
            );

            -- The single-open-session guard. Partial: closed rows do not count.
            CREATE UNIQUE INDEX IF NOT EXISTS ux_open_session
                ON work_sessions(emp_num) WHERE time_out IS NULL;

            CREATE INDEX IF NOT EXISTS idx_sessions_emp_time
                ON work_sessions(emp_num, time_in);

            CREATE TABLE IF NOT EXISTS cost_codes (
                job_code INTEGER NOT NULL,
                job_sfx TEXT NOT NULL,
                bom_item TEXT NOT NULL,
                sequence TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (job_code, job_sfx, bom_item, sequence)
            );

            CREATE TABLE IF NOT EXISTS job_assignments (
                emp_num INTEGER NOT NULL,
                job_code INTEGER NOT NULL,
                clockable INTEGER NOT NULL DEFAULT 0,
                requires_cost_code INTEGER NOT NULL DEFAULT 0,
                ask_quantity INTEGER NOT NULL DEFAULT 0,
                ask_split_code INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (emp_num, job_code)
            );

            -- Append-only. No UPDATE or DELETE is ever issued against this table.
            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                field_changed TEXT NOT NULL,
                session_id TEXT NOT NULL,
                emp_num INTEGER NOT NULL,
                old_data TEXT NOT NULL,
                new_data TEXT NOT NULL,
                description TEXT NOT NULL,
                actor TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_session ON audit_log(session_id);
            CREATE INDEX IF NOT EXISTS idx_audit_emp ON audit_log(emp_num);
            ",
        )?;
        Ok(())
    }

    /// Fetches a single session by id.
    pub fn find_session(&self, id: &SessionId) -> Result<Option<WorkSession>, DbError> {
        let session = self
            .conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM work_sessions WHERE id = ?"
            ))?
            .query_row([id.as_str()], session_from_row)
            .optional()?;
        Ok(session)
    }

    /// Sessions for one employee with `time_in` inside the given range,
    /// oldest first. The range is inclusive on both ends.
    pub fn sessions_for_employee(
        &self,
        emp_num: EmployeeNumber,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<WorkSession>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {SESSION_COLUMNS} FROM work_sessions
            WHERE emp_num = ? AND time_in >= ? AND time_in <= ?
            ORDER BY time_in ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(
            params![
                emp_num.value(),
                timecalc::format_time(start),
                timecalc::format_time(end)
            ],
            session_from_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Registers a cost code for a job, replacing any existing row with the
    /// same key.
    pub fn insert_cost_code(&self, code: &CostCode) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT OR REPLACE INTO cost_codes (job_code, job_sfx, bom_item, sequence, active)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                code.job_code,
                code.job_sfx,
                code.bom_item,
                code.sequence,
                i32::from(code.active)
            ],
        )?;
        Ok(())
    }

    /// Creates or replaces the assignment row for an (employee, job) pair.
    pub fn upsert_assignment(
        &self,
        emp_num: EmployeeNumber,
        job_code: u32,
        assignment: JobAssignment,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT OR REPLACE INTO job_assignments
            (emp_num, job_code, clockable, requires_cost_code, ask_quantity, ask_split_code)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                emp_num.value(),
                job_code,
                i32::from(assignment.clockable),
                i32::from(assignment.requires_cost_code),
                i32::from(assignment.ask_quantity),
                i32::from(assignment.ask_split_code)
            ],
        )?;
        Ok(())
    }
}

const SESSION_COLUMNS: &str = "id, emp_num, job_code, job_desc, time_in, actual_time_in, \
     time_out, actual_time_out, cost_code, quantity, split_code, break_flag, \
     elapsed_minutes, manager_approval, manager_name, is_edited";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<WorkSession> {
    Ok(WorkSession {
        id: SessionId::new(row.get::<_, String>(0)?)
            .map_err(|err| conversion_failure(0, err))?,
        emp_num: EmployeeNumber::new(row.get::<_, i64>(1)?)
            .map_err(|err| conversion_failure(1, err))?,
        job_code: row.get(2)?,
        job_desc: row.get(3)?,
        time_in: get_time(row, 4)?,
        actual_time_in: get_time(row, 5)?,
        time_out: get_optional_time(row, 6)?,
        actual_time_out: get_optional_time(row, 7)?,
        cost_code: row.get(8)?,
        quantity: row.get(9)?,
        split_code: row.get(10)?,
        break_flag: row.get(11)?,
        elapsed_minutes: row.get(12)?,
        manager_approval: row.get::<_, i32>(13)? != 0,
        manager_name: row.get(14)?,
        is_edited: row.get::<_, i32>(15)? != 0,
    })
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    timecalc::parse_time(&raw).ok_or_else(|| conversion_failure(idx, BadTimestamp(raw)))
}

fn get_optional_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        timecalc::parse_time(&raw).ok_or_else(|| conversion_failure(idx, BadTimestamp(raw)))
    })
    .transpose()
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Maps a sqlite error to the store error vocabulary. A unique-constraint
/// violation on the open-session claim is the clock-in race, everything
/// else is infrastructure.
fn store_error(err: &rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, message) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation
            && message
                .as_deref()
                .is_some_and(|m| m.contains(OPEN_SESSION_CONSTRAINT))
        {
            return StoreError::OpenSessionExists;
        }
    }
    StoreError::Unavailable(err.to_string())
}

impl ClockingStore for Database {
    fn find_open_session(
        &self,
        emp_num: EmployeeNumber,
    ) -> Result<Option<WorkSession>, StoreError> {
        self.conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM work_sessions \
                 WHERE emp_num = ? AND time_out IS NULL"
            ))
            .and_then(|mut stmt| {
                stmt.query_row([emp_num.value()], session_from_row).optional()
            })
            .map_err(|err| store_error(&err))
    }

    fn create_session(&self, session: NewSession) -> Result<WorkSession, StoreError> {
        let id = SessionId::new(Uuid::new_v4().to_string())
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        self.conn
            .execute(
                "
                INSERT INTO work_sessions
                (id, emp_num, job_code, job_desc, time_in, actual_time_in, cost_code, break_flag)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id.as_str(),
                    session.emp_num.value(),
                    session.job_code,
                    session.job_desc,
                    timecalc::format_time(session.time_in),
                    timecalc::format_time(session.actual_time_in),
                    session.cost_code,
                    session.break_flag
                ],
            )
            .map_err(|err| store_error(&err))?;

        Ok(WorkSession {
            id,
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
        })
    }

    fn update_session(
        &self,
        id: &SessionId,
        patch: SessionPatch,
    ) -> Result<WorkSession, StoreError> {
        // COALESCE keeps the stored value wherever the patch binds NULL.
        let updated = self
            .conn
            .execute(
                "
                UPDATE work_sessions SET
                    time_out = COALESCE(?1, time_out),
                    actual_time_out = COALESCE(?2, actual_time_out),
                    quantity = COALESCE(?3, quantity),
                    split_code = COALESCE(?4, split_code),
                    break_flag = COALESCE(?5, break_flag),
                    elapsed_minutes = COALESCE(?6, elapsed_minutes),
                    manager_approval = COALESCE(?7, manager_approval),
                    manager_name = COALESCE(?8, manager_name),
                    is_edited = COALESCE(?9, is_edited)
                WHERE id = ?10
                ",
                params![
                    patch.time_out.map(timecalc::format_time),
                    patch.actual_time_out.map(timecalc::format_time),
                    patch.quantity,
                    patch.split_code,
                    patch.break_flag,
                    patch.elapsed_minutes,
                    patch.manager_approval.map(i32::from),
                    patch.manager_name,
                    patch.is_edited.map(i32::from),
                    id.as_str()
                ],
            )
            .map_err(|err| store_error(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.find_session(id)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl CostCodeStore for Database {
    fn find_cost_codes_by_job(&self, job_code: u32) -> Result<Vec<CostCode>, StoreError> {
        let result = self
            .conn
            .prepare(
                "
                SELECT job_code, job_sfx, bom_item, sequence, active
                FROM cost_codes
                WHERE job_code = ?
                ORDER BY job_sfx ASC, bom_item ASC, sequence ASC
                ",
            )
            .and_then(|mut stmt| {
                let rows = stmt.query_map([job_code], |row| {
                    Ok(CostCode {
                        job_code: row.get(0)?,
                        job_sfx: row.get(1)?,
                        bom_item: row.get(2)?,
                        sequence: row.get(3)?,
                        active: row.get::<_, i32>(4)? != 0,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            });
        result.map_err(|err| store_error(&err))
    }

    fn find_assignment(
        &self,
        emp_num: EmployeeNumber,
        job_code: u32,
    ) -> Result<Option<JobAssignment>, StoreError> {
        self.conn
            .prepare(
                "
                SELECT clockable, requires_cost_code, ask_quantity, ask_split_code
                FROM job_assignments
                WHERE emp_num = ? AND job_code = ?
                ",
            )
            .and_then(|mut stmt| {
                stmt.query_row(params![emp_num.value(), job_code], |row| {
                    Ok(JobAssignment {
                        clockable: row.get::<_, i32>(0)? != 0,
                        requires_cost_code: row.get::<_, i32>(1)? != 0,
                        ask_quantity: row.get::<_, i32>(2)? != 0,
                        ask_split_code: row.get::<_, i32>(3)? != 0,
                    })
                })
                .optional()
            })
            .map_err(|err| store_error(&err))
    }
}

impl AuditStore for Database {
    fn create_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "
                INSERT INTO audit_log
                (id, collection, field_changed, session_id, emp_num, old_data, new_data, description, actor, changed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id,
                    entry.collection,
                    entry.field_changed,
                    entry.session_id.as_str(),
                    entry.emp_num.value(),
                    entry.old_data,
                    entry.new_data,
                    entry.description,
                    entry.actor,
                    timecalc::format_time(entry.changed_at)
                ],
            )
            .map_err(|err| store_error(&err))?;

        Ok(AuditEntry {
            id,
            collection: entry.collection,
            field_changed: entry.field_changed,
            session_id: entry.session_id,
            emp_num: entry.emp_num,
            old_data: entry.old_data,
            new_data: entry.new_data,
            description: entry.description,
            actor: entry.actor,
            changed_at: entry.changed_at,
        })
    }

    fn find_by_session(&self, session_id: &SessionId) -> Result<Vec<AuditEntry>, StoreError> {
        self.query_audit(
            "WHERE session_id = ?",
            params![session_id.as_str()],
        )
    }

    fn find_by_employee(&self, emp_num: EmployeeNumber) -> Result<Vec<AuditEntry>, StoreError> {
        self.query_audit("WHERE emp_num = ?", params![emp_num.value()])
    }
}

impl Database {
    fn query_audit(
        &self,
        filter: &str,
        filter_params: impl rusqlite::Params,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let result = self
            .conn
            .prepare(&format!(
                "
                SELECT id, collection, field_changed, session_id, emp_num,
                       old_data, new_data, description, actor, changed_at
                FROM audit_log
                {filter}
                ORDER BY changed_at ASC, id ASC
                "
            ))
            .and_then(|mut stmt| {
                let rows = stmt.query_map(filter_params, audit_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            });
        result.map_err(|err| store_error(&err))
    }
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        collection: row.get(1)?,
        field_changed: row.get(2)?,
        session_id: SessionId::new(row.get::<_, String>(3)?)
            .map_err(|err| conversion_failure(3, err))?,
        emp_num: EmployeeNumber::new(row.get::<_, i64>(4)?)
            .map_err(|err| conversion_failure(4, err))?,
        old_data: row.get(5)?,
        new_data: row.get(6)?,
        description: row.get(7)?,
        actor: row.get(8)?,
        changed_at: get_time(row, 9)?,
    })
}
