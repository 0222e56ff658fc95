//! History command for reading the audit trail.

use std::io::Write;

use anyhow::Result;

use ta_core::audit::{AuditEntry, AuditTrailService};
use ta_core::timecalc;
use ta_core::types::{EmployeeNumber, SessionId};
use ta_db::Database;

/// What to read the trail for.
#[derive(Debug)]
pub enum Target {
    Employee(EmployeeNumber),
    Session(SessionId),
}

pub fn run<W: Write>(writer: &mut W, db: &Database, target: &Target) -> Result<()> {
    let audit = AuditTrailService::new(db);
    let entries = match target {
        Target::Employee(emp_num) => {
            writeln!(writer, "Audit history for employee {emp_num}")?;
            audit.employee_history(*emp_num)
        }
        Target::Session(session_id) => {
            writeln!(writer, "Audit history for session {session_id}")?;
            audit.session_history(session_id)
        }
    };

    if entries.is_empty() {
        writeln!(writer, "No entries.")?;
        return Ok(());
    }
    for entry in &entries {
        write_entry(writer, entry)?;
    }
    Ok(())
}

fn write_entry<W: Write>(writer: &mut W, entry: &AuditEntry) -> Result<()> {
    writeln!(
        writer,
        "- {} {} by {}: {}",
        timecalc::format_time(entry.changed_at),
        entry.field_changed,
        entry.actor,
        entry.description
    )?;
    if !entry.old_data.is_empty() {
        writeln!(writer, "    old: {}", entry.old_data)?;
    }
    if !entry.new_data.is_empty() {
        writeln!(writer, "    new: {}", entry.new_data)?;
    }
    Ok(())
}
