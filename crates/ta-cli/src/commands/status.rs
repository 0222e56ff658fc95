//! Status command for showing an employee's clock state.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDateTime;

use ta_core::clocking::ClockingService;
use ta_core::timecalc;
use ta_core::types::EmployeeNumber;
use ta_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    emp_num: EmployeeNumber,
    json: bool,
    now: NaiveDateTime,
) -> Result<()> {
    let clocking = ClockingService::new(db);
    let open = clocking.open_session(emp_num);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &open)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Employee {emp_num}")?;
    match open {
        Some(session) => {
            let elapsed = timecalc::elapsed_minutes(session.time_in, None, now);
            writeln!(writer, "Clocked in: yes")?;
            writeln!(
                writer,
                "  Job: {}{}",
                session.job_code,
                session
                    .job_desc
                    .as_deref()
                    .map(|d| format!(" - {d}"))
                    .unwrap_or_default()
            )?;
            writeln!(writer, "  Time in: {}", timecalc::format_time(session.time_in))?;
            if let Some(cost_code) = session.cost_code.as_deref() {
                writeln!(writer, "  Cost code: {cost_code}")?;
            }
            writeln!(
                writer,
                "  Elapsed: {elapsed} minutes ({:.2} hours)",
                timecalc::minutes_to_hours(elapsed)
            )?;
        }
        None => {
            writeln!(writer, "Clocked in: no")?;
        }
    }
    Ok(())
}
