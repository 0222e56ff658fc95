//! Clock-in command.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDateTime;

use ta_core::clocking::ClockInRequest;
use ta_core::timecalc;
use ta_core::types::Actor;
use ta_core::TimeClock;
use ta_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    request: &ClockInRequest,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<()> {
    let clock = TimeClock::new(db, db, db);
    match clock.execute_clock_in_at(request, actor, now) {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                writeln!(writer, "warning: {warning}")?;
            }
            writeln!(
                writer,
                "Clocked in employee {} on job {} at {}",
                outcome.session.emp_num,
                outcome.session.job_code,
                timecalc::format_time(outcome.session.time_in)
            )?;
            Ok(())
        }
        Err(failure) => {
            for warning in &failure.warnings {
                writeln!(writer, "warning: {warning}")?;
            }
            for error in &failure.errors {
                writeln!(writer, "error: {error}")?;
            }
            bail!("clock in rejected");
        }
    }
}
