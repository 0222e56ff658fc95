//! Clock-out and force-clock-out commands.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDateTime;

use ta_core::clocking::{ClockOutRequest, ClockingService};
use ta_core::timecalc;
use ta_core::types::{Actor, EmployeeNumber};
use ta_core::TimeClock;
use ta_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    request: &ClockOutRequest,
    actor: &Actor,
) -> Result<()> {
    let clock = TimeClock::new(db, db, db);
    match clock.execute_clock_out(request, actor) {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                writeln!(writer, "warning: {warning}")?;
            }
            let time_out = outcome
                .session
                .time_out
                .map(timecalc::format_time)
                .unwrap_or_default();
            writeln!(
                writer,
                "Clocked out employee {} at {} ({} minutes, {:.2} hours)",
                outcome.session.emp_num,
                time_out,
                outcome.session.elapsed_minutes,
                timecalc::minutes_to_hours(outcome.session.elapsed_minutes)
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
            bail!("clock out rejected");
        }
    }
}

/// Manager override for a stuck open session.
pub fn force<W: Write>(
    writer: &mut W,
    db: &Database,
    emp_num: EmployeeNumber,
    clock_out_time: NaiveDateTime,
    manager: &str,
) -> Result<()> {
    let clocking = ClockingService::new(db);
    match clocking.force_clock_out(emp_num, clock_out_time, manager) {
        Ok(session) => {
            let time_out = session.time_out.map(timecalc::format_time).unwrap_or_default();
            writeln!(
                writer,
                "Force clocked out employee {} at {} by {}",
                session.emp_num, time_out, manager
            )?;
            Ok(())
        }
        Err(error) => {
            writeln!(writer, "error: {error}")?;
            bail!("force clock out rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use insta::assert_snapshot;
    use ta_core::clocking::ClockInRequest;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn emp() -> EmployeeNumber {
        EmployeeNumber::new(42).unwrap()
    }

    fn clock_in(db: &Database, time: NaiveDateTime) {
        let actor = Actor::new("terminal", "operator");
        let request = ClockInRequest {
            emp_num: emp(),
            job_code: 10,
            clocked_time: time,
            cost_code: None,
            job_desc: Some("Welding".to_string()),
        };
        let mut sink = Vec::new();
        crate::commands::clock_in::run(&mut sink, db, &request, &actor, time).unwrap();
    }

    #[test]
    fn clock_out_reports_elapsed_time() {
        let db = Database::open_in_memory().unwrap();
        clock_in(&db, at(8, 1, 10));

        let request = ClockOutRequest {
            emp_num: emp(),
            clocked_time: at(12, 0, 0),
            units: Some("150".to_string()),
            split: None,
            break_flag: 0,
        };
        let actor = Actor::new("terminal", "operator");
        let mut output = Vec::new();
        run(&mut output, &db, &request, &actor).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(
            output,
            @"Clocked out employee 42 at 2025-06-02T12:00:00 (240 minutes, 4.00 hours)"
        );
    }

    #[test]
    fn clock_out_without_session_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let request = ClockOutRequest {
            emp_num: emp(),
            clocked_time: at(12, 0, 0),
            units: None,
            split: None,
            break_flag: 0,
        };
        let actor = Actor::new("terminal", "operator");
        let mut output = Vec::new();
        let err = run(&mut output, &db, &request, &actor).unwrap_err();
        assert_eq!(err.to_string(), "clock out rejected");

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"error: No active clock in found for employee");
    }

    #[test]
    fn force_out_stamps_manager() {
        let db = Database::open_in_memory().unwrap();
        clock_in(&db, at(8, 0, 0));

        let mut output = Vec::new();
        force(&mut output, &db, emp(), at(8, 0, 0), "Pat").unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"Force clocked out employee 42 at 2025-06-02T08:00:00 by Pat");
    }
}
