//! CLI subcommand implementations.

pub mod clock_in;
pub mod clock_out;
pub mod history;
pub mod jobs;
pub mod status;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;

use ta_core::timecalc;
use ta_core::types::EmployeeNumber;

/// Parses an `--emp` argument into a validated employee number.
pub fn employee(raw: i64) -> Result<EmployeeNumber> {
    EmployeeNumber::new(raw).context("invalid employee number")
}

/// Resolves an optional `--time` argument, defaulting to `now`.
pub fn resolve_time(raw: Option<&str>, now: NaiveDateTime) -> Result<NaiveDateTime> {
    match raw {
        None => Ok(now),
        Some(raw) => match timecalc::parse_time(raw) {
            Some(parsed) => Ok(parsed),
            None => bail!("unrecognized time: {raw}"),
        },
    }
}
