//! Time rounding, elapsed-minute math, overlap checks, and splits.
//!
//! Everything here is pure: functions take explicit instants (including
//! "now") so callers and tests control the clock. Timestamps are
//! timezone-naive; conversion is the caller's responsibility.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::session::WorkSession;
use crate::types::ValidationOutcome;

/// The rounding granularity: every recorded clock time lands on a
/// 3-minute boundary.
pub const ROUND_MINUTES: i64 = 3;

const ROUND_MS: i64 = ROUND_MINUTES * 60 * 1000;

/// Which edge of a session an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEdge {
    TimeIn,
    TimeOut,
}

/// Errors from session splitting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// An open session has no end and can never be split.
    #[error("cannot split an open session")]
    OpenSession,

    /// The duration does not divide into equal 3-minute multiples.
    #[error("split is not viable: duration must divide into equal 3-minute segments")]
    NotViable,
}

/// Rounds an instant to the nearest 3-minute boundary.
///
/// Computed as `floor((millis + round/2 + 1) / round) * round`, so an exact
/// halfway point rounds up. Idempotent: rounding a rounded time is a no-op.
#[must_use]
pub fn round_time(t: NaiveDateTime) -> NaiveDateTime {
    let millis = t.and_utc().timestamp_millis();
    let rounded = (millis + ROUND_MS / 2 + 1).div_euclid(ROUND_MS) * ROUND_MS;
    DateTime::from_timestamp_millis(rounded).map_or(t, |dt| dt.naive_utc())
}

/// Whole minutes between `start` and `end`.
///
/// An open session (`end` is `None`) is still accruing time and is measured
/// up to `now`.
#[must_use]
pub fn elapsed_minutes(
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> i64 {
    let end = end.unwrap_or(now);
    let millis = (end - start).num_milliseconds();
    (millis + 30_000).div_euclid(60_000)
}

/// Converts minutes to decimal hours, rounded to 2 places.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn minutes_to_hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

/// Validates a candidate time for one edge of a session against its
/// sibling sessions for the same employee-day.
///
/// The candidate must stay inside the overall min/max bound of all
/// sessions, must not cross the session's own opposite edge, and must not
/// collide with the nearest neighbouring session on that side.
#[must_use]
pub fn validate_time_overlap(
    target: &WorkSession,
    all: &[WorkSession],
    candidate: NaiveDateTime,
    edge: TimeEdge,
) -> ValidationOutcome {
    let mut result = ValidationOutcome::valid();

    let times = all
        .iter()
        .flat_map(|s| std::iter::once(s.time_in).chain(s.time_out));
    let (earliest, latest) = match times.clone().min().zip(times.max()) {
        Some(bounds) => bounds,
        None => return result,
    };

    if candidate < earliest || candidate > latest {
        result.push_error("Time must be within the range of all job times");
        return result;
    }

    match edge {
        TimeEdge::TimeIn => {
            if let Some(time_out) = target.time_out {
                if candidate >= time_out {
                    result.push_error("Time in must be before time out");
                }
            }
            // Nearest sibling ending at or before this session starts.
            let previous = all
                .iter()
                .filter(|s| s.id != target.id)
                .filter_map(|s| s.time_out.filter(|out| *out <= target.time_in))
                .max();
            if previous.is_some_and(|out| out > candidate) {
                result.push_error("Time in conflicts with previous job");
            }
        }
        TimeEdge::TimeOut => {
            if candidate <= target.time_in {
                result.push_error("Time out must be after time in");
            }
            // Nearest sibling starting at or after this session ends.
            if let Some(current_end) = target.time_out {
                let next = all
                    .iter()
                    .filter(|s| s.id != target.id)
                    .map(|s| s.time_in)
                    .filter(|time_in| *time_in >= current_end)
                    .min();
                if next.is_some_and(|time_in| time_in < candidate) {
                    result.push_error("Time out conflicts with next job");
                }
            }
        }
    }

    result
}

/// Whether a session can be split into `num_splits` equal segments.
///
/// Viable only when the total duration divides evenly and each segment is a
/// positive multiple of the rounding granularity. An open session is never
/// splittable.
#[must_use]
pub fn is_split_viable(
    time_in: NaiveDateTime,
    time_out: Option<NaiveDateTime>,
    num_splits: u32,
) -> bool {
    let Some(time_out) = time_out else {
        return false;
    };
    if num_splits == 0 {
        return false;
    }
    let total = elapsed_minutes(time_in, Some(time_out), time_out);
    if total <= 0 {
        return false;
    }
    let splits = i64::from(num_splits);
    total % splits == 0 && (total / splits) % ROUND_MINUTES == 0
}

/// Splits a session into `num_splits` contiguous equal-length segments.
///
/// The first segment starts at the original start; the last segment ends at
/// the original end exactly, absorbing any remainder in the actual times.
/// Shared fields are copied; each segment gets a derived id.
pub fn split_session(
    session: &WorkSession,
    num_splits: u32,
) -> Result<Vec<WorkSession>, SplitError> {
    let time_out = session.time_out.ok_or(SplitError::OpenSession)?;
    if !is_split_viable(session.time_in, Some(time_out), num_splits) {
        return Err(SplitError::NotViable);
    }

    let total = elapsed_minutes(session.time_in, Some(time_out), time_out);
    let per_split = total / i64::from(num_splits);
    let step = Duration::minutes(per_split);
    let actual_in = session.actual_time_in;

    let mut segments = Vec::with_capacity(num_splits as usize);
    for i in 0..i64::from(num_splits) {
        let last = i == i64::from(num_splits) - 1;
        let seg_in = session.time_in + step * i32::try_from(i).unwrap_or(i32::MAX);
        let seg_out = if last {
            time_out
        } else {
            session.time_in + step * i32::try_from(i + 1).unwrap_or(i32::MAX)
        };
        let seg_actual_in = actual_in + step * i32::try_from(i).unwrap_or(i32::MAX);
        let seg_actual_out = if last {
            session.actual_time_out.unwrap_or(seg_out)
        } else {
            actual_in + step * i32::try_from(i + 1).unwrap_or(i32::MAX)
        };

        let mut segment = session.clone();
        segment.id = session.id.split_segment(usize::try_from(i).unwrap_or(0) + 1);
        segment.time_in = seg_in;
        segment.time_out = Some(seg_out);
        segment.actual_time_in = seg_actual_in;
        segment.actual_time_out = Some(seg_actual_out);
        segment.elapsed_minutes = per_split;
        segments.push(segment);
    }

    Ok(segments)
}

/// Sums parsed decimal-hour strings for one day.
///
/// Non-numeric or blank values contribute zero; a bad entry never poisons
/// the total.
pub fn day_total<'a, I>(hours: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    hours
        .into_iter()
        .map(|h| h.trim().parse::<f64>().unwrap_or(0.0))
        .sum()
}

/// Sums parsed decimal-hour strings for one week. Same lenient parsing as
/// [`day_total`], different scope.
pub fn week_total<'a, I>(hours: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    day_total(hours)
}

/// Formats an instant in the canonical storage format.
#[must_use]
pub fn format_time(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parses a time string, accepting the canonical format plus common
/// space-separated and minute-precision variants.
#[must_use]
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let value = value.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Midnight-to-end-of-day bounds for a work day.
#[must_use]
pub fn work_day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = date.and_hms_opt(23, 59, 59).unwrap_or_default();
    (start, end)
}

/// Sunday-start week bounds containing `date`.
#[must_use]
pub fn week_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let days_from_sunday = i64::from(date.weekday().num_days_from_sunday());
    let sunday = date - Duration::days(days_from_sunday);
    let (start, _) = work_day_bounds(sunday);
    let (_, end) = work_day_bounds(sunday + Duration::days(6));
    (start, end)
}

/// Whether two instants fall on the same calendar day.
#[must_use]
pub fn is_same_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}
