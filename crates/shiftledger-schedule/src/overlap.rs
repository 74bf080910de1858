//! The pure overlap predicate.
//!
//! Shifts are `(date, start_time, end_time)` triples in company-local time;
//! `end_time <= start_time` means the shift crosses midnight. Intervals are
//! normalized onto an absolute axis before comparison, so shifts on
//! different dates compare correctly.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use shiftledger_core::types::{ShiftId, UserId};

/// The absolute `[start, end)` interval of a scheduled shift.
fn absolute_interval(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> (NaiveDateTime, NaiveDateTime) {
    let start_dt = date.and_time(start);
    let mut end_dt = date.and_time(end);
    if end_dt <= start_dt {
        end_dt += Duration::days(1);
    }
    (start_dt, end_dt)
}

/// Whether two shifts occupy intersecting spans of absolute time.
///
/// Touching endpoints (`a.end == b.start`) do not overlap.
pub fn shifts_overlap(
    date_a: NaiveDate,
    start_a: NaiveTime,
    end_a: NaiveTime,
    date_b: NaiveDate,
    start_b: NaiveTime,
    end_b: NaiveTime,
) -> bool {
    let (a_start, a_end) = absolute_interval(date_a, start_a, end_a);
    let (b_start, b_end) = absolute_interval(date_b, start_b, end_b);
    a_start < b_end && b_start < a_end
}

/// Whether a shift's absolute interval intersects a local date window
/// (`[window_start, window_end]`, inclusive dates).
pub fn shift_in_window(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> bool {
    let (s, e) = absolute_interval(date, start, end);
    let w_start = window_start.and_time(NaiveTime::MIN);
    let w_end = (window_end + Duration::days(1)).and_time(NaiveTime::MIN);
    s < w_end && w_start < e
}

/// One detected scheduling conflict, ready for the UI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftConflict {
    pub conflicting_shift_id: ShiftId,
    pub conflicting_shift_date: NaiveDate,
    pub conflicting_start_time: NaiveTime,
    pub conflicting_end_time: NaiveTime,
    pub employee_id: UserId,
    pub employee_name: String,
    pub message: String,
}
