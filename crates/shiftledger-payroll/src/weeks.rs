//! Weekly overtime splitting.
//!
//! The period is carved into weeks anchored on the company's configured
//! week-start weekday; each closed entry lands in the week its *local*
//! clock-in date falls in, and minutes above the weekly threshold bill as
//! overtime.

use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;

use shiftledger_core::company::CompanySettings;
use shiftledger_core::payroll::{LineItemDetails, WeekBlock};
use shiftledger_core::time_entry::{EntryStatus, TimeEntry};
use shiftledger_core::tz::local_date;
use shiftledger_time::compute_paid_minutes;

/// Weeks covering `[start, end]`, anchored on `week_start_day` (0 = Monday)
/// and clamped to the period bounds.
pub fn split_into_weeks(
    start: NaiveDate,
    end: NaiveDate,
    week_start_day: u8,
) -> Vec<(NaiveDate, NaiveDate)> {
    let mut weeks = Vec::new();
    let mut current = start;
    while current <= end {
        let offset = (i64::from(current.weekday().num_days_from_monday())
            - i64::from(week_start_day))
        .rem_euclid(7);
        let week_start = current - Duration::days(offset);
        let week_end = week_start + Duration::days(6);
        weeks.push((week_start.max(start), week_end.min(end)));
        current = week_end + Duration::days(1);
    }
    weeks
}

#[derive(Clone, Debug, Default)]
pub struct WeeklySplit {
    pub regular_minutes: i64,
    pub overtime_minutes: i64,
    pub exceptions_count: u32,
    pub details: LineItemDetails,
}

/// Allocate an employee's entries to weeks and split out overtime.
///
/// Open entries in the period are excluded from minutes and counted as
/// exceptions; edited entries contribute minutes but are flagged too.
pub fn compute_weekly_blocks(
    entries: &[TimeEntry],
    period_start: NaiveDate,
    period_end: NaiveDate,
    settings: &CompanySettings,
    zone: Tz,
) -> WeeklySplit {
    let threshold_minutes = settings.overtime_threshold_minutes();
    let mut split = WeeklySplit::default();

    for (week_start, week_end) in split_into_weeks(
        period_start,
        period_end,
        settings.payroll_week_start_day,
    ) {
        let mut week_minutes = 0i64;
        let mut week_entry_ids = Vec::new();

        for entry in entries {
            let clock_in_date = local_date(zone, entry.clock_in_at);
            if clock_in_date < week_start || clock_in_date > week_end {
                continue;
            }
            if entry.clock_out_at.is_none() {
                split.exceptions_count += 1;
                continue;
            }
            if entry.status == EntryStatus::Edited {
                split.exceptions_count += 1;
            }

            let minutes = compute_paid_minutes(
                entry.clock_in_at,
                entry.clock_out_at,
                entry.break_minutes,
                settings.rounding_policy,
                settings.breaks_paid,
            );

            week_minutes += minutes;
            week_entry_ids.push(entry.id);
            *split.details.days.entry(clock_in_date).or_insert(0) += minutes;
            split.details.time_entry_ids.push(entry.id);
        }

        let overtime = if settings.overtime_enabled {
            (week_minutes - threshold_minutes).max(0)
        } else {
            0
        };
        let regular = week_minutes - overtime;

        split.regular_minutes += regular;
        split.overtime_minutes += overtime;
        split.details.week_blocks.push(WeekBlock {
            week_start,
            week_end,
            regular_minutes: regular,
            overtime_minutes: overtime,
            total_minutes: week_minutes,
            entry_ids: week_entry_ids,
        });
    }

    split
}
