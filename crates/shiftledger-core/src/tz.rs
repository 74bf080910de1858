//! Company-timezone conversions.
//!
//! All instants are stored in UTC; dates are local dates in the company
//! timezone. These helpers convert local date ranges to UTC instants for
//! filtering and project UTC instants back onto local dates.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::ShiftledgerError;

pub fn parse_timezone(name: &str) -> Result<Tz, ShiftledgerError> {
    name.parse::<Tz>()
        .map_err(|_| ShiftledgerError::InvalidTimezone(name.to_string()))
}

/// UTC instant of local midnight on `date`.
///
/// DST gaps (no local midnight) resolve one hour forward; ambiguous
/// midnights take the earlier offset.
pub fn local_day_start_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// UTC instant of the last second of `date` in the company timezone.
pub fn local_day_end_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    local_day_start_utc(tz, date + Duration::days(1)) - Duration::seconds(1)
}

/// Inclusive UTC bounds covering `[start, end]` in the company timezone.
pub fn utc_range_for_local_dates(
    tz: Tz,
    start: NaiveDate,
    end: NaiveDate,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_day_start_utc(tz, start), local_day_end_utc(tz, end))
}

/// The local calendar date `at` falls on in the company timezone.
pub fn local_date(tz: Tz, at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chicago() -> Tz {
        parse_timezone("America/Chicago").unwrap()
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_timezone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn midnight_maps_to_utc_offset() {
        // CST is UTC-6 in January.
        let d = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let start = local_day_start_utc(chicago(), d);
        assert_eq!(start.to_rfc3339(), "2025-01-15T06:00:00+00:00");
    }

    #[test]
    fn day_end_is_last_second() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let (start, end) = utc_range_for_local_dates(chicago(), d, d);
        assert_eq!((end - start).num_seconds(), 86_399);
    }

    #[test]
    fn spring_forward_gap_resolves() {
        // 2025-03-09 02:30 does not exist in Chicago; midnight does, but
        // exercise the range across the transition anyway.
        let d = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let (start, end) = utc_range_for_local_dates(chicago(), d, d);
        // The day is only 23 hours long.
        assert_eq!((end - start).num_seconds(), 23 * 3600 - 1);
    }

    #[test]
    fn local_date_rolls_over() {
        // 03:00 UTC is the previous local evening in Chicago.
        let at = Utc.with_ymd_and_hms(2025, 6, 17, 3, 0, 0).unwrap();
        let d = local_date(chicago(), at);
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 6, 16).unwrap());
    }
}
