//! Pure minutes computation. No I/O.

use chrono::{DateTime, Utc};

use shiftledger_core::company::RoundingPolicy;

/// Round `minutes` to the nearest multiple of `step`, half up.
fn nearest(minutes: i64, step: i64) -> i64 {
    ((minutes + step / 2) / step) * step
}

/// Apply a rounding policy to non-negative minutes.
///
/// `15` is the 7-minute rule: a remainder of 0–7 rounds down to the
/// previous quarter hour, 8–14 rounds up to the next.
pub fn apply_rounding(minutes: i64, policy: RoundingPolicy) -> i64 {
    match policy {
        RoundingPolicy::None => minutes,
        RoundingPolicy::Nearest5 => nearest(minutes, 5),
        RoundingPolicy::Nearest6 => nearest(minutes, 6),
        RoundingPolicy::Nearest10 => nearest(minutes, 10),
        RoundingPolicy::Quarter => {
            let remainder = minutes % 15;
            if remainder <= 7 {
                minutes - remainder
            } else {
                minutes - remainder + 15
            }
        }
        RoundingPolicy::Nearest30 => nearest(minutes, 30),
    }
}

/// Paid minutes for one entry.
///
/// An open entry contributes nothing. Breaks are deducted only when they
/// are unpaid, clamped at zero, and rounding applies to the result.
pub fn compute_paid_minutes(
    clock_in: DateTime<Utc>,
    clock_out: Option<DateTime<Utc>>,
    break_minutes: i64,
    policy: RoundingPolicy,
    breaks_paid: bool,
) -> i64 {
    let Some(out) = clock_out else { return 0 };

    let raw_minutes = (out - clock_in).num_minutes();
    let paid = if breaks_paid {
        raw_minutes
    } else {
        (raw_minutes - break_minutes).max(0)
    };
    apply_rounding(paid, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    #[test]
    fn open_entry_contributes_nothing() {
        assert_eq!(
            compute_paid_minutes(at(9, 0), None, 0, RoundingPolicy::Quarter, false),
            0
        );
    }

    #[test]
    fn breaks_deducted_only_when_unpaid() {
        let out = Some(at(17, 0)); // 480 raw
        assert_eq!(
            compute_paid_minutes(at(9, 0), out, 30, RoundingPolicy::None, false),
            450
        );
        assert_eq!(
            compute_paid_minutes(at(9, 0), out, 30, RoundingPolicy::None, true),
            480
        );
    }

    #[test]
    fn break_longer_than_shift_clamps_to_zero() {
        let out = Some(at(9, 20)); // 20 raw
        assert_eq!(
            compute_paid_minutes(at(9, 0), out, 45, RoundingPolicy::None, false),
            0
        );
    }

    #[test]
    fn seven_minute_rule() {
        // 9:00 → 18:07 minus a 30-minute break: 547 − 30 = 517;
        // 517 mod 15 = 7 ⇒ round down to 510.
        assert_eq!(
            compute_paid_minutes(at(9, 0), Some(at(18, 7)), 30, RoundingPolicy::Quarter, false),
            510
        );
        // One more minute worked tips the remainder to 8 ⇒ round up to 525.
        assert_eq!(
            compute_paid_minutes(at(9, 0), Some(at(18, 8)), 30, RoundingPolicy::Quarter, false),
            525
        );
    }

    #[test]
    fn nearest_policies_round_half_up() {
        assert_eq!(apply_rounding(12, RoundingPolicy::Nearest5), 10);
        assert_eq!(apply_rounding(13, RoundingPolicy::Nearest5), 15);
        // Exact midpoints round up, not to even.
        assert_eq!(apply_rounding(15, RoundingPolicy::Nearest6), 18);
        assert_eq!(apply_rounding(15, RoundingPolicy::Nearest10), 20);
        assert_eq!(apply_rounding(15, RoundingPolicy::Nearest30), 30);
        assert_eq!(apply_rounding(44, RoundingPolicy::Nearest30), 30);
        assert_eq!(apply_rounding(45, RoundingPolicy::Nearest30), 60);
    }

    #[test]
    fn identity_policy() {
        assert_eq!(apply_rounding(517, RoundingPolicy::None), 517);
    }

    #[test]
    fn rounding_is_monotonic() {
        let policies = [
            RoundingPolicy::None,
            RoundingPolicy::Nearest5,
            RoundingPolicy::Nearest6,
            RoundingPolicy::Nearest10,
            RoundingPolicy::Quarter,
            RoundingPolicy::Nearest30,
        ];
        let start = at(9, 0);
        for policy in policies {
            let mut previous = 0;
            for worked in 0..360 {
                let paid = compute_paid_minutes(
                    start,
                    Some(start + Duration::minutes(worked)),
                    0,
                    policy,
                    true,
                );
                assert!(
                    paid >= previous,
                    "{policy}: paid minutes decreased at {worked}"
                );
                previous = paid;
            }
        }
    }
}
