//! Cents-safe pay arithmetic. Never binary floating point.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

fn round_cents(amount: Decimal) -> i64 {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// `(regular_pay_cents, overtime_pay_cents, total_pay_cents)`.
///
/// Minutes convert to decimal hours; each component rounds to the nearest
/// cent (half up) independently, and the total is the exact sum of the two.
pub fn compute_pay_cents(
    regular_minutes: i64,
    overtime_minutes: i64,
    pay_rate_cents: i64,
    overtime_multiplier: Decimal,
) -> (i64, i64, i64) {
    let sixty = Decimal::from(60);
    let rate = Decimal::from(pay_rate_cents);

    let regular_pay = Decimal::from(regular_minutes) / sixty * rate;
    let overtime_pay = Decimal::from(overtime_minutes) / sixty * rate * overtime_multiplier;

    let regular_cents = round_cents(regular_pay);
    let overtime_cents = round_cents(overtime_pay);
    (regular_cents, overtime_cents, regular_cents + overtime_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multiplier(tenths: i64) -> Decimal {
        Decimal::new(tenths, 1)
    }

    #[test]
    fn forty_hours_at_25_with_overtime() {
        // 40 h regular + 2.5 h overtime at $25.00/h, 1.5×.
        let (regular, overtime, total) =
            compute_pay_cents(2_400, 150, 2_500, multiplier(15));
        assert_eq!(regular, 100_000);
        assert_eq!(overtime, 9_375);
        assert_eq!(total, 109_375);
    }

    #[test]
    fn total_is_exact_sum_of_parts() {
        for minutes in [1, 17, 59, 61, 123, 480, 2_399] {
            for rate in [101, 999, 1_333, 2_500] {
                let (regular, overtime, total) =
                    compute_pay_cents(minutes, minutes / 3, rate, multiplier(15));
                assert_eq!(regular + overtime, total);
            }
        }
    }

    #[test]
    fn fractional_cent_rounds_half_up() {
        // 1 minute at 30¢/h = 0.5¢ exactly; half up gives 1¢.
        let (regular, _, _) = compute_pay_cents(1, 0, 30, multiplier(15));
        assert_eq!(regular, 1);
    }

    #[test]
    fn regeneration_is_bit_for_bit_stable() {
        let first = compute_pay_cents(2_517, 311, 1_847, multiplier(17));
        for _ in 0..10 {
            assert_eq!(compute_pay_cents(2_517, 311, 1_847, multiplier(17)), first);
        }
    }

    #[test]
    fn zero_minutes_zero_pay() {
        assert_eq!(compute_pay_cents(0, 0, 2_500, multiplier(15)), (0, 0, 0));
    }
}
