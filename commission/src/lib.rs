//! Commission-Split Arithmetic
//!
//! Splits a gross settlement amount into the platform's fee and the
//! counterparty's share, given a flat fee percentage. The split is
//! deterministic: the fee is rounded half-up to two decimal places and the
//! counterparty share is the exact remainder, so the two parts always sum
//! back to the gross amount to the cent.
//!
//! The same function runs at checkout-creation time (to front-load the split
//! into the payment record) and must produce identical results if re-derived
//! at completion time.
//!
//! # Example
//! ```
//! use commission::split;
//! use rust_decimal::Decimal;
//!
//! let s = split(Decimal::new(10000, 2), Decimal::new(150, 1)).unwrap();
//! assert_eq!(s.platform_fee, Decimal::new(1500, 2));       // 15.00
//! assert_eq!(s.counterparty_amount, Decimal::new(8500, 2)); // 85.00
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Decimal places used for monetary rounding.
const MONEY_SCALE: u32 = 2;

/// The result of splitting a gross amount between platform and counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSplit {
    /// Gross amount charged to the paying party.
    pub total_amount: Decimal,
    /// Fee percentage applied (0..=100).
    pub fee_percentage: Decimal,
    /// Platform's cut, rounded half-up to two decimal places.
    pub platform_fee: Decimal,
    /// Counterparty's share: total minus the rounded fee. Absorbs the
    /// rounding remainder so the parts sum exactly to the total.
    pub counterparty_amount: Decimal,
}

/// Errors from invalid split inputs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("Total amount cannot be negative: {0}")]
    NegativeTotal(Decimal),

    #[error("Fee percentage must be between 0 and 100: {0}")]
    FeePercentageOutOfRange(Decimal),
}

/// Splits `total` into platform fee and counterparty amount.
///
/// Preconditions: `total >= 0` and `0 <= fee_percent <= 100`.
pub fn split(total: Decimal, fee_percent: Decimal) -> Result<CommissionSplit, SplitError> {
    if total.is_sign_negative() && !total.is_zero() {
        return Err(SplitError::NegativeTotal(total));
    }
    if fee_percent.is_sign_negative() || fee_percent > Decimal::ONE_HUNDRED {
        return Err(SplitError::FeePercentageOutOfRange(fee_percent));
    }

    let platform_fee = (total * fee_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    let counterparty_amount = total - platform_fee;

    Ok(CommissionSplit {
        total_amount: total,
        fee_percentage: fee_percent,
        platform_fee,
        counterparty_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fifteen_percent_of_one_hundred() {
        let s = split(dec!(100.00), dec!(15.0)).unwrap();
        assert_eq!(s.platform_fee, dec!(15.00));
        assert_eq!(s.counterparty_amount, dec!(85.00));
    }

    #[test]
    fn parts_sum_exactly_to_total() {
        let cases = [
            (dec!(0.01), dec!(15.0)),
            (dec!(0.10), dec!(15.0)),
            (dec!(10.01), dec!(15.0)),
            (dec!(33.33), dec!(7.5)),
            (dec!(99.99), dec!(2.9)),
            (dec!(1234.56), dec!(12.34)),
        ];
        for (total, pct) in cases {
            let s = split(total, pct).unwrap();
            assert_eq!(
                s.platform_fee + s.counterparty_amount,
                total,
                "split of {total} at {pct}% must be exact"
            );
        }
    }

    #[test]
    fn fee_rounds_half_up() {
        // 0.10 * 15% = 0.015 -> rounds up to 0.02, remainder 0.08
        let s = split(dec!(0.10), dec!(15.0)).unwrap();
        assert_eq!(s.platform_fee, dec!(0.02));
        assert_eq!(s.counterparty_amount, dec!(0.08));

        // 10.01 * 15% = 1.5015 -> 1.50
        let s = split(dec!(10.01), dec!(15.0)).unwrap();
        assert_eq!(s.platform_fee, dec!(1.50));
        assert_eq!(s.counterparty_amount, dec!(8.51));
    }

    #[test]
    fn zero_percent_gives_everything_to_counterparty() {
        let s = split(dec!(50.00), dec!(0)).unwrap();
        assert_eq!(s.platform_fee, dec!(0.00));
        assert_eq!(s.counterparty_amount, dec!(50.00));
    }

    #[test]
    fn hundred_percent_gives_everything_to_platform() {
        let s = split(dec!(50.00), dec!(100)).unwrap();
        assert_eq!(s.platform_fee, dec!(50.00));
        assert_eq!(s.counterparty_amount, dec!(0.00));
    }

    #[test]
    fn zero_total_is_valid() {
        let s = split(dec!(0), dec!(15.0)).unwrap();
        assert_eq!(s.platform_fee, dec!(0));
        assert_eq!(s.counterparty_amount, dec!(0));
    }

    #[test]
    fn negative_total_rejected() {
        assert_eq!(
            split(dec!(-1.00), dec!(15.0)),
            Err(SplitError::NegativeTotal(dec!(-1.00)))
        );
    }

    #[test]
    fn fee_percentage_out_of_range_rejected() {
        assert!(matches!(
            split(dec!(10.00), dec!(-0.1)),
            Err(SplitError::FeePercentageOutOfRange(_))
        ));
        assert!(matches!(
            split(dec!(10.00), dec!(100.1)),
            Err(SplitError::FeePercentageOutOfRange(_))
        ));
    }

    #[test]
    fn same_inputs_same_split_across_call_sites() {
        // Checkout creation and completion both derive the split from the
        // work-order cost; the results must be interchangeable.
        let at_checkout = split(dec!(247.50), dec!(15.0)).unwrap();
        let at_completion = split(dec!(247.50), dec!(15.0)).unwrap();
        assert_eq!(at_checkout, at_completion);
    }
}
