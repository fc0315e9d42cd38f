//! Per-user capital-gains tax state.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// Running tax balances threaded through every gain computation.
///
/// A value object: the engine takes one in and hands a new one back,
/// storage owns the durable copy. Compared by value when a close is
/// committed, so two states are interchangeable exactly when all three
/// balances match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxState {
    /// Realized losses available to offset future gains. Never negative.
    pub loss_carryforward: Decimal,
    /// Remaining annual tax-free gain allowance. Never negative.
    pub tax_allowance: Decimal,
    /// Flat rate applied to the taxable remainder, in [0, 1].
    pub tax_rate: Decimal,
}

impl TaxState {
    /// Create a TaxState from its three balances.
    pub fn new(loss_carryforward: Decimal, tax_allowance: Decimal, tax_rate: Decimal) -> Self {
        TaxState {
            loss_carryforward,
            tax_allowance,
            tax_rate,
        }
    }

    /// The starting state: no carryforward, no allowance, zero rate.
    pub fn zeroed() -> Self {
        TaxState {
            loss_carryforward: Decimal::zero(),
            tax_allowance: Decimal::zero(),
            tax_rate: Decimal::zero(),
        }
    }

    /// Check the range invariants.
    ///
    /// # Errors
    /// Names the first field out of range.
    pub fn validate(&self) -> Result<(), InvalidTaxState> {
        if self.loss_carryforward.is_negative() {
            return Err(InvalidTaxState("loss_carryforward"));
        }
        if self.tax_allowance.is_negative() {
            return Err(InvalidTaxState("tax_allowance"));
        }
        if self.tax_rate.is_negative() || self.tax_rate > Decimal::from_i64(1) {
            return Err(InvalidTaxState("tax_rate"));
        }
        Ok(())
    }
}

/// A tax-state field outside its allowed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("tax state field out of range: {0}")]
pub struct InvalidTaxState(pub &'static str);

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_zeroed_state_is_valid() {
        let state = TaxState::zeroed();
        assert!(state.validate().is_ok());
        assert!(state.loss_carryforward.is_zero());
        assert!(state.tax_allowance.is_zero());
        assert!(state.tax_rate.is_zero());
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let negative_loss = TaxState::new(d("-1"), d("0"), d("0.25"));
        assert_eq!(
            negative_loss.validate(),
            Err(InvalidTaxState("loss_carryforward"))
        );

        let negative_allowance = TaxState::new(d("0"), d("-0.01"), d("0.25"));
        assert_eq!(
            negative_allowance.validate(),
            Err(InvalidTaxState("tax_allowance"))
        );

        let rate_above_one = TaxState::new(d("0"), d("0"), d("1.01"));
        assert_eq!(rate_above_one.validate(), Err(InvalidTaxState("tax_rate")));
    }

    #[test]
    fn test_value_equality_ignores_scale() {
        let a = TaxState::new(d("400"), d("300.0"), d("0.25"));
        let b = TaxState::new(d("400.00"), d("300"), d("0.250"));
        assert_eq!(a, b);
    }
}
