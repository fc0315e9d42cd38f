//! Gain settlement against loss carryforward, allowance and tax rate.

use crate::domain::{Decimal, TaxState};
use crate::engine::TaxSettlement;

/// Settle one realized gross gain against the tax balances.
///
/// Offset order is fixed policy: loss carryforward absorbs the gain
/// first, then the annual allowance, and only the remainder is taxed
/// at the flat rate, rounded to 2 decimals half away from zero.
/// A loss is never taxed; it grows the carryforward and leaves the
/// allowance alone.
///
/// Deterministic in `(gross_gain, state)`; the caller decides when the
/// returned `tax_after` becomes the durable state.
pub fn settle_gain(gross_gain: Decimal, state: &TaxState) -> TaxSettlement {
    if !gross_gain.is_positive() {
        return TaxSettlement {
            used_loss_carryforward: Decimal::zero(),
            used_allowance: Decimal::zero(),
            taxable: Decimal::zero(),
            tax: Decimal::zero(),
            tax_after: TaxState {
                loss_carryforward: state.loss_carryforward + gross_gain.abs(),
                tax_allowance: state.tax_allowance,
                tax_rate: state.tax_rate,
            },
        };
    }

    let used_loss_carryforward = state.loss_carryforward.min(gross_gain);
    let after_loss = gross_gain - used_loss_carryforward;

    let used_allowance = state.tax_allowance.min(after_loss);
    let taxable = after_loss - used_allowance;

    let tax = (taxable * state.tax_rate).round2();

    TaxSettlement {
        used_loss_carryforward,
        used_allowance,
        taxable,
        tax,
        tax_after: TaxState {
            loss_carryforward: state.loss_carryforward - used_loss_carryforward,
            tax_allowance: state.tax_allowance - used_allowance,
            tax_rate: state.tax_rate,
        },
    }
}
