//! Close planning: validation, revenue, cost basis and net amount.

use crate::domain::{CloseRequest, ClosingKind, Decimal, Lot, TaxState};
use crate::engine::{plan_fifo, settle_gain, ClosePreview, EngineError};

/// Plan a closing event without touching storage.
///
/// Validates the request's quantity convention, matches lots
/// first-in-first-out, derives revenue and cost basis for the closing
/// kind and settles the gain against the tax balances.
///
/// Cost basis is kind-dependent: sells and partial sells use the
/// matched lots' prorated acquisition costs, while redemptions and
/// knock-outs settle the position as one unit against its cumulative
/// `price_paid`. A knock-out has zero revenue whatever the request
/// says. The fee is charged once per event, not per lot.
///
/// # Errors
/// `InvalidQuantity` if the quantity breaks the rules for the kind,
/// including a full-position close with nothing open;
/// `InsufficientOpenQuantity` if a partial sell asks for more than the
/// lots hold.
pub fn preview_close(
    request: &CloseRequest,
    lots: &[Lot],
    price_paid: Decimal,
    tax_state: &TaxState,
) -> Result<ClosePreview, EngineError> {
    let open_qty: i64 = lots
        .iter()
        .filter(|lot| lot.is_open())
        .map(|lot| lot.open_qty)
        .sum();

    let close_qty = if request.kind.is_full_position() {
        if request.requested_qty != 0 {
            return Err(EngineError::InvalidQuantity(format!(
                "{} closes the whole position; expected quantity 0, got {}",
                request.kind, request.requested_qty
            )));
        }
        if open_qty == 0 {
            return Err(EngineError::InvalidQuantity(format!(
                "trade {} has nothing open to close",
                request.trade_id
            )));
        }
        open_qty
    } else {
        request.requested_qty
    };

    let plan = plan_fifo(lots, close_qty)?;

    let revenue = match request.kind {
        ClosingKind::KnockOut => Decimal::zero(),
        _ => request.unit_price * Decimal::from_i64(plan.closed_qty),
    };

    let cost_basis = if request.kind.uses_price_paid_basis() {
        price_paid
    } else {
        plan.cost_basis
    };

    let gross_gain = revenue - request.fee - cost_basis;
    let settlement = settle_gain(gross_gain, tax_state);
    let net_amount = revenue - request.fee - settlement.tax;

    Ok(ClosePreview {
        request: request.clone(),
        consumed: plan.consumed,
        closed_qty: plan.closed_qty,
        revenue,
        cost_basis,
        gross_gain,
        settlement,
        net_amount,
        tax_before: tax_state.clone(),
    })
}
