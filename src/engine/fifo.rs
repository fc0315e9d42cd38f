//! First-in-first-out lot matching.

use crate::domain::{sort_lots_fifo, Decimal, Lot};
use crate::engine::{AllocationPlan, EngineError, LotConsumption};

/// Plan the consumption of `close_qty` units from a trade's lots.
///
/// Lots are consumed oldest first (opening date, then id). Each lot
/// contributes `min(remaining, open_qty)` units at a cost prorated
/// from its original acquisition cost, so a lot's per-unit cost never
/// drifts across successive partial closes.
///
/// Pure: the caller's lots are untouched, and planning the same close
/// twice yields the same plan. All-or-nothing: if the lots cannot
/// cover the full quantity, no partial plan is produced.
///
/// # Errors
/// `InvalidQuantity` for a non-positive `close_qty`;
/// `InsufficientOpenQuantity` if the open lots cannot cover it.
pub fn plan_fifo(lots: &[Lot], close_qty: i64) -> Result<AllocationPlan, EngineError> {
    if close_qty <= 0 {
        return Err(EngineError::InvalidQuantity(format!(
            "close quantity must be positive, got {}",
            close_qty
        )));
    }

    // Sort here instead of trusting storage row order.
    let mut open: Vec<Lot> = lots.iter().filter(|lot| lot.is_open()).cloned().collect();
    sort_lots_fifo(&mut open);

    let available: i64 = open.iter().map(|lot| lot.open_qty).sum();
    if available < close_qty {
        return Err(EngineError::InsufficientOpenQuantity {
            requested: close_qty,
            available,
        });
    }

    let mut consumed = Vec::new();
    let mut cost_basis = Decimal::zero();
    let mut remaining = close_qty;
    for lot in &open {
        if remaining == 0 {
            break;
        }
        let used = remaining.min(lot.open_qty);
        let cost = lot.cost_for(used);
        consumed.push(LotConsumption {
            lot_id: lot.id,
            qty: used,
            cost,
        });
        cost_basis = cost_basis + cost;
        remaining -= used;
    }

    Ok(AllocationPlan {
        consumed,
        closed_qty: close_qty,
        cost_basis,
    })
}
