//! Opening transactions and the lots they become.

use crate::domain::{Decimal, EventKind, LotId, TradeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A tax lot: one buy or rebuy and the part of it not yet closed.
///
/// Lots are created once and never deleted; closing a position only
/// reduces `open_qty`. Invariant: `0 <= open_qty <= original_qty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    /// Stable identifier (storage rowid of the opening transaction).
    pub id: LotId,
    /// Position this lot belongs to.
    pub trade_id: TradeId,
    /// Execution date of the opening transaction; first-in-first-out
    /// consumption follows this date, then `id`.
    pub opened_at: NaiveDate,
    /// Total acquisition cost of the lot (unit price × quantity + fee).
    pub cost_basis: Decimal,
    /// Quantity at open. Positive.
    pub original_qty: i64,
    /// Quantity not yet consumed by closes.
    pub open_qty: i64,
}

impl Lot {
    /// Create a new Lot.
    pub fn new(
        id: LotId,
        trade_id: TradeId,
        opened_at: NaiveDate,
        cost_basis: Decimal,
        original_qty: i64,
        open_qty: i64,
    ) -> Self {
        Lot {
            id,
            trade_id,
            opened_at,
            cost_basis,
            original_qty,
            open_qty,
        }
    }

    /// True while the lot still has unconsumed quantity.
    pub fn is_open(&self) -> bool {
        self.open_qty > 0
    }

    /// Acquisition cost attributable to consuming `qty` units.
    ///
    /// Prorated from the ORIGINAL total cost and original quantity, so
    /// the per-unit cost stays fixed no matter how much of the lot was
    /// consumed before. `original_qty` is positive for any lot that
    /// still has open quantity.
    pub fn cost_for(&self, qty: i64) -> Decimal {
        debug_assert!(self.original_qty > 0);
        self.cost_basis * Decimal::from_i64(qty) / Decimal::from_i64(self.original_qty)
    }
}

/// An opening event (buy or rebuy) about to be recorded.
///
/// Once stored it becomes a `Lot`: the row id is the lot id and
/// `total_price` is the lot's cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningTransaction {
    /// Position the opening belongs to.
    pub trade_id: TradeId,
    /// Buy or Rebuy.
    pub kind: EventKind,
    /// Execution date.
    pub executed_at: NaiveDate,
    /// Price paid per unit.
    pub unit_price: Decimal,
    /// Quantity bought. Positive.
    pub qty: i64,
    /// Order fee.
    pub fee: Decimal,
    /// Total cost: unit_price × qty + fee.
    pub total_price: Decimal,
}

impl OpeningTransaction {
    /// Create an opening with its total cost derived from the parts.
    pub fn new(
        trade_id: TradeId,
        kind: EventKind,
        executed_at: NaiveDate,
        unit_price: Decimal,
        qty: i64,
        fee: Decimal,
    ) -> Self {
        let total_price = unit_price * Decimal::from_i64(qty) + fee;
        OpeningTransaction {
            trade_id,
            kind,
            executed_at,
            unit_price,
            qty,
            fee,
            total_price,
        }
    }
}
