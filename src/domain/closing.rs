//! Closing events: request and persisted record types.

use crate::domain::{Decimal, EventKind, TradeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The four ways a position (or part of it) stops being open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingKind {
    /// Full close at market.
    Sell,
    /// Close of part of the open quantity.
    PartialSell,
    /// Issuer payout at expiry; closes everything.
    Redemption,
    /// Barrier hit; position expires worthless, closes everything.
    KnockOut,
}

impl ClosingKind {
    /// The ledger event kind recorded for this close.
    pub fn event_kind(&self) -> EventKind {
        match self {
            ClosingKind::Sell => EventKind::Sell,
            ClosingKind::PartialSell => EventKind::PartialSell,
            ClosingKind::Redemption => EventKind::Redemption,
            ClosingKind::KnockOut => EventKind::KnockOut,
        }
    }

    /// True for kinds that always consume the whole remaining quantity.
    pub fn is_full_position(&self) -> bool {
        !matches!(self, ClosingKind::PartialSell)
    }

    /// True when the position's cumulative price paid, not per-lot
    /// cost, is the cost basis (redemption and knock-out settle the
    /// position as one unit).
    pub fn uses_price_paid_basis(&self) -> bool {
        matches!(self, ClosingKind::Redemption | ClosingKind::KnockOut)
    }
}

impl std::fmt::Display for ClosingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_kind().as_str())
    }
}

/// One requested closing event, before any computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    /// Position being closed.
    pub trade_id: TradeId,
    /// What kind of close this is.
    pub kind: ClosingKind,
    /// Quantity to close. Must be 0 for full-position kinds (they
    /// consume all remaining quantity) and positive for partial sells.
    pub requested_qty: i64,
    /// Proceeds per unit. Zero for knock-outs.
    pub unit_price: Decimal,
    /// Flat fee for the whole event, charged once, not per lot.
    pub fee: Decimal,
    /// Execution date.
    pub executed_at: NaiveDate,
}

impl CloseRequest {
    /// Full sell of everything still open.
    pub fn sell(trade_id: TradeId, unit_price: Decimal, fee: Decimal, executed_at: NaiveDate) -> Self {
        CloseRequest {
            trade_id,
            kind: ClosingKind::Sell,
            requested_qty: 0,
            unit_price,
            fee,
            executed_at,
        }
    }

    /// Sell of `qty` units out of the open quantity.
    pub fn partial_sell(
        trade_id: TradeId,
        qty: i64,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Self {
        CloseRequest {
            trade_id,
            kind: ClosingKind::PartialSell,
            requested_qty: qty,
            unit_price,
            fee,
            executed_at,
        }
    }

    /// Issuer redemption at `unit_price` per unit.
    pub fn redemption(
        trade_id: TradeId,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Self {
        CloseRequest {
            trade_id,
            kind: ClosingKind::Redemption,
            requested_qty: 0,
            unit_price,
            fee,
            executed_at,
        }
    }

    /// Knock-out: the position expires with zero proceeds.
    pub fn knock_out(trade_id: TradeId, executed_at: NaiveDate) -> Self {
        CloseRequest {
            trade_id,
            kind: ClosingKind::KnockOut,
            requested_qty: 0,
            unit_price: Decimal::zero(),
            fee: Decimal::zero(),
            executed_at,
        }
    }
}

/// The persisted record of a committed close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingTransaction {
    /// Position the close belongs to.
    pub trade_id: TradeId,
    /// What kind of close this was.
    pub kind: ClosingKind,
    /// Execution date.
    pub executed_at: NaiveDate,
    /// Proceeds per unit.
    pub unit_price: Decimal,
    /// Quantity closed.
    pub qty: i64,
    /// Flat fee charged for the event.
    pub fee: Decimal,
    /// Tax owed on the event.
    pub tax: Decimal,
    /// Net amount received: revenue - fee - tax.
    pub total_price: Decimal,
    /// Realized gross gain, rounded to 2 decimals for the record.
    pub gain: Decimal,
}
