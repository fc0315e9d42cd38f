//! Pure computation engine for lot allocation and tax settlement.
//!
//! Nothing in here touches storage. A close is planned from a snapshot
//! of the trade's lots and the tax balances; applying the plan is the
//! store's job, so planning twice is free and commit stays explicit.

use crate::domain::{CloseRequest, ClosingTransaction, Decimal, LotId, TaxState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod close;
pub mod fifo;
pub mod tax;

pub use close::preview_close;
pub use fifo::plan_fifo;
pub use tax::settle_gain;

/// Errors raised while planning a close. Nothing has been applied when
/// one of these comes back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The close quantity violates the rules for its kind.
    #[error("invalid close quantity: {0}")]
    InvalidQuantity(String),
    /// The lots cannot cover the requested quantity.
    #[error("close quantity {requested} exceeds open quantity {available}")]
    InsufficientOpenQuantity { requested: i64, available: i64 },
}

/// Quantity taken from a single lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotConsumption {
    pub lot_id: LotId,
    pub qty: i64,      // units taken from this lot
    pub cost: Decimal, // prorated share of the lot's acquisition cost
}

/// First-in-first-out allocation of a close across a trade's lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub consumed: Vec<LotConsumption>, // oldest lot first
    pub closed_qty: i64,
    pub cost_basis: Decimal, // sum of the consumption costs
}

/// Outcome of settling one gross gain against the tax balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettlement {
    pub used_loss_carryforward: Decimal,
    pub used_allowance: Decimal,
    pub taxable: Decimal,
    pub tax: Decimal, // rounded to 2 decimals
    /// Balances after the event, ready to persist.
    pub tax_after: TaxState,
}

/// Everything a committed close will record, computed without side
/// effects. Holds the tax pre-image so the commit can detect that the
/// balances moved since planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePreview {
    pub request: CloseRequest,
    pub consumed: Vec<LotConsumption>,
    pub closed_qty: i64,
    pub revenue: Decimal,
    pub cost_basis: Decimal, // basis the gain was computed against
    pub gross_gain: Decimal,
    pub settlement: TaxSettlement,
    pub net_amount: Decimal, // revenue - fee - tax
    pub tax_before: TaxState,
}

impl ClosePreview {
    /// The record a commit of this preview writes to the ledger.
    pub fn closing_transaction(&self) -> ClosingTransaction {
        ClosingTransaction {
            trade_id: self.request.trade_id,
            kind: self.request.kind,
            executed_at: self.request.executed_at,
            unit_price: self.request.unit_price,
            qty: self.closed_qty,
            fee: self.request.fee,
            tax: self.settlement.tax,
            total_price: self.net_amount,
            gain: self.gross_gain.round2(),
        }
    }
}
