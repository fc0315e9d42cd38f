//! Position store seam between the planning engine and persistence.

use crate::domain::{ClosingTransaction, Decimal, Lot, LotId, TaxState, TradeId, UserId};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Store for lots, closing records and tax balances.
///
/// Reads hand the engine a snapshot; `apply_close` is the only
/// compound write and must be atomic. Implementations return lots in
/// consumption order, though the engine re-sorts anyway.
#[async_trait]
pub trait PositionStore: Send + Sync + fmt::Debug {
    /// Lots of the trade that still have open quantity, oldest first.
    async fn open_lots(&self, trade_id: TradeId) -> Result<Vec<Lot>, StoreError>;

    /// Total remaining open quantity of the trade.
    async fn open_quantity(&self, trade_id: TradeId) -> Result<i64, StoreError>;

    /// Cumulative cost of the position: the sum of `total_price` over
    /// all of the trade's opening transactions.
    async fn price_paid(&self, trade_id: TradeId) -> Result<Decimal, StoreError>;

    /// Current tax balances; zeroed when none were stored yet.
    async fn tax_state(&self, user: &UserId) -> Result<TaxState, StoreError>;

    /// Overwrite the tax balances.
    async fn set_tax_state(&self, user: &UserId, state: &TaxState) -> Result<(), StoreError>;

    /// Commit a close: reduce the consumed lots, insert the closing
    /// record and persist the new tax balances, all in one
    /// transaction. Fails with `StaleTaxState` when the stored
    /// balances no longer match `expected_tax_state`; nothing is
    /// applied then.
    async fn apply_close(&self, user: &UserId, apply: CloseApply) -> Result<(), StoreError>;
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The tax balances moved between planning and commit. The caller
    /// re-reads and plans again.
    #[error("tax state for user {user} changed since the close was planned")]
    StaleTaxState { user: UserId },
    /// The underlying storage failed.
    #[error(transparent)]
    Unavailable(#[from] sqlx::Error),
}

impl StoreError {
    /// True for the retryable plan-again case.
    pub fn is_stale_tax_state(&self) -> bool {
        matches!(self, StoreError::StaleTaxState { .. })
    }
}

/// Everything one committed close writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseApply {
    /// Quantity to remove per lot; lots floor at zero.
    pub consumed: Vec<(LotId, i64)>,
    /// The closing record to insert.
    pub record: ClosingTransaction,
    /// Balances the plan was computed from. The commit compares by
    /// value and refuses to apply over anything else.
    pub expected_tax_state: TaxState,
    /// Balances to persist with the close.
    pub new_tax_state: TaxState,
}
