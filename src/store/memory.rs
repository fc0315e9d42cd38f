//! In-memory position store for tests.

use super::{CloseApply, PositionStore, StoreError};
use crate::domain::{sort_lots_fifo, ClosingTransaction, Decimal, Lot, TaxState, TradeId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Position store holding everything in memory.
///
/// Same contract as the SQLite store, including the tax-state check in
/// `apply_close`. `price_paid` falls out of the seeded lots: every
/// opening's `total_price` is its lot's `cost_basis`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    lots: Vec<Lot>,
    closings: Vec<ClosingTransaction>,
    tax_states: HashMap<String, TaxState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a lot.
    pub fn with_lot(mut self, lot: Lot) -> Self {
        self.inner.get_mut().lots.push(lot);
        self
    }

    /// Seed multiple lots.
    pub fn with_lots(mut self, lots: Vec<Lot>) -> Self {
        self.inner.get_mut().lots.extend(lots);
        self
    }

    /// Seed a user's tax balances.
    pub fn with_tax_state(mut self, user: &UserId, state: TaxState) -> Self {
        self.inner
            .get_mut()
            .tax_states
            .insert(user.as_str().to_string(), state);
        self
    }

    /// Snapshot of all lots, for assertions.
    pub async fn lots(&self) -> Vec<Lot> {
        self.inner.lock().await.lots.clone()
    }

    /// Snapshot of the recorded closings, oldest first.
    pub async fn closings(&self) -> Vec<ClosingTransaction> {
        self.inner.lock().await.closings.clone()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn open_lots(&self, trade_id: TradeId) -> Result<Vec<Lot>, StoreError> {
        let inner = self.inner.lock().await;
        let mut lots: Vec<Lot> = inner
            .lots
            .iter()
            .filter(|lot| lot.trade_id == trade_id && lot.is_open())
            .cloned()
            .collect();
        sort_lots_fifo(&mut lots);
        Ok(lots)
    }

    async fn open_quantity(&self, trade_id: TradeId) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .lots
            .iter()
            .filter(|lot| lot.trade_id == trade_id)
            .map(|lot| lot.open_qty)
            .sum())
    }

    async fn price_paid(&self, trade_id: TradeId) -> Result<Decimal, StoreError> {
        let inner = self.inner.lock().await;
        let mut total = Decimal::zero();
        for lot in inner.lots.iter().filter(|lot| lot.trade_id == trade_id) {
            total = total + lot.cost_basis;
        }
        Ok(total)
    }

    async fn tax_state(&self, user: &UserId) -> Result<TaxState, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tax_states
            .get(user.as_str())
            .cloned()
            .unwrap_or_else(TaxState::zeroed))
    }

    async fn set_tax_state(&self, user: &UserId, state: &TaxState) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .tax_states
            .insert(user.as_str().to_string(), state.clone());
        Ok(())
    }

    async fn apply_close(&self, user: &UserId, apply: CloseApply) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        let current = inner
            .tax_states
            .get(user.as_str())
            .cloned()
            .unwrap_or_else(TaxState::zeroed);
        if current != apply.expected_tax_state {
            return Err(StoreError::StaleTaxState { user: user.clone() });
        }

        for (lot_id, qty) in &apply.consumed {
            if let Some(lot) = inner.lots.iter_mut().find(|lot| lot.id == *lot_id) {
                lot.open_qty = (lot.open_qty - qty).max(0);
            }
        }
        inner.closings.push(apply.record);
        inner
            .tax_states
            .insert(user.as_str().to_string(), apply.new_tax_state);

        Ok(())
    }
}
