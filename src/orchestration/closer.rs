//! Two-phase close driver over a `PositionStore`.
//!
//! `preview` plans a close from a snapshot of storage without writing
//! anything; `commit` applies exactly that plan. The gap between the
//! two is guarded by the tax-state pre-image carried in the preview:
//! if the balances changed in between, the commit fails stale and the
//! close has to be planned again.

use crate::domain::{CloseRequest, ClosingTransaction, UserId};
use crate::engine::{preview_close, ClosePreview};
use crate::error::LedgerError;
use crate::store::{CloseApply, PositionStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Closer {
    store: Arc<dyn PositionStore>,
}

impl Closer {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self { store }
    }

    /// Plan a close without touching storage.
    ///
    /// # Errors
    /// Engine validation errors, or a store read failure.
    pub async fn preview(
        &self,
        user: &UserId,
        request: CloseRequest,
    ) -> Result<ClosePreview, LedgerError> {
        let lots = self.store.open_lots(request.trade_id).await?;
        let price_paid = self.store.price_paid(request.trade_id).await?;
        let tax_state = self.store.tax_state(user).await?;

        let preview = preview_close(&request, &lots, price_paid, &tax_state)?;
        info!(
            user = %user,
            trade_id = %preview.request.trade_id,
            kind = %preview.request.kind,
            qty = preview.closed_qty,
            gross_gain = %preview.gross_gain,
            tax = %preview.settlement.tax,
            "Close planned"
        );
        Ok(preview)
    }

    /// Apply a previously computed preview and return the record it
    /// wrote.
    ///
    /// # Errors
    /// `StaleTaxState` when the balances moved since the preview was
    /// planned, otherwise a store write failure.
    pub async fn commit(
        &self,
        user: &UserId,
        preview: &ClosePreview,
    ) -> Result<ClosingTransaction, LedgerError> {
        let record = preview.closing_transaction();
        let apply = CloseApply {
            consumed: preview
                .consumed
                .iter()
                .map(|consumption| (consumption.lot_id, consumption.qty))
                .collect(),
            record: record.clone(),
            expected_tax_state: preview.tax_before.clone(),
            new_tax_state: preview.settlement.tax_after.clone(),
        };
        self.store.apply_close(user, apply).await?;
        Ok(record)
    }

    /// Preview and commit in one call, replanning once if the tax
    /// balances moved between the two steps.
    pub async fn close(
        &self,
        user: &UserId,
        request: CloseRequest,
    ) -> Result<ClosingTransaction, LedgerError> {
        let preview = self.preview(user, request.clone()).await?;
        match self.commit(user, &preview).await {
            Err(e) if e.is_stale_tax_state() => {
                warn!(
                    user = %user,
                    trade_id = %request.trade_id,
                    "Tax state changed since planning, replanning close"
                );
                let preview = self.preview(user, request).await?;
                self.commit(user, &preview).await
            }
            other => other,
        }
    }
}
