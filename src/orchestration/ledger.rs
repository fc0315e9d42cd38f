//! Ledger facade: openings, closes and the read-side in one place.

use crate::db::repo::{OpenPositionRow, Repository, TransactionRecord};
use crate::domain::{
    CloseRequest, ClosingTransaction, Decimal, EventKind, Instrument, LotId, NewInstrument,
    OpeningTransaction, TaxState, TradeId, UserId,
};
use crate::engine::{ClosePreview, EngineError};
use crate::error::LedgerError;
use crate::orchestration::Closer;
use crate::report::{self, PortfolioReport};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

/// What an opening wrote: the trade it joined or started, the new lot,
/// and the total amount paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningReceipt {
    pub trade_id: TradeId,
    pub lot_id: LotId,
    pub kind: EventKind,
    pub instrument: Instrument,
    pub total_price: Decimal,
}

/// Single-user facade over the repository and the close driver.
///
/// Openings and reads go straight to the repository; every close runs
/// through the preview/commit machinery of [`Closer`].
#[derive(Clone)]
pub struct TradeLedger {
    repo: Arc<Repository>,
    closer: Closer,
    user: UserId,
}

impl TradeLedger {
    pub fn new(repo: Arc<Repository>, user: UserId) -> Self {
        let closer = Closer::new(repo.clone());
        Self { repo, closer, user }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    // =========================================================================
    // Openings
    // =========================================================================

    /// Record a buy. When the instrument already has an open trade the
    /// purchase joins it and is stored as a rebuy; otherwise a new
    /// trade starts.
    ///
    /// # Errors
    /// `InvalidQuantity` for a non-positive quantity,
    /// `InvalidInstrument` when the direction does not fit the product
    /// type, otherwise storage failures.
    pub async fn record_buy(
        &self,
        instrument: &NewInstrument,
        executed_at: NaiveDate,
        unit_price: Decimal,
        qty: i64,
        fee: Decimal,
    ) -> Result<OpeningReceipt, LedgerError> {
        validate_opening_qty(qty)?;
        if !instrument.product_type.allows_direction(instrument.direction) {
            return Err(LedgerError::InvalidInstrument(format!(
                "a {} cannot be {}",
                instrument.product_type, instrument.direction
            )));
        }

        let instrument = self.repo.get_or_create_instrument(instrument).await?;
        let (trade_id, kind) = match self.repo.find_open_trade(instrument.id).await? {
            Some(trade_id) => (trade_id, EventKind::Rebuy),
            None => (self.repo.next_trade_id().await?, EventKind::Buy),
        };

        self.insert_opening(instrument, trade_id, kind, executed_at, unit_price, qty, fee)
            .await
    }

    /// Add a lot to a trade that is still open.
    ///
    /// # Errors
    /// `TradeNotOpen` when the trade is unknown or fully closed,
    /// `InvalidQuantity` for a non-positive quantity.
    pub async fn record_rebuy(
        &self,
        trade_id: TradeId,
        executed_at: NaiveDate,
        unit_price: Decimal,
        qty: i64,
        fee: Decimal,
    ) -> Result<OpeningReceipt, LedgerError> {
        validate_opening_qty(qty)?;

        if self.repo.get_open_quantity(trade_id).await? == 0 {
            return Err(LedgerError::TradeNotOpen(trade_id));
        }
        let instrument_id = self
            .repo
            .get_trade_instrument(trade_id)
            .await?
            .ok_or(LedgerError::TradeNotOpen(trade_id))?;
        let instrument = self
            .repo
            .get_instrument(instrument_id)
            .await?
            .ok_or(LedgerError::Db(sqlx::Error::RowNotFound))?;

        self.insert_opening(
            instrument,
            trade_id,
            EventKind::Rebuy,
            executed_at,
            unit_price,
            qty,
            fee,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_opening(
        &self,
        instrument: Instrument,
        trade_id: TradeId,
        kind: EventKind,
        executed_at: NaiveDate,
        unit_price: Decimal,
        qty: i64,
        fee: Decimal,
    ) -> Result<OpeningReceipt, LedgerError> {
        let opening = OpeningTransaction::new(trade_id, kind, executed_at, unit_price, qty, fee);
        let lot_id = self.repo.insert_opening(instrument.id, &opening).await?;

        info!(
            user = %self.user,
            trade_id = %trade_id,
            kind = %kind,
            qty,
            total_price = %opening.total_price,
            "Opening recorded"
        );
        Ok(OpeningReceipt {
            trade_id,
            lot_id,
            kind,
            instrument,
            total_price: opening.total_price,
        })
    }

    // =========================================================================
    // Closes
    // =========================================================================

    /// Plan a full sell of everything still open.
    pub async fn preview_sell(
        &self,
        trade_id: TradeId,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Result<ClosePreview, LedgerError> {
        self.closer
            .preview(
                &self.user,
                CloseRequest::sell(trade_id, unit_price, fee, executed_at),
            )
            .await
    }

    /// Sell everything still open in one call.
    pub async fn sell(
        &self,
        trade_id: TradeId,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Result<ClosingTransaction, LedgerError> {
        self.closer
            .close(
                &self.user,
                CloseRequest::sell(trade_id, unit_price, fee, executed_at),
            )
            .await
    }

    /// Plan a sell of `qty` units out of the open quantity.
    pub async fn preview_partial_sell(
        &self,
        trade_id: TradeId,
        qty: i64,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Result<ClosePreview, LedgerError> {
        self.closer
            .preview(
                &self.user,
                CloseRequest::partial_sell(trade_id, qty, unit_price, fee, executed_at),
            )
            .await
    }

    /// Sell `qty` units out of the open quantity in one call.
    pub async fn partial_sell(
        &self,
        trade_id: TradeId,
        qty: i64,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Result<ClosingTransaction, LedgerError> {
        self.closer
            .close(
                &self.user,
                CloseRequest::partial_sell(trade_id, qty, unit_price, fee, executed_at),
            )
            .await
    }

    /// Plan an issuer redemption of the whole position.
    pub async fn preview_redemption(
        &self,
        trade_id: TradeId,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Result<ClosePreview, LedgerError> {
        self.closer
            .preview(
                &self.user,
                CloseRequest::redemption(trade_id, unit_price, fee, executed_at),
            )
            .await
    }

    /// Redeem the whole position in one call.
    pub async fn redemption(
        &self,
        trade_id: TradeId,
        unit_price: Decimal,
        fee: Decimal,
        executed_at: NaiveDate,
    ) -> Result<ClosingTransaction, LedgerError> {
        self.closer
            .close(
                &self.user,
                CloseRequest::redemption(trade_id, unit_price, fee, executed_at),
            )
            .await
    }

    /// Plan writing off the whole position after a barrier hit.
    pub async fn preview_knock_out(
        &self,
        trade_id: TradeId,
        executed_at: NaiveDate,
    ) -> Result<ClosePreview, LedgerError> {
        self.closer
            .preview(&self.user, CloseRequest::knock_out(trade_id, executed_at))
            .await
    }

    /// Write off the whole position in one call.
    pub async fn knock_out(
        &self,
        trade_id: TradeId,
        executed_at: NaiveDate,
    ) -> Result<ClosingTransaction, LedgerError> {
        self.closer
            .close(&self.user, CloseRequest::knock_out(trade_id, executed_at))
            .await
    }

    /// Commit a close planned by one of the `preview_*` methods.
    pub async fn commit(&self, preview: &ClosePreview) -> Result<ClosingTransaction, LedgerError> {
        self.closer.commit(&self.user, preview).await
    }

    // =========================================================================
    // Tax state and read-side
    // =========================================================================

    /// Current tax balances, zeroed when never set.
    pub async fn tax_state(&self) -> Result<TaxState, LedgerError> {
        Ok(self.repo.get_tax_state(&self.user).await?)
    }

    /// Replace the tax balances, e.g. to seed the yearly allowance and
    /// the rate.
    ///
    /// # Errors
    /// Rejects out-of-range balances before touching storage.
    pub async fn set_tax_state(&self, state: &TaxState) -> Result<(), LedgerError> {
        state.validate()?;
        Ok(self.repo.store_tax_state(&self.user, state).await?)
    }

    /// Positions with open quantity, one row per trade.
    pub async fn open_positions(&self) -> Result<Vec<OpenPositionRow>, LedgerError> {
        Ok(self.repo.get_open_positions().await?)
    }

    /// Latest transactions, newest first.
    pub async fn recent_transactions(
        &self,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self.repo.get_recent_transactions(limit).await?)
    }

    /// Portfolio metrics plus the open positions.
    pub async fn portfolio_report(&self) -> Result<PortfolioReport, LedgerError> {
        Ok(report::portfolio_report(&self.repo).await?)
    }
}

fn validate_opening_qty(qty: i64) -> Result<(), LedgerError> {
    if qty <= 0 {
        return Err(EngineError::InvalidQuantity(format!(
            "opening quantity must be positive, got {}",
            qty
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{Direction, ProductType};
    use tempfile::TempDir;

    async fn setup_ledger() -> (TradeLedger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("ledger.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let ledger = TradeLedger::new(repo, UserId::new("default".to_string()));
        (ledger, temp_dir)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, n).unwrap()
    }

    fn dax_long() -> NewInstrument {
        NewInstrument {
            underlying: "DAX".to_string(),
            product_type: ProductType::KnockOutCertificate,
            direction: Direction::Long,
            strike: d("18000"),
            strike_currency: "EUR".to_string(),
            wkn: None,
            name: None,
            expiry_date: None,
        }
    }

    #[tokio::test]
    async fn test_buy_joins_open_trade_as_rebuy() {
        let (ledger, _temp) = setup_ledger().await;

        let first = ledger
            .record_buy(&dax_long(), day(1), d("10"), 5, d("1"))
            .await
            .unwrap();
        assert_eq!(first.kind, EventKind::Buy);
        assert_eq!(first.total_price, d("51"));

        let second = ledger
            .record_buy(&dax_long(), day(2), d("12"), 5, d("1"))
            .await
            .unwrap();
        assert_eq!(second.kind, EventKind::Rebuy);
        assert_eq!(second.trade_id, first.trade_id);
        assert_ne!(second.lot_id, first.lot_id);

        // Drain the trade; the next buy starts a new one.
        ledger
            .sell(first.trade_id, d("11"), d("1"), day(3))
            .await
            .unwrap();
        let third = ledger
            .record_buy(&dax_long(), day(4), d("10"), 5, d("1"))
            .await
            .unwrap();
        assert_eq!(third.kind, EventKind::Buy);
        assert_ne!(third.trade_id, first.trade_id);
    }

    #[tokio::test]
    async fn test_rebuy_requires_an_open_trade() {
        let (ledger, _temp) = setup_ledger().await;

        let err = ledger
            .record_rebuy(TradeId::new(7), day(1), d("10"), 5, d("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TradeNotOpen(t) if t == TradeId::new(7)));

        let receipt = ledger
            .record_buy(&dax_long(), day(1), d("10"), 5, d("1"))
            .await
            .unwrap();
        ledger
            .sell(receipt.trade_id, d("11"), d("1"), day(2))
            .await
            .unwrap();
        let err = ledger
            .record_rebuy(receipt.trade_id, day(3), d("10"), 5, d("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TradeNotOpen(_)));
    }

    #[tokio::test]
    async fn test_buy_rejects_mismatched_direction() {
        let (ledger, _temp) = setup_ledger().await;

        // A knock-out certificate is long or short, never call.
        let mut bad = dax_long();
        bad.direction = Direction::Call;
        let err = ledger
            .record_buy(&bad, day(1), d("10"), 5, d("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInstrument(_)));
    }

    #[tokio::test]
    async fn test_openings_reject_non_positive_qty() {
        let (ledger, _temp) = setup_ledger().await;

        let err = ledger
            .record_buy(&dax_long(), day(1), d("10"), 0, d("1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Engine(EngineError::InvalidQuantity(_))
        ));
    }

    #[tokio::test]
    async fn test_set_tax_state_validates_ranges() {
        let (ledger, _temp) = setup_ledger().await;

        let err = ledger
            .set_tax_state(&TaxState::new(d("-1"), d("0"), d("0.25")))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TaxState(_)));

        ledger
            .set_tax_state(&TaxState::new(d("0"), d("1000"), d("0.25")))
            .await
            .unwrap();
        assert_eq!(
            ledger.tax_state().await.unwrap(),
            TaxState::new(d("0"), d("1000"), d("0.25"))
        );
    }
}
