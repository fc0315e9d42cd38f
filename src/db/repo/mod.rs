//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database
//! operations. Methods are organized across submodules by domain:
//! - `lots.rs` - lot and open-quantity queries
//! - `trades.rs` - instruments, trade ids, transaction rows
//! - `tax.rs` - tax-state read/write
//!
//! The one compound write, `apply_close_atomic`, lives here because it
//! spans all three areas in a single transaction.

mod lots;
mod tax;
mod trades;

use crate::domain::{
    Decimal, EventKind, Instrument, InstrumentId, TaxState, TradeId, UserId,
};
use crate::store::{CloseApply, PositionStore, StoreError};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::{info, warn};

/// One row of the transactions table, openings and closings alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: i64,
    pub trade_id: TradeId,
    pub instrument_id: InstrumentId,
    pub kind: EventKind,
    pub executed_at: NaiveDate,
    pub unit_price: Decimal,
    pub qty: i64,
    pub fee: Decimal,
    pub tax: Decimal,
    pub total_price: Decimal,
    pub gain: Decimal,
    pub open_qty: Option<i64>, // openings only
}

/// An instrument still held, with its remaining quantity and cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPositionRow {
    pub trade_id: TradeId,
    pub instrument: Instrument,
    pub open_qty: i64,
    pub price_paid: Decimal,
}

/// Repository for database operations.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Commit one close: reduce the consumed lots, insert the closing
    /// record and upsert the tax balances, all in a single
    /// transaction.
    ///
    /// The stored tax state is re-read inside the transaction and
    /// compared by value against the plan's pre-image; on mismatch the
    /// transaction rolls back with `StaleTaxState` and nothing is
    /// applied. Lot quantities floor at zero.
    ///
    /// # Errors
    /// `StaleTaxState` on a pre-image mismatch, otherwise any storage
    /// failure.
    pub async fn apply_close_atomic(
        &self,
        user: &UserId,
        apply: &CloseApply,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT loss_carryforward, tax_allowance, tax_rate FROM tax_states WHERE user_id = ?",
        )
        .bind(user.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let current = match row {
            Some(row) => tax_state_from_row(&row)?,
            None => TaxState::zeroed(),
        };
        if current != apply.expected_tax_state {
            // Dropping the transaction rolls it back.
            return Err(StoreError::StaleTaxState { user: user.clone() });
        }

        for (lot_id, qty) in &apply.consumed {
            sqlx::query("UPDATE transactions SET open_qty = MAX(open_qty - ?, 0) WHERE id = ?")
                .bind(*qty)
                .bind(lot_id.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        let record = &apply.record;
        let instrument_row =
            sqlx::query("SELECT instrument_id FROM transactions WHERE trade_id = ? LIMIT 1")
                .bind(record.trade_id.as_i64())
                .fetch_one(&mut *tx)
                .await?;
        let instrument_id: i64 = instrument_row.get("instrument_id");

        sqlx::query(
            r#"
            INSERT INTO transactions (
                trade_id, instrument_id, kind, executed_at, unit_price,
                qty, fee, tax, total_price, gain, open_qty, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(record.trade_id.as_i64())
        .bind(instrument_id)
        .bind(record.kind.event_kind().as_str())
        .bind(record.executed_at.to_string())
        .bind(record.unit_price.to_canonical_string())
        .bind(record.qty)
        .bind(record.fee.to_canonical_string())
        .bind(record.tax.to_canonical_string())
        .bind(record.total_price.to_canonical_string())
        .bind(record.gain.to_canonical_string())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        upsert_tax_state_tx(&mut tx, user, &apply.new_tax_state).await?;

        tx.commit().await?;

        info!(
            user = %user,
            trade_id = %record.trade_id,
            kind = %record.kind,
            qty = record.qty,
            gain = %record.gain,
            tax = %record.tax,
            "Close committed"
        );
        Ok(())
    }
}

#[async_trait]
impl PositionStore for Repository {
    async fn open_lots(
        &self,
        trade_id: TradeId,
    ) -> Result<Vec<crate::domain::Lot>, StoreError> {
        Ok(self.get_open_lots(trade_id).await?)
    }

    async fn open_quantity(&self, trade_id: TradeId) -> Result<i64, StoreError> {
        Ok(self.get_open_quantity(trade_id).await?)
    }

    async fn price_paid(&self, trade_id: TradeId) -> Result<Decimal, StoreError> {
        Ok(self.get_price_paid(trade_id).await?)
    }

    async fn tax_state(&self, user: &UserId) -> Result<TaxState, StoreError> {
        Ok(self.get_tax_state(user).await?)
    }

    async fn set_tax_state(&self, user: &UserId, state: &TaxState) -> Result<(), StoreError> {
        Ok(self.store_tax_state(user, state).await?)
    }

    async fn apply_close(&self, user: &UserId, apply: CloseApply) -> Result<(), StoreError> {
        self.apply_close_atomic(user, &apply).await
    }
}

/// Upsert the tax balances inside an open transaction.
async fn upsert_tax_state_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user: &UserId,
    state: &TaxState,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tax_states (user_id, loss_carryforward, tax_allowance, tax_rate)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            loss_carryforward = excluded.loss_carryforward,
            tax_allowance = excluded.tax_allowance,
            tax_rate = excluded.tax_rate
        "#,
    )
    .bind(user.as_str())
    .bind(state.loss_carryforward.to_canonical_string())
    .bind(state.tax_allowance.to_canonical_string())
    .bind(state.tax_rate.to_canonical_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Parse a tax_states row. Strict: these three columns feed the
/// commit-time comparison, so a mangled value must surface as an
/// error, not default away.
fn tax_state_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TaxState, sqlx::Error> {
    Ok(TaxState {
        loss_carryforward: strict_decimal(&row.get::<String, _>("loss_carryforward"), "loss_carryforward")?,
        tax_allowance: strict_decimal(&row.get::<String, _>("tax_allowance"), "tax_allowance")?,
        tax_rate: strict_decimal(&row.get::<String, _>("tax_rate"), "tax_rate")?,
    })
}

/// Parse a money column, defaulting to zero with a warning.
///
/// Display-path reads tolerate a mangled value; writes always store
/// canonical strings, so this fires only on externally edited rows.
pub(crate) fn lenient_decimal(raw: &str, column: &'static str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(
            column = column,
            value = %raw,
            error = %e,
            "Failed to parse decimal column, using zero"
        );
        Decimal::zero()
    })
}

/// Parse a money column strictly, as a column-decode error.
pub(crate) fn strict_decimal(raw: &str, column: &'static str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Parse an ISO date column.
pub(crate) fn decode_date(raw: &str, column: &'static str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Parse an event-kind column.
pub(crate) fn decode_kind(raw: &str, column: &'static str) -> Result<EventKind, sqlx::Error> {
    EventKind::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{
        ClosingKind, ClosingTransaction, Direction, LotId, NewInstrument, OpeningTransaction,
        ProductType,
    };
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("ledger.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, n).unwrap()
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

    fn user() -> UserId {
        UserId::new("default".to_string())
    }

    async fn seed_position(repo: &Repository) -> (TradeId, LotId, LotId) {
        let instrument = repo.get_or_create_instrument(&dax_long()).await.unwrap();
        let trade = TradeId::new(1);
        let first = repo
            .insert_opening(
                instrument.id,
                &OpeningTransaction::new(trade, EventKind::Buy, day(1), d("99.9"), 10, d("1")),
            )
            .await
            .unwrap();
        let second = repo
            .insert_opening(
                instrument.id,
                &OpeningTransaction::new(trade, EventKind::Rebuy, day(3), d("119.8"), 5, d("1")),
            )
            .await
            .unwrap();
        (trade, first, second)
    }

    #[tokio::test]
    async fn test_apply_close_updates_everything_at_once() {
        let (repo, _temp) = setup_test_db().await;
        let (trade, first, second) = seed_position(&repo).await;

        let apply = CloseApply {
            consumed: vec![(first, 10), (second, 2)],
            record: ClosingTransaction {
                trade_id: trade,
                kind: ClosingKind::PartialSell,
                executed_at: day(9),
                unit_price: d("120"),
                qty: 12,
                fee: d("1"),
                tax: d("12"),
                total_price: d("1427"),
                gain: d("199.08"),
            },
            expected_tax_state: TaxState::zeroed(),
            new_tax_state: TaxState::new(d("0"), d("0"), d("0.25")),
        };
        repo.apply_close_atomic(&user(), &apply).await.unwrap();

        let lots = repo.get_open_lots(trade).await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].id, second);
        assert_eq!(lots[0].open_qty, 3);

        let records = repo.get_recent_transactions(10).await.unwrap();
        assert_eq!(records[0].kind, EventKind::PartialSell);
        assert_eq!(records[0].qty, 12);
        assert_eq!(records[0].open_qty, None);

        let state = repo.get_tax_state(&user()).await.unwrap();
        assert_eq!(state, TaxState::new(d("0"), d("0"), d("0.25")));
    }

    #[tokio::test]
    async fn test_apply_close_rolls_back_on_stale_tax_state() {
        let (repo, _temp) = setup_test_db().await;
        let (trade, first, _second) = seed_position(&repo).await;

        repo.store_tax_state(&user(), &TaxState::new(d("50"), d("0"), d("0.25")))
            .await
            .unwrap();

        let apply = CloseApply {
            consumed: vec![(first, 5)],
            record: ClosingTransaction {
                trade_id: trade,
                kind: ClosingKind::PartialSell,
                executed_at: day(9),
                unit_price: d("120"),
                qty: 5,
                fee: d("1"),
                tax: d("0"),
                total_price: d("599"),
                gain: d("99.5"),
            },
            expected_tax_state: TaxState::zeroed(),
            new_tax_state: TaxState::zeroed(),
        };
        let err = repo.apply_close_atomic(&user(), &apply).await.unwrap_err();

        assert!(err.is_stale_tax_state());
        let lots = repo.get_open_lots(trade).await.unwrap();
        assert_eq!(lots[0].open_qty, 10);
        let records = repo.get_recent_transactions(10).await.unwrap();
        assert!(records.iter().all(|r| r.kind.is_opening()));
        let state = repo.get_tax_state(&user()).await.unwrap();
        assert_eq!(state, TaxState::new(d("50"), d("0"), d("0.25")));
    }

    #[tokio::test]
    async fn test_apply_close_clamps_lot_at_zero() {
        let (repo, _temp) = setup_test_db().await;
        let (trade, first, _second) = seed_position(&repo).await;

        let apply = CloseApply {
            consumed: vec![(first, 25)],
            record: ClosingTransaction {
                trade_id: trade,
                kind: ClosingKind::Sell,
                executed_at: day(9),
                unit_price: d("1"),
                qty: 15,
                fee: d("0"),
                tax: d("0"),
                total_price: d("15"),
                gain: d("0"),
            },
            expected_tax_state: TaxState::zeroed(),
            new_tax_state: TaxState::zeroed(),
        };
        repo.apply_close_atomic(&user(), &apply).await.unwrap();

        let remaining = repo.get_open_quantity(trade).await.unwrap();
        assert_eq!(remaining, 5);
    }

    #[tokio::test]
    async fn test_lenient_decimal_defaults_to_zero() {
        assert_eq!(lenient_decimal("not-a-number", "fee"), Decimal::zero());
        assert_eq!(lenient_decimal("12.5", "fee"), d("12.5"));
    }

    #[tokio::test]
    async fn test_strict_decimal_errors_out() {
        assert!(strict_decimal("not-a-number", "tax_rate").is_err());
        assert_eq!(strict_decimal("0.25", "tax_rate").unwrap(), d("0.25"));
    }
}
