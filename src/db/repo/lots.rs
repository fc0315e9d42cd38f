//! Lot and open-quantity queries for the repository.

use crate::domain::{Decimal, Lot, LotId, TradeId};
use sqlx::Row;

use super::{decode_date, lenient_decimal, Repository};

impl Repository {
    /// Open lots of a trade in consumption order: opening date, then
    /// row id. Opening rows are the lots; their `total_price` is the
    /// lot's cost basis.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_open_lots(&self, trade_id: TradeId) -> Result<Vec<Lot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, trade_id, executed_at, total_price, qty, open_qty
            FROM transactions
            WHERE trade_id = ? AND kind IN ('buy', 'rebuy') AND open_qty > 0
            ORDER BY executed_at ASC, id ASC
            "#,
        )
        .bind(trade_id.as_i64())
        .fetch_all(self.pool())
        .await?;

        let mut lots = Vec::with_capacity(rows.len());
        for row in rows {
            let executed_at: String = row.get("executed_at");
            let total_price: String = row.get("total_price");
            lots.push(Lot {
                id: LotId::new(row.get("id")),
                trade_id: TradeId::new(row.get("trade_id")),
                opened_at: decode_date(&executed_at, "executed_at")?,
                cost_basis: lenient_decimal(&total_price, "total_price"),
                original_qty: row.get("qty"),
                open_qty: row.get("open_qty"),
            });
        }
        Ok(lots)
    }

    /// Total remaining open quantity of a trade. Integer sum, so SQL
    /// aggregation is exact here.
    pub async fn get_open_quantity(&self, trade_id: TradeId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(open_qty), 0) AS open_qty
            FROM transactions
            WHERE trade_id = ? AND kind IN ('buy', 'rebuy')
            "#,
        )
        .bind(trade_id.as_i64())
        .fetch_one(self.pool())
        .await?;

        Ok(row.get("open_qty"))
    }

    /// Cumulative cost of a trade: the sum of `total_price` over all
    /// of its opening transactions, consumed lots included.
    ///
    /// # Implementation Note
    ///
    /// Summed in Rust to preserve decimal precision. SQLite's SUM
    /// returns REAL, which would drift for money columns.
    pub async fn get_price_paid(&self, trade_id: TradeId) -> Result<Decimal, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT total_price
            FROM transactions
            WHERE trade_id = ? AND kind IN ('buy', 'rebuy')
            ORDER BY executed_at ASC, id ASC
            "#,
        )
        .bind(trade_id.as_i64())
        .fetch_all(self.pool())
        .await?;

        let mut sum = Decimal::zero();
        for row in rows {
            let total_price: String = row.get("total_price");
            sum = sum + lenient_decimal(&total_price, "total_price");
        }
        Ok(sum)
    }
}
