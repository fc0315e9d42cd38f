//! Instrument and transaction-row operations for the repository.

use crate::domain::{
    Direction, Instrument, InstrumentId, LotId, NewInstrument, OpeningTransaction, ProductType,
    TradeId,
};
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;

use super::{
    decode_date, decode_kind, lenient_decimal, OpenPositionRow, Repository, TransactionRecord,
};

impl Repository {
    // =========================================================================
    // Instrument operations
    // =========================================================================

    /// Find the instrument matching the identity tuple (underlying,
    /// product type, direction, strike, strike currency) or create it.
    /// Metadata (wkn, name, expiry) sticks from the first sighting.
    ///
    /// Strike matching relies on the canonical decimal string, so
    /// 18000 and 18000.0 are the same strike.
    ///
    /// # Errors
    /// Returns an error if the query or insert fails.
    pub async fn get_or_create_instrument(
        &self,
        new: &NewInstrument,
    ) -> Result<Instrument, sqlx::Error> {
        let existing = sqlx::query(
            r#"
            SELECT id, underlying, product_type, direction, strike,
                   strike_currency, wkn, name, expiry_date
            FROM instruments
            WHERE underlying = ? AND product_type = ? AND direction = ?
              AND strike = ? AND strike_currency = ?
            "#,
        )
        .bind(new.underlying.as_str())
        .bind(new.product_type.as_str())
        .bind(new.direction.as_str())
        .bind(new.strike.to_canonical_string())
        .bind(new.strike_currency.as_str())
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = existing {
            return instrument_from_row(&row);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO instruments (
                underlying, product_type, direction, strike, strike_currency,
                wkn, name, expiry_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.underlying.as_str())
        .bind(new.product_type.as_str())
        .bind(new.direction.as_str())
        .bind(new.strike.to_canonical_string())
        .bind(new.strike_currency.as_str())
        .bind(new.wkn.as_deref())
        .bind(new.name.as_deref())
        .bind(new.expiry_date.map(|d| d.to_string()))
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;

        let id = InstrumentId::new(result.last_insert_rowid());
        info!(instrument_id = %id, underlying = %new.underlying, "Instrument created");

        Ok(Instrument {
            id,
            underlying: new.underlying.clone(),
            product_type: new.product_type,
            direction: new.direction,
            strike: new.strike,
            strike_currency: new.strike_currency.clone(),
            wkn: new.wkn.clone(),
            name: new.name.clone(),
            expiry_date: new.expiry_date,
        })
    }

    /// Load an instrument by id.
    pub async fn get_instrument(
        &self,
        id: InstrumentId,
    ) -> Result<Option<Instrument>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, underlying, product_type, direction, strike,
                   strike_currency, wkn, name, expiry_date
            FROM instruments
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| instrument_from_row(&row)).transpose()
    }

    // =========================================================================
    // Trade id operations
    // =========================================================================

    /// The trade still open for this instrument, if any. A rebuy joins
    /// that trade instead of starting a new one.
    pub async fn find_open_trade(
        &self,
        instrument_id: InstrumentId,
    ) -> Result<Option<TradeId>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT trade_id
            FROM transactions
            WHERE instrument_id = ? AND kind IN ('buy', 'rebuy') AND open_qty > 0
            ORDER BY executed_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(instrument_id.as_i64())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| TradeId::new(row.get("trade_id"))))
    }

    /// The instrument a trade's rows reference, if the trade exists.
    pub async fn get_trade_instrument(
        &self,
        trade_id: TradeId,
    ) -> Result<Option<InstrumentId>, sqlx::Error> {
        let row = sqlx::query("SELECT instrument_id FROM transactions WHERE trade_id = ? LIMIT 1")
            .bind(trade_id.as_i64())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|row| InstrumentId::new(row.get("instrument_id"))))
    }

    /// The next unused trade id.
    pub async fn next_trade_id(&self) -> Result<TradeId, sqlx::Error> {
        let row = sqlx::query("SELECT MAX(trade_id) AS max_trade FROM transactions")
            .fetch_one(self.pool())
            .await?;

        let max: Option<i64> = row.get("max_trade");
        Ok(TradeId::new(max.map_or(1, |m| m + 1)))
    }

    // =========================================================================
    // Transaction rows
    // =========================================================================

    /// Insert an opening transaction. The new row is the lot; its id
    /// comes back as the lot id and its `open_qty` starts at the full
    /// quantity.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_opening(
        &self,
        instrument_id: InstrumentId,
        opening: &OpeningTransaction,
    ) -> Result<LotId, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                trade_id, instrument_id, kind, executed_at, unit_price,
                qty, fee, tax, total_price, gain, open_qty, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, '0', ?, '0', ?, ?)
            "#,
        )
        .bind(opening.trade_id.as_i64())
        .bind(instrument_id.as_i64())
        .bind(opening.kind.as_str())
        .bind(opening.executed_at.to_string())
        .bind(opening.unit_price.to_canonical_string())
        .bind(opening.qty)
        .bind(opening.fee.to_canonical_string())
        .bind(opening.total_price.to_canonical_string())
        .bind(opening.qty)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;

        Ok(LotId::new(result.last_insert_rowid()))
    }

    /// Latest transactions, newest first.
    pub async fn get_recent_transactions(
        &self,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, trade_id, instrument_id, kind, executed_at, unit_price,
                   qty, fee, tax, total_price, gain, open_qty
            FROM transactions
            ORDER BY executed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Every transaction, oldest first.
    pub async fn get_all_transactions(&self) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, trade_id, instrument_id, kind, executed_at, unit_price,
                   qty, fee, tax, total_price, gain, open_qty
            FROM transactions
            ORDER BY executed_at ASC, id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Positions with open quantity left, one row per trade, with the
    /// cumulative price paid across all of the trade's openings.
    ///
    /// # Implementation Note
    ///
    /// Money is summed in Rust rather than with SQLite's SUM, which
    /// returns REAL and would drift.
    pub async fn get_open_positions(&self) -> Result<Vec<OpenPositionRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT t.trade_id, t.total_price, t.open_qty,
                   i.id, i.underlying, i.product_type, i.direction,
                   i.strike, i.strike_currency, i.wkn, i.name, i.expiry_date
            FROM transactions t
            JOIN instruments i ON i.id = t.instrument_id
            WHERE t.kind IN ('buy', 'rebuy')
            ORDER BY t.trade_id ASC, t.executed_at ASC, t.id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut positions: BTreeMap<i64, OpenPositionRow> = BTreeMap::new();
        for row in &rows {
            let trade_id: i64 = row.get("trade_id");
            let total_price: String = row.get("total_price");
            let total_price = lenient_decimal(&total_price, "total_price");
            let open_qty: i64 = row.get("open_qty");

            match positions.get_mut(&trade_id) {
                Some(position) => {
                    position.open_qty += open_qty;
                    position.price_paid = position.price_paid + total_price;
                }
                None => {
                    positions.insert(
                        trade_id,
                        OpenPositionRow {
                            trade_id: TradeId::new(trade_id),
                            instrument: instrument_from_row(row)?,
                            open_qty,
                            price_paid: total_price,
                        },
                    );
                }
            }
        }

        Ok(positions
            .into_values()
            .filter(|position| position.open_qty > 0)
            .collect())
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord, sqlx::Error> {
    let kind: String = row.get("kind");
    let executed_at: String = row.get("executed_at");
    let unit_price: String = row.get("unit_price");
    let fee: String = row.get("fee");
    let tax: String = row.get("tax");
    let total_price: String = row.get("total_price");
    let gain: String = row.get("gain");

    Ok(TransactionRecord {
        id: row.get("id"),
        trade_id: TradeId::new(row.get("trade_id")),
        instrument_id: InstrumentId::new(row.get("instrument_id")),
        kind: decode_kind(&kind, "kind")?,
        executed_at: decode_date(&executed_at, "executed_at")?,
        unit_price: lenient_decimal(&unit_price, "unit_price"),
        qty: row.get("qty"),
        fee: lenient_decimal(&fee, "fee"),
        tax: lenient_decimal(&tax, "tax"),
        total_price: lenient_decimal(&total_price, "total_price"),
        gain: lenient_decimal(&gain, "gain"),
        open_qty: row.get("open_qty"),
    })
}

fn instrument_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Instrument, sqlx::Error> {
    let product_type: String = row.get("product_type");
    let product_type =
        ProductType::from_str(&product_type).map_err(|e| sqlx::Error::ColumnDecode {
            index: "product_type".to_string(),
            source: Box::new(e),
        })?;
    let direction: String = row.get("direction");
    let direction = Direction::from_str(&direction).map_err(|e| sqlx::Error::ColumnDecode {
        index: "direction".to_string(),
        source: Box::new(e),
    })?;
    let strike: String = row.get("strike");
    let expiry_date: Option<String> = row.get("expiry_date");
    let expiry_date = expiry_date
        .map(|raw| decode_date(&raw, "expiry_date"))
        .transpose()?;

    Ok(Instrument {
        id: InstrumentId::new(row.get("id")),
        underlying: row.get("underlying"),
        product_type,
        direction,
        strike: lenient_decimal(&strike, "strike"),
        strike_currency: row.get("strike_currency"),
        wkn: row.get("wkn"),
        name: row.get("name"),
        expiry_date,
    })
}
