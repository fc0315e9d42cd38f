//! Portfolio-level metrics over the whole transaction history.

use crate::db::repo::{OpenPositionRow, Repository, TransactionRecord};
use crate::domain::Decimal;
use futures::try_join;

/// Realized performance, aggregated over every recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioMetrics {
    /// Money moved in either direction: sum of |total_price|.
    pub total_volume: Decimal,
    /// Sum of the recorded gains of closing events.
    pub realized_gain: Decimal,
    /// Sum of the tax paid on closing events.
    pub total_tax: Decimal,
    /// Number of closing events.
    pub closed_events: i64,
    /// Share of closing events with a positive gain, in percent. None
    /// while nothing has been closed.
    pub win_rate: Option<Decimal>,
    /// Mean recorded gain per closing event. None while nothing has
    /// been closed.
    pub avg_gain: Option<Decimal>,
}

/// Metrics plus the open side of the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioReport {
    pub metrics: PortfolioMetrics,
    pub open_positions: Vec<OpenPositionRow>,
}

/// Fold the metric accumulators over the transaction rows.
///
/// Sums run in Rust so the money stays exact.
pub fn compute_metrics(records: &[TransactionRecord]) -> PortfolioMetrics {
    let mut total_volume = Decimal::zero();
    let mut realized_gain = Decimal::zero();
    let mut total_tax = Decimal::zero();
    let mut closed_events: i64 = 0;
    let mut wins: i64 = 0;

    for record in records {
        total_volume = total_volume + record.total_price.abs();
        if record.kind.is_closing() {
            realized_gain = realized_gain + record.gain;
            total_tax = total_tax + record.tax;
            closed_events += 1;
            if record.gain.is_positive() {
                wins += 1;
            }
        }
    }

    let (win_rate, avg_gain) = if closed_events == 0 {
        (None, None)
    } else {
        let closed = Decimal::from_i64(closed_events);
        (
            Some((Decimal::from_i64(wins) / closed) * Decimal::hundred()),
            Some(realized_gain / closed),
        )
    };

    PortfolioMetrics {
        total_volume,
        realized_gain,
        total_tax,
        closed_events,
        win_rate,
        avg_gain,
    }
}

/// Full report: metrics over the whole history plus the open
/// positions, fetched concurrently.
pub async fn portfolio_report(repo: &Repository) -> Result<PortfolioReport, sqlx::Error> {
    let (records, open_positions) =
        try_join!(repo.get_all_transactions(), repo.get_open_positions())?;

    Ok(PortfolioReport {
        metrics: compute_metrics(&records),
        open_positions,
    })
}
