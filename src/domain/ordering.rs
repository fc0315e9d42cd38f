//! First-in-first-out lot ordering.

use crate::domain::Lot;
use chrono::NaiveDate;

/// Sort key defining which lot is consumed first.
///
/// Ordering: opened_at -> id. Two lots never share both, so the order
/// is total and stable across runs and across storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LotOrderingKey {
    /// Opening date (primary sort).
    pub opened_at: NaiveDate,
    /// Lot id (tie-breaker for same-day openings).
    pub id: i64,
}

impl LotOrderingKey {
    /// Create an ordering key from a Lot.
    pub fn from_lot(lot: &Lot) -> Self {
        LotOrderingKey {
            opened_at: lot.opened_at,
            id: lot.id.as_i64(),
        }
    }

    /// Returns true if `a` is consumed before `b`.
    pub fn consumes_before(a: &Lot, b: &Lot) -> bool {
        Self::from_lot(a) < Self::from_lot(b)
    }
}

/// Sort lots into consumption order, oldest first.
pub fn sort_lots_fifo(lots: &mut [Lot]) {
    lots.sort_by(|a, b| {
        let key_a = LotOrderingKey::from_lot(a);
        let key_b = LotOrderingKey::from_lot(b);
        key_a.cmp(&key_b)
    });
}
