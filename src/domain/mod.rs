//! Domain types for the tax-lot ledger.
//!
//! This module provides:
//! - Exact money handling via the Decimal wrapper
//! - Domain primitives: TradeId, LotId, InstrumentId, UserId, EventKind
//! - Lot, TaxState, closing request/record and instrument types
//! - The explicit first-in-first-out lot ordering key

pub mod closing;
pub mod decimal;
pub mod instrument;
pub mod lot;
pub mod ordering;
pub mod primitives;
pub mod tax;

pub use closing::{CloseRequest, ClosingKind, ClosingTransaction};
pub use decimal::Decimal;
pub use instrument::{Direction, Instrument, NewInstrument, ProductType};
pub use lot::{Lot, OpeningTransaction};
pub use ordering::{sort_lots_fifo, LotOrderingKey};
pub use primitives::{EventKind, InstrumentId, LotId, TradeId, UnknownCode, UserId};
pub use tax::{InvalidTaxState, TaxState};
