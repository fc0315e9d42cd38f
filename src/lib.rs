//! Trade ledger for leveraged derivatives with first-in-first-out lot
//! accounting and capital-gains tax settlement.
//!
//! Positions are tracked as trades made of lots (one lot per opening
//! transaction). Closing a position runs in two phases: a pure preview
//! computes the lot allocation, realized gain and tax from a snapshot,
//! and a commit applies exactly that preview atomically, guarded by a
//! tax-state pre-image check. Storage is SQLite via sqlx; all money is
//! exact decimal.

pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod report;
pub mod store;

pub use config::Config;
pub use db::repo::{OpenPositionRow, TransactionRecord};
pub use db::{init_db, Repository};
pub use domain::{
    CloseRequest, ClosingKind, ClosingTransaction, Decimal, Direction, EventKind, Instrument,
    InstrumentId, Lot, LotId, NewInstrument, OpeningTransaction, ProductType, TaxState, TradeId,
    UserId,
};
pub use engine::{ClosePreview, EngineError};
pub use error::LedgerError;
pub use orchestration::{Closer, OpeningReceipt, TradeLedger};
pub use report::{PortfolioMetrics, PortfolioReport};
pub use store::{MemoryStore, PositionStore, StoreError};
