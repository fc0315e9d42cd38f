//! Close planning and the ledger facade.

pub mod closer;
pub mod ledger;

pub use closer::Closer;
pub use ledger::{OpeningReceipt, TradeLedger};
