//! Crate-level error type.

use crate::config::ConfigError;
use crate::domain::{InvalidTaxState, TradeId};
use crate::engine::EngineError;
use crate::store::StoreError;
use thiserror::Error;

/// Unified error for the orchestration layer and callers above it.
///
/// The engine and store keep their own error types; this wraps them so
/// ledger operations have a single error channel.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    TaxState(#[from] InvalidTaxState),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("trade {0} has no open quantity")]
    TradeNotOpen(TradeId),
    #[error("invalid instrument: {0}")]
    InvalidInstrument(String),
}

impl LedgerError {
    /// True when a commit lost the tax-state race and the close should
    /// be previewed again.
    pub fn is_stale_tax_state(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_stale_tax_state())
    }
}
