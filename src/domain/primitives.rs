//! Domain primitives: TradeId, LotId, UserId, EventKind.

use serde::{Deserialize, Serialize};

/// Identifier of a logical position (one instrument held over time).
///
/// All opening and closing transactions of that position share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeId(pub i64);

impl TradeId {
    /// Create a TradeId from its numeric value.
    pub fn new(id: i64) -> Self {
        TradeId(id)
    }

    /// Get the underlying numeric value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single opening transaction (tax lot).
///
/// Stable for the life of the lot; storage assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LotId(pub i64);

impl LotId {
    /// Create a LotId from its numeric value.
    pub fn new(id: i64) -> Self {
        LotId(id)
    }

    /// Get the underlying numeric value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an instrument (master-data row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(pub i64);

impl InstrumentId {
    /// Create an InstrumentId from its numeric value.
    pub fn new(id: i64) -> Self {
        InstrumentId(id)
    }

    /// Get the underlying numeric value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner of a tax state (single-user deployments use one fixed id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a UserId from a string.
    pub fn new(id: String) -> Self {
        UserId(id)
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a ledger transaction, as stored in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First opening transaction of a trade.
    Buy,
    /// Additional opening transaction on an existing trade.
    Rebuy,
    /// Full close at market.
    Sell,
    /// Close of part of the open quantity.
    PartialSell,
    /// Issuer pays out the position at expiry.
    Redemption,
    /// Knock-out barrier hit; position expires worthless.
    KnockOut,
}

impl EventKind {
    /// Storage code for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Buy => "buy",
            EventKind::Rebuy => "rebuy",
            EventKind::Sell => "sell",
            EventKind::PartialSell => "partial_sell",
            EventKind::Redemption => "redemption",
            EventKind::KnockOut => "knock_out",
        }
    }

    /// True for kinds that create a lot (buy, rebuy).
    pub fn is_opening(&self) -> bool {
        matches!(self, EventKind::Buy | EventKind::Rebuy)
    }

    /// True for kinds that consume open quantity.
    pub fn is_closing(&self) -> bool {
        !self.is_opening()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An unrecognized storage code for one of the coded enums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} code: {code}")]
pub struct UnknownCode {
    /// Which enum the code was parsed for.
    pub what: &'static str,
    /// The offending code.
    pub code: String,
}

impl UnknownCode {
    /// Create an UnknownCode error.
    pub fn new(what: &'static str, code: &str) -> Self {
        UnknownCode {
            what,
            code: code.to_string(),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(EventKind::Buy),
            "rebuy" => Ok(EventKind::Rebuy),
            "sell" => Ok(EventKind::Sell),
            "partial_sell" => Ok(EventKind::PartialSell),
            "redemption" => Ok(EventKind::Redemption),
            "knock_out" => Ok(EventKind::KnockOut),
            other => Err(UnknownCode::new("event kind", other)),
        }
    }
}
