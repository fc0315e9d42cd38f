//! Instrument master data for leveraged products.

use crate::domain::{Decimal, InstrumentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Product category of a traded instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// Classic warrant with an expiry date.
    Warrant,
    /// Open-ended knock-out certificate with a barrier.
    KnockOutCertificate,
    /// Factor certificate with daily leverage reset.
    FactorCertificate,
}

impl ProductType {
    /// Storage code for this product type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Warrant => "warrant",
            ProductType::KnockOutCertificate => "knock_out_certificate",
            ProductType::FactorCertificate => "factor_certificate",
        }
    }

    /// Directions an instrument of this type can take. Warrants are
    /// Call/Put; certificates are Long/Short.
    pub fn allows_direction(&self, direction: Direction) -> bool {
        match self {
            ProductType::Warrant => {
                matches!(direction, Direction::Call | Direction::Put)
            }
            ProductType::KnockOutCertificate | ProductType::FactorCertificate => {
                matches!(direction, Direction::Long | Direction::Short)
            }
        }
    }
}

impl std::str::FromStr for ProductType {
    type Err = crate::domain::UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warrant" => Ok(ProductType::Warrant),
            "knock_out_certificate" => Ok(ProductType::KnockOutCertificate),
            "factor_certificate" => Ok(ProductType::FactorCertificate),
            other => Err(crate::domain::UnknownCode::new("product type", other)),
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Market direction the instrument profits from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Warrant betting on a rising underlying.
    Call,
    /// Warrant betting on a falling underlying.
    Put,
    /// Certificate long the underlying.
    Long,
    /// Certificate short the underlying.
    Short,
}

impl Direction {
    /// Storage code for this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Call => "call",
            Direction::Put => "put",
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = crate::domain::UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call" => Ok(Direction::Call),
            "put" => Ok(Direction::Put),
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(crate::domain::UnknownCode::new("direction", other)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Instrument description as entered on a buy.
///
/// The first five fields are the identity: two buys naming the same
/// underlying, type, direction, strike and currency refer to the same
/// instrument row. wkn, name and expiry are metadata kept from the
/// first sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInstrument {
    /// Underlying asset, e.g. "DAX".
    pub underlying: String,
    /// Product category.
    pub product_type: ProductType,
    /// Market direction.
    pub direction: Direction,
    /// Strike or barrier level.
    pub strike: Decimal,
    /// Currency the strike is quoted in, e.g. "EUR".
    pub strike_currency: String,
    /// Exchange identifier (WKN), if known.
    pub wkn: Option<String>,
    /// Issuer's product name, if known.
    pub name: Option<String>,
    /// Expiry date; warrants have one, open-ended certificates do not.
    pub expiry_date: Option<NaiveDate>,
}

/// A persisted instrument row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Storage id.
    pub id: InstrumentId,
    /// Underlying asset.
    pub underlying: String,
    /// Product category.
    pub product_type: ProductType,
    /// Market direction.
    pub direction: Direction,
    /// Strike or barrier level.
    pub strike: Decimal,
    /// Currency the strike is quoted in.
    pub strike_currency: String,
    /// Exchange identifier (WKN), if known.
    pub wkn: Option<String>,
    /// Issuer's product name, if known.
    pub name: Option<String>,
    /// Expiry date, if the product has one.
    pub expiry_date: Option<NaiveDate>,
}

impl Instrument {
    /// Short human-readable label, e.g. "long @ 18000 EUR DAX".
    pub fn label(&self) -> String {
        format!(
            "{} @ {} {} {}",
            self.direction, self.strike, self.strike_currency, self.underlying
        )
    }
}
