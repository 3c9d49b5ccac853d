//! Monetary values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Digits kept after the decimal point.
pub const PRICE_SCALE: u32 = 2;

/// Exclusive upper bound, matching the `NUMERIC(12, 2)` price column.
const PRICE_LIMIT: i64 = 10_000_000_000;

/// Price of a purchasable variant.
///
/// Always strictly positive, at most two decimal places and below
/// `10_000_000_000`, so every backend stores it exactly. Serialized as a plain
/// JSON number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "price must be positive, got {amount}"
            )));
        }
        if amount.normalize().scale() > PRICE_SCALE {
            return Err(DomainError::validation(format!(
                "price {amount} has more than {PRICE_SCALE} decimal places"
            )));
        }
        if amount >= Decimal::from(PRICE_LIMIT) {
            return Err(DomainError::validation(format!(
                "price {amount} exceeds the maximum of {PRICE_LIMIT}"
            )));
        }
        Ok(Self(amount))
    }

    /// Convenience constructor for whole-unit prices.
    pub fn from_units(units: i64) -> DomainResult<Self> {
        Self::new(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl ValueObject for Price {}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
