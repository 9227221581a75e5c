//! Fixed-precision stake value.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places every amount is rounded to.
pub const AMOUNT_PRECISION: u32 = 2;

/// Errors produced when constructing an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Stake values cannot be negative.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),

    /// The input was not a decimal number.
    #[error("invalid amount {input:?}: {reason}")]
    Invalid { input: String, reason: String },

    /// The result does not fit in a decimal.
    #[error("amount overflow")]
    Overflow,
}

/// Non-negative stake value with two decimal places.
///
/// Rounding happens at construction and after every scaling operation,
/// always midpoint-away-from-zero, so equal inputs produce equal amounts
/// regardless of the path taken to compute them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Returns a zero amount.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Creates an amount from a decimal, rounding to [`AMOUNT_PRECISION`].
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        let rounded = round(value);
        if rounded < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(rounded))
    }

    /// Returns the underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiplies by a non-negative factor and rounds the product.
    pub fn scale(&self, factor: Decimal) -> Result<Self, AmountError> {
        let product = self.0.checked_mul(factor).ok_or(AmountError::Overflow)?;
        Self::new(product)
    }

    /// Adds two amounts, failing if the sum does not fit.
    pub fn checked_add(&self, rhs: Amount) -> Result<Self, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }
}

fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| AmountError::Invalid {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Saturates at [`Decimal::MAX`]; use [`Amount::checked_add`] to detect overflow.
impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, a| acc + a)
    }
}
