//! Positive BRL amount stored in centavos.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Amount of Brazilian reais, in the smallest currency unit (centavos).
///
/// Stored as an integer to avoid floating-point precision issues.
/// Always at least one centavo: a PIX charge of zero makes no sense upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Centavos per real.
    pub const CENTS_PER_REAL: i64 = 100;

    /// Creates an amount from centavos.
    pub fn from_cents(cents: i64) -> Result<Self, DomainError> {
        if cents <= 0 {
            return Err(DomainError::NonPositiveAmount(cents));
        }
        Ok(Self(cents))
    }

    /// Creates an amount from reais.
    ///
    /// Fractions of a centavo are rounded half away from zero, so `43.675`
    /// becomes `4368` and `43.674` becomes `4367`.
    pub fn from_reais(reais: Decimal) -> Result<Self, DomainError> {
        let cents = reais
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::from(Self::CENTS_PER_REAL))
            .and_then(|cents| cents.to_i64())
            .ok_or_else(|| DomainError::AmountOutOfRange(reais.to_string()))?;
        Self::from_cents(cents)
    }

    /// Parses a decimal amount in reais. Accepts `.` or `,` as decimal separator.
    pub fn parse_reais(input: &str) -> Result<Self, DomainError> {
        let normalized = input.trim().replace(',', ".");
        let reais = Decimal::from_str(&normalized)
            .map_err(|_| DomainError::InvalidAmount(input.to_string()))?;
        Self::from_reais(reais)
    }

    /// Returns the amount in centavos.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the amount in reais as an exact decimal.
    pub fn to_reais(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl TryFrom<i64> for Amount {
    type Error = DomainError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Self::from_cents(cents)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.0 / Self::CENTS_PER_REAL;
        let minor = self.0 % Self::CENTS_PER_REAL;
        write!(f, "R$ {},{:02}", major, minor)
    }
}
