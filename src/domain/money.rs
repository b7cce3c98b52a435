//! Monetary value object.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Non-negative amount tagged with an ISO-4217 style currency code.
///
/// The currency is normalized to uppercase on construction, so `usd` and `USD`
/// produce equal values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMoney", into = "RawMoney")]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Result<Self, DomainError> {
        if amount < Decimal::ZERO {
            return Err(DomainError::validation(
                "price_amount",
                "amount cannot be negative",
            ));
        }

        let currency = currency.trim();
        if currency.is_empty() {
            return Err(DomainError::validation(
                "price_currency",
                "currency cannot be empty",
            ));
        }
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation(
                "price_currency",
                format!("currency `{currency}` must be three ASCII letters"),
            ));
        }

        Ok(Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[derive(Serialize, Deserialize)]
struct RawMoney {
    amount: Decimal,
    currency: String,
}

impl TryFrom<RawMoney> for Money {
    type Error = DomainError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, &raw.currency)
    }
}

impl From<Money> for RawMoney {
    fn from(money: Money) -> Self {
        Self {
            amount: money.amount,
            currency: money.currency,
        }
    }
}
