//! Currency-qualified amounts with fixed-point decimal arithmetic.
//!
//! Order totals and payment amounts carry their currency code, so all
//! arithmetic is checked for both overflow and currency mismatch.
//! **Never use f64 for financial calculations!**

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monetary amount in a specific currency.
///
/// Uses `Decimal` internally (28-29 significant digits), so arithmetic is
/// exact and the value serializes as a string, preserving precision.
///
/// # Examples
///
/// ```rust
/// use commerce_btcpay::Money;
///
/// let price = Money::parse("10.00", "EUR").unwrap();
/// let fee = Money::parse("0.50", "EUR").unwrap();
/// let total = price.checked_add(&fee).unwrap();
/// assert_eq!(total.to_string(), "10.50 EUR");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value.
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "EUR", "USD").
    pub currency_code: String,
}

impl Money {
    /// Create a new amount.
    pub fn new(amount: Decimal, currency_code: impl Into<String>) -> Self {
        Self {
            amount,
            currency_code: currency_code.into(),
        }
    }

    /// Parse an amount from a decimal string (e.g., "123.45").
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as a valid decimal.
    pub fn parse(amount: &str, currency_code: impl Into<String>) -> Result<Self, String> {
        Decimal::from_str(amount)
            .map(|value| Self::new(value, currency_code))
            .map_err(|e| format!("Invalid amount: {}", e))
    }

    /// Zero in the given currency.
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Check if both operands share a currency.
    pub fn same_currency(&self, other: &Self) -> bool {
        self.currency_code == other.currency_code
    }

    /// Checked addition. Returns `None` on overflow or currency mismatch.
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if !self.same_currency(other) {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency_code.clone()))
    }

    /// Checked subtraction. Returns `None` on overflow or currency mismatch.
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if !self.same_currency(other) {
            return None;
        }
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Self::new(amount, self.currency_code.clone()))
    }

    /// Strict comparison: `self < other` in the same currency.
    pub fn less_than(&self, other: &Self) -> bool {
        self.same_currency(other) && self.amount < other.amount
    }

    /// Strict comparison: `self > other` in the same currency.
    pub fn greater_than(&self, other: &Self) -> bool {
        self.same_currency(other) && self.amount > other.amount
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_and_display() {
        let price = Money::parse("10.00", "EUR").unwrap();
        assert_eq!(price.amount, dec!(10.00));
        assert_eq!(price.to_string(), "10.00 EUR");

        assert!(Money::parse("not-a-number", "EUR").is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Money::parse("10.00", "EUR").unwrap();
        let b = Money::parse("2.50", "EUR").unwrap();

        assert_eq!(a.checked_add(&b).unwrap().amount, dec!(12.50));
        assert_eq!(a.checked_sub(&b).unwrap().amount, dec!(7.50));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let eur = Money::parse("10.00", "EUR").unwrap();
        let usd = Money::parse("10.00", "USD").unwrap();

        assert!(eur.checked_add(&usd).is_none());
        assert!(eur.checked_sub(&usd).is_none());
        assert!(!eur.less_than(&usd));
    }

    #[test]
    fn test_comparisons() {
        let small = Money::parse("1.00", "EUR").unwrap();
        let large = Money::parse("2.00", "EUR").unwrap();

        assert!(small.less_than(&large));
        assert!(large.greater_than(&small));
        assert!(!small.greater_than(&large));
    }

    #[test]
    fn test_serialization_preserves_precision() {
        let price = Money::parse("0.00000001", "BTC").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(price, parsed);
    }

    #[test]
    fn test_zero() {
        let zero = Money::zero("EUR");
        assert!(zero.is_zero());
        assert_eq!(zero.to_string(), "0 EUR");
    }
}
