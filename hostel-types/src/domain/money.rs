//! Type-safe monetary value with embedded currency.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::DomainError;

/// Currencies supported by the payment system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    INR,
    USD,
    EUR,
    GBP,
}

impl Currency {
    /// Returns the number of decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::INR | Currency::USD | Currency::EUR | Currency::GBP => 2,
        }
    }

    /// Returns the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::INR => "₹",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
        }
    }

    /// Returns the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Currency::INR),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            other => Err(DomainError::validation(format!("Unknown currency: {other}"))),
        }
    }
}

/// Quantizes an amount to 2 decimal places using banker's rounding.
pub fn quantize(amount: Decimal) -> Decimal {
    let mut q = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    q.rescale(2);
    if q.is_zero() {
        q.set_sign_positive(true);
    }
    q
}

/// Type-safe money representation with embedded currency.
///
/// Amounts are always quantized to 2 decimal places and never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value, quantizing the amount.
    ///
    /// The amount must fit in signed 64-bit minor units, the storage format.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, DomainError> {
        let amount = quantize(amount);
        if amount.is_sign_negative() {
            return Err(DomainError::NegativeAmount);
        }
        let money = Self { amount, currency };
        money.to_minor()?;
        Ok(money)
    }

    /// Creates a strictly positive Money value (payments, refunds, schedules).
    pub fn positive(amount: Decimal, currency: Currency) -> Result<Self, DomainError> {
        let money = Self::new(amount, currency)?;
        if money.amount.is_zero() {
            return Err(DomainError::NonPositiveAmount);
        }
        Ok(money)
    }

    /// Creates a zero-value Money for the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: quantize(Decimal::ZERO),
            currency,
        }
    }

    /// Rebuilds Money from the smallest currency unit (paise, cents).
    pub fn from_minor(minor: i64, currency: Currency) -> Result<Self, DomainError> {
        Self::new(Decimal::new(minor, currency.decimal_places()), currency)
    }

    /// Returns the amount in the smallest currency unit.
    pub fn to_minor(&self) -> Result<i64, DomainError> {
        let scale = Decimal::from(10_i64.pow(self.currency.decimal_places()));
        self.amount
            .checked_mul(scale)
            .and_then(|minor| minor.to_i64())
            .ok_or(DomainError::AmountOutOfRange)
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Checked addition - returns error if currencies don't match.
    pub fn checked_add(&self, other: Money) -> Result<Money, DomainError> {
        self.ensure_same_currency(&other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(DomainError::AmountOutOfRange)?;
        Money::new(amount, self.currency)
    }

    /// Checked subtraction - returns error if currencies don't match or result would be negative.
    pub fn checked_sub(&self, other: Money) -> Result<Money, DomainError> {
        self.ensure_same_currency(&other)?;
        if self.amount < other.amount {
            return Err(DomainError::NegativeAmount);
        }
        Money::new(self.amount - other.amount, self.currency)
    }

    pub fn ensure_same_currency(&self, other: &Money) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.currency.symbol(), self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_is_quantized() {
        let money = Money::new(dec!(1500), Currency::INR).unwrap();
        assert_eq!(money.amount().to_string(), "1500.00");

        let money = Money::new(dec!(10.005), Currency::INR).unwrap();
        assert_eq!(money.amount(), dec!(10.00));

        let money = Money::new(dec!(10.015), Currency::INR).unwrap();
        assert_eq!(money.amount(), dec!(10.02));
    }

    #[test]
    fn test_negative_money_fails() {
        let result = Money::new(dec!(-1), Currency::USD);
        assert!(matches!(result, Err(DomainError::NegativeAmount)));
    }

    #[test]
    fn test_amounts_beyond_minor_range_fail() {
        let huge = Decimal::MAX;
        assert!(matches!(
            Money::new(huge, Currency::INR),
            Err(DomainError::AmountOutOfRange)
        ));

        let largest = Decimal::new(i64::MAX, 2);
        assert_eq!(
            Money::new(largest, Currency::INR).unwrap().to_minor().unwrap(),
            i64::MAX
        );
        assert!(Money::new(largest + dec!(0.01), Currency::INR).is_err());
    }

    #[test]
    fn test_positive_rejects_zero_after_rounding() {
        let result = Money::positive(dec!(0.004), Currency::INR);
        assert!(matches!(result, Err(DomainError::NonPositiveAmount)));
    }

    #[test]
    fn test_minor_units() {
        let money = Money::new(dec!(1234.56), Currency::INR).unwrap();
        assert_eq!(money.to_minor().unwrap(), 123456);
        assert_eq!(Money::from_minor(123456, Currency::INR).unwrap(), money);
    }

    #[test]
    fn test_currency_mismatch() {
        let inr = Money::new(dec!(100), Currency::INR).unwrap();
        let usd = Money::new(dec!(50), Currency::USD).unwrap();
        assert!(matches!(
            inr.checked_add(usd),
            Err(DomainError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_checked_sub_never_negative() {
        let a = Money::new(dec!(10), Currency::INR).unwrap();
        let b = Money::new(dec!(10.01), Currency::INR).unwrap();
        assert!(a.checked_sub(b).is_err());
        assert!(b.checked_sub(a).unwrap().amount() == dec!(0.01));
    }

    #[test]
    fn test_money_display() {
        let money = Money::new(dec!(10.5), Currency::USD).unwrap();
        assert_eq!(format!("{}", money), "$10.50");
    }
}
