//! Exact fixed-point monetary values
//!
//! Every monetary field in the domain is an `Amount`: a non-negative
//! `rust_decimal::Decimal` quantized to 2 decimal places at the edges.
//! Intermediate sums run at full precision; quantization happens only when
//! a value is stored or returned. Binary floats never enter the arithmetic,
//! so chained subtotal/tax/tip derivations cannot drift by a cent.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A non-negative monetary value with 2-decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Parse an amount from a decimal string like `"12.34"`.
    ///
    /// Negative values fail validation: discounts and refunds are not
    /// modeled in this domain.
    pub fn parse(raw: &str) -> Result<Amount> {
        let value = Decimal::from_str(raw.trim())
            .map_err(|e| Error::validation("amount", format!("invalid amount {:?}: {}", raw, e)))?;
        Amount::new(value)
    }

    /// Construct from a decimal, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Amount> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::validation(
                "amount",
                format!("negative amount not allowed: {}", value),
            ));
        }
        Ok(Amount(value))
    }

    /// Construct from a raw model float, clamping negatives to zero.
    ///
    /// Model extractions occasionally emit small negative artifacts; per the
    /// domain invariant those clamp rather than fail.
    pub fn from_f64_clamped(value: f64) -> Amount {
        match Decimal::from_f64(value) {
            Some(d) if !d.is_sign_negative() => Amount(d),
            _ => Amount::ZERO,
        }
    }

    /// Round-half-up to 2 decimal places.
    pub fn quantize(self) -> Amount {
        Amount(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Subtract, flooring at zero. Used for clamped fields (subtotal,
    /// posttax_total) where the derivation can momentarily go negative.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        let diff = self.0 - other.0;
        if diff.is_sign_negative() {
            Amount::ZERO
        } else {
            Amount(diff)
        }
    }

    /// Multiply by a quantity, exactly. The quantity is converted through
    /// its decimal representation, never multiplied as a float.
    pub fn mul_quantity(self, quantity: f64) -> Amount {
        let q = Decimal::from_f64(quantity).unwrap_or(Decimal::ZERO);
        Amount(self.0 * q.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Mul<Decimal> for Amount {
    type Output = Amount;

    fn mul(self, rhs: Decimal) -> Amount {
        Amount(self.0 * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Always the 2-decimal string form, e.g. "23.00"
        serializer.collect_str(&format_args!("{:.2}", self.0))
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative monetary value as a number or string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Amount, E> {
        let d = Decimal::from_f64(v)
            .ok_or_else(|| E::custom(format!("amount not representable: {}", v)))?;
        Amount::new(d).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Amount, E> {
        Amount::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Amount, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Amount, E> {
        Amount::parse(v).map_err(E::custom)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Amount, E> {
        // Model output uses null for unknown amounts; those default to zero.
        Ok(Amount::ZERO)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let a = Amount::parse("12.345").unwrap();
        assert_eq!(a.quantize().to_string(), "12.35");
        assert_eq!(Amount::parse("5").unwrap().to_string(), "5.00");
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert!(Amount::parse("-1.00").is_err());
        assert!(Amount::parse("garbage").is_err());
    }

    #[test]
    fn test_quantize_rounds_half_up() {
        assert_eq!(Amount::parse("2.005").unwrap().quantize().to_string(), "2.01");
        assert_eq!(Amount::parse("2.004").unwrap().quantize().to_string(), "2.00");
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Amount::parse("3.00").unwrap();
        let b = Amount::parse("5.00").unwrap();
        assert_eq!(a.saturating_sub(b), Amount::ZERO);
        assert_eq!(b.saturating_sub(a).to_string(), "2.00");
    }

    #[test]
    fn test_mul_quantity_is_exact() {
        // 23.00 * 2 = 46.00 with no float drift
        let price = Amount::parse("23.00").unwrap();
        assert_eq!(price.mul_quantity(2.0).quantize().to_string(), "46.00");
        // 0.1 * 3 = 0.30, the classic float failure case
        let dime = Amount::parse("0.10").unwrap();
        assert_eq!(dime.mul_quantity(3.0).quantize().to_string(), "0.30");
    }

    #[test]
    fn test_sum_precise_over_many_items() {
        let total: Amount = (0..100).map(|_| Amount::parse("0.01").unwrap()).sum();
        assert_eq!(total.quantize().to_string(), "1.00");
    }

    #[test]
    fn test_serde_string_form() {
        let a = Amount::parse("23").unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"23.00\"");

        // Accepts both number and string on the way in
        let from_num: Amount = serde_json::from_str("23.5").unwrap();
        assert_eq!(from_num.to_string(), "23.50");
        let from_str: Amount = serde_json::from_str("\"23.50\"").unwrap();
        assert_eq!(from_num, from_str);
        let from_null: Amount = serde_json::from_str("null").unwrap();
        assert_eq!(from_null, Amount::ZERO);
    }

    #[test]
    fn test_serde_rejects_negative() {
        assert!(serde_json::from_str::<Amount>("-4.2").is_err());
    }
}
