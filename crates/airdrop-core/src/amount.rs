//! Token and native-currency amounts in base units (wei-style integers).
//!
//! Amounts never pass through floating point. On the wire they are decimal
//! strings so that values above 2^53 survive JSON consumers in other
//! languages; deserialization also accepts plain integers for hand-written
//! configuration files.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A non-negative amount in the smallest unit of a token or currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw base-unit value.
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Parse a decimal base-unit string such as `"1000000000000000000"`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidAmount(s.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidAmount(s.to_string()))
    }

    /// The raw base-unit value.
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Whether this amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Total for `count` recipients each receiving `self`.
    pub fn checked_total(&self, count: usize) -> Result<Self, ValidationError> {
        u128::try_from(count)
            .ok()
            .and_then(|c| self.0.checked_mul(c))
            .map(Self)
            .ok_or(ValidationError::AmountOverflow {
                per_address: self.0,
                count,
            })
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TokenAmount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> serde::de::Visitor<'de> for AmountVisitor {
            type Value = TokenAmount;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a decimal string or non-negative integer in base units")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<TokenAmount, E> {
                TokenAmount::parse(v).map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<TokenAmount, E> {
                Ok(TokenAmount(u128::from(v)))
            }

            fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<TokenAmount, E> {
                Ok(TokenAmount(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<TokenAmount, E> {
                u128::try_from(v)
                    .map(TokenAmount)
                    .map_err(|_| E::custom(ValidationError::InvalidAmount(v.to_string())))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
