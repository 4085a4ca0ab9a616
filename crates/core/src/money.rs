use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YenParseError {
    #[error("no digits in amount: '{0}'")]
    Empty(String),
    #[error("invalid amount '{0}'")]
    Invalid(String),
    #[error("amount out of range: '{0}'")]
    Overflow(String),
}

/// A whole-yen amount. JPY has no minor unit, so fractional input is rounded
/// half-to-even on the way in and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Yen(i64);

impl Yen {
    pub const fn new(value: i64) -> Self {
        Yen(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// `None` when the sum leaves the `i64` range.
    pub fn checked_add(self, rhs: Yen) -> Option<Yen> {
        self.0.checked_add(rhs.0).map(Yen)
    }

    pub fn abs_diff(self, other: Yen) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Round a decimal amount to whole yen (banker's rounding).
    pub fn from_decimal(decimal: Decimal) -> Option<Self> {
        decimal
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i64()
            .map(Yen)
    }

    /// Parse loose ASCII amount text: optional sign, `¥` prefix, thousands
    /// commas, up to two decimal places, and a trailing `円` or `JPY`.
    pub fn parse_loose(s: &str) -> Result<Self, YenParseError> {
        let trimmed = s
            .trim()
            .trim_end_matches("JPY")
            .trim_end_matches('円')
            .trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let body = body.trim_start_matches('¥').trim();
        let clean: String = body.chars().filter(|c| *c != ',').collect();
        if !clean.chars().any(|c| c.is_ascii_digit()) {
            return Err(YenParseError::Empty(s.to_string()));
        }
        let dec = Decimal::from_str(&clean).map_err(|_| YenParseError::Invalid(s.to_string()))?;
        let dec = if negative { -dec } else { dec };
        Yen::from_decimal(dec).ok_or_else(|| YenParseError::Overflow(s.to_string()))
    }
}

impl From<i64> for Yen {
    fn from(value: i64) -> Self {
        Yen(value)
    }
}

impl From<Yen> for i64 {
    fn from(value: Yen) -> Self {
        value.0
    }
}

impl FromStr for Yen {
    type Err = YenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Yen::parse_loose(s)
    }
}

impl fmt::Display for Yen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-¥{grouped}")
        } else {
            write!(f, "¥{grouped}")
        }
    }
}

impl Neg for Yen {
    type Output = Self;
    fn neg(self) -> Self {
        Yen(-self.0)
    }
}
