use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed money amount represented as **integer minor units** (cents).
///
/// Every monetary field of a record (opening balances, transaction amounts)
/// uses this type so edits never drift through floating point.
///
/// # Examples
///
/// ```rust
/// use folio_engine::Amount;
///
/// let amount = Amount::new(12_34);
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from typed input (accepts `.` or `,` as decimal separator and
/// rejects more than two decimals):
///
/// ```rust
/// use folio_engine::Amount;
///
/// assert_eq!("10,5".parse::<Amount>().unwrap().minor(), 1050);
/// assert!("12.345".parse::<Amount>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a decimal string into minor units.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = |message: &str| EngineError::InvalidValue {
            field: "amount".to_string(),
            message: message.to_string(),
        };

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let rest = rest.trim().replace(',', ".");
        if rest.is_empty() {
            return Err(reject("empty amount"));
        }

        let (units_str, frac_str) = match rest.split_once('.') {
            Some((units, frac)) => (units, frac),
            None => (rest.as_str(), ""),
        };
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if units_str.is_empty() || !all_digits(units_str) || !all_digits(frac_str) {
            return Err(reject("invalid amount"));
        }

        let units: i64 = units_str.parse().map_err(|_| reject("amount too large"))?;
        let frac: i64 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i64>().map_err(|_| reject("invalid amount"))? * 10,
            2 => frac_str.parse::<i64>().map_err(|_| reject("invalid amount"))?,
            _ => return Err(reject("too many decimals")),
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| reject("amount too large"))?;

        Ok(Amount(if negative { -total } else { total }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_minor_units() {
        assert_eq!(Amount::new(0).to_string(), "0.00");
        assert_eq!(Amount::new(7).to_string(), "0.07");
        assert_eq!(Amount::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Amount>().unwrap().minor(), 1000);
        assert_eq!("10.5".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Amount>().unwrap().minor(), 1050);
        assert_eq!("-0.01".parse::<Amount>().unwrap().minor(), -1);
        assert_eq!(" +2.30 ".parse::<Amount>().unwrap().minor(), 230);
    }

    #[test]
    fn parse_rejects_partial_input() {
        assert!("".parse::<Amount>().is_err());
        assert!("-".parse::<Amount>().is_err());
        assert!("12.".parse::<Amount>().is_ok());
        assert!(".5".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("12.345".parse::<Amount>().is_err());
    }
}
