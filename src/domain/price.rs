//! Integer price representation.
//!
//! Prices are stored as hundred-thousandths of the unit: $1.00 == 100,000.
//! All arithmetic stays in integers; the wire's dollar-string form is parsed
//! once at ingest and never revisited.

use std::fmt;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

/// One full unit ($1.00) in price ticks.
pub const UNIT: i64 = 100_000;

/// A contract price in hundred-thousandths of the unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Self = Self(0);

    /// Create a price from raw hundred-thousandths, clamped to [0, 100000].
    pub fn from_raw(raw: i64) -> Self {
        Self(raw.clamp(0, UNIT))
    }

    /// Create a price from whole cents (the REST orderbook form).
    pub fn from_cents(cents: i64) -> Self {
        Self::from_raw(cents.saturating_mul(1_000))
    }

    /// Parse the exchange's dollar-string form, e.g. `"0.5250"` -> 52500.
    ///
    /// Sub-cent precision is preserved up to five fractional digits; deeper
    /// digits are truncated. Empty or malformed input yields zero, matching
    /// the wire contract for absent prices.
    pub fn parse_dollars(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self::ZERO;
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        let whole: i64 = match whole.parse() {
            Ok(v) => v,
            Err(_) if whole.is_empty() => 0,
            Err(_) => return Self::ZERO,
        };

        let mut frac_raw: i64 = 0;
        let mut scale: i64 = UNIT / 10;
        for c in frac.chars().take(5) {
            let Some(d) = c.to_digit(10) else {
                return Self::ZERO;
            };
            frac_raw += i64::from(d) * scale;
            scale /= 10;
        }

        Self::from_raw(whole.saturating_mul(UNIT).saturating_add(frac_raw))
    }

    /// Raw value in hundred-thousandths.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// The complement price: what the opposite side pays for the same level.
    pub fn complement(self) -> Self {
        Self(UNIT - self.0)
    }
}

impl Sub for Price {
    type Output = i64;

    fn sub(self, rhs: Self) -> i64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:05}", self.0 / UNIT, self.0 % UNIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sub_cent_dollars() {
        assert_eq!(Price::parse_dollars("0.5255").raw(), 52_550);
        assert_eq!(Price::parse_dollars("0.5250").raw(), 52_500);
    }

    #[test]
    fn parses_short_fraction() {
        assert_eq!(Price::parse_dollars("0.52").raw(), 52_000);
        assert_eq!(Price::parse_dollars("0.5").raw(), 50_000);
    }

    #[test]
    fn parses_whole_unit() {
        assert_eq!(Price::parse_dollars("1.00").raw(), 100_000);
        assert_eq!(Price::parse_dollars("1").raw(), 100_000);
    }

    #[test]
    fn empty_and_garbage_yield_zero() {
        assert_eq!(Price::parse_dollars(""), Price::ZERO);
        assert_eq!(Price::parse_dollars("  "), Price::ZERO);
        assert_eq!(Price::parse_dollars("abc"), Price::ZERO);
        assert_eq!(Price::parse_dollars("0.5a"), Price::ZERO);
    }

    #[test]
    fn truncates_beyond_five_digits() {
        assert_eq!(Price::parse_dollars("0.123456789").raw(), 12_345);
    }

    #[test]
    fn cents_scale_by_thousand() {
        assert_eq!(Price::from_cents(52).raw(), 52_000);
        assert_eq!(Price::from_cents(100).raw(), 100_000);
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(Price::from_raw(200_000).raw(), 100_000);
        assert_eq!(Price::from_raw(-5).raw(), 0);
        assert_eq!(Price::parse_dollars("2.50").raw(), 100_000);
    }

    #[test]
    fn complement_mirrors_around_unit() {
        assert_eq!(Price::from_cents(40).complement().raw(), 60_000);
    }

    #[test]
    fn displays_as_dollars() {
        assert_eq!(Price::from_raw(52_550).to_string(), "0.52550");
        assert_eq!(Price::from_raw(100_000).to_string(), "1.00000");
    }
}
