//! Exact measure offsets.
//!
//! Row positions inside a chart are sums of `1/rows` steps. Keeping them as
//! reduced fractions means a row on a 12th boundary is recognized as exactly
//! that, no matter how many rows came before it.

use std::cmp::Ordering;
use std::fmt;
use std::ops;

use gcd::Gcd;

/// Subdivisions (in rows per measure) a row can be tagged with, finest last.
pub const BEAT_DENOMINATORS: [i64; 5] = [4, 6, 8, 12, 16];

/// Tag used for rows that land on none of [`BEAT_DENOMINATORS`]
/// (5ths, 32nds, ...). They are colored like 6ths.
pub const FALLBACK_BEAT: u32 = 6;

/// A non-negative or negative rational number of measures, always reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fraction {
    n: i64,
    d: i64,
}

impl Fraction {
    pub const ZERO: Fraction = Fraction { n: 0, d: 1 };
    pub const ONE: Fraction = Fraction { n: 1, d: 1 };

    /// Builds `n/d` in lowest terms. A zero denominator is treated as 1.
    pub fn new(n: i64, d: i64) -> Self {
        let (n, d) = match d.cmp(&0) {
            Ordering::Less => (-n, -d),
            Ordering::Equal => (n, 1),
            Ordering::Greater => (n, d),
        };
        let gcd = n.unsigned_abs().gcd(d.unsigned_abs()).max(1);
        Self {
            n: n / gcd as i64,
            d: d / gcd as i64,
        }
    }

    /// The per-row step of a measure holding `rows` rows. Empty measures
    /// step by a whole measure.
    pub fn recip_of(rows: usize) -> Self {
        Self::new(1, rows.max(1) as i64)
    }

    pub fn num(&self) -> i64 {
        self.n
    }

    pub fn den(&self) -> i64 {
        self.d
    }

    pub fn as_f64(&self) -> f64 {
        self.n as f64 / self.d as f64
    }

    pub fn is_integer(&self) -> bool {
        self.d == 1
    }

    /// True when `self` is an exact integer multiple of `unit`.
    pub fn is_multiple_of(&self, unit: Fraction) -> bool {
        if unit.n == 0 {
            return self.n == 0;
        }
        // self / unit = (n * unit.d) / (d * unit.n)
        let num = i128::from(self.n) * i128::from(unit.d);
        let den = i128::from(self.d) * i128::from(unit.n);
        num % den == 0
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.d == 1 {
            write!(f, "{}", self.n)
        } else {
            write!(f, "{}/{}", self.n, self.d)
        }
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        (i128::from(self.n) * i128::from(other.d)).cmp(&(i128::from(other.n) * i128::from(self.d)))
    }
}

impl ops::Add<Self> for Fraction {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let gcd = self.d.unsigned_abs().gcd(rhs.d.unsigned_abs()) as i64;
        let d = (self.d / gcd) * rhs.d;
        let n = self.n * (rhs.d / gcd) + rhs.n * (self.d / gcd);
        Self::new(n, d)
    }
}

impl ops::AddAssign<Self> for Fraction {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl ops::Neg for Fraction {
    type Output = Self;

    fn neg(self) -> Self {
        Self { n: -self.n, d: self.d }
    }
}

impl ops::Sub<Self> for Fraction {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl From<i64> for Fraction {
    fn from(value: i64) -> Self {
        Self { n: value, d: 1 }
    }
}

impl From<Fraction> for f64 {
    fn from(value: Fraction) -> Self {
        value.as_f64()
    }
}

/// Finest standard subdivision an offset lands on exactly, as a
/// rows-per-measure denominator (4 = quarter notes, 16 = sixteenths).
pub fn determine_beat(offset: Fraction) -> u32 {
    BEAT_DENOMINATORS
        .iter()
        .find(|&&k| offset.is_multiple_of(Fraction::new(1, k)))
        .map_or(FALLBACK_BEAT, |&k| k as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reduces() {
        assert_eq!(Fraction::new(2, 4), Fraction::new(1, 2));
        assert_eq!(Fraction::new(10, 6).num(), 5);
        assert_eq!(Fraction::new(10, 6).den(), 3);
        assert_eq!(Fraction::new(1, -2), Fraction::new(-1, 2));
        assert_eq!(Fraction::new(0, 7), Fraction::ZERO);
    }

    #[test]
    fn test_add() {
        let third = Fraction::new(1, 3);
        assert_eq!(third + third + third, Fraction::ONE);
        assert_eq!(Fraction::new(1, 4) + Fraction::new(1, 6), Fraction::new(5, 12));
        assert_eq!(Fraction::new(3, 4) - Fraction::new(1, 4), Fraction::new(1, 2));
    }

    #[test]
    fn test_many_additions_stay_exact() {
        let step = Fraction::recip_of(12);
        let mut offset = Fraction::ZERO;
        for _ in 0..12_000 {
            offset += step;
        }
        assert_eq!(offset, Fraction::from(1000));
        assert!(offset.is_integer());
    }

    #[test]
    fn test_recip_of_empty_measure() {
        assert_eq!(Fraction::recip_of(0), Fraction::ONE);
    }

    #[test]
    fn test_ordering() {
        assert!(Fraction::new(1, 3) < Fraction::new(1, 2));
        assert!(Fraction::new(-1, 2) < Fraction::ZERO);
    }

    #[test]
    fn test_determine_beat() {
        assert_eq!(determine_beat(Fraction::ZERO), 4);
        assert_eq!(determine_beat(Fraction::new(3, 4)), 4);
        assert_eq!(determine_beat(Fraction::new(1, 8)), 8);
        assert_eq!(determine_beat(Fraction::new(1, 3)), 6);
        assert_eq!(determine_beat(Fraction::new(1, 12)), 12);
        assert_eq!(determine_beat(Fraction::new(5, 16)), 16);
        assert_eq!(determine_beat(Fraction::new(7, 4) + Fraction::new(1, 16)), 16);
    }

    #[test]
    fn test_determine_beat_fallback() {
        assert_eq!(determine_beat(Fraction::new(1, 5)), FALLBACK_BEAT);
        assert_eq!(determine_beat(Fraction::new(1, 32)), FALLBACK_BEAT);
    }
}
