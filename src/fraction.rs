//! Fraction type with cycle-related operations for pattern timing.
//!
//! All pattern timing is expressed in cycles (1 cycle = 1 bar) using exact
//! rational arithmetic, so multi-hour sessions never accumulate float drift.

use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A point in time or a duration, measured in cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction(Rational64);

impl Fraction {
    /// Create a new fraction from numerator and denominator.
    pub fn new(numer: i64, denom: i64) -> Self {
        Fraction(Rational64::new(numer, denom))
    }

    /// Create a fraction from an integer number of cycles.
    pub fn from_integer(n: i64) -> Self {
        Fraction(Rational64::from_integer(n))
    }

    /// Returns the start of the cycle containing this time (floor to integer).
    /// In Tidal terminology this is the "sam" (start of measure).
    pub fn sam(&self) -> Self {
        Fraction(Rational64::from_integer(self.0.floor().to_integer()))
    }

    /// Returns the start of the next cycle.
    pub fn next_sam(&self) -> Self {
        self.sam() + Fraction::one()
    }

    /// Returns the position within the current cycle (fractional part).
    pub fn cycle_pos(&self) -> Self {
        *self - self.sam()
    }

    /// The integer index of the cycle containing this time.
    /// Correct for negative times: -1/4 lies in cycle -1.
    pub fn cycle_index(&self) -> i64 {
        self.0.floor().to_integer()
    }

    /// Floor to integer.
    pub fn floor(&self) -> Self {
        Fraction(Rational64::from_integer(self.0.floor().to_integer()))
    }

    /// Ceiling to integer.
    pub fn ceil(&self) -> Self {
        Fraction(Rational64::from_integer(self.0.ceil().to_integer()))
    }

    /// Convert to f64 for intensity math at the render boundary.
    pub fn to_f64(&self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }

    /// Get the numerator.
    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    /// Get the denominator.
    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    /// Returns the minimum of two fractions.
    pub fn min(self, other: Self) -> Self {
        if self < other {
            self
        } else {
            other
        }
    }

    /// Returns the maximum of two fractions.
    pub fn max(self, other: Self) -> Self {
        if self > other {
            self
        } else {
            other
        }
    }

    /// Zero cycles.
    pub fn zero() -> Self {
        Fraction(Rational64::zero())
    }

    /// One whole cycle.
    pub fn one() -> Self {
        Fraction(Rational64::one())
    }

    /// Check if this fraction is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Fraction(self.0.abs())
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::zero()
    }
}

impl From<i64> for Fraction {
    fn from(n: i64) -> Self {
        Fraction::from_integer(n)
    }
}

impl From<i32> for Fraction {
    fn from(n: i32) -> Self {
        Fraction::from_integer(n as i64)
    }
}

impl From<f64> for Fraction {
    /// Convert an externally supplied float (beat clock position) to a
    /// rational with a bounded denominator. Once inside the engine, time
    /// stays rational; this is the only lossy step and it happens once per
    /// frame, so error never accumulates.
    fn from(f: f64) -> Self {
        let max_denom: i64 = 10000;

        if f.is_nan() || f.is_infinite() {
            return Fraction::zero();
        }

        let sign = if f < 0.0 { -1 } else { 1 };
        let f_abs = f.abs();

        let int_part = f_abs.floor() as i64;
        let frac_part = f_abs - int_part as f64;

        if frac_part < 1e-10 {
            return Fraction::from_integer(sign * int_part);
        }

        // Stern-Brocot mediant search for the best bounded-denominator
        // approximation of the fractional part.
        let mut a_num: i64 = 0;
        let mut a_den: i64 = 1;
        let mut b_num: i64 = 1;
        let mut b_den: i64 = 1;

        let target = frac_part;

        for _ in 0..50 {
            let med_num = a_num + b_num;
            let med_den = a_den + b_den;

            if med_den > max_denom {
                break;
            }

            let med_val = med_num as f64 / med_den as f64;

            if (med_val - target).abs() < 1e-10 {
                let total_num = sign * (int_part * med_den + med_num);
                return Fraction::new(total_num, med_den);
            } else if med_val < target {
                a_num = med_num;
                a_den = med_den;
            } else {
                b_num = med_num;
                b_den = med_den;
            }
        }

        let a_val = a_num as f64 / a_den as f64;
        let b_val = b_num as f64 / b_den as f64;

        let (best_num, best_den) = if (a_val - target).abs() < (b_val - target).abs() {
            (a_num, a_den)
        } else {
            (b_num, b_den)
        };

        let total_num = sign * (int_part * best_den + best_num);
        Fraction::new(total_num, best_den)
    }
}

impl From<Rational64> for Fraction {
    fn from(r: Rational64) -> Self {
        Fraction(r)
    }
}

impl Add for Fraction {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Fraction(self.0 + other.0)
    }
}

impl Sub for Fraction {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Fraction(self.0 - other.0)
    }
}

impl Mul for Fraction {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Fraction(self.0 * other.0)
    }
}

impl Div for Fraction {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        Fraction(self.0 / other.0)
    }
}

impl Neg for Fraction {
    type Output = Self;

    fn neg(self) -> Self {
        Fraction(-self.0)
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Display for Fraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numer(), self.denom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sam() {
        assert_eq!(Fraction::new(0, 1).sam(), Fraction::new(0, 1));
        assert_eq!(Fraction::new(1, 2).sam(), Fraction::new(0, 1));
        assert_eq!(Fraction::new(3, 2).sam(), Fraction::new(1, 1));
        assert_eq!(Fraction::new(-1, 4).sam(), Fraction::new(-1, 1));
    }

    #[test]
    fn test_cycle_index_negative() {
        assert_eq!(Fraction::new(-1, 4).cycle_index(), -1);
        assert_eq!(Fraction::new(-5, 4).cycle_index(), -2);
        assert_eq!(Fraction::new(7, 4).cycle_index(), 1);
    }

    #[test]
    fn test_cycle_pos() {
        assert_eq!(Fraction::new(3, 2).cycle_pos(), Fraction::new(1, 2));
        assert_eq!(Fraction::new(7, 4).cycle_pos(), Fraction::new(3, 4));
        assert_eq!(Fraction::new(-1, 4).cycle_pos(), Fraction::new(3, 4));
    }

    #[test]
    fn test_arithmetic() {
        let a = Fraction::new(1, 2);
        let b = Fraction::new(1, 3);
        assert_eq!(a + b, Fraction::new(5, 6));
        assert_eq!(a - b, Fraction::new(1, 6));
        assert_eq!(a * b, Fraction::new(1, 6));
        assert_eq!(a / b, Fraction::new(3, 2));
    }

    #[test]
    fn test_repeated_shift_is_exact() {
        // Shifting by 1/b, b times, lands exactly on 1 for any b.
        for b in 1..=97i64 {
            let step = Fraction::new(1, b);
            let mut t = Fraction::zero();
            for _ in 0..b {
                t = t + step;
            }
            assert_eq!(t, Fraction::one(), "drift for b={}", b);
        }
    }

    #[test]
    fn test_from_f64_round_trip() {
        assert_eq!(Fraction::from(0.25), Fraction::new(1, 4));
        assert_eq!(Fraction::from(2.5), Fraction::new(5, 2));
        assert_eq!(Fraction::from(-0.75), Fraction::new(-3, 4));
        assert_eq!(Fraction::from(3.0), Fraction::from_integer(3));
    }
}
