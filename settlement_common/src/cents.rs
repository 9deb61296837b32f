use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "EUR";

//--------------------------------------        Cents        ---------------------------------------------------------
/// A monetary amount in minor currency units (1/100 of the unit). All settlement arithmetic is done in `Cents`, so
/// there is no floating point anywhere in the money path.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Cents> for Cents {
    fn sum<I: Iterator<Item = &'a Cents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies the amount by `basis_points / 10_000`, rounding half away from zero to the nearest cent.
    ///
    /// 19% is 1_900 basis points, so `Cents(925).scale_basis_points(1_900)` is `Cents(176)`.
    pub fn scale_basis_points(&self, basis_points: i64) -> Self {
        let product = i128::from(self.0) * i128::from(basis_points);
        let magnitude = (product.abs() + 5_000) / 10_000;
        let rounded = if product < 0 { -magnitude } else { magnitude };
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    /// Clamps the amount into `[min, max]`.
    pub fn clamp_to(self, min: Cents, max: Cents) -> Self {
        Self(self.0.clamp(min.0, max.0.max(min.0)))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid currency amount: {0}")]
pub struct CentsParseError(pub String);

impl FromStr for Cents {
    type Err = CentsParseError;

    /// Parses decimal strings such as `"10"`, `"9.5"`, `"9.25"` or `"-3.20"`. More than two decimals are rejected
    /// rather than silently rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = digits.split('.');
        let whole = parts.next().filter(|w| !w.is_empty()).ok_or_else(|| CentsParseError(s.to_string()))?;
        let fraction = parts.next();
        if parts.next().is_some() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(CentsParseError(s.to_string()));
        }
        let whole = whole.parse::<i64>().map_err(|e| CentsParseError(format!("{s}. {e}")))?;
        let cents = match fraction {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 2 || !f.chars().all(|c| c.is_ascii_digit()) => {
                return Err(CentsParseError(s.to_string()));
            },
            Some(f) if f.len() == 1 => f.parse::<i64>().map_err(|e| CentsParseError(format!("{s}. {e}")))? * 10,
            Some(f) => f.parse::<i64>().map_err(|e| CentsParseError(format!("{s}. {e}")))?,
        };
        let value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| CentsParseError(format!("{s} is out of range")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Cents::from(925).to_string(), "9.25");
        assert_eq!(Cents::from(5).to_string(), "0.05");
        assert_eq!(Cents::from(-320).to_string(), "-3.20");
        assert_eq!(Cents::from_major(12).to_string(), "12.00");
    }

    #[test]
    fn parse() {
        assert_eq!("10".parse::<Cents>(), Ok(Cents::from(1000)));
        assert_eq!("9.5".parse::<Cents>(), Ok(Cents::from(950)));
        assert_eq!("9.25".parse::<Cents>(), Ok(Cents::from(925)));
        assert_eq!("-3.20".parse::<Cents>(), Ok(Cents::from(-320)));
        assert!("9.255".parse::<Cents>().is_err());
        assert!("nine".parse::<Cents>().is_err());
        assert!(".50".parse::<Cents>().is_err());
        assert!("1.2.3".parse::<Cents>().is_err());
    }

    #[test]
    fn basis_points_round_half_up() {
        assert_eq!(Cents::from(1000).scale_basis_points(1_900), Cents::from(190));
        assert_eq!(Cents::from(3333).scale_basis_points(1_900), Cents::from(633));
        assert_eq!(Cents::from(925).scale_basis_points(1_900), Cents::from(176));
        // 0.5 cent rounds up
        assert_eq!(Cents::from(50).scale_basis_points(100), Cents::from(1));
        assert_eq!(Cents::from(-50).scale_basis_points(100), Cents::from(-1));
    }

    #[test]
    fn sums() {
        let values = [Cents::from(925), Cents::from(75), Cents::from(1000)];
        assert_eq!(values.iter().sum::<Cents>(), Cents::from(2000));
        let mut a = Cents::from(100);
        a -= Cents::from(30);
        a += Cents::from(5);
        assert_eq!(a, Cents::from(75));
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&Cents::from(925)).unwrap();
        assert_eq!(json, "925");
    }
}
