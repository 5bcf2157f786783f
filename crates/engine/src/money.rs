use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError};

/// Signed money amount represented as an integer number of **minor units**.
///
/// Use this type for **all** monetary values in the engine (balances, budget
/// limits, goal targets, transaction amounts) to avoid floating-point drift.
///
/// The value is signed:
/// - positive = income / increase
/// - negative = expense / decrease
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
///
/// let amount = Money::new(1_234_56);
/// assert_eq!(amount.minor(), 123_456);
/// assert_eq!(amount.format(Currency::Eur), "€1,234.56");
/// ```
///
/// Parsing from user input rounds half-up past the currency's minor unit:
///
/// ```rust
/// use engine::{Currency, Money};
///
/// assert_eq!(Money::parse("10.5", Currency::Eur).unwrap().minor(), 1050);
/// assert_eq!(Money::parse("10.005", Currency::Eur).unwrap().minor(), 1001);
/// assert_eq!(Money::parse("120", Currency::Jpy).unwrap().minor(), 120);
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Parses a decimal string into minor units of `currency`.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading
    /// `+`/`-`. Fraction digits past the currency's minor unit are rounded
    /// half-up (away from zero).
    pub fn parse(s: &str, currency: Currency) -> Result<Self, EngineError> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let major_str = parts.next().ok_or_else(invalid)?;
        let frac_str = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(invalid());
        }

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = major_str.parse().map_err(|_| invalid())?;

        let digits = currency.minor_units() as usize;
        let scale = 10i64.pow(digits as u32);

        // Keep `digits` fraction digits, then round half-up on the next one.
        let mut frac: i64 = 0;
        for c in frac_str.chars().take(digits) {
            frac = frac * 10 + i64::from(c as u8 - b'0');
        }
        // Right-pad short fractions ("10.5" EUR -> 50 cents).
        for _ in frac_str.len()..digits {
            frac *= 10;
        }
        if let Some(next) = frac_str.chars().nth(digits) {
            if next as u8 - b'0' >= 5 {
                frac += 1;
            }
        }

        let total = major
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;

        let signed = if sign < 0 {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Money(signed))
    }

    /// Formats the amount as a symbol-prefixed, thousands-grouped string.
    ///
    /// The returned string only ever contains engine-generated characters;
    /// user text (account or budget names) is never routed through here.
    #[must_use]
    pub fn format(self, currency: Currency) -> String {
        let digits = currency.minor_units() as usize;
        let scale = 10u64.pow(digits as u32);
        let abs = self.0.unsigned_abs();
        let major = abs / scale;
        let frac = abs % scale;

        let mut grouped = String::new();
        let major_str = major.to_string();
        let first_group = major_str.len() % 3;
        for (i, c) in major_str.chars().enumerate() {
            if i != 0 && (i + 3 - first_group) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }

        let mut out = String::new();
        if self.0 < 0 {
            out.push('-');
        }
        out.push_str(currency.symbol());
        out.push_str(&grouped);
        if digits > 0 {
            out.push('.');
            out.push_str(&format!("{frac:0>width$}", width = digits));
        }
        out
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}
