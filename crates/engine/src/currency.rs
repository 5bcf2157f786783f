use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO-like currency code used by accounts and money values.
///
/// ## Minor units
///
/// The engine stores monetary values as an `i64` number of **minor units**
/// (see `Money`). `minor_units()` returns how many decimal digits are used
/// when converting between:
/// - major units (human input/output, e.g. `10.50 EUR`)
/// - minor units (stored integers, e.g. `1050`)
///
/// JPY has no minor unit, so `1050 JPY` is stored as `1050`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Chf,
    Jpy,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Chf => "CHF",
            Currency::Jpy => "JPY",
        }
    }

    /// Display symbol prefixed to formatted amounts.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Currency::Eur => "€",
            Currency::Usd => "$",
            Currency::Gbp => "£",
            Currency::Chf => "CHF ",
            Currency::Jpy => "¥",
        }
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    ///
    /// Example: EUR uses 2 fraction digits (cents), JPY uses 0.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "CHF" => Ok(Currency::Chf),
            "JPY" => Ok(Currency::Jpy),
            other => Err(EngineError::CurrencyMismatch(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}
