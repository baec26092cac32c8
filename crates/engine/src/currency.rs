use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Currency code of a ledger account.
///
/// ## Minor units
///
/// The engine stores monetary values as an `i64` number of **minor units**
/// (see [`Money`](crate::Money)). `minor_units()` returns how many decimal
/// digits are used when converting between:
/// - major units (human input/output, e.g. `10.50 TL`)
/// - minor units (stored integers, e.g. `1050`)
///
/// Accounts on different currencies can take part in the same movement
/// (e.g. a TL cash register paying into a USD bank account); the engine does
/// not convert or compare amounts across currencies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Tl,
    Usd,
    Eur,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Tl => "TL",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Number of fraction digits used when formatting amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Tl | Currency::Usd | Currency::Eur => 2,
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
            "TL" | "TRY" => Ok(Currency::Tl),
            "USD" => Ok(Currency::Usd),
            "EUR" | "EURO" => Ok(Currency::Eur),
            other => Err(EngineError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}
