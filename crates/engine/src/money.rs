use std::fmt;

use crate::Currency;

/// An amount of minor units tagged with its currency, used for
/// human-readable output.
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
///
/// assert_eq!(Money::new(12_34, Currency::Tl).to_string(), "12.34 TL");
/// assert_eq!(Money::new(-5, Currency::Usd).to_string(), "-0.05 USD");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    #[must_use]
    pub const fn currency(self) -> Currency {
        self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        let scale = 10u64.pow(u32::from(self.currency.minor_units()));
        let major = abs / scale;
        let fraction = abs % scale;
        let width = usize::from(self.currency.minor_units());
        write!(
            f,
            "{sign}{major}.{fraction:0width$} {}",
            self.currency.code()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_fraction() {
        assert_eq!(Money::new(0, Currency::Tl).to_string(), "0.00 TL");
        assert_eq!(Money::new(1, Currency::Tl).to_string(), "0.01 TL");
        assert_eq!(Money::new(10, Currency::Eur).to_string(), "0.10 EUR");
        assert_eq!(Money::new(10_000, Currency::Tl).to_string(), "100.00 TL");
        assert_eq!(Money::new(-1050, Currency::Usd).to_string(), "-10.50 USD");
    }
}
