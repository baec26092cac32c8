//! Running totals of ledger accounts.
//!
//! Every change to an account's totals goes through [`apply`]. Amounts are
//! validated by the caller (they must be > 0); the only failure left is a
//! total that would no longer fit in an `i64`.

use serde::{Deserialize, Serialize};

use crate::{EngineError, LedgerAccount, ResultEngine};

/// Side of a movement, seen from the account it is booked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Money enters the account (deposit).
    Inflow,
    /// Money leaves the account (withdrawal).
    Outflow,
}

impl Direction {
    /// The side the other party of the same event is booked on.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Inflow => Self::Outflow,
            Self::Outflow => Self::Inflow,
        }
    }
}

/// Adds `amount_minor` to the deposit total for an inflow, to the withdrawal
/// total for an outflow.
///
/// On overflow the account is left untouched and a
/// [`EngineError::Validation`] is returned.
pub fn apply(
    account: &mut LedgerAccount,
    direction: Direction,
    amount_minor: i64,
) -> ResultEngine<()> {
    let id = account.id;
    let total = match direction {
        Direction::Inflow => &mut account.deposit_minor,
        Direction::Outflow => &mut account.withdrawal_minor,
    };
    *total = total.checked_add(amount_minor).ok_or_else(|| {
        EngineError::Validation(format!(
            "{} total of account {} would overflow",
            match direction {
                Direction::Inflow => "deposit",
                Direction::Outflow => "withdrawal",
            },
            id
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Currency, LedgerKind};

    fn account() -> LedgerAccount {
        LedgerAccount::new(LedgerKind::CashRegister, "Cash-1".to_string(), Currency::Tl)
    }

    #[test]
    fn inflow_only_touches_deposits() {
        let mut account = account();
        apply(&mut account, Direction::Inflow, 100).unwrap();
        assert_eq!(account.deposit_minor, 100);
        assert_eq!(account.withdrawal_minor, 0);
        assert_eq!(account.balance(), 100);
    }

    #[test]
    fn outflow_only_touches_withdrawals() {
        let mut account = account();
        apply(&mut account, Direction::Inflow, 100).unwrap();
        apply(&mut account, Direction::Outflow, 30).unwrap();
        assert_eq!(account.deposit_minor, 100);
        assert_eq!(account.withdrawal_minor, 30);
        assert_eq!(account.balance(), 70);
    }

    #[test]
    fn overflowing_total_is_rejected_untouched() {
        let mut account = account();
        apply(&mut account, Direction::Inflow, i64::MAX).unwrap();

        assert!(matches!(
            apply(&mut account, Direction::Inflow, 1),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(account.deposit_minor, i64::MAX);

        apply(&mut account, Direction::Outflow, i64::MAX).unwrap();
        assert_eq!(account.balance(), 0);
    }

    #[test]
    fn opposite_flips_direction() {
        assert_eq!(Direction::Inflow.opposite(), Direction::Outflow);
        assert_eq!(Direction::Outflow.opposite().opposite(), Direction::Outflow);
    }
}
