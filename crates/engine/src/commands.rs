//! Command structs for engine operations.
//!
//! A [`MovementCmd`] describes one real-world financial event: a deposit or
//! withdrawal on a cash register or bank, optionally mirrored onto a second
//! treasury ledger and/or a customer current account.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, TreasuryKind, balance::Direction};

/// Second treasury ledger affected by the same event, booked on the opposite
/// side of the primary movement.
///
/// `amount_minor` may differ from the primary amount (e.g. when the two
/// accounts use different currencies).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub kind: TreasuryKind,
    pub account_id: Uuid,
    pub amount_minor: i64,
}

/// Customer current account settled by the same event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCounterpart {
    pub customer_id: Uuid,
    pub amount_minor: i64,
}

/// Record a movement on a cash register or bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovementCmd {
    pub primary_kind: TreasuryKind,
    pub primary_account_id: Uuid,
    pub direction: Direction,
    pub amount_minor: i64,
    pub date: NaiveDate,
    pub description: String,
    pub counterpart: Option<Counterpart>,
    pub customer: Option<CustomerCounterpart>,
}

impl MovementCmd {
    #[must_use]
    pub fn new(
        primary_kind: TreasuryKind,
        primary_account_id: Uuid,
        direction: Direction,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            primary_kind,
            primary_account_id,
            direction,
            amount_minor,
            date,
            description: String::new(),
            counterpart: None,
            customer: None,
        }
    }

    /// Money entering `primary_account_id`.
    #[must_use]
    pub fn inflow(
        primary_kind: TreasuryKind,
        primary_account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self::new(
            primary_kind,
            primary_account_id,
            Direction::Inflow,
            amount_minor,
            date,
        )
    }

    /// Money leaving `primary_account_id`.
    #[must_use]
    pub fn outflow(
        primary_kind: TreasuryKind,
        primary_account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self::new(
            primary_kind,
            primary_account_id,
            Direction::Outflow,
            amount_minor,
            date,
        )
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn counterpart(mut self, kind: TreasuryKind, account_id: Uuid, amount_minor: i64) -> Self {
        self.counterpart = Some(Counterpart {
            kind,
            account_id,
            amount_minor,
        });
        self
    }

    #[must_use]
    pub fn customer(mut self, customer_id: Uuid, amount_minor: i64) -> Self {
        self.customer = Some(CustomerCounterpart {
            customer_id,
            amount_minor,
        });
        self
    }

    /// Checks everything that can be checked without storage.
    pub(crate) fn validate(&self) -> ResultEngine<()> {
        ensure_positive(self.amount_minor, "amount_minor")?;
        if let Some(counterpart) = &self.counterpart {
            ensure_positive(counterpart.amount_minor, "counterpart amount_minor")?;
            if counterpart.account_id == self.primary_account_id {
                return Err(EngineError::Validation(
                    "counterpart account must differ from the primary account".to_string(),
                ));
            }
        }
        if let Some(customer) = &self.customer {
            ensure_positive(customer.amount_minor, "customer amount_minor")?;
        }
        Ok(())
    }
}

fn ensure_positive(amount_minor: i64, label: &str) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::Validation(format!("{label} must be > 0")));
    }
    Ok(())
}

/// Outcome of a committed movement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub movement_id: Uuid,
    pub counterpart_movement_id: Option<Uuid>,
    pub customer_movement_id: Option<Uuid>,
    /// Human-readable confirmation.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn builder_sets_optional_parts() {
        let cash = Uuid::new_v4();
        let bank = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let cmd = MovementCmd::outflow(TreasuryKind::CashRegister, cash, 5_000, date())
            .description("Kira")
            .counterpart(TreasuryKind::Bank, bank, 5_000)
            .customer(customer, 5_000);

        assert_eq!(cmd.direction, Direction::Outflow);
        assert_eq!(cmd.description, "Kira");
        assert_eq!(cmd.counterpart.unwrap().account_id, bank);
        assert_eq!(cmd.customer.unwrap().customer_id, customer);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let cash = Uuid::new_v4();
        let zero = MovementCmd::inflow(TreasuryKind::CashRegister, cash, 0, date());
        assert_eq!(
            zero.validate(),
            Err(EngineError::Validation("amount_minor must be > 0".to_string()))
        );

        let bad_counterpart = MovementCmd::inflow(TreasuryKind::CashRegister, cash, 100, date())
            .counterpart(TreasuryKind::Bank, Uuid::new_v4(), -1);
        assert!(bad_counterpart.validate().is_err());

        let bad_customer = MovementCmd::inflow(TreasuryKind::CashRegister, cash, 100, date())
            .customer(Uuid::new_v4(), 0);
        assert!(bad_customer.validate().is_err());
    }

    #[test]
    fn counterpart_cannot_be_the_primary_account() {
        let cash = Uuid::new_v4();
        let cmd = MovementCmd::inflow(TreasuryKind::CashRegister, cash, 100, date())
            .counterpart(TreasuryKind::CashRegister, cash, 100);
        assert!(matches!(cmd.validate(), Err(EngineError::Validation(_))));
    }
}
