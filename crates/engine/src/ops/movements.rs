use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    CacheKey, Currency, EngineError, LedgerAccount, LedgerKind, Money, MovementCmd, MovementReceipt,
    MovementRecord, ResultEngine, TreasuryKind, balance,
    movements::{link_customer, link_mirrors},
    store,
    util::normalize_text,
};

use sea_orm::TransactionTrait;

use super::{Engine, with_tx};

/// Every record and account one movement produces, staged in memory before
/// anything is written.
#[derive(Debug)]
struct Propagation {
    primary_kind: TreasuryKind,
    primary: MovementRecord,
    counterpart: Option<MovementRecord>,
    customer: Option<MovementRecord>,
    currency: Currency,
    accounts: Vec<LedgerAccount>,
}

impl Propagation {
    /// Builds the linked records for `cmd` and applies their deltas to the
    /// loaded accounts.
    ///
    /// The counterpart and customer records take the opposite direction of
    /// the primary one. Each record moves exactly one total on its own
    /// account.
    fn stage(
        cmd: &MovementCmd,
        mut primary_account: LedgerAccount,
        counterpart_account: Option<LedgerAccount>,
        customer_account: Option<LedgerAccount>,
    ) -> ResultEngine<Self> {
        let description = normalize_text(&cmd.description);
        let currency = primary_account.currency;

        let mut primary = MovementRecord::new(
            &primary_account,
            cmd.direction,
            cmd.amount_minor,
            cmd.date,
            description.clone(),
        )?;
        balance::apply(&mut primary_account, cmd.direction, cmd.amount_minor)?;
        let mut accounts = vec![primary_account];

        let counterpart = match (cmd.counterpart, counterpart_account) {
            (Some(part), Some(mut account)) => {
                let direction = cmd.direction.opposite();
                let mut record = MovementRecord::new(
                    &account,
                    direction,
                    part.amount_minor,
                    cmd.date,
                    description.clone(),
                )?;
                link_mirrors(&mut primary, &mut record);
                balance::apply(&mut account, direction, part.amount_minor)?;
                accounts.push(account);
                Some(record)
            }
            _ => None,
        };

        let customer = match (cmd.customer, customer_account) {
            (Some(part), Some(mut account)) => {
                let direction = cmd.direction.opposite();
                let mut record = MovementRecord::new(
                    &account,
                    direction,
                    part.amount_minor,
                    cmd.date,
                    description,
                )?;
                record.origin = Some(cmd.primary_kind);
                link_customer(&mut primary, &mut record);
                balance::apply(&mut account, direction, part.amount_minor)?;
                accounts.push(account);
                Some(record)
            }
            _ => None,
        };

        Ok(Self {
            primary_kind: cmd.primary_kind,
            primary,
            counterpart,
            customer,
            currency,
            accounts,
        })
    }

    fn records(&self) -> impl Iterator<Item = &MovementRecord> {
        std::iter::once(&self.primary)
            .chain(self.counterpart.as_ref())
            .chain(self.customer.as_ref())
    }

    /// Read caches holding an account touched by this movement.
    fn touched_keys(&self) -> Vec<CacheKey> {
        let mut keys = Vec::with_capacity(3);
        for account in &self.accounts {
            let key = account.kind.cache_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn receipt(&self) -> MovementReceipt {
        let mut message = format!(
            "{} movement recorded: {}",
            LedgerKind::from(self.primary_kind),
            Money::new(self.primary.amount_minor(), self.currency)
        );
        if let Some(counterpart) = &self.counterpart {
            message.push_str(&format!(", mirrored on {}", counterpart.account_kind));
        }
        if self.customer.is_some() {
            message.push_str(", customer account updated");
        }

        MovementReceipt {
            movement_id: self.primary.id,
            counterpart_movement_id: self.counterpart.as_ref().map(|record| record.id),
            customer_movement_id: self.customer.as_ref().map(|record| record.id),
            message,
        }
    }
}

impl Engine {
    /// Books one financial event and propagates it to the counterpart
    /// treasury ledger and the customer account, if any.
    ///
    /// All records and account totals are written in one database
    /// transaction: on any error nothing is kept. Read caches of the touched
    /// ledger kinds are invalidated after commit.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] if an amount is not positive or the
    ///   counterpart is the primary account.
    /// - [`EngineError::AccountNotFound`] if the primary or counterpart
    ///   account is missing or deleted.
    /// - [`EngineError::CustomerNotFound`] if the customer is missing or
    ///   deleted.
    /// - [`EngineError::ConcurrencyConflict`] if a touched account was saved
    ///   by someone else meanwhile, or the store was busy with another
    ///   writer. Retrying the call is safe.
    /// - [`EngineError::Validation`] if a total would overflow.
    pub async fn apply_movement(&self, cmd: MovementCmd) -> ResultEngine<MovementReceipt> {
        cmd.validate()?;

        let propagation = self
            .propagate(&cmd)
            .await
            .map_err(|err| err.into_conflict_if_busy(cmd.primary_account_id))?;
        self.invalidate(&propagation.touched_keys());

        let receipt = propagation.receipt();
        tracing::info!(
            movement_id = %receipt.movement_id,
            account_id = %cmd.primary_account_id,
            kind = cmd.primary_kind.as_str(),
            "{}",
            receipt.message
        );
        Ok(receipt)
    }

    async fn propagate(&self, cmd: &MovementCmd) -> ResultEngine<Propagation> {
        with_tx!(self, |db_tx| {
            let mut loaded = HashMap::new();
            for (kind, id) in lock_order(cmd) {
                if let Some(account) = store::get_for_update(&db_tx, kind, id).await? {
                    loaded.insert((kind, id), account);
                }
            }

            let primary_kind = LedgerKind::from(cmd.primary_kind);
            let primary = loaded
                .remove(&(primary_kind, cmd.primary_account_id))
                .ok_or_else(|| primary_kind.not_found(cmd.primary_account_id))?;
            let counterpart = match cmd.counterpart {
                Some(part) => {
                    let kind = LedgerKind::from(part.kind);
                    let account = loaded
                        .remove(&(kind, part.account_id))
                        .ok_or_else(|| kind.not_found(part.account_id))?;
                    Some(account)
                }
                None => None,
            };
            let customer = match cmd.customer {
                Some(part) => {
                    let account = loaded
                        .remove(&(LedgerKind::Customer, part.customer_id))
                        .ok_or_else(|| LedgerKind::Customer.not_found(part.customer_id))?;
                    Some(account)
                }
                None => None,
            };

            let mut propagation = Propagation::stage(cmd, primary, counterpart, customer)?;
            tracing::debug!(
                records = propagation.records().count(),
                "movement staged"
            );

            for record in propagation.records() {
                store::add_movement(&db_tx, record).await?;
            }
            for account in &mut propagation.accounts {
                store::save_account(&db_tx, account).await?;
            }

            Ok::<_, EngineError>(propagation)
        })
    }
}

/// Accounts touched by `cmd`, sorted by id. Rows are always locked in this
/// order so two movements over the same accounts cannot deadlock.
fn lock_order(cmd: &MovementCmd) -> Vec<(LedgerKind, Uuid)> {
    let mut order = vec![(LedgerKind::from(cmd.primary_kind), cmd.primary_account_id)];
    if let Some(part) = cmd.counterpart {
        order.push((LedgerKind::from(part.kind), part.account_id));
    }
    if let Some(part) = cmd.customer {
        order.push((LedgerKind::Customer, part.customer_id));
    }
    order.sort_by_key(|(kind, id)| (*id, *kind));
    order
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::Direction;

    fn account(kind: LedgerKind, name: &str) -> LedgerAccount {
        LedgerAccount::new(kind, name.to_string(), Currency::Tl)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn primary_only_moves_one_total() {
        let cash = account(LedgerKind::CashRegister, "Cash-1");
        let cmd = MovementCmd::inflow(TreasuryKind::CashRegister, cash.id, 10_000, date())
            .description("  satis  ");

        let staged = Propagation::stage(&cmd, cash, None, None).unwrap();

        assert_eq!(staged.primary.deposit_minor, 10_000);
        assert_eq!(staged.primary.withdrawal_minor, 0);
        assert_eq!(staged.primary.description, "satis");
        assert_eq!(staged.accounts[0].deposit_minor, 10_000);
        assert_eq!(staged.accounts[0].withdrawal_minor, 0);
        assert_eq!(staged.touched_keys(), vec![CacheKey::CashRegisters]);
        assert_eq!(
            staged.receipt().message,
            "cash register movement recorded: 100.00 TL"
        );
    }

    #[test]
    fn counterpart_takes_the_opposite_side() {
        let cash = account(LedgerKind::CashRegister, "Cash-1");
        let bank = account(LedgerKind::Bank, "Bank-1");
        let cmd = MovementCmd::inflow(TreasuryKind::CashRegister, cash.id, 10_000, date())
            .counterpart(TreasuryKind::Bank, bank.id, 9_500);

        let staged = Propagation::stage(&cmd, cash, Some(bank), None).unwrap();
        let mirror = staged.counterpart.as_ref().unwrap();

        assert_eq!(mirror.direction(), Direction::Outflow);
        assert_eq!(mirror.withdrawal_minor, 9_500);
        assert_eq!(staged.primary.mirror_id, Some(mirror.id));
        assert_eq!(mirror.mirror_id, Some(staged.primary.id));
        assert_eq!(staged.accounts[1].withdrawal_minor, 9_500);
        assert_eq!(
            staged.touched_keys(),
            vec![CacheKey::CashRegisters, CacheKey::Banks]
        );
    }

    #[test]
    fn customer_record_is_tagged_and_linked() {
        let cash = account(LedgerKind::CashRegister, "Cash-1");
        let customer = account(LedgerKind::Customer, "Acme");
        let cmd = MovementCmd::outflow(TreasuryKind::CashRegister, cash.id, 5_000, date())
            .customer(customer.id, 5_000);

        let staged = Propagation::stage(&cmd, cash, None, Some(customer)).unwrap();
        let record = staged.customer.as_ref().unwrap();

        assert_eq!(record.origin, Some(TreasuryKind::CashRegister));
        assert_eq!(record.deposit_minor, 5_000);
        assert_eq!(record.mirror_id, Some(staged.primary.id));
        assert_eq!(staged.primary.customer_movement_id, Some(record.id));
        assert_eq!(staged.primary.mirror_id, None);

        let customer = &staged.accounts[1];
        assert_eq!(customer.deposit_minor, 5_000);
        assert_eq!(customer.withdrawal_minor, 0);
        assert!(staged.receipt().customer_movement_id.is_some());
    }

    #[test]
    fn overflow_fails_staging() {
        let mut cash = account(LedgerKind::CashRegister, "Cash-1");
        cash.deposit_minor = i64::MAX;
        let cmd = MovementCmd::inflow(TreasuryKind::CashRegister, cash.id, 1, date());

        assert!(matches!(
            Propagation::stage(&cmd, cash, None, None),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn opposite_transfers_lock_in_the_same_order() {
        let cash = account(LedgerKind::CashRegister, "Cash-1");
        let bank = account(LedgerKind::Bank, "Bank-1");
        let customer = account(LedgerKind::Customer, "Acme");

        let there = MovementCmd::outflow(TreasuryKind::CashRegister, cash.id, 100, date())
            .counterpart(TreasuryKind::Bank, bank.id, 100)
            .customer(customer.id, 100);
        let back = MovementCmd::outflow(TreasuryKind::Bank, bank.id, 100, date())
            .counterpart(TreasuryKind::CashRegister, cash.id, 100)
            .customer(customer.id, 100);

        let order = lock_order(&there);
        assert_eq!(order, lock_order(&back));
        assert_eq!(order.len(), 3);
        assert!(order.windows(2).all(|pair| pair[0].1 < pair[1].1));
    }

    #[test]
    fn same_kind_transfer_touches_one_key() {
        let first = account(LedgerKind::CashRegister, "Cash-1");
        let second = account(LedgerKind::CashRegister, "Cash-2");
        let cmd = MovementCmd::outflow(TreasuryKind::CashRegister, first.id, 100, date()).counterpart(
            TreasuryKind::CashRegister,
            second.id,
            100,
        );

        let staged = Propagation::stage(&cmd, first, Some(second), None).unwrap();
        assert_eq!(staged.records().count(), 2);
        assert_eq!(staged.touched_keys(), vec![CacheKey::CashRegisters]);
    }
}
