//! Ledger accounts.
//!
//! A [`LedgerAccount`] is a cash register, a bank account or a customer
//! current account. It keeps two running totals, the cumulative inbound
//! (`deposit_minor`) and outbound (`withdrawal_minor`) amounts, which only
//! grow as movements are applied (see [`balance`](crate::balance)).
//!
//! All three kinds share the `ledger_accounts` table, discriminated by the
//! `kind` column.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine, cache::CacheKey, util::parse_uuid};

/// The kind of ledger an account belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    CashRegister,
    Bank,
    Customer,
}

impl LedgerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CashRegister => "cash_register",
            Self::Bank => "bank",
            Self::Customer => "customer",
        }
    }

    /// Read cache holding the account list of this kind.
    pub fn cache_key(self) -> CacheKey {
        match self {
            Self::CashRegister => CacheKey::CashRegisters,
            Self::Bank => CacheKey::Banks,
            Self::Customer => CacheKey::Customers,
        }
    }

    /// Error returned when an account of this kind cannot be found.
    pub(crate) fn not_found(self, id: Uuid) -> EngineError {
        match self {
            Self::Customer => EngineError::CustomerNotFound(id.to_string()),
            Self::CashRegister | Self::Bank => EngineError::AccountNotFound(id.to_string()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::CashRegister => "cash register",
            Self::Bank => "bank",
            Self::Customer => "customer",
        }
    }
}

impl core::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<&str> for LedgerKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash_register" => Ok(Self::CashRegister),
            "bank" => Ok(Self::Bank),
            "customer" => Ok(Self::Customer),
            other => Err(EngineError::InvalidData(format!(
                "invalid ledger kind: {other}"
            ))),
        }
    }
}

/// Ledgers a movement can originate from, or be mirrored onto.
///
/// Customer accounts are never the primary side of a movement: they are
/// touched through the separate customer counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasuryKind {
    CashRegister,
    Bank,
}

impl From<TreasuryKind> for LedgerKind {
    fn from(value: TreasuryKind) -> Self {
        match value {
            TreasuryKind::CashRegister => LedgerKind::CashRegister,
            TreasuryKind::Bank => LedgerKind::Bank,
        }
    }
}

impl TryFrom<LedgerKind> for TreasuryKind {
    type Error = EngineError;

    fn try_from(value: LedgerKind) -> Result<Self, Self::Error> {
        match value {
            LedgerKind::CashRegister => Ok(Self::CashRegister),
            LedgerKind::Bank => Ok(Self::Bank),
            LedgerKind::Customer => Err(EngineError::InvalidData(
                "customer is not a treasury ledger".to_string(),
            )),
        }
    }
}

impl TreasuryKind {
    pub fn as_str(self) -> &'static str {
        LedgerKind::from(self).as_str()
    }
}

/// A cash register, bank account or customer current account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub id: Uuid,
    pub kind: LedgerKind,
    pub name: String,
    pub currency: Currency,
    /// Cumulative inbound amount, in minor units.
    pub deposit_minor: i64,
    /// Cumulative outbound amount, in minor units.
    pub withdrawal_minor: i64,
    /// Optimistic-concurrency counter, bumped on every save.
    pub version: i64,
}

impl LedgerAccount {
    pub fn new(kind: LedgerKind, name: String, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name,
            currency,
            deposit_minor: 0,
            withdrawal_minor: 0,
            version: 0,
        }
    }

    /// Current balance: deposits minus withdrawals.
    pub fn balance(&self) -> i64 {
        self.deposit_minor - self.withdrawal_minor
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub name: String,
    pub currency: String,
    pub deposit_minor: i64,
    pub withdrawal_minor: i64,
    pub version: i64,
    pub deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movements::Entity")]
    Movements,
}

impl Related<super::movements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerAccount> for ActiveModel {
    fn from(value: &LedgerAccount) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            name: ActiveValue::Set(value.name.clone()),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            deposit_minor: ActiveValue::Set(value.deposit_minor),
            withdrawal_minor: ActiveValue::Set(value.withdrawal_minor),
            version: ActiveValue::Set(value.version),
            deleted: ActiveValue::Set(false),
        }
    }
}

impl TryFrom<Model> for LedgerAccount {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            kind: LedgerKind::try_from(model.kind.as_str())?,
            name: model.name,
            currency: Currency::try_from(model.currency.as_str())
                .map_err(|_| EngineError::InvalidData(format!("invalid currency: {}", model.currency)))?,
            deposit_minor: model.deposit_minor,
            withdrawal_minor: model.withdrawal_minor,
            version: model.version,
        })
    }
}
