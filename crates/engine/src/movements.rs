//! Movement records.
//!
//! A [`MovementRecord`] is one line of history on exactly one ledger
//! account. Exactly one of `deposit_minor`/`withdrawal_minor` is non-zero.
//!
//! Records created for the same real-world event reference each other by id:
//! - `mirror_id` points to the record on the other ledger (the counterpart,
//!   or, for a customer record, the primary record it arose from)
//! - `customer_movement_id` points from a primary record to its customer
//!   record

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, LedgerAccount, LedgerKind, ResultEngine, TreasuryKind, balance::Direction,
    util::parse_uuid,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub account_kind: LedgerKind,
    pub date: NaiveDate,
    pub deposit_minor: i64,
    pub withdrawal_minor: i64,
    pub description: String,
    pub mirror_id: Option<Uuid>,
    pub customer_movement_id: Option<Uuid>,
    /// Only set on customer records: the ledger the event was booked from.
    pub origin: Option<TreasuryKind>,
}

impl MovementRecord {
    /// Builds a record on `account` for one side of an event.
    pub fn new(
        account: &LedgerAccount,
        direction: Direction,
        amount_minor: i64,
        date: NaiveDate,
        description: String,
    ) -> ResultEngine<Self> {
        let (deposit_minor, withdrawal_minor) = match direction {
            Direction::Inflow => (amount_minor, 0),
            Direction::Outflow => (0, amount_minor),
        };
        validate_sides(deposit_minor, withdrawal_minor)?;

        Ok(Self {
            id: Uuid::new_v4(),
            account_id: account.id,
            account_kind: account.kind,
            date,
            deposit_minor,
            withdrawal_minor,
            description,
            mirror_id: None,
            customer_movement_id: None,
            origin: None,
        })
    }

    pub fn direction(&self) -> Direction {
        if self.deposit_minor > 0 {
            Direction::Inflow
        } else {
            Direction::Outflow
        }
    }

    /// The non-zero side of the record.
    pub fn amount_minor(&self) -> i64 {
        self.deposit_minor.max(self.withdrawal_minor)
    }
}

/// Links two records of the same event on different ledgers, both ways.
pub(crate) fn link_mirrors(a: &mut MovementRecord, b: &mut MovementRecord) {
    a.mirror_id = Some(b.id);
    b.mirror_id = Some(a.id);
}

/// Links a primary record to the customer record it produced.
pub(crate) fn link_customer(primary: &mut MovementRecord, customer: &mut MovementRecord) {
    primary.customer_movement_id = Some(customer.id);
    customer.mirror_id = Some(primary.id);
}

/// Exactly one side is non-zero, and neither is negative.
pub(crate) fn validate_sides(deposit_minor: i64, withdrawal_minor: i64) -> ResultEngine<()> {
    if deposit_minor < 0 || withdrawal_minor < 0 {
        return Err(EngineError::Validation(
            "movement amounts must be >= 0".to_string(),
        ));
    }
    if (deposit_minor == 0) == (withdrawal_minor == 0) {
        return Err(EngineError::Validation(
            "exactly one of deposit/withdrawal must be non-zero".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub account_kind: String,
    pub date: Date,
    pub deposit_minor: i64,
    pub withdrawal_minor: i64,
    pub description: String,
    pub mirror_id: Option<String>,
    pub customer_movement_id: Option<String>,
    pub origin: Option<String>,
    pub deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&MovementRecord> for ActiveModel {
    fn from(record: &MovementRecord) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            account_id: ActiveValue::Set(record.account_id.to_string()),
            account_kind: ActiveValue::Set(record.account_kind.as_str().to_string()),
            date: ActiveValue::Set(record.date),
            deposit_minor: ActiveValue::Set(record.deposit_minor),
            withdrawal_minor: ActiveValue::Set(record.withdrawal_minor),
            description: ActiveValue::Set(record.description.clone()),
            mirror_id: ActiveValue::Set(record.mirror_id.map(|id| id.to_string())),
            customer_movement_id: ActiveValue::Set(
                record.customer_movement_id.map(|id| id.to_string()),
            ),
            origin: ActiveValue::Set(record.origin.map(|kind| kind.as_str().to_string())),
            deleted: ActiveValue::Set(false),
        }
    }
}

impl TryFrom<Model> for MovementRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        validate_sides(model.deposit_minor, model.withdrawal_minor)
            .map_err(|err| EngineError::InvalidData(format!("movement {}: {err}", model.id)))?;

        let origin = model
            .origin
            .as_deref()
            .map(LedgerKind::try_from)
            .transpose()?
            .map(TreasuryKind::try_from)
            .transpose()?;

        Ok(Self {
            id: parse_uuid(&model.id, "movement")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            account_kind: LedgerKind::try_from(model.account_kind.as_str())?,
            date: model.date,
            deposit_minor: model.deposit_minor,
            withdrawal_minor: model.withdrawal_minor,
            description: model.description,
            mirror_id: model
                .mirror_id
                .as_deref()
                .map(|id| parse_uuid(id, "mirror movement"))
                .transpose()?,
            customer_movement_id: model
                .customer_movement_id
                .as_deref()
                .map(|id| parse_uuid(id, "customer movement"))
                .transpose()?,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Currency;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn cash() -> LedgerAccount {
        LedgerAccount::new(LedgerKind::CashRegister, "Cash-1".to_string(), Currency::Tl)
    }

    #[test]
    fn inflow_books_a_deposit() {
        let record =
            MovementRecord::new(&cash(), Direction::Inflow, 100, date(), String::new()).unwrap();
        assert_eq!(record.deposit_minor, 100);
        assert_eq!(record.withdrawal_minor, 0);
        assert_eq!(record.direction(), Direction::Inflow);
        assert_eq!(record.amount_minor(), 100);
    }

    #[test]
    fn outflow_books_a_withdrawal() {
        let record =
            MovementRecord::new(&cash(), Direction::Outflow, 50, date(), String::new()).unwrap();
        assert_eq!(record.deposit_minor, 0);
        assert_eq!(record.withdrawal_minor, 50);
        assert_eq!(record.direction(), Direction::Outflow);
    }

    #[test]
    fn zero_or_negative_amounts_are_rejected() {
        assert!(matches!(
            MovementRecord::new(&cash(), Direction::Inflow, 0, date(), String::new()),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            MovementRecord::new(&cash(), Direction::Outflow, -5, date(), String::new()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn both_sides_set_is_rejected() {
        assert!(validate_sides(10, 10).is_err());
        assert!(validate_sides(0, 0).is_err());
        assert!(validate_sides(0, 10).is_ok());
    }

    #[test]
    fn linking_is_symmetric() {
        let bank = LedgerAccount::new(LedgerKind::Bank, "Bank-1".to_string(), Currency::Tl);
        let customer =
            LedgerAccount::new(LedgerKind::Customer, "Acme".to_string(), Currency::Tl);
        let mut primary =
            MovementRecord::new(&cash(), Direction::Outflow, 50, date(), String::new()).unwrap();
        let mut mirror =
            MovementRecord::new(&bank, Direction::Inflow, 50, date(), String::new()).unwrap();
        let mut customer_record =
            MovementRecord::new(&customer, Direction::Inflow, 50, date(), String::new()).unwrap();

        link_mirrors(&mut primary, &mut mirror);
        link_customer(&mut primary, &mut customer_record);

        assert_eq!(primary.mirror_id, Some(mirror.id));
        assert_eq!(mirror.mirror_id, Some(primary.id));
        assert_eq!(primary.customer_movement_id, Some(customer_record.id));
        assert_eq!(customer_record.mirror_id, Some(primary.id));
    }

    #[test]
    fn malformed_row_is_invalid_data() {
        let model = Model {
            id: Uuid::new_v4().to_string(),
            account_id: Uuid::new_v4().to_string(),
            account_kind: "bank".to_string(),
            date: date(),
            deposit_minor: 10,
            withdrawal_minor: 10,
            description: String::new(),
            mirror_id: None,
            customer_movement_id: None,
            origin: None,
            deleted: false,
        };
        assert!(matches!(
            MovementRecord::try_from(model),
            Err(EngineError::InvalidData(_))
        ));
    }

    #[test]
    fn customer_row_keeps_its_origin() {
        let model = Model {
            id: Uuid::new_v4().to_string(),
            account_id: Uuid::new_v4().to_string(),
            account_kind: "customer".to_string(),
            date: date(),
            deposit_minor: 5_000,
            withdrawal_minor: 0,
            description: "Tahsilat".to_string(),
            mirror_id: Some(Uuid::new_v4().to_string()),
            customer_movement_id: None,
            origin: Some("bank".to_string()),
            deleted: false,
        };
        let record = MovementRecord::try_from(model).unwrap();
        assert_eq!(record.origin, Some(TreasuryKind::Bank));
        assert!(record.mirror_id.is_some());
    }
}
