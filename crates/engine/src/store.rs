//! Account and movement stores.
//!
//! Thin functions over any sea-orm connection, so the same code runs on the
//! open `DatabaseTransaction` of a write and on the plain connection of a
//! read. Deleted rows are invisible to every function here.

use sea_orm::{DbBackend, QueryFilter, QueryOrder, QuerySelect, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    EngineError, LedgerAccount, LedgerKind, MovementRecord, ResultEngine, accounts, movements,
};

/// Loads a live account of `kind`, locking its row until the surrounding
/// transaction ends.
///
/// SQLite has no row locks (writers are serialized per database), so there
/// the version check in [`save_account`] is the only guard.
pub(crate) async fn get_for_update<C: ConnectionTrait>(
    conn: &C,
    kind: LedgerKind,
    id: Uuid,
) -> ResultEngine<Option<LedgerAccount>> {
    let mut query = accounts::Entity::find_by_id(id.to_string())
        .filter(accounts::Column::Kind.eq(kind.as_str()))
        .filter(accounts::Column::Deleted.eq(false));
    // Only reached when the workspace enables a sea-orm backend with row
    // locks (`sqlx-postgres`, `sqlx-mysql`); the shipped build is SQLite only.
    if conn.get_database_backend() != DbBackend::Sqlite {
        query = query.lock_exclusive();
    }

    query.one(conn).await?.map(LedgerAccount::try_from).transpose()
}

/// Loads a live account of `kind` without locking it.
pub(crate) async fn get<C: ConnectionTrait>(
    conn: &C,
    kind: LedgerKind,
    id: Uuid,
) -> ResultEngine<Option<LedgerAccount>> {
    accounts::Entity::find_by_id(id.to_string())
        .filter(accounts::Column::Kind.eq(kind.as_str()))
        .filter(accounts::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .map(LedgerAccount::try_from)
        .transpose()
}

/// Persists the totals of `account` if nobody saved it since it was loaded,
/// then bumps its version.
pub(crate) async fn save_account<C: ConnectionTrait>(
    conn: &C,
    account: &mut LedgerAccount,
) -> ResultEngine<()> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::DepositMinor,
            Expr::value(account.deposit_minor),
        )
        .col_expr(
            accounts::Column::WithdrawalMinor,
            Expr::value(account.withdrawal_minor),
        )
        .col_expr(accounts::Column::Version, Expr::value(account.version + 1))
        .filter(accounts::Column::Id.eq(account.id.to_string()))
        .filter(accounts::Column::Version.eq(account.version))
        .filter(accounts::Column::Deleted.eq(false))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(EngineError::ConcurrencyConflict(account.id.to_string()));
    }
    account.version += 1;
    Ok(())
}

pub(crate) async fn insert_account<C: ConnectionTrait>(
    conn: &C,
    account: &LedgerAccount,
) -> ResultEngine<()> {
    accounts::ActiveModel::from(account).insert(conn).await?;
    Ok(())
}

/// Flags an account as deleted. Returns `false` if no live account matched.
pub(crate) async fn soft_delete_account<C: ConnectionTrait>(
    conn: &C,
    kind: LedgerKind,
    id: Uuid,
) -> ResultEngine<bool> {
    let result = accounts::Entity::update_many()
        .col_expr(accounts::Column::Deleted, Expr::value(true))
        .filter(accounts::Column::Id.eq(id.to_string()))
        .filter(accounts::Column::Kind.eq(kind.as_str()))
        .filter(accounts::Column::Deleted.eq(false))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

pub(crate) async fn name_taken<C: ConnectionTrait>(
    conn: &C,
    kind: LedgerKind,
    name: &str,
) -> ResultEngine<bool> {
    let found = accounts::Entity::find()
        .filter(accounts::Column::Kind.eq(kind.as_str()))
        .filter(accounts::Column::Name.eq(name))
        .filter(accounts::Column::Deleted.eq(false))
        .one(conn)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn list_accounts<C: ConnectionTrait>(
    conn: &C,
    kind: LedgerKind,
) -> ResultEngine<Vec<LedgerAccount>> {
    accounts::Entity::find()
        .filter(accounts::Column::Kind.eq(kind.as_str()))
        .filter(accounts::Column::Deleted.eq(false))
        .order_by_asc(accounts::Column::Name)
        .all(conn)
        .await?
        .into_iter()
        .map(LedgerAccount::try_from)
        .collect()
}

pub(crate) async fn add_movement<C: ConnectionTrait>(
    conn: &C,
    record: &MovementRecord,
) -> ResultEngine<()> {
    movements::ActiveModel::from(record).insert(conn).await?;
    Ok(())
}

pub(crate) async fn list_movements<C: ConnectionTrait>(
    conn: &C,
    account_id: Uuid,
) -> ResultEngine<Vec<MovementRecord>> {
    movements::Entity::find()
        .filter(movements::Column::AccountId.eq(account_id.to_string()))
        .filter(movements::Column::Deleted.eq(false))
        .order_by_asc(movements::Column::Date)
        .order_by_asc(movements::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(MovementRecord::try_from)
        .collect()
}

pub(crate) async fn movement<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> ResultEngine<Option<MovementRecord>> {
    movements::Entity::find_by_id(id.to_string())
        .filter(movements::Column::Deleted.eq(false))
        .one(conn)
        .await?
        .map(MovementRecord::try_from)
        .transpose()
}

/// Raw rows for the audit, including those that fail to decode.
pub(crate) async fn live_account_models<C: ConnectionTrait>(
    conn: &C,
) -> ResultEngine<Vec<accounts::Model>> {
    Ok(accounts::Entity::find()
        .filter(accounts::Column::Deleted.eq(false))
        .all(conn)
        .await?)
}

pub(crate) async fn live_movement_models<C: ConnectionTrait>(
    conn: &C,
) -> ResultEngine<Vec<movements::Model>> {
    Ok(movements::Entity::find()
        .filter(movements::Column::Deleted.eq(false))
        .all(conn)
        .await?)
}

/// Overwrites stored totals without a version bump. Only used to simulate
/// corruption in tests.
#[cfg(test)]
pub(crate) async fn tamper_totals<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    deposit_minor: i64,
) -> ResultEngine<()> {
    use sea_orm::ActiveValue;

    let model = accounts::ActiveModel {
        id: ActiveValue::Set(id.to_string()),
        deposit_minor: ActiveValue::Set(deposit_minor),
        ..Default::default()
    };
    model.update(conn).await?;
    Ok(())
}
