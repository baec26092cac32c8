use uuid::Uuid;

use sea_orm::TransactionTrait;

use crate::{
    Currency, EngineError, LedgerAccount, LedgerKind, MovementRecord, ResultEngine, store,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Opens a new account of `kind` with zero totals.
    ///
    /// The name is trimmed and must be unique among the live accounts of the
    /// same kind.
    pub async fn new_account(
        &self,
        kind: LedgerKind,
        name: &str,
        currency: Currency,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "account")?;
        let id = with_tx!(self, |db_tx| {
            if store::name_taken(&db_tx, kind, &name).await? {
                return Err(EngineError::ExistingKey(name));
            }

            let account = LedgerAccount::new(kind, name.clone(), currency);
            store::insert_account(&db_tx, &account).await?;
            Ok::<_, EngineError>(account.id)
        })?;

        self.invalidate(&[kind.cache_key()]);
        tracing::info!(account_id = %id, kind = kind.as_str(), name = %name, "account created");
        Ok(id)
    }

    /// Soft-deletes an account. Its movements stay in place but it is no
    /// longer visible nor usable in new movements.
    pub async fn delete_account(&self, kind: LedgerKind, id: Uuid) -> ResultEngine<()> {
        if !store::soft_delete_account(&self.database, kind, id).await? {
            return Err(kind.not_found(id));
        }

        self.invalidate(&[kind.cache_key()]);
        tracing::info!(account_id = %id, kind = kind.as_str(), "account deleted");
        Ok(())
    }

    /// Return an account snapshot from DB.
    pub async fn account(&self, kind: LedgerKind, id: Uuid) -> ResultEngine<LedgerAccount> {
        store::get(&self.database, kind, id)
            .await?
            .ok_or_else(|| kind.not_found(id))
    }

    /// Live accounts of `kind`, ordered by name.
    ///
    /// Served from the read cache when possible; a miss loads the list and
    /// stores it unless a write invalidated the key in the meantime.
    pub async fn accounts(&self, kind: LedgerKind) -> ResultEngine<Vec<LedgerAccount>> {
        let key = kind.cache_key();
        if let Some(accounts) = self.cache.get(key) {
            tracing::trace!(cache_key = %key, "cache hit");
            return Ok(accounts);
        }

        let generation = self.cache.generation(key);
        let accounts = store::list_accounts(&self.database, kind).await?;
        self.cache.put(key, generation, accounts.clone());
        Ok(accounts)
    }

    /// Movements of one account, oldest first.
    pub async fn movements(
        &self,
        kind: LedgerKind,
        account_id: Uuid,
    ) -> ResultEngine<Vec<MovementRecord>> {
        if store::get(&self.database, kind, account_id).await?.is_none() {
            return Err(kind.not_found(account_id));
        }
        store::list_movements(&self.database, account_id).await
    }

    pub async fn movement(&self, id: Uuid) -> ResultEngine<MovementRecord> {
        store::movement(&self.database, id)
            .await?
            .ok_or_else(|| EngineError::MovementNotFound(id.to_string()))
    }
}
