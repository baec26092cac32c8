use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Ledger accounts (cash registers, banks, customers)
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(LedgerAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerAccounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerAccounts::Kind).string().not_null())
                    .col(ColumnDef::new(LedgerAccounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(LedgerAccounts::Currency)
                            .string()
                            .not_null()
                            .default("TL"),
                    )
                    .col(
                        ColumnDef::new(LedgerAccounts::DepositMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LedgerAccounts::WithdrawalMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LedgerAccounts::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LedgerAccounts::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // Names are unique among live accounts only, enforced by the engine.
        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_accounts-kind-name")
                    .table(LedgerAccounts::Table)
                    .col(LedgerAccounts::Kind)
                    .col(LedgerAccounts::Name)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Movements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Movements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Movements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Movements::AccountId).string().not_null())
                    .col(ColumnDef::new(Movements::AccountKind).string().not_null())
                    .col(ColumnDef::new(Movements::Date).date().not_null())
                    .col(
                        ColumnDef::new(Movements::DepositMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Movements::WithdrawalMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Movements::Description)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Movements::MirrorId).string())
                    .col(ColumnDef::new(Movements::CustomerMovementId).string())
                    .col(ColumnDef::new(Movements::Origin).string())
                    .col(
                        ColumnDef::new(Movements::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-movements-account_id")
                            .from(Movements::Table, Movements::AccountId)
                            .to(LedgerAccounts::Table, LedgerAccounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-movements-account_id-date")
                    .table(Movements::Table)
                    .col(Movements::AccountId)
                    .col(Movements::Date)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Movements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerAccounts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum LedgerAccounts {
    Table,
    Id,
    Kind,
    Name,
    Currency,
    DepositMinor,
    WithdrawalMinor,
    Version,
    Deleted,
}

#[derive(Iden)]
pub enum Movements {
    Table,
    Id,
    AccountId,
    AccountKind,
    Date,
    DepositMinor,
    WithdrawalMinor,
    Description,
    MirrorId,
    CustomerMovementId,
    Origin,
    Deleted,
}
