use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Orders::Table)
                    .col(pk_id_col(manager, Orders::Id))
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("created")),
                    )
                    .col(ColumnDef::new(Orders::CustomerId).string().not_null())
                    .col(ColumnDef::new(Orders::ItemId).string().not_null())
                    .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                    .col(timestamp_col(Orders::CreatedAt))
                    .col(timestamp_col(Orders::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(LedgerEntries::Table)
                    .col(pk_id_col(manager, LedgerEntries::Id))
                    .col(ColumnDef::new(LedgerEntries::Uuid).uuid().not_null())
                    .col(ColumnDef::new(LedgerEntries::OrderId).integer().not_null())
                    .col(timestamp_col(LedgerEntries::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ledger_entries_uuid")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // One audit entry per order, both directions.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ledger_entries_order_id")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::OrderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(IdempotencyRecords::Table)
                    .col(pk_id_col(manager, IdempotencyRecords::Id))
                    .col(
                        ColumnDef::new(IdempotencyRecords::Key)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IdempotencyRecords::Fingerprint)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IdempotencyRecords::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("in_process")),
                    )
                    .col(ColumnDef::new(IdempotencyRecords::ResponseBody).text())
                    .col(ColumnDef::new(IdempotencyRecords::ResponseCode).integer())
                    .col(timestamp_col(IdempotencyRecords::CreatedAt))
                    .col(timestamp_col(IdempotencyRecords::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // The key is the unit of mutual exclusion; concurrent first attempts
        // race on this index and exactly one insert wins.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_idempotency_records_key")
                    .table(IdempotencyRecords::Table)
                    .col(IdempotencyRecords::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IdempotencyRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Orders {
    Table,
    Id,
    Status,
    CustomerId,
    ItemId,
    Quantity,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    Uuid,
    OrderId,
    CreatedAt,
}

#[derive(Iden)]
enum IdempotencyRecords {
    Table,
    Id,
    Key,
    Fingerprint,
    Status,
    ResponseBody,
    ResponseCode,
    CreatedAt,
    UpdatedAt,
}
