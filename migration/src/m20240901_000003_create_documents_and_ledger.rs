use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Inventory {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Masters {
    Table,
    Id,
}

/// 寄售单（Memo）
#[derive(DeriveIden)]
enum Memos {
    Table,
    Id,
    MemoNumber,
    MasterId,
    IssueDate,
    DueDate,
    Status,
    TotalCents,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MemoItems {
    Table,
    Id,
    MemoId,
    InventoryId,
    PriceCents,
    Status,
    ReturnedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    InvoiceNumber,
    MasterId,
    MemoId,
    IssueDate,
    DueDate,
    Status,
    SubtotalCents,
    DiscountCents,
    TaxCents,
    TotalCents,
    PaidCents,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum InvoiceItems {
    Table,
    Id,
    InvoiceId,
    InventoryId,
    Description,
    Quantity,
    UnitPriceCents,
    AmountCents,
    CreatedAt,
}

/// 往来账（借方 = 应收增加，贷方 = 收款 / 冲销）
#[derive(DeriveIden)]
enum Ledgers {
    Table,
    Id,
    MasterId,
    EntryType,
    Reference,
    InvoiceId,
    DebitCents,
    CreditCents,
    Description,
    EntryDate,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn created_at<T: IntoIden + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::cust("NOW()"))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("invoice_status"))
                    .values(vec![
                        Alias::new("unpaid"),
                        Alias::new("partially_paid"),
                        Alias::new("paid"),
                        Alias::new("void"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("memo_status"))
                    .values(vec![
                        Alias::new("open"),
                        Alias::new("partially_returned"),
                        Alias::new("returned"),
                        Alias::new("invoiced"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("memo_item_status"))
                    .values(vec![
                        Alias::new("on_memo"),
                        Alias::new("returned"),
                        Alias::new("sold"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("ledger_entry_type"))
                    .values(vec![
                        Alias::new("invoice"),
                        Alias::new("payment"),
                        Alias::new("credit_note"),
                        Alias::new("adjustment"),
                    ])
                    .to_owned(),
            )
            .await?;

        // memos
        manager
            .create_table(
                Table::create()
                    .table(Memos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Memos::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Memos::MemoNumber).string_len(32).not_null())
                    .col(ColumnDef::new(Memos::MasterId).big_integer().not_null())
                    .col(ColumnDef::new(Memos::IssueDate).date().not_null())
                    .col(ColumnDef::new(Memos::DueDate).date().null())
                    .col(
                        ColumnDef::new(Memos::Status)
                            .custom(Alias::new("memo_status"))
                            .not_null()
                            .default(Expr::cust("'open'::memo_status")),
                    )
                    .col(
                        ColumnDef::new(Memos::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Memos::Notes).text().null())
                    .col(ColumnDef::new(Memos::CreatedBy).big_integer().null())
                    .col(&mut created_at(Memos::CreatedAt))
                    .col(&mut created_at(Memos::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memos_master")
                            .from(Memos::Table, Memos::MasterId)
                            .to(Masters::Table, Masters::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memos_created_by")
                            .from(Memos::Table, Memos::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_memos_number_unique")
                    .table(Memos::Table)
                    .col(Memos::MemoNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MemoItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MemoItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MemoItems::MemoId).big_integer().not_null())
                    .col(ColumnDef::new(MemoItems::InventoryId).big_integer().not_null())
                    .col(
                        ColumnDef::new(MemoItems::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MemoItems::Status)
                            .custom(Alias::new("memo_item_status"))
                            .not_null()
                            .default(Expr::cust("'on_memo'::memo_item_status")),
                    )
                    .col(
                        ColumnDef::new(MemoItems::ReturnedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(&mut created_at(MemoItems::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memo_items_memo")
                            .from(MemoItems::Table, MemoItems::MemoId)
                            .to(Memos::Table, Memos::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memo_items_inventory")
                            .from(MemoItems::Table, MemoItems::InventoryId)
                            .to(Inventory::Table, Inventory::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // invoices
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invoices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Invoices::InvoiceNumber)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invoices::MasterId).big_integer().not_null())
                    .col(ColumnDef::new(Invoices::MemoId).big_integer().null())
                    .col(ColumnDef::new(Invoices::IssueDate).date().not_null())
                    .col(ColumnDef::new(Invoices::DueDate).date().null())
                    .col(
                        ColumnDef::new(Invoices::Status)
                            .custom(Alias::new("invoice_status"))
                            .not_null()
                            .default(Expr::cust("'unpaid'::invoice_status")),
                    )
                    .col(
                        ColumnDef::new(Invoices::SubtotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Invoices::DiscountCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Invoices::TaxCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Invoices::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Invoices::PaidCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Invoices::Notes).text().null())
                    .col(ColumnDef::new(Invoices::CreatedBy).big_integer().null())
                    .col(&mut created_at(Invoices::CreatedAt))
                    .col(&mut created_at(Invoices::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_master")
                            .from(Invoices::Table, Invoices::MasterId)
                            .to(Masters::Table, Masters::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_memo")
                            .from(Invoices::Table, Invoices::MemoId)
                            .to(Memos::Table, Memos::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_created_by")
                            .from(Invoices::Table, Invoices::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_invoices_number_unique")
                    .table(Invoices::Table)
                    .col(Invoices::InvoiceNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_invoices_issue_date")
                    .table(Invoices::Table)
                    .col(Invoices::IssueDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InvoiceItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InvoiceItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InvoiceItems::InvoiceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InvoiceItems::InventoryId).big_integer().null())
                    .col(
                        ColumnDef::new(InvoiceItems::Description)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InvoiceItems::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(InvoiceItems::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InvoiceItems::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(&mut created_at(InvoiceItems::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoice_items_invoice")
                            .from(InvoiceItems::Table, InvoiceItems::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoice_items_inventory")
                            .from(InvoiceItems::Table, InvoiceItems::InventoryId)
                            .to(Inventory::Table, Inventory::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // ledger
        manager
            .create_table(
                Table::create()
                    .table(Ledgers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Ledgers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Ledgers::MasterId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Ledgers::EntryType)
                            .custom(Alias::new("ledger_entry_type"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Ledgers::Reference).string_len(64).null())
                    .col(ColumnDef::new(Ledgers::InvoiceId).big_integer().null())
                    .col(
                        ColumnDef::new(Ledgers::DebitCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Ledgers::CreditCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Ledgers::Description).text().null())
                    .col(ColumnDef::new(Ledgers::EntryDate).date().not_null())
                    .col(ColumnDef::new(Ledgers::CreatedBy).big_integer().null())
                    .col(&mut created_at(Ledgers::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledgers_master")
                            .from(Ledgers::Table, Ledgers::MasterId)
                            .to(Masters::Table, Masters::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledgers_invoice")
                            .from(Ledgers::Table, Ledgers::InvoiceId)
                            .to(Invoices::Table, Invoices::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ledgers_master")
                    .table(Ledgers::Table)
                    .col(Ledgers::MasterId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Ledgers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InvoiceItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MemoItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Memos::Table).if_exists().to_owned())
            .await?;
        for name in [
            "ledger_entry_type",
            "memo_item_status",
            "memo_status",
            "invoice_status",
        ] {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
