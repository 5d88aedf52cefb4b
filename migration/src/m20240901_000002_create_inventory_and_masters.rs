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
    StockId,
    Shape,
    Carat,
    Color,
    Clarity,
    Cut,
    Polish,
    Symmetry,
    Fluorescence,
    Lab,
    CertificateNo,
    Measurements,
    CostPriceCents,
    SalePriceCents,
    Status,
    Location,
    ImageUrl,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

/// 库存变更记录
#[derive(DeriveIden)]
enum InventoryHistory {
    Table,
    Id,
    InventoryId,
    Action,
    FromStatus,
    ToStatus,
    Reference,
    Note,
    PerformedBy,
    CreatedAt,
}

/// 客户 / 供应商档案
#[derive(DeriveIden)]
enum Masters {
    Table,
    Id,
    Code,
    Name,
    Company,
    MasterType,
    Email,
    Phone,
    Address,
    City,
    Country,
    TaxId,
    CreditLimitCents,
    Notes,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("inventory_status"))
                    .values(vec![
                        Alias::new("AVAILABLE"),
                        Alias::new("HOLD"),
                        Alias::new("MEMO"),
                        Alias::new("SOLD"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("master_type"))
                    .values(vec![Alias::new("customer"), Alias::new("vendor")])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Inventory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Inventory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Inventory::StockId).string_len(64).not_null())
                    .col(ColumnDef::new(Inventory::Shape).string_len(32).not_null())
                    .col(ColumnDef::new(Inventory::Carat).double().not_null())
                    .col(ColumnDef::new(Inventory::Color).string_len(16).not_null())
                    .col(ColumnDef::new(Inventory::Clarity).string_len(16).not_null())
                    .col(ColumnDef::new(Inventory::Cut).string_len(16).null())
                    .col(ColumnDef::new(Inventory::Polish).string_len(16).null())
                    .col(ColumnDef::new(Inventory::Symmetry).string_len(16).null())
                    .col(ColumnDef::new(Inventory::Fluorescence).string_len(32).null())
                    .col(ColumnDef::new(Inventory::Lab).string_len(32).null())
                    .col(ColumnDef::new(Inventory::CertificateNo).string_len(64).null())
                    .col(ColumnDef::new(Inventory::Measurements).string_len(64).null())
                    .col(
                        ColumnDef::new(Inventory::CostPriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Inventory::SalePriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Inventory::Status)
                            .custom(Alias::new("inventory_status"))
                            .not_null()
                            .default(Expr::cust("'AVAILABLE'::inventory_status")),
                    )
                    .col(ColumnDef::new(Inventory::Location).string_len(64).null())
                    .col(ColumnDef::new(Inventory::ImageUrl).text().null())
                    .col(ColumnDef::new(Inventory::Notes).text().null())
                    .col(ColumnDef::new(Inventory::CreatedBy).big_integer().null())
                    .col(
                        ColumnDef::new(Inventory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Inventory::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inventory_created_by")
                            .from(Inventory::Table, Inventory::CreatedBy)
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
                    .name("idx_inventory_stock_id_unique")
                    .table(Inventory::Table)
                    .col(Inventory::StockId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inventory_status")
                    .table(Inventory::Table)
                    .col(Inventory::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InventoryHistory::InventoryId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryHistory::Action)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryHistory::FromStatus)
                            .custom(Alias::new("inventory_status"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(InventoryHistory::ToStatus)
                            .custom(Alias::new("inventory_status"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(InventoryHistory::Reference)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(InventoryHistory::Note).text().null())
                    .col(
                        ColumnDef::new(InventoryHistory::PerformedBy)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(InventoryHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_inventory_history_inventory")
                            .from(InventoryHistory::Table, InventoryHistory::InventoryId)
                            .to(Inventory::Table, Inventory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_inventory_history_inventory")
                    .table(InventoryHistory::Table)
                    .col(InventoryHistory::InventoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Masters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Masters::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Masters::Code).string_len(32).not_null())
                    .col(ColumnDef::new(Masters::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Masters::Company).string_len(255).null())
                    .col(
                        ColumnDef::new(Masters::MasterType)
                            .custom(Alias::new("master_type"))
                            .not_null()
                            .default(Expr::cust("'customer'::master_type")),
                    )
                    .col(ColumnDef::new(Masters::Email).string_len(255).null())
                    .col(ColumnDef::new(Masters::Phone).string_len(32).null())
                    .col(ColumnDef::new(Masters::Address).text().null())
                    .col(ColumnDef::new(Masters::City).string_len(128).null())
                    .col(ColumnDef::new(Masters::Country).string_len(128).null())
                    .col(ColumnDef::new(Masters::TaxId).string_len(64).null())
                    .col(ColumnDef::new(Masters::CreditLimitCents).big_integer().null())
                    .col(ColumnDef::new(Masters::Notes).text().null())
                    .col(
                        ColumnDef::new(Masters::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Masters::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Masters::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_masters_code_unique")
                    .table(Masters::Table)
                    .col(Masters::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Masters::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(InventoryHistory::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Inventory::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_type(Type::drop().if_exists().name(Alias::new("master_type")).to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .if_exists()
                    .name(Alias::new("inventory_status"))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
