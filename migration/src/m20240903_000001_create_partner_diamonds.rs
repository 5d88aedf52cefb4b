use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum CranberriDiamonds {
    Table,
}

#[derive(DeriveIden)]
enum KyrahDiamonds {
    Table,
}

/// 两个供应商表结构一致，共用列定义
#[derive(DeriveIden)]
enum Diamond {
    Id,
    ExternalId,
    StockNumber,
    Shape,
    Carat,
    Color,
    Clarity,
    Cut,
    Lab,
    CertificateNo,
    PriceCents,
    ImageUrl,
    VideoUrl,
    IsAvailable,
    Raw,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DiamondSyncStatus {
    Table,
    Id,
    Source,
    State,
    LastStartedAt,
    LastFinishedAt,
    LastSuccessAt,
    ProcessedCount,
    ErrorMessage,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn diamond_table<T: IntoIden + 'static>(table: T) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(
            ColumnDef::new(Diamond::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Diamond::ExternalId).string_len(128).not_null())
        .col(ColumnDef::new(Diamond::StockNumber).string_len(128).null())
        .col(ColumnDef::new(Diamond::Shape).string_len(32).null())
        .col(ColumnDef::new(Diamond::Carat).double().null())
        .col(ColumnDef::new(Diamond::Color).string_len(16).null())
        .col(ColumnDef::new(Diamond::Clarity).string_len(16).null())
        .col(ColumnDef::new(Diamond::Cut).string_len(16).null())
        .col(ColumnDef::new(Diamond::Lab).string_len(32).null())
        .col(ColumnDef::new(Diamond::CertificateNo).string_len(64).null())
        .col(ColumnDef::new(Diamond::PriceCents).big_integer().null())
        .col(ColumnDef::new(Diamond::ImageUrl).text().null())
        .col(ColumnDef::new(Diamond::VideoUrl).text().null())
        .col(
            ColumnDef::new(Diamond::IsAvailable)
                .boolean()
                .not_null()
                .default(true),
        )
        .col(ColumnDef::new(Diamond::Raw).json_binary().null())
        .col(
            ColumnDef::new(Diamond::LastSyncedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::cust("NOW()")),
        )
        .col(
            ColumnDef::new(Diamond::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::cust("NOW()")),
        )
        .col(
            ColumnDef::new(Diamond::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::cust("NOW()")),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("sync_state"))
                    .values(vec![
                        Alias::new("idle"),
                        Alias::new("running"),
                        Alias::new("succeeded"),
                        Alias::new("failed"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(diamond_table(CranberriDiamonds::Table))
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_cranberri_diamonds_external_id_unique")
                    .table(CranberriDiamonds::Table)
                    .col(Diamond::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(diamond_table(KyrahDiamonds::Table))
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_kyrah_diamonds_external_id_unique")
                    .table(KyrahDiamonds::Table)
                    .col(Diamond::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DiamondSyncStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiamondSyncStatus::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiamondSyncStatus::Source)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiamondSyncStatus::State)
                            .custom(Alias::new("sync_state"))
                            .not_null()
                            .default(Expr::cust("'idle'::sync_state")),
                    )
                    .col(
                        ColumnDef::new(DiamondSyncStatus::LastStartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiamondSyncStatus::LastFinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiamondSyncStatus::LastSuccessAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DiamondSyncStatus::ProcessedCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DiamondSyncStatus::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(DiamondSyncStatus::UpdatedAt)
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
                    .name("idx_diamond_sync_status_source_unique")
                    .table(DiamondSyncStatus::Table)
                    .col(DiamondSyncStatus::Source)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 每个数据源一行状态记录
        let db = manager.get_connection();
        db.execute_unprepared(
            "INSERT INTO diamond_sync_status (source) VALUES ('cranberri'), ('kyrah') \
             ON CONFLICT (source) DO NOTHING",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(DiamondSyncStatus::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(KyrahDiamonds::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(CranberriDiamonds::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(Type::drop().if_exists().name(Alias::new("sync_state")).to_owned())
            .await?;
        Ok(())
    }
}
