use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    OrderNumber,
    UserId,
    Status,
    SubtotalCents,
    ShippingCents,
    TotalCents,
    ShippingName,
    ShippingAddress,
    ShippingPhone,
    StripeSessionId,
    StripePaymentIntentId,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    ProductName,
    Quantity,
    UnitPriceCents,
    AmountCents,
}

#[derive(DeriveIden)]
enum CartItems {
    Table,
    Id,
    UserId,
    ProductId,
    Quantity,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WishlistItems {
    Table,
    Id,
    UserId,
    ProductId,
    CreatedAt,
}

/// 门店预约
#[derive(DeriveIden)]
enum Appointments {
    Table,
    Id,
    UserId,
    Name,
    Email,
    Phone,
    PreferredAt,
    Purpose,
    Status,
    Notes,
    AssignedTo,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn timestamp_now<T: IntoIden + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::cust("NOW()"))
        .to_owned()
}

fn id_col<T: IntoIden + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("order_status"))
                    .values(vec![
                        Alias::new("pending"),
                        Alias::new("paid"),
                        Alias::new("processing"),
                        Alias::new("shipped"),
                        Alias::new("delivered"),
                        Alias::new("cancelled"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("appointment_status"))
                    .values(vec![
                        Alias::new("requested"),
                        Alias::new("confirmed"),
                        Alias::new("completed"),
                        Alias::new("cancelled"),
                    ])
                    .to_owned(),
            )
            .await?;

        // 订单
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(&mut id_col(Orders::Id))
                    .col(ColumnDef::new(Orders::OrderNumber).string_len(32).not_null())
                    .col(ColumnDef::new(Orders::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .custom(Alias::new("order_status"))
                            .not_null()
                            .default(Expr::cust("'pending'::order_status")),
                    )
                    .col(
                        ColumnDef::new(Orders::SubtotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::ShippingCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Orders::ShippingName).string_len(255).not_null())
                    .col(ColumnDef::new(Orders::ShippingAddress).text().not_null())
                    .col(ColumnDef::new(Orders::ShippingPhone).string_len(32).null())
                    .col(ColumnDef::new(Orders::StripeSessionId).string_len(255).null())
                    .col(
                        ColumnDef::new(Orders::StripePaymentIntentId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(&mut timestamp_now(Orders::CreatedAt))
                    .col(&mut timestamp_now(Orders::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_user")
                            .from(Orders::Table, Orders::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_number_unique")
                    .table(Orders::Table)
                    .col(Orders::OrderNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(&mut id_col(OrderItems::Id))
                    .col(ColumnDef::new(OrderItems::OrderId).big_integer().not_null())
                    .col(ColumnDef::new(OrderItems::ProductId).big_integer().null())
                    .col(
                        ColumnDef::new(OrderItems::ProductName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(OrderItems::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_product")
                            .from(OrderItems::Table, OrderItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // 购物车
        manager
            .create_table(
                Table::create()
                    .table(CartItems::Table)
                    .if_not_exists()
                    .col(&mut id_col(CartItems::Id))
                    .col(ColumnDef::new(CartItems::UserId).big_integer().not_null())
                    .col(ColumnDef::new(CartItems::ProductId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CartItems::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(&mut timestamp_now(CartItems::CreatedAt))
                    .col(&mut timestamp_now(CartItems::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_user")
                            .from(CartItems::Table, CartItems::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_product")
                            .from(CartItems::Table, CartItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_cart_items_user_product_unique")
                    .table(CartItems::Table)
                    .col(CartItems::UserId)
                    .col(CartItems::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 心愿单
        manager
            .create_table(
                Table::create()
                    .table(WishlistItems::Table)
                    .if_not_exists()
                    .col(&mut id_col(WishlistItems::Id))
                    .col(ColumnDef::new(WishlistItems::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(WishlistItems::ProductId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(&mut timestamp_now(WishlistItems::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wishlist_items_user")
                            .from(WishlistItems::Table, WishlistItems::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wishlist_items_product")
                            .from(WishlistItems::Table, WishlistItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_wishlist_items_user_product_unique")
                    .table(WishlistItems::Table)
                    .col(WishlistItems::UserId)
                    .col(WishlistItems::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Appointments::Table)
                    .if_not_exists()
                    .col(&mut id_col(Appointments::Id))
                    .col(ColumnDef::new(Appointments::UserId).big_integer().null())
                    .col(ColumnDef::new(Appointments::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Appointments::Email).string_len(255).not_null())
                    .col(ColumnDef::new(Appointments::Phone).string_len(32).null())
                    .col(
                        ColumnDef::new(Appointments::PreferredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Appointments::Purpose).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Appointments::Status)
                            .custom(Alias::new("appointment_status"))
                            .not_null()
                            .default(Expr::cust("'requested'::appointment_status")),
                    )
                    .col(ColumnDef::new(Appointments::Notes).text().null())
                    .col(ColumnDef::new(Appointments::AssignedTo).big_integer().null())
                    .col(&mut timestamp_now(Appointments::CreatedAt))
                    .col(&mut timestamp_now(Appointments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_user")
                            .from(Appointments::Table, Appointments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_appointments_assigned_to")
                            .from(Appointments::Table, Appointments::AssignedTo)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Appointments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WishlistItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .if_exists()
                    .name(Alias::new("appointment_status"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(Type::drop().if_exists().name(Alias::new("order_status")).to_owned())
            .await?;
        Ok(())
    }
}
