use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ChatRequests {
    Table,
    Id,
    CustomerId,
    Subject,
    Status,
    AcceptedBy,
    ChatId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Chats {
    Table,
    Id,
    CustomerId,
    EmployeeId,
    IsOpen,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    ChatId,
    SenderId,
    Content,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Title,
    Body,
    Kind,
    Link,
    IsRead,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Title,
    Description,
    Priority,
    Status,
    DueDate,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskAssignments {
    Table,
    Id,
    TaskId,
    UserId,
    AssignedAt,
}

/// 员工绩效报表（按周期生成后落库）
#[derive(DeriveIden)]
enum PerformanceReports {
    Table,
    Id,
    EmployeeId,
    PeriodStart,
    PeriodEnd,
    InvoicesCount,
    SalesCents,
    MemosCount,
    TasksCompleted,
    Notes,
    GeneratedBy,
    CreatedAt,
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
                    .as_enum(Alias::new("chat_request_status"))
                    .values(vec![
                        Alias::new("pending"),
                        Alias::new("accepted"),
                        Alias::new("closed"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("task_priority"))
                    .values(vec![
                        Alias::new("low"),
                        Alias::new("medium"),
                        Alias::new("high"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("task_status"))
                    .values(vec![
                        Alias::new("todo"),
                        Alias::new("in_progress"),
                        Alias::new("done"),
                        Alias::new("cancelled"),
                    ])
                    .to_owned(),
            )
            .await?;

        // chats 需先于 chat_requests 创建（外键）
        manager
            .create_table(
                Table::create()
                    .table(Chats::Table)
                    .if_not_exists()
                    .col(&mut id_col(Chats::Id))
                    .col(ColumnDef::new(Chats::CustomerId).big_integer().not_null())
                    .col(ColumnDef::new(Chats::EmployeeId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Chats::IsOpen)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(&mut timestamp_now(Chats::CreatedAt))
                    .col(&mut timestamp_now(Chats::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chats_customer")
                            .from(Chats::Table, Chats::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chats_employee")
                            .from(Chats::Table, Chats::EmployeeId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChatRequests::Table)
                    .if_not_exists()
                    .col(&mut id_col(ChatRequests::Id))
                    .col(ColumnDef::new(ChatRequests::CustomerId).big_integer().not_null())
                    .col(ColumnDef::new(ChatRequests::Subject).string_len(255).null())
                    .col(
                        ColumnDef::new(ChatRequests::Status)
                            .custom(Alias::new("chat_request_status"))
                            .not_null()
                            .default(Expr::cust("'pending'::chat_request_status")),
                    )
                    .col(ColumnDef::new(ChatRequests::AcceptedBy).big_integer().null())
                    .col(ColumnDef::new(ChatRequests::ChatId).big_integer().null())
                    .col(&mut timestamp_now(ChatRequests::CreatedAt))
                    .col(&mut timestamp_now(ChatRequests::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_requests_customer")
                            .from(ChatRequests::Table, ChatRequests::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_requests_chat")
                            .from(ChatRequests::Table, ChatRequests::ChatId)
                            .to(Chats::Table, Chats::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(&mut id_col(Messages::Id))
                    .col(ColumnDef::new(Messages::ChatId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::SenderId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::Content).text().not_null())
                    .col(&mut timestamp_now(Messages::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_chat")
                            .from(Messages::Table, Messages::ChatId)
                            .to(Chats::Table, Chats::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_messages_chat")
                    .table(Messages::Table)
                    .col(Messages::ChatId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(&mut id_col(Notifications::Id))
                    .col(ColumnDef::new(Notifications::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Notifications::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Notifications::Body).text().not_null())
                    .col(ColumnDef::new(Notifications::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Notifications::Link).string_len(255).null())
                    .col(
                        ColumnDef::new(Notifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(&mut timestamp_now(Notifications::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user")
                            .from(Notifications::Table, Notifications::UserId)
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
                    .name("idx_notifications_user_read")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::IsRead)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(&mut id_col(Tasks::Id))
                    .col(ColumnDef::new(Tasks::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Tasks::Description).text().null())
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .custom(Alias::new("task_priority"))
                            .not_null()
                            .default(Expr::cust("'medium'::task_priority")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .custom(Alias::new("task_status"))
                            .not_null()
                            .default(Expr::cust("'todo'::task_status")),
                    )
                    .col(ColumnDef::new(Tasks::DueDate).date().null())
                    .col(ColumnDef::new(Tasks::CreatedBy).big_integer().null())
                    .col(&mut timestamp_now(Tasks::CreatedAt))
                    .col(&mut timestamp_now(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_created_by")
                            .from(Tasks::Table, Tasks::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskAssignments::Table)
                    .if_not_exists()
                    .col(&mut id_col(TaskAssignments::Id))
                    .col(ColumnDef::new(TaskAssignments::TaskId).big_integer().not_null())
                    .col(ColumnDef::new(TaskAssignments::UserId).big_integer().not_null())
                    .col(&mut timestamp_now(TaskAssignments::AssignedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignments_task")
                            .from(TaskAssignments::Table, TaskAssignments::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignments_user")
                            .from(TaskAssignments::Table, TaskAssignments::UserId)
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
                    .name("idx_task_assignments_task_user_unique")
                    .table(TaskAssignments::Table)
                    .col(TaskAssignments::TaskId)
                    .col(TaskAssignments::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PerformanceReports::Table)
                    .if_not_exists()
                    .col(&mut id_col(PerformanceReports::Id))
                    .col(
                        ColumnDef::new(PerformanceReports::EmployeeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PerformanceReports::PeriodStart).date().not_null())
                    .col(ColumnDef::new(PerformanceReports::PeriodEnd).date().not_null())
                    .col(
                        ColumnDef::new(PerformanceReports::InvoicesCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PerformanceReports::SalesCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PerformanceReports::MemosCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PerformanceReports::TasksCompleted)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(PerformanceReports::Notes).text().null())
                    .col(
                        ColumnDef::new(PerformanceReports::GeneratedBy)
                            .big_integer()
                            .null(),
                    )
                    .col(&mut timestamp_now(PerformanceReports::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_performance_reports_employee")
                            .from(PerformanceReports::Table, PerformanceReports::EmployeeId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(PerformanceReports::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(TaskAssignments::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChatRequests::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Chats::Table).if_exists().to_owned())
            .await?;
        for name in ["task_status", "task_priority", "chat_request_status"] {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
