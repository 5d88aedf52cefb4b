use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "memo_status")]
#[serde(rename_all = "snake_case")]
pub enum MemoStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "partially_returned")]
    PartiallyReturned,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "invoiced")]
    Invoiced,
}

impl MemoStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, MemoStatus::Returned | MemoStatus::Invoiced)
    }
}

/// 寄售单（货品借给客户看货）
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "memos")]
#[schema(as = Memo)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub memo_number: String,
    pub master_id: i64,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: MemoStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
