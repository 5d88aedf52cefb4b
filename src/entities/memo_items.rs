use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "memo_item_status")]
#[serde(rename_all = "snake_case")]
pub enum MemoItemStatus {
    #[sea_orm(string_value = "on_memo")]
    OnMemo,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "sold")]
    Sold,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "memo_items")]
#[schema(as = MemoItem)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub memo_id: i64,
    pub inventory_id: i64,
    pub price_cents: i64,
    pub status: MemoItemStatus,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
