use super::inventory::InventoryStatus;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const ACTION_CREATED: &str = "CREATED";
pub const ACTION_UPDATED: &str = "UPDATED";
pub const ACTION_STATUS_CHANGED: &str = "STATUS_CHANGED";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "inventory_history")]
#[schema(as = InventoryHistory)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub inventory_id: i64,
    pub action: String,
    pub from_status: Option<InventoryStatus>,
    pub to_status: Option<InventoryStatus>,
    pub reference: Option<String>,
    pub note: Option<String>,
    pub performed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
