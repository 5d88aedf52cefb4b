use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "cranberri_diamonds")]
#[schema(as = CranberriDiamond)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub external_id: String,
    pub stock_number: Option<String>,
    pub shape: Option<String>,
    pub carat: Option<f64>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub lab: Option<String>,
    pub certificate_no: Option<String>,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub is_available: bool,
    #[serde(skip_serializing)]
    #[schema(value_type = Option<Object>)]
    pub raw: Option<Json>,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
