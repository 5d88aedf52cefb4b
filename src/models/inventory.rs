use crate::entities::{InventoryStatus, inventory, inventory_history};
use crate::utils::PaginationParams;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct InventoryQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<InventoryStatus>,
    pub shape: Option<String>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub min_carat: Option<f64>,
    pub max_carat: Option<f64>,
    /// stock_id 或证书号
    pub search: Option<String>,
}

impl InventoryQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateInventoryRequest {
    #[schema(example = "D-10234")]
    pub stock_id: String,
    #[schema(example = "Round")]
    pub shape: String,
    #[schema(example = 1.01)]
    pub carat: f64,
    #[schema(example = "G")]
    pub color: String,
    #[schema(example = "VS1")]
    pub clarity: String,
    pub cut: Option<String>,
    pub polish: Option<String>,
    pub symmetry: Option<String>,
    pub fluorescence: Option<String>,
    pub lab: Option<String>,
    pub certificate_no: Option<String>,
    pub measurements: Option<String>,
    pub cost_price_cents: i64,
    pub sale_price_cents: i64,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateInventoryRequest {
    pub shape: Option<String>,
    pub carat: Option<f64>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub polish: Option<String>,
    pub symmetry: Option<String>,
    pub fluorescence: Option<String>,
    pub lab: Option<String>,
    pub certificate_no: Option<String>,
    pub measurements: Option<String>,
    pub cost_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChangeInventoryStatusRequest {
    pub status: InventoryStatus,
    pub reference: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryDetail {
    #[serde(flatten)]
    pub item: inventory::Model,
    pub history: Vec<inventory_history::Model>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct InventorySummary {
    pub total: i64,
    pub available: i64,
    pub hold: i64,
    pub memo: i64,
    pub sold: i64,
    /// 未售出货品按售价合计
    pub unsold_value_cents: i64,
}
