use crate::entities::MasterType;
use crate::utils::PaginationParams;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MasterQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub master_type: Option<MasterType>,
    /// 编号、名称、公司名模糊匹配
    pub search: Option<String>,
    pub include_inactive: Option<bool>,
}

impl MasterQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateMasterRequest {
    /// 为空时自动生成 `M00001` 格式
    pub code: Option<String>,
    pub name: String,
    pub company: Option<String>,
    pub master_type: MasterType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateMasterRequest {
    pub name: Option<String>,
    pub company: Option<String>,
    pub master_type: Option<MasterType>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub credit_limit_cents: Option<i64>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}
