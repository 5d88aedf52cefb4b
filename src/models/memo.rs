use crate::entities::{MemoStatus, memo_items, memos};
use crate::utils::PaginationParams;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemoLineRequest {
    pub inventory_id: i64,
    /// 为空时取库存售价
    pub price_cents: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateMemoRequest {
    pub master_id: i64,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<MemoLineRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReturnMemoItemsRequest {
    /// memo_items.id 列表
    pub item_ids: Vec<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ConvertMemoRequest {
    pub due_date: Option<NaiveDate>,
    pub discount_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MemoQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<MemoStatus>,
    pub master_id: Option<i64>,
}

impl MemoQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemoDetail {
    #[serde(flatten)]
    pub memo: memos::Model,
    pub items: Vec<memo_items::Model>,
}
