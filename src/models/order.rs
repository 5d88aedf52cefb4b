use crate::entities::{OrderStatus, order_items, orders};
use crate::utils::PaginationParams;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[schema(example = "Jane Doe")]
    pub shipping_name: String,
    #[schema(example = "1 Market St, San Francisco, CA 94105")]
    pub shipping_address: String,
    pub shipping_phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: orders::Model,
    pub items: Vec<order_items::Model>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: OrderDetail,
    /// Stripe 未配置时为空
    pub checkout_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}
