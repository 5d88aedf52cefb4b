use crate::entities::products;
use crate::utils::PaginationParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_CART_QUANTITY: i32 = 99;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub category: Option<String>,
    pub metal: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub search: Option<String>,
}

impl ProductQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    #[schema(example = "RING-SOL-001")]
    pub sku: String,
    #[schema(example = "Solitaire Engagement Ring")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "rings")]
    pub category: String,
    #[schema(example = "18k white gold")]
    pub metal: Option<String>,
    #[schema(example = 249900)]
    pub price_cents: i64,
    pub image_url: Option<String>,
    pub stock_qty: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub metal: Option<String>,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub stock_qty: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    /// 默认为 1
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// 0 表示删除
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub item_id: i64,
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub total_cents: i64,
}

impl CartResponse {
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| l.quantity as i64).sum();
        let total_cents = items.iter().map(|l| l.line_total_cents).sum();
        Self {
            items,
            item_count,
            total_cents,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddWishlistItemRequest {
    pub product_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WishlistEntry {
    pub id: i64,
    pub added_at: DateTime<Utc>,
    pub product: products::Model,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i32, price: i64) -> CartLine {
        CartLine {
            item_id: 1,
            product_id: 1,
            sku: "SKU".into(),
            name: "Ring".into(),
            image_url: None,
            unit_price_cents: price,
            quantity: qty,
            line_total_cents: price * qty as i64,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = CartResponse::from_lines(vec![line(2, 1500), line(1, 10000)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.total_cents, 13000);

        let empty = CartResponse::from_lines(vec![]);
        assert_eq!(empty.total_cents, 0);
    }
}
