use crate::entities::{cart_items, products};
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

#[derive(Clone)]
pub struct CartService {
    pool: DatabaseConnection,
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if !(1..=MAX_CART_QUANTITY).contains(&quantity) {
        return Err(AppError::ValidationError(format!(
            "Quantity must be between 1 and {MAX_CART_QUANTITY}"
        )));
    }
    Ok(())
}

/// 购物车行与商品在内存中拼接
pub(crate) fn build_lines(
    items: Vec<cart_items::Model>,
    products: Vec<products::Model>,
) -> Vec<CartLine> {
    let by_id: HashMap<i64, products::Model> = products.into_iter().map(|p| (p.id, p)).collect();

    items
        .into_iter()
        .filter_map(|item| {
            let product = by_id.get(&item.product_id)?;
            Some(CartLine {
                item_id: item.id,
                product_id: product.id,
                sku: product.sku.clone(),
                name: product.name.clone(),
                image_url: product.image_url.clone(),
                unit_price_cents: product.price_cents,
                quantity: item.quantity,
                line_total_cents: product.price_cents * item.quantity as i64,
            })
        })
        .collect()
}

impl CartService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn get_cart(&self, user_id: i64) -> AppResult<CartResponse> {
        let items = cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(user_id))
            .order_by_asc(cart_items::Column::Id)
            .all(&self.pool)
            .await?;

        if items.is_empty() {
            return Ok(CartResponse::from_lines(Vec::new()));
        }

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let products = products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(&self.pool)
            .await?;

        Ok(CartResponse::from_lines(build_lines(items, products)))
    }

    pub async fn add_item(&self, user_id: i64, request: AddCartItemRequest) -> AppResult<CartResponse> {
        Self::add_in(
            &self.pool,
            user_id,
            request.product_id,
            request.quantity.unwrap_or(1),
        )
        .await?;
        self.get_cart(user_id).await
    }

    /// 加入购物车，已存在时合并数量
    pub(crate) async fn add_in<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> AppResult<cart_items::Model> {
        validate_quantity(quantity)?;

        let product = products::Entity::find_by_id(product_id)
            .one(db)
            .await?
            .filter(|p| p.is_published)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let existing = cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(user_id))
            .filter(cart_items::Column::ProductId.eq(product.id))
            .one(db)
            .await?;

        match existing {
            Some(item) => {
                let merged = item.quantity + quantity;
                validate_quantity(merged)?;

                let mut active = item.into_active_model();
                active.quantity = Set(merged);
                active.updated_at = Set(Utc::now());
                Ok(active.update(db).await?)
            }
            None => Ok(cart_items::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product.id),
                quantity: Set(quantity),
                ..Default::default()
            }
            .insert(db)
            .await?),
        }
    }

    /// 数量为 0 时删除该行
    pub async fn update_item(
        &self,
        user_id: i64,
        item_id: i64,
        request: UpdateCartItemRequest,
    ) -> AppResult<CartResponse> {
        let item = self.find_own(user_id, item_id).await?;

        if request.quantity == 0 {
            cart_items::Entity::delete_by_id(item.id)
                .exec(&self.pool)
                .await?;
        } else {
            validate_quantity(request.quantity)?;
            let mut active = item.into_active_model();
            active.quantity = Set(request.quantity);
            active.updated_at = Set(Utc::now());
            active.update(&self.pool).await?;
        }

        self.get_cart(user_id).await
    }

    pub async fn remove_item(&self, user_id: i64, item_id: i64) -> AppResult<CartResponse> {
        let item = self.find_own(user_id, item_id).await?;
        cart_items::Entity::delete_by_id(item.id)
            .exec(&self.pool)
            .await?;
        self.get_cart(user_id).await
    }

    pub async fn clear(&self, user_id: i64) -> AppResult<()> {
        cart_items::Entity::delete_many()
            .filter(cart_items::Column::UserId.eq(user_id))
            .exec(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_own(&self, user_id: i64, item_id: i64) -> AppResult<cart_items::Model> {
        cart_items::Entity::find_by_id(item_id)
            .filter(cart_items::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::product_service::tests::product;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn cart_item(id: i64, product_id: i64, quantity: i32) -> cart_items::Model {
        cart_items::Model {
            id,
            user_id: 1,
            product_id,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_lines_skips_missing_products() {
        let lines = build_lines(
            vec![cart_item(1, 10, 2), cart_item(2, 11, 1)],
            vec![product(10, 2500, 5, true)],
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_total_cents, 5000);
        assert_eq!(lines[0].sku, "SKU-10");
    }

    #[tokio::test]
    async fn test_add_rejects_out_of_range_quantity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = CartService::add_in(&db, 1, 10, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = CartService::add_in(&db, 1, 10, 100).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_add_rejects_unpublished_product() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(10, 2500, 5, false)]])
            .into_connection();
        let err = CartService::add_in(&db, 1, 10, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_merge_cannot_exceed_limit() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(10, 2500, 500, true)]])
            .append_query_results([vec![cart_item(1, 10, 95)]])
            .into_connection();
        let err = CartService::add_in(&db, 1, 10, 5).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_merge_adds_quantity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(10, 2500, 500, true)]])
            .append_query_results([vec![cart_item(1, 10, 2)]])
            .append_query_results([vec![cart_item(1, 10, 5)]])
            .into_connection();
        let item = CartService::add_in(&db, 1, 10, 3).await.unwrap();
        assert_eq!(item.quantity, 5);
    }
}
