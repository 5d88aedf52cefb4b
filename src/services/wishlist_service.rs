use crate::entities::{products, wishlist_items};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::CartService;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;

#[derive(Clone)]
pub struct WishlistService {
    pool: DatabaseConnection,
}

impl WishlistService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: i64) -> AppResult<Vec<WishlistEntry>> {
        let items = wishlist_items::Entity::find()
            .filter(wishlist_items::Column::UserId.eq(user_id))
            .order_by_desc(wishlist_items::Column::CreatedAt)
            .all(&self.pool)
            .await?;

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let mut products: HashMap<i64, products::Model> = products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(items
            .into_iter()
            .filter_map(|item| {
                products.remove(&item.product_id).map(|product| WishlistEntry {
                    id: item.id,
                    added_at: item.created_at,
                    product,
                })
            })
            .collect())
    }

    /// 重复添加直接返回已有记录
    pub async fn add(
        &self,
        user_id: i64,
        request: AddWishlistItemRequest,
    ) -> AppResult<wishlist_items::Model> {
        products::Entity::find_by_id(request.product_id)
            .one(&self.pool)
            .await?
            .filter(|p| p.is_published)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        if let Some(existing) = wishlist_items::Entity::find()
            .filter(wishlist_items::Column::UserId.eq(user_id))
            .filter(wishlist_items::Column::ProductId.eq(request.product_id))
            .one(&self.pool)
            .await?
        {
            return Ok(existing);
        }

        Ok(wishlist_items::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(request.product_id),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?)
    }

    pub async fn remove(&self, user_id: i64, item_id: i64) -> AppResult<()> {
        let result = wishlist_items::Entity::delete_many()
            .filter(wishlist_items::Column::Id.eq(item_id))
            .filter(wishlist_items::Column::UserId.eq(user_id))
            .exec(&self.pool)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Wishlist item not found".to_string()));
        }
        Ok(())
    }

    /// 移入购物车（数量 1）并从心愿单删除
    pub async fn move_to_cart(&self, user_id: i64, item_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;

        let item = wishlist_items::Entity::find_by_id(item_id)
            .filter(wishlist_items::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Wishlist item not found".to_string()))?;

        CartService::add_in(&txn, user_id, item.product_id, 1).await?;
        wishlist_items::Entity::delete_by_id(item.id)
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::product_service::tests::product;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let existing = wishlist_items::Model {
            id: 3,
            user_id: 1,
            product_id: 10,
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(10, 1000, 1, true)]])
            .append_query_results([vec![existing.clone()]])
            .into_connection();
        let service = WishlistService::new(db);

        let item = service
            .add(1, AddWishlistItemRequest { product_id: 10 })
            .await
            .unwrap();
        assert_eq!(item, existing);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<wishlist_items::Model>::new()])
            .into_connection();
        let service = WishlistService::new(db);
        assert!(service.list(1).await.unwrap().is_empty());
    }
}
