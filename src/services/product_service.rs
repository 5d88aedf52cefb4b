use crate::entities::products;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::like_pattern;
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

#[derive(Clone)]
pub struct ProductService {
    pool: DatabaseConnection,
}

fn validate_price_and_stock(price_cents: Option<i64>, stock_qty: Option<i32>) -> AppResult<()> {
    if let Some(price) = price_cents {
        require_non_negative("price_cents", price)?;
    }
    if let Some(qty) = stock_qty {
        require_non_negative("stock_qty", qty as i64)?;
    }
    Ok(())
}

impl ProductService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 商品列表；店面只看已上架商品
    pub async fn list_products(
        &self,
        query: ProductQuery,
        include_unpublished: bool,
    ) -> AppResult<PaginatedResponse<products::Model>> {
        let params = query.pagination();

        let mut select = products::Entity::find();
        if !include_unpublished {
            select = select.filter(products::Column::IsPublished.eq(true));
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(products::Column::Category.eq(category));
        }
        if let Some(metal) = query.metal.as_deref().filter(|m| !m.is_empty()) {
            select = select.filter(products::Column::Metal.eq(metal));
        }
        if let Some(min) = query.min_price_cents {
            select = select.filter(products::Column::PriceCents.gte(min));
        }
        if let Some(max) = query.max_price_cents {
            select = select.filter(products::Column::PriceCents.lte(max));
        }
        if let Some(pattern) = like_pattern(query.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(Expr::col(products::Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(products::Column::Sku).ilike(pattern)),
            );
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(products::Column::CreatedAt)
            .order_by_desc(products::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_product(
        &self,
        product_id: i64,
        include_unpublished: bool,
    ) -> AppResult<products::Model> {
        let product = products::Entity::find_by_id(product_id)
            .one(&self.pool)
            .await?
            .filter(|p| include_unpublished || p.is_published)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        Ok(product)
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> AppResult<products::Model> {
        require_non_empty("sku", &request.sku)?;
        require_non_empty("name", &request.name)?;
        require_non_empty("category", &request.category)?;
        validate_price_and_stock(Some(request.price_cents), request.stock_qty)?;

        let product = products::ActiveModel {
            sku: Set(request.sku.trim().to_string()),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            category: Set(request.category.trim().to_lowercase()),
            metal: Set(request.metal),
            price_cents: Set(request.price_cents),
            image_url: Set(request.image_url),
            stock_qty: Set(request.stock_qty.unwrap_or(0)),
            is_published: Set(request.is_published.unwrap_or(false)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Created product {} ({})", product.id, product.sku);
        Ok(product)
    }

    pub async fn update_product(
        &self,
        product_id: i64,
        request: UpdateProductRequest,
    ) -> AppResult<products::Model> {
        validate_price_and_stock(request.price_cents, request.stock_qty)?;

        let product = self.get_product(product_id, true).await?;
        let mut active = product.into_active_model();

        if let Some(name) = request.name {
            require_non_empty("name", &name)?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = request.category {
            require_non_empty("category", &category)?;
            active.category = Set(category.trim().to_lowercase());
        }
        if let Some(metal) = request.metal {
            active.metal = Set(Some(metal));
        }
        if let Some(price) = request.price_cents {
            active.price_cents = Set(price);
        }
        if let Some(image_url) = request.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(qty) = request.stock_qty {
            active.stock_qty = Set(qty);
        }
        if let Some(published) = request.is_published {
            active.is_published = Set(published);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.pool).await?)
    }

    pub async fn delete_product(&self, product_id: i64) -> AppResult<()> {
        let result = products::Entity::delete_by_id(product_id)
            .exec(&self.pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        log::info!("Deleted product {product_id}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    pub(crate) fn product(id: i64, price_cents: i64, stock_qty: i32, published: bool) -> products::Model {
        products::Model {
            id,
            sku: format!("SKU-{id}"),
            name: format!("Ring {id}"),
            description: None,
            category: "rings".to_string(),
            metal: Some("platinum".to_string()),
            price_cents,
            image_url: None,
            stock_qty,
            is_published: published,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unpublished_product_hidden_from_storefront() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(1, 1000, 1, false)]])
            .append_query_results([vec![product(1, 1000, 1, false)]])
            .into_connection();
        let service = ProductService::new(db);

        assert!(matches!(
            service.get_product(1, false).await,
            Err(AppError::NotFound(_))
        ));
        assert!(service.get_product(1, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_negative_price() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = ProductService::new(db);

        let err = service
            .create_product(CreateProductRequest {
                sku: "RING-1".into(),
                name: "Ring".into(),
                description: None,
                category: "rings".into(),
                metal: None,
                price_cents: -5,
                image_url: None,
                stock_qty: None,
                is_published: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
