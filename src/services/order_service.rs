use crate::entities::{OrderStatus, cart_items, order_items, orders, products};
use crate::error::{AppError, AppResult};
use crate::external::StripeService;
use crate::models::*;
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

#[derive(Clone)]
pub struct OrderService {
    pool: DatabaseConnection,
    stripe_service: StripeService,
}

impl OrderService {
    pub fn new(pool: DatabaseConnection, stripe_service: StripeService) -> Self {
        Self {
            pool,
            stripe_service,
        }
    }

    /// 购物车结算：扣减库存、生成订单、清空购物车，然后创建 Stripe 支付会话
    pub async fn checkout(&self, user_id: i64, request: CheckoutRequest) -> AppResult<CheckoutResponse> {
        require_non_empty("shipping_name", &request.shipping_name)?;
        require_non_empty("shipping_address", &request.shipping_address)?;

        let txn = self.pool.begin().await?;

        let cart = cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(user_id))
            .order_by_asc(cart_items::Column::Id)
            .all(&txn)
            .await?;
        if cart.is_empty() {
            return Err(AppError::ValidationError("Cart is empty".to_string()));
        }

        let product_ids: Vec<i64> = cart.iter().map(|c| c.product_id).collect();
        let products: HashMap<i64, products::Model> = products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(cart.len());
        for item in &cart {
            let product = products
                .get(&item.product_id)
                .filter(|p| p.is_published)
                .ok_or_else(|| {
                    AppError::ValidationError(format!(
                        "Product {} is no longer available",
                        item.product_id
                    ))
                })?;

            // 条件扣减，库存不足时影响行数为 0
            let result = products::Entity::update_many()
                .col_expr(
                    products::Column::StockQty,
                    Expr::col(products::Column::StockQty).sub(item.quantity),
                )
                .col_expr(products::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(products::Column::Id.eq(product.id))
                .filter(products::Column::StockQty.gte(item.quantity))
                .exec(&txn)
                .await?;
            if result.rows_affected != 1 {
                return Err(AppError::Conflict(format!(
                    "Insufficient stock for {}",
                    product.name
                )));
            }

            let amount_cents = line_amount_cents(product.price_cents, item.quantity)?;
            lines.push((product, item.quantity, amount_cents));
        }

        let subtotal_cents = sum_cents(lines.iter().map(|(_, _, amount)| *amount))?;
        let shipping_cents = 0;

        let order = orders::ActiveModel {
            order_number: Set(generate_order_number(Utc::now().date_naive())),
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            subtotal_cents: Set(subtotal_cents),
            shipping_cents: Set(shipping_cents),
            total_cents: Set(subtotal_cents + shipping_cents),
            shipping_name: Set(request.shipping_name.trim().to_string()),
            shipping_address: Set(request.shipping_address.trim().to_string()),
            shipping_phone: Set(request.shipping_phone),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (product, quantity, amount_cents) in lines {
            let item = order_items::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(Some(product.id)),
                product_name: Set(product.name.clone()),
                quantity: Set(quantity),
                unit_price_cents: Set(product.price_cents),
                amount_cents: Set(amount_cents),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        cart_items::Entity::delete_many()
            .filter(cart_items::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        log::info!(
            "Order {} created for user {user_id}, total {} cents",
            order.order_number,
            order.total_cents
        );

        if !self.stripe_service.is_configured() {
            return Ok(CheckoutResponse {
                order: OrderDetail { order, items },
                checkout_url: None,
            });
        }

        // 订单已落库，支付会话失败时可通过 /orders/{id}/pay 重试
        match self.start_payment(order.clone(), &items).await {
            Ok((order, checkout_url)) => Ok(CheckoutResponse {
                order: OrderDetail { order, items },
                checkout_url,
            }),
            Err(e) => {
                log::error!("Failed to create checkout session for order {}: {e}", order.id);
                Ok(CheckoutResponse {
                    order: OrderDetail { order, items },
                    checkout_url: None,
                })
            }
        }
    }

    /// 为待支付订单重新创建支付会话
    pub async fn pay(&self, user_id: i64, order_id: i64) -> AppResult<CheckoutResponse> {
        let order = self.find_own(user_id, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order is {}, payment is only possible for pending orders",
                order.status
            )));
        }

        let items = Self::items_of(&self.pool, order.id).await?;
        let (order, checkout_url) = self.start_payment(order, &items).await?;

        Ok(CheckoutResponse {
            order: OrderDetail { order, items },
            checkout_url,
        })
    }

    async fn start_payment(
        &self,
        order: orders::Model,
        items: &[order_items::Model],
    ) -> AppResult<(orders::Model, Option<String>)> {
        let session = self
            .stripe_service
            .create_checkout_session(&order, items)
            .await?;

        let mut active = order.into_active_model();
        active.stripe_session_id = Set(Some(session.id));
        active.updated_at = Set(Utc::now());
        let order = active.update(&self.pool).await?;

        Ok((order, session.url))
    }

    /// Stripe webhook 回调；非 pending 订单直接返回，重复通知不会重复处理
    pub async fn mark_paid(
        &self,
        order_id: i64,
        session_id: Option<String>,
        payment_intent_id: Option<String>,
    ) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;
        // 与取消互斥，状态在锁内判断
        let order = Self::lock_in(&txn, order_id).await?;

        if order.status != OrderStatus::Pending {
            log::info!(
                "Order {} already {}, ignoring payment notification",
                order.id,
                order.status
            );
            return Ok(order);
        }

        let mut active = order.into_active_model();
        active.status = Set(OrderStatus::Paid);
        active.paid_at = Set(Some(Utc::now()));
        if session_id.is_some() {
            active.stripe_session_id = Set(session_id);
        }
        active.stripe_payment_intent_id = Set(payment_intent_id);
        active.updated_at = Set(Utc::now());

        let order = active.update(&txn).await?;
        txn.commit().await?;
        log::info!("Order {} marked as paid", order.order_number);
        Ok(order)
    }

    pub async fn list_own(
        &self,
        user_id: i64,
        query: OrderQuery,
    ) -> AppResult<PaginatedResponse<orders::Model>> {
        self.list(Some(user_id), query).await
    }

    pub async fn list_all(&self, query: OrderQuery) -> AppResult<PaginatedResponse<orders::Model>> {
        self.list(None, query).await
    }

    async fn list(
        &self,
        user_id: Option<i64>,
        query: OrderQuery,
    ) -> AppResult<PaginatedResponse<orders::Model>> {
        let params = query.pagination();

        let mut select = orders::Entity::find();
        if let Some(user_id) = user_id {
            select = select.filter(orders::Column::UserId.eq(user_id));
        }
        if let Some(status) = query.status {
            select = select.filter(orders::Column::Status.eq(status));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_own(&self, user_id: i64, order_id: i64) -> AppResult<OrderDetail> {
        let order = self.find_own(user_id, order_id).await?;
        let items = Self::items_of(&self.pool, order.id).await?;
        Ok(OrderDetail { order, items })
    }

    pub async fn get(&self, order_id: i64) -> AppResult<OrderDetail> {
        let order = self.find(order_id).await?;
        let items = Self::items_of(&self.pool, order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// 顾客只能取消待支付订单
    pub async fn cancel_own(&self, user_id: i64, order_id: i64) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;
        let order = Self::lock_in(&txn, order_id).await?;
        if order.user_id != user_id {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(
                "Only pending orders can be cancelled".to_string(),
            ));
        }

        let order = Self::transition_in(&txn, order, OrderStatus::Cancelled).await?;
        txn.commit().await?;
        Ok(order)
    }

    pub async fn update_status(
        &self,
        order_id: i64,
        request: UpdateOrderStatusRequest,
    ) -> AppResult<orders::Model> {
        let txn = self.pool.begin().await?;
        let order = Self::lock_in(&txn, order_id).await?;
        if order.status == request.status {
            return Ok(order);
        }
        if !order.status.can_transition_to(request.status) {
            return Err(AppError::Conflict(format!(
                "Cannot change order status from {} to {}",
                order.status, request.status
            )));
        }

        let order = Self::transition_in(&txn, order, request.status).await?;
        txn.commit().await?;
        Ok(order)
    }

    /// 调用方须已持有订单行锁
    async fn transition_in<C: ConnectionTrait>(
        db: &C,
        order: orders::Model,
        to: OrderStatus,
    ) -> AppResult<orders::Model> {
        if to == OrderStatus::Cancelled {
            let items = Self::items_of(db, order.id).await?;
            Self::restore_stock(db, &items).await?;
        }

        let from = order.status;
        let mut active = order.into_active_model();
        active.status = Set(to);
        if to == OrderStatus::Paid {
            active.paid_at = Set(Some(Utc::now()));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(db).await?;

        log::info!("Order {} status {from} -> {to}", order.order_number);
        Ok(order)
    }

    async fn restore_stock<C: ConnectionTrait>(db: &C, items: &[order_items::Model]) -> AppResult<()> {
        for item in items {
            // 商品已删除的行无需回补
            let Some(product_id) = item.product_id else {
                continue;
            };
            products::Entity::update_many()
                .col_expr(
                    products::Column::StockQty,
                    Expr::col(products::Column::StockQty).add(item.quantity),
                )
                .col_expr(products::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(products::Column::Id.eq(product_id))
                .exec(db)
                .await?;
        }
        Ok(())
    }

    async fn items_of<C: ConnectionTrait>(db: &C, order_id: i64) -> AppResult<Vec<order_items::Model>> {
        Ok(order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .order_by_asc(order_items::Column::Id)
            .all(db)
            .await?)
    }

    /// SELECT ... FOR UPDATE
    async fn lock_in<C: ConnectionTrait>(db: &C, order_id: i64) -> AppResult<orders::Model> {
        orders::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }

    async fn find(&self, order_id: i64) -> AppResult<orders::Model> {
        orders::Entity::find_by_id(order_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }

    async fn find_own(&self, user_id: i64, order_id: i64) -> AppResult<orders::Model> {
        orders::Entity::find_by_id(order_id)
            .filter(orders::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use crate::services::product_service::tests::product;
    use crate::services::test_support::{assert_in_order, statement_log};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn stripe() -> StripeService {
        StripeService::new(StripeConfig::default())
    }

    fn order(id: i64, status: OrderStatus) -> orders::Model {
        orders::Model {
            id,
            order_number: "ORD-20240901-ABC123".to_string(),
            user_id: 1,
            status,
            subtotal_cents: 5000,
            shipping_cents: 0,
            total_cents: 5000,
            shipping_name: "Jane".to_string(),
            shipping_address: "1 Market St".to_string(),
            shipping_phone: None,
            stripe_session_id: None,
            stripe_payment_intent_id: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cart_item(product_id: i64, quantity: i32) -> cart_items::Model {
        cart_items::Model {
            id: product_id,
            user_id: 1,
            product_id,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_name: "Jane".to_string(),
            shipping_address: "1 Market St".to_string(),
            shipping_phone: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<cart_items::Model>::new()])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let err = service.checkout(1, checkout_request()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_checkout_insufficient_stock() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![cart_item(10, 3)]])
            .append_query_results([vec![product(10, 2500, 1, true)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let err = service.checkout(1, checkout_request()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_checkout_without_stripe_returns_no_url() {
        let item = order_items::Model {
            id: 1,
            order_id: 7,
            product_id: Some(10),
            product_name: "Ring 10".to_string(),
            quantity: 2,
            unit_price_cents: 2500,
            amount_cents: 5000,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![cart_item(10, 2)]])
            .append_query_results([vec![product(10, 2500, 5, true)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![order(7, OrderStatus::Pending)]])
            .append_query_results([vec![item]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let resp = service.checkout(1, checkout_request()).await.unwrap();
        assert!(resp.checkout_url.is_none());
        assert_eq!(resp.order.order.id, 7);
        assert_eq!(resp.order.items.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_paid_is_idempotent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(7, OrderStatus::Paid)]])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let order = service
            .mark_paid(7, Some("cs_test".into()), None)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_own_requires_pending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(7, OrderStatus::Cancelled)]])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let err = service.cancel_own(1, 7).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // 已取消的订单不会再次回补库存
        let log = statement_log(service.pool);
        assert!(log.contains("FOR UPDATE"));
        assert!(!log.contains(r#"UPDATE \"products\""#));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_under_lock() {
        let item = order_items::Model {
            id: 1,
            order_id: 7,
            product_id: Some(10),
            product_name: "Ring 10".to_string(),
            quantity: 2,
            unit_price_cents: 2500,
            amount_cents: 5000,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(7, OrderStatus::Pending)]])
            .append_query_results([vec![item]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![order(7, OrderStatus::Cancelled)]])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let cancelled = service.cancel_own(1, 7).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        assert_in_order(
            &statement_log(service.pool),
            &[
                "BEGIN",
                "FOR UPDATE",
                r#"UPDATE \"products\""#,
                r#"UPDATE \"orders\""#,
                "COMMIT",
            ],
        );
    }

    #[tokio::test]
    async fn test_cancel_other_users_order_not_found() {
        let mut other = order(7, OrderStatus::Pending);
        other.user_id = 2;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![other]])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let err = service.cancel_own(1, 7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_paid_locks_pending_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(7, OrderStatus::Pending)]])
            .append_query_results([vec![order(7, OrderStatus::Paid)]])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let paid = service
            .mark_paid(7, Some("cs_test".into()), Some("pi_test".into()))
            .await
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);

        assert_in_order(
            &statement_log(service.pool),
            &["BEGIN", "FOR UPDATE", r#"UPDATE \"orders\""#, "COMMIT"],
        );
    }

    #[tokio::test]
    async fn test_invalid_status_transition() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(7, OrderStatus::Delivered)]])
            .into_connection();
        let service = OrderService::new(db, stripe());

        let err = service
            .update_status(
                7,
                UpdateOrderStatusRequest {
                    status: OrderStatus::Pending,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
