use crate::middlewares::{current_user, require_staff};
use crate::models::*;
use crate::services::OrderService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/orders/checkout",
    tag = "orders",
    request_body = CheckoutRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "下单成功", body = CheckoutResponse),
        (status = 400, description = "购物车为空或商品未上架"),
        (status = 409, description = "库存不足")
    )
)]
pub async fn checkout(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.checkout(user.id, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "订单状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的订单"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_my_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.list_own(user.id, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "订单 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单详情", body = OrderDetail),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_my_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.get_own(user.id, path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/pay",
    tag = "orders",
    params(("id" = i64, Path, description = "订单 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "新的支付链接", body = CheckoutResponse),
        (status = 409, description = "订单不是待支付状态")
    )
)]
pub async fn pay_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.pay(user.id, path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    tag = "orders",
    params(("id" = i64, Path, description = "订单 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单已取消", body = Order),
        (status = 409, description = "只能取消待支付订单")
    )
)]
pub async fn cancel_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match order_service.cancel_own(user.id, path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    tag = "orders",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "订单状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部订单"),
        (status = 403, description = "仅限员工")
    )
)]
pub async fn list_all_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match order_service.list_all(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/orders/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "订单 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单详情", body = OrderDetail),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match order_service.get(path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/orders/{id}/status",
    tag = "orders",
    params(("id" = i64, Path, description = "订单 ID")),
    request_body = UpdateOrderStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态已更新", body = Order),
        (status = 409, description = "不允许的状态流转")
    )
)]
pub async fn update_order_status(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;
    let order_id = path.into_inner();

    match order_service.update_status(order_id, request.into_inner()).await {
        Ok(order) => {
            log::info!(
                "Order {order_id} set to {:?} by {}",
                order.status,
                staff.id
            );
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": order
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(list_my_orders))
            .route("/checkout", web::post().to(checkout))
            .route("/{id}", web::get().to(get_my_order))
            .route("/{id}/pay", web::post().to(pay_order))
            .route("/{id}/cancel", web::post().to(cancel_order)),
    )
    .service(
        web::scope("/admin/orders")
            .route("", web::get().to(list_all_orders))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/status", web::put().to(update_order_status)),
    );
}
