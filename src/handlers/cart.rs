use crate::middlewares::current_user;
use crate::models::*;
use crate::services::CartService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "购物车", body = CartResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_cart(cart_service: web::Data<CartService>, req: HttpRequest) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.get_cart(user.id).await {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cart/items",
    tag = "cart",
    request_body = AddCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已加入购物车", body = CartResponse),
        (status = 400, description = "数量超出范围或商品未上架")
    )
)]
pub async fn add_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    request: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.add_item(user.id, request.into_inner()).await {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/cart/items/{id}",
    tag = "cart",
    params(("id" = i64, Path, description = "购物车条目 ID")),
    request_body = UpdateCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已更新", body = CartResponse),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn update_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service
        .update_item(user.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart/items/{id}",
    tag = "cart",
    params(("id" = i64, Path, description = "购物车条目 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已移除", body = CartResponse),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn remove_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.remove_item(user.id, path.into_inner()).await {
        Ok(cart) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": cart
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "购物车已清空")
    )
)]
pub async fn clear_cart(cart_service: web::Data<CartService>, req: HttpRequest) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match cart_service.clear(user.id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Cart cleared"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cart_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .route("", web::get().to(get_cart))
            .route("", web::delete().to(clear_cart))
            .route("/items", web::post().to(add_item))
            .route("/items/{id}", web::put().to(update_item))
            .route("/items/{id}", web::delete().to(remove_item)),
    );
}
