use crate::middlewares::current_user;
use crate::models::*;
use crate::services::WishlistService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/wishlist",
    tag = "wishlist",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "收藏列表", body = [WishlistEntry])
    )
)]
pub async fn list_wishlist(
    wishlist_service: web::Data<WishlistService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match wishlist_service.list(user.id).await {
        Ok(items) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": items
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/wishlist",
    tag = "wishlist",
    request_body = AddWishlistItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已收藏", body = WishlistItem),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn add_to_wishlist(
    wishlist_service: web::Data<WishlistService>,
    req: HttpRequest,
    request: web::Json<AddWishlistItemRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match wishlist_service.add(user.id, request.into_inner()).await {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/wishlist/{id}",
    tag = "wishlist",
    params(("id" = i64, Path, description = "收藏条目 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已移除"),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn remove_from_wishlist(
    wishlist_service: web::Data<WishlistService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match wishlist_service.remove(user.id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Removed from wishlist"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/wishlist/{id}/move-to-cart",
    tag = "wishlist",
    params(("id" = i64, Path, description = "收藏条目 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已移入购物车"),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn move_to_cart(
    wishlist_service: web::Data<WishlistService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match wishlist_service.move_to_cart(user.id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Moved to cart"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn wishlist_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wishlist")
            .route("", web::get().to(list_wishlist))
            .route("", web::post().to(add_to_wishlist))
            .route("/{id}", web::delete().to(remove_from_wishlist))
            .route("/{id}/move-to-cart", web::post().to(move_to_cart)),
    );
}
