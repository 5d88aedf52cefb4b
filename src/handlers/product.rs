use crate::middlewares::{optional_user, require_staff};
use crate::models::*;
use crate::services::ProductService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

// 员工访问时可以看到未上架商品
fn sees_unpublished(req: &HttpRequest) -> bool {
    optional_user(req).is_some_and(|u| u.is_staff())
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("category" = Option<String>, Query, description = "分类"),
        ("metal" = Option<String>, Query, description = "材质"),
        ("min_price_cents" = Option<i64>, Query, description = "最低价（分）"),
        ("max_price_cents" = Option<i64>, Query, description = "最高价（分）"),
        ("search" = Option<String>, Query, description = "名称或 SKU")
    ),
    responses(
        (status = 200, description = "商品列表")
    )
)]
pub async fn list_products(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse> {
    match product_service
        .list_products(query.into_inner(), sees_unpublished(&req))
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "商品 ID")),
    responses(
        (status = 200, description = "商品详情", body = Product),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn get_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match product_service
        .get_product(path.into_inner(), sees_unpublished(&req))
        .await
    {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = CreateProductRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "商品已创建", body = Product),
        (status = 409, description = "SKU 已存在")
    )
)]
pub async fn create_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    request: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match product_service.create_product(request.into_inner()).await {
        Ok(product) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "商品 ID")),
    request_body = UpdateProductRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = Product),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn update_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match product_service
        .update_product(path.into_inner(), request.into_inner())
        .await
    {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "商品 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 409, description = "商品已被订单引用")
    )
)]
pub async fn delete_product(
    product_service: web::Data<ProductService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match product_service.delete_product(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Product deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn product_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .route("", web::get().to(list_products))
            .route("", web::post().to(create_product))
            .route("/{id}", web::get().to(get_product))
            .route("/{id}", web::put().to(update_product))
            .route("/{id}", web::delete().to(delete_product)),
    );
}
