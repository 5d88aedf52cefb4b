use crate::middlewares::{require_admin, require_staff};
use crate::models::*;
use crate::services::InventoryService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/inventory",
    tag = "inventory",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "AVAILABLE / HOLD / MEMO / SOLD"),
        ("shape" = Option<String>, Query, description = "形状"),
        ("color" = Option<String>, Query, description = "颜色"),
        ("clarity" = Option<String>, Query, description = "净度"),
        ("min_carat" = Option<f64>, Query, description = "最小克拉"),
        ("max_carat" = Option<f64>, Query, description = "最大克拉"),
        ("search" = Option<String>, Query, description = "stock_id 或证书号")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "库存列表"),
        (status = 403, description = "仅限员工")
    )
)]
pub async fn list_inventory(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
    query: web::Query<InventoryQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match inventory_service.list(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/inventory/summary",
    tag = "inventory",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "按状态统计", body = InventorySummary)
    )
)]
pub async fn inventory_summary(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match inventory_service.summary().await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": summary
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/inventory/{id}",
    tag = "inventory",
    params(("id" = i64, Path, description = "库存 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "库存详情及历史", body = InventoryDetail),
        (status = 404, description = "库存不存在")
    )
)]
pub async fn get_inventory(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match inventory_service.get(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/inventory",
    tag = "inventory",
    request_body = CreateInventoryRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "入库成功", body = InventoryItem),
        (status = 409, description = "stock_id 已存在")
    )
)]
pub async fn create_inventory(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
    request: web::Json<CreateInventoryRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match inventory_service.create(staff.id, request.into_inner()).await {
        Ok(item) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/inventory/{id}",
    tag = "inventory",
    params(("id" = i64, Path, description = "库存 ID")),
    request_body = UpdateInventoryRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已更新", body = InventoryItem),
        (status = 400, description = "没有任何字段变化")
    )
)]
pub async fn update_inventory(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateInventoryRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match inventory_service
        .update(staff.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/inventory/{id}/status",
    tag = "inventory",
    params(("id" = i64, Path, description = "库存 ID")),
    request_body = ChangeInventoryStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态已变更", body = InventoryItem),
        (status = 409, description = "不允许的状态流转")
    )
)]
pub async fn change_inventory_status(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ChangeInventoryStatusRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match inventory_service
        .change_status(staff, path.into_inner(), request.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/inventory/{id}",
    tag = "inventory",
    params(("id" = i64, Path, description = "库存 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 409, description = "已售出的货品不能删除")
    )
)]
pub async fn delete_inventory(
    inventory_service: web::Data<InventoryService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match inventory_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Inventory item deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn inventory_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/inventory")
            .route("", web::get().to(list_inventory))
            .route("", web::post().to(create_inventory))
            .route("/summary", web::get().to(inventory_summary))
            .route("/{id}", web::get().to(get_inventory))
            .route("/{id}", web::put().to(update_inventory))
            .route("/{id}", web::delete().to(delete_inventory))
            .route("/{id}/status", web::post().to(change_inventory_status)),
    );
}
