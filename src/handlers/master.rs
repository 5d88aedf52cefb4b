use crate::middlewares::{require_admin, require_staff};
use crate::models::*;
use crate::services::MasterService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/masters",
    tag = "masters",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("master_type" = Option<String>, Query, description = "customer / vendor"),
        ("search" = Option<String>, Query, description = "编号、名称或公司"),
        ("include_inactive" = Option<bool>, Query, description = "包含已停用")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "档案列表")
    )
)]
pub async fn list_masters(
    master_service: web::Data<MasterService>,
    req: HttpRequest,
    query: web::Query<MasterQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match master_service.list(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/masters/{id}",
    tag = "masters",
    params(("id" = i64, Path, description = "档案 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "档案详情", body = Master),
        (status = 404, description = "档案不存在")
    )
)]
pub async fn get_master(
    master_service: web::Data<MasterService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match master_service.get(path.into_inner()).await {
        Ok(master) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": master
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/masters",
    tag = "masters",
    request_body = CreateMasterRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "档案已创建", body = Master),
        (status = 409, description = "编号已存在")
    )
)]
pub async fn create_master(
    master_service: web::Data<MasterService>,
    req: HttpRequest,
    request: web::Json<CreateMasterRequest>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match master_service.create(request.into_inner()).await {
        Ok(master) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": master
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/masters/{id}",
    tag = "masters",
    params(("id" = i64, Path, description = "档案 ID")),
    request_body = UpdateMasterRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已更新", body = Master),
        (status = 404, description = "档案不存在")
    )
)]
pub async fn update_master(
    master_service: web::Data<MasterService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateMasterRequest>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match master_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(master) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": master
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/masters/{id}/deactivate",
    tag = "masters",
    params(("id" = i64, Path, description = "档案 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已停用", body = Master)
    )
)]
pub async fn deactivate_master(
    master_service: web::Data<MasterService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match master_service.deactivate(path.into_inner()).await {
        Ok(master) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": master
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/masters/{id}",
    tag = "masters",
    params(("id" = i64, Path, description = "档案 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 409, description = "已有发票或寄售单")
    )
)]
pub async fn delete_master(
    master_service: web::Data<MasterService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match master_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Master deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn master_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/masters")
            .route("", web::get().to(list_masters))
            .route("", web::post().to(create_master))
            .route("/{id}", web::get().to(get_master))
            .route("/{id}", web::put().to(update_master))
            .route("/{id}", web::delete().to(delete_master))
            .route("/{id}/deactivate", web::post().to(deactivate_master)),
    );
}
