use crate::middlewares::require_admin;
use crate::models::*;
use crate::services::DiamondSyncService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/diamonds/{source}",
    tag = "diamonds",
    params(
        ("source" = String, Path, description = "cranberri / kyrah"),
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("shape" = Option<String>, Query, description = "形状"),
        ("color" = Option<String>, Query, description = "颜色"),
        ("clarity" = Option<String>, Query, description = "净度"),
        ("min_carat" = Option<f64>, Query, description = "最小克拉"),
        ("max_carat" = Option<f64>, Query, description = "最大克拉"),
        ("min_price_cents" = Option<i64>, Query, description = "最低价（分）"),
        ("max_price_cents" = Option<i64>, Query, description = "最高价（分）")
    ),
    responses(
        (status = 200, description = "合作方在售钻石"),
        (status = 404, description = "未知数据源")
    )
)]
pub async fn list_partner_diamonds(
    sync_service: web::Data<DiamondSyncService>,
    path: web::Path<String>,
    query: web::Query<DiamondQuery>,
) -> Result<HttpResponse> {
    let source = match path.into_inner().parse::<DiamondSource>() {
        Ok(source) => source,
        Err(e) => return Ok(e.error_response()),
    };

    match sync_service.list(source, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/diamonds/{source}/sync",
    tag = "diamonds",
    params(("source" = String, Path, description = "cranberri / kyrah")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "同步完成", body = SyncOutcome),
        (status = 409, description = "该数据源正在同步"),
        (status = 502, description = "合作方接口失败")
    )
)]
pub async fn trigger_sync(
    sync_service: web::Data<DiamondSyncService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let admin = require_admin(&req)?;
    let source = match path.into_inner().parse::<DiamondSource>() {
        Ok(source) => source,
        Err(e) => return Ok(e.error_response()),
    };

    log::info!("Manual {source} sync triggered by {}", admin.id);
    match sync_service.sync(source).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": outcome
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/diamonds/sync/status",
    tag = "diamonds",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "各数据源同步状态", body = [DiamondSyncStatus])
    )
)]
pub async fn sync_status(
    sync_service: web::Data<DiamondSyncService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match sync_service.statuses().await {
        Ok(statuses) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": statuses
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn diamond_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/diamonds")
            .route("/sync/status", web::get().to(sync_status))
            .route("/{source}", web::get().to(list_partner_diamonds))
            .route("/{source}/sync", web::post().to(trigger_sync)),
    );
}
