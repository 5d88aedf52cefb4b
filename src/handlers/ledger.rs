use crate::middlewares::require_staff;
use crate::models::*;
use crate::services::LedgerService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/ledger/summary",
    tag = "ledger",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "各档案借贷余额", body = [MasterBalance])
    )
)]
pub async fn ledger_summary(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match ledger_service.summary().await {
        Ok(balances) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": balances
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/ledger/masters/{id}",
    tag = "ledger",
    params(
        ("id" = i64, Path, description = "档案 ID"),
        ("start_date" = Option<String>, Query, description = "开始日期 YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "结束日期 YYYY-MM-DD")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "对账单", body = LedgerStatement),
        (status = 404, description = "档案不存在")
    )
)]
pub async fn master_statement(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match ledger_service
        .entries(path.into_inner(), query.into_inner())
        .await
    {
        Ok(statement) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": statement
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/ledger/masters/{id}",
    tag = "ledger",
    params(("id" = i64, Path, description = "档案 ID")),
    request_body = ManualLedgerEntryRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "分录已记账", body = LedgerEntry),
        (status = 400, description = "分录类型或金额不合法")
    )
)]
pub async fn create_ledger_entry(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ManualLedgerEntryRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match ledger_service
        .manual_entry(staff.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(entry) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": entry
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/ledger/masters/{id}/outstanding",
    tag = "ledger",
    params(("id" = i64, Path, description = "档案 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "应收余额", body = OutstandingBalance)
    )
)]
pub async fn master_outstanding(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match ledger_service.outstanding(path.into_inner()).await {
        Ok(balance) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": balance
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn ledger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ledger")
            .route("/summary", web::get().to(ledger_summary))
            .route("/masters/{id}", web::get().to(master_statement))
            .route("/masters/{id}", web::post().to(create_ledger_entry))
            .route("/masters/{id}/outstanding", web::get().to(master_outstanding)),
    );
}
