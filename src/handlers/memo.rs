use crate::middlewares::require_staff;
use crate::models::*;
use crate::services::MemoService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/memos/next-number",
    tag = "memos",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "下一个寄售单号预览", body = NextNumberResponse)
    )
)]
pub async fn next_memo_number(
    memo_service: web::Data<MemoService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match memo_service.next_memo_number().await {
        Ok(number) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": number
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/memos",
    tag = "memos",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "open / partially_returned / returned / invoiced"),
        ("master_id" = Option<i64>, Query, description = "档案 ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "寄售单列表")
    )
)]
pub async fn list_memos(
    memo_service: web::Data<MemoService>,
    req: HttpRequest,
    query: web::Query<MemoQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match memo_service.list(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/memos/{id}",
    tag = "memos",
    params(("id" = i64, Path, description = "寄售单 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "寄售单详情", body = MemoDetail),
        (status = 404, description = "寄售单不存在")
    )
)]
pub async fn get_memo(
    memo_service: web::Data<MemoService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match memo_service.get(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/memos",
    tag = "memos",
    request_body = CreateMemoRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "寄售单已创建", body = MemoDetail),
        (status = 409, description = "库存不可寄售")
    )
)]
pub async fn create_memo(
    memo_service: web::Data<MemoService>,
    req: HttpRequest,
    request: web::Json<CreateMemoRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match memo_service.create(staff.id, request.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/memos/{id}/return",
    tag = "memos",
    params(("id" = i64, Path, description = "寄售单 ID")),
    request_body = ReturnMemoItemsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "货品已退回", body = MemoDetail),
        (status = 409, description = "寄售单已关闭或货品已不在寄售中")
    )
)]
pub async fn return_memo_items(
    memo_service: web::Data<MemoService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ReturnMemoItemsRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match memo_service
        .return_items(staff.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/memos/{id}/convert",
    tag = "memos",
    params(("id" = i64, Path, description = "寄售单 ID")),
    request_body = ConvertMemoRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "已转为发票", body = InvoiceDetail),
        (status = 409, description = "没有可开票的货品")
    )
)]
pub async fn convert_memo(
    memo_service: web::Data<MemoService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ConvertMemoRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;
    let memo_id = path.into_inner();

    match memo_service
        .convert_to_invoice(staff.id, memo_id, request.into_inner())
        .await
    {
        Ok(detail) => {
            log::info!(
                "Memo {memo_id} converted to invoice {}",
                detail.invoice.invoice_number
            );
            Ok(HttpResponse::Created().json(json!({
                "success": true,
                "data": detail
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn memo_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/memos")
            .route("", web::get().to(list_memos))
            .route("", web::post().to(create_memo))
            .route("/next-number", web::get().to(next_memo_number))
            .route("/{id}", web::get().to(get_memo))
            .route("/{id}/return", web::post().to(return_memo_items))
            .route("/{id}/convert", web::post().to(convert_memo)),
    );
}
