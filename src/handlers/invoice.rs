use crate::middlewares::{require_admin, require_staff};
use crate::models::*;
use crate::services::InvoiceService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/invoices/next-number",
    tag = "invoices",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "下一个发票号预览", body = NextNumberResponse)
    )
)]
pub async fn next_invoice_number(
    invoice_service: web::Data<InvoiceService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match invoice_service.next_invoice_number().await {
        Ok(number) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": number
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/invoices",
    tag = "invoices",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "unpaid / partially_paid / paid / void"),
        ("master_id" = Option<i64>, Query, description = "档案 ID"),
        ("start_date" = Option<String>, Query, description = "开票日期起"),
        ("end_date" = Option<String>, Query, description = "开票日期止")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "发票列表")
    )
)]
pub async fn list_invoices(
    invoice_service: web::Data<InvoiceService>,
    req: HttpRequest,
    query: web::Query<InvoiceQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match invoice_service.list(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/invoices/{id}",
    tag = "invoices",
    params(("id" = i64, Path, description = "发票 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "发票详情", body = InvoiceDetail),
        (status = 404, description = "发票不存在")
    )
)]
pub async fn get_invoice(
    invoice_service: web::Data<InvoiceService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match invoice_service.get(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/invoices",
    tag = "invoices",
    request_body = CreateInvoiceRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "开票成功", body = InvoiceDetail),
        (status = 400, description = "发票行不合法"),
        (status = 409, description = "库存不可售")
    )
)]
pub async fn create_invoice(
    invoice_service: web::Data<InvoiceService>,
    req: HttpRequest,
    request: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match invoice_service.create(staff.id, request.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/payments",
    tag = "invoices",
    params(("id" = i64, Path, description = "发票 ID")),
    request_body = RecordPaymentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "收款已登记", body = Invoice),
        (status = 400, description = "金额超过未收余额"),
        (status = 409, description = "发票已作废")
    )
)]
pub async fn record_invoice_payment(
    invoice_service: web::Data<InvoiceService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<RecordPaymentRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match invoice_service
        .record_payment(staff.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(invoice) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": invoice
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/void",
    tag = "invoices",
    params(("id" = i64, Path, description = "发票 ID")),
    request_body = VoidInvoiceRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "发票已作废", body = Invoice),
        (status = 409, description = "发票已作废")
    )
)]
pub async fn void_invoice(
    invoice_service: web::Data<InvoiceService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<VoidInvoiceRequest>,
) -> Result<HttpResponse> {
    let admin = require_admin(&req)?;
    let invoice_id = path.into_inner();

    match invoice_service
        .void(admin.id, invoice_id, request.into_inner())
        .await
    {
        Ok(invoice) => {
            log::info!("Invoice {} voided by {}", invoice.invoice_number, admin.id);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": invoice
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn invoice_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoices")
            .route("", web::get().to(list_invoices))
            .route("", web::post().to(create_invoice))
            .route("/next-number", web::get().to(next_invoice_number))
            .route("/{id}", web::get().to(get_invoice))
            .route("/{id}/payments", web::post().to(record_invoice_payment))
            .route("/{id}/void", web::post().to(void_invoice)),
    );
}
