use crate::middlewares::{require_admin, require_staff};
use crate::models::*;
use crate::services::ReportService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/reports/sales",
    tag = "reports",
    params(
        ("start_date" = String, Query, description = "开始日期 YYYY-MM-DD"),
        ("end_date" = String, Query, description = "结束日期 YYYY-MM-DD")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "销售报表", body = SalesReport),
        (status = 400, description = "日期区间不合法")
    )
)]
pub async fn sales_report(
    report_service: web::Data<ReportService>,
    req: HttpRequest,
    query: web::Query<SalesReportQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match report_service.sales_report(query.into_inner()).await {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": report
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/reports/performance",
    tag = "reports",
    request_body = GeneratePerformanceReportRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "绩效报告已生成", body = PerformanceReport),
        (status = 404, description = "员工不存在")
    )
)]
pub async fn generate_performance_report(
    report_service: web::Data<ReportService>,
    req: HttpRequest,
    request: web::Json<GeneratePerformanceReportRequest>,
) -> Result<HttpResponse> {
    let admin = require_admin(&req)?;

    match report_service
        .generate_performance(admin.id, request.into_inner())
        .await
    {
        Ok(report) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": report
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/reports/performance",
    tag = "reports",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("employee_id" = Option<i64>, Query, description = "员工 ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "绩效报告列表")
    )
)]
pub async fn list_performance_reports(
    report_service: web::Data<ReportService>,
    req: HttpRequest,
    query: web::Query<PerformanceReportQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match report_service.list_performance(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn report_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reports")
            .route("/sales", web::get().to(sales_report))
            .route("/performance", web::post().to(generate_performance_report))
            .route("/performance", web::get().to(list_performance_reports)),
    );
}
