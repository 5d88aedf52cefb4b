use crate::middlewares::{current_user, optional_user, require_staff};
use crate::models::*;
use crate::services::AppointmentService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// 公开预约，带有效 token 时关联到当前用户
#[utoipa::path(
    post,
    path = "/appointments",
    tag = "appointments",
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "预约已提交", body = Appointment),
        (status = 400, description = "请求参数错误")
    )
)]
pub async fn create_appointment(
    appointment_service: web::Data<AppointmentService>,
    req: HttpRequest,
    request: web::Json<CreateAppointmentRequest>,
) -> Result<HttpResponse> {
    let user_id = optional_user(&req).map(|u| u.id);

    match appointment_service.create(user_id, request.into_inner()).await {
        Ok(appointment) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": appointment
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/appointments",
    tag = "appointments",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "预约状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的预约")
    )
)]
pub async fn list_my_appointments(
    appointment_service: web::Data<AppointmentService>,
    req: HttpRequest,
    query: web::Query<AppointmentQuery>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match appointment_service.list_own(user.id, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/appointments",
    tag = "appointments",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "预约状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部预约"),
        (status = 403, description = "仅限员工")
    )
)]
pub async fn list_all_appointments(
    appointment_service: web::Data<AppointmentService>,
    req: HttpRequest,
    query: web::Query<AppointmentQuery>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match appointment_service.list_all(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/appointments/{id}",
    tag = "appointments",
    params(("id" = i64, Path, description = "预约 ID")),
    request_body = UpdateAppointmentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "预约已更新", body = Appointment),
        (status = 404, description = "预约不存在")
    )
)]
pub async fn update_appointment(
    appointment_service: web::Data<AppointmentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateAppointmentRequest>,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match appointment_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(appointment) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": appointment
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn appointment_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/appointments")
            .route("", web::post().to(create_appointment))
            .route("", web::get().to(list_my_appointments)),
    )
    .service(
        web::scope("/admin/appointments")
            .route("", web::get().to(list_all_appointments))
            .route("/{id}", web::put().to(update_appointment)),
    );
}
