use crate::middlewares::current_user;
use crate::models::*;
use crate::services::NotificationService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("unread_only" = Option<bool>, Query, description = "只看未读")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "通知列表")
    )
)]
pub async fn list_notifications(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match notification_service.list(user.id, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "未读数量", body = UnreadCountResponse)
    )
)]
pub async fn unread_count(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match notification_service.unread_count(user.id).await {
        Ok(count) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": count
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(("id" = i64, Path, description = "通知 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已标记为已读", body = Notification),
        (status = 404, description = "通知不存在")
    )
)]
pub async fn mark_read(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match notification_service.mark_read(user.id, path.into_inner()).await {
        Ok(notification) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": notification
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部已读", body = MarkAllReadResponse)
    )
)]
pub async fn mark_all_read(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match notification_service.mark_all_read(user.id).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn notification_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(list_notifications))
            .route("/unread-count", web::get().to(unread_count))
            .route("/read-all", web::post().to(mark_all_read))
            .route("/{id}/read", web::post().to(mark_read)),
    );
}
