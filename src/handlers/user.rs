use crate::middlewares::require_admin;
use crate::models::*;
use crate::services::UserService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("role" = Option<String>, Query, description = "角色: admin, employee, customer"),
        ("search" = Option<String>, Query, description = "姓名或邮箱")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户列表"),
        (status = 403, description = "仅管理员")
    )
)]
pub async fn list_users(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match user_service.list_users(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "用户 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "用户详情", body = UserResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match user_service.get_user(path.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateStaffRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "员工账号已创建", body = UserResponse),
        (status = 409, description = "邮箱已存在")
    )
)]
pub async fn create_staff(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<CreateStaffRequest>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match user_service.create_staff(request.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "用户 ID")),
    request_body = UpdateUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = UserResponse),
        (status = 400, description = "不能修改自己的角色或停用自己")
    )
)]
pub async fn update_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let admin = require_admin(&req)?;

    match user_service
        .update_user(admin.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "用户 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 409, description = "用户仍被引用")
    )
)]
pub async fn delete_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = require_admin(&req)?;

    match user_service.delete_user(admin.id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "User deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("", web::post().to(create_staff))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}
