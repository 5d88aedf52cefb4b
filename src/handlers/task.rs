use crate::middlewares::{require_admin, require_staff};
use crate::models::*;
use crate::services::TaskService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "任务已创建", body = TaskDetail),
        (status = 400, description = "指派对象不是在职员工")
    )
)]
pub async fn create_task(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    request: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse> {
    let admin = require_admin(&req)?;

    match task_service.create(admin.id, request.into_inner()).await {
        Ok(task) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": task
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "todo / in_progress / done / cancelled")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部任务")
    )
)]
pub async fn list_tasks(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    query: web::Query<TaskQuery>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match task_service.list_all(query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/tasks/assigned",
    tag = "tasks",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "任务状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "指派给我的任务")
    )
)]
pub async fn list_assigned_tasks(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    query: web::Query<TaskQuery>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match task_service.list_assigned(staff.id, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "任务 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "任务详情", body = TaskDetail),
        (status = 404, description = "任务不存在")
    )
)]
pub async fn get_task(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match task_service.get(path.into_inner()).await {
        Ok(task) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": task
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "任务 ID")),
    request_body = UpdateTaskRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "任务已更新", body = TaskDetail),
        (status = 404, description = "任务不存在")
    )
)]
pub async fn update_task(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match task_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(task) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": task
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/tasks/{id}/status",
    tag = "tasks",
    params(("id" = i64, Path, description = "任务 ID")),
    request_body = UpdateTaskStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态已更新", body = Task),
        (status = 403, description = "任务未指派给当前员工")
    )
)]
pub async fn update_task_status(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateTaskStatusRequest>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match task_service
        .update_status(staff.id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(task) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": task
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "任务 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "任务不存在")
    )
)]
pub async fn delete_task(
    task_service: web::Data<TaskService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    require_admin(&req)?;

    match task_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Task deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn task_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .route("", web::get().to(list_tasks))
            .route("", web::post().to(create_task))
            .route("/assigned", web::get().to(list_assigned_tasks))
            .route("/{id}", web::get().to(get_task))
            .route("/{id}", web::put().to(update_task))
            .route("/{id}", web::delete().to(delete_task))
            .route("/{id}/status", web::put().to(update_task_status)),
    );
}
