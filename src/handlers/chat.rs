use crate::entities::messages;
use crate::error::AppError;
use crate::middlewares::{current_user, require_staff};
use crate::models::*;
use crate::services::ChatService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

const KEEP_ALIVE: Duration = Duration::from_secs(20);

/// SSE 帧：`event: message` + JSON
fn message_frame(message: &messages::Model) -> Option<web::Bytes> {
    match serde_json::to_string(message) {
        Ok(data) => Some(web::Bytes::from(format!("event: message\ndata: {data}\n\n"))),
        Err(e) => {
            log::error!("Failed to encode chat message {}: {e}", message.id);
            None
        }
    }
}

#[utoipa::path(
    post,
    path = "/chat/requests",
    tag = "chat",
    request_body = OpenChatRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "已发起咨询", body = ChatRequest),
        (status = 409, description = "已有待处理的咨询")
    )
)]
pub async fn open_chat_request(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
    request: web::Json<OpenChatRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;
    if user.is_staff() {
        return Ok(AppError::Forbidden.error_response());
    }

    match chat_service.open_request(user.id, request.into_inner()).await {
        Ok(request) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": request
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/chat/requests",
    tag = "chat",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的咨询请求", body = [ChatRequest])
    )
)]
pub async fn list_my_chat_requests(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match chat_service.list_own_requests(user.id).await {
        Ok(requests) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": requests
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/chat/requests/pending",
    tag = "chat",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "待接入的咨询", body = [ChatRequest]),
        (status = 403, description = "仅限员工")
    )
)]
pub async fn list_pending_chat_requests(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_staff(&req)?;

    match chat_service.list_pending_requests().await {
        Ok(requests) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": requests
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/chat/requests/{id}/accept",
    tag = "chat",
    params(("id" = i64, Path, description = "咨询请求 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "已接入，会话创建", body = Chat),
        (status = 409, description = "请求已被接入或关闭")
    )
)]
pub async fn accept_chat_request(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match chat_service.accept_request(staff.id, path.into_inner()).await {
        Ok(chat) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": chat
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/chat",
    tag = "chat",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我参与的会话", body = [Chat])
    )
)]
pub async fn list_chats(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match chat_service.list_chats(user).await {
        Ok(chats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": chats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/chat/{id}/close",
    tag = "chat",
    params(("id" = i64, Path, description = "会话 ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "会话已关闭", body = Chat),
        (status = 403, description = "无权关闭")
    )
)]
pub async fn close_chat(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let staff = require_staff(&req)?;

    match chat_service.close_chat(staff, path.into_inner()).await {
        Ok(chat) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": chat
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/chat/{id}/messages",
    tag = "chat",
    params(
        ("id" = i64, Path, description = "会话 ID"),
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "历史消息，按时间正序"),
        (status = 403, description = "不是会话参与者")
    )
)]
pub async fn list_messages(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<MessageQuery>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match chat_service
        .list_messages(user, path.into_inner(), query.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/chat/{id}/messages",
    tag = "chat",
    params(("id" = i64, Path, description = "会话 ID")),
    request_body = PostMessageRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "消息已发送", body = ChatMessage),
        (status = 409, description = "会话已关闭")
    )
)]
pub async fn post_message(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<PostMessageRequest>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;

    match chat_service
        .post_message(user, path.into_inner(), request.into_inner())
        .await
    {
        Ok(message) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": message
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 实时消息推送（SSE），浏览器 EventSource 可用 `access_token` 查询参数认证
#[utoipa::path(
    get,
    path = "/chat/{id}/stream",
    tag = "chat",
    params(
        ("id" = i64, Path, description = "会话 ID"),
        ("access_token" = Option<String>, Query, description = "无法设置请求头时使用")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "text/event-stream"),
        (status = 403, description = "不是会话参与者")
    )
)]
pub async fn stream_messages(
    chat_service: web::Data<ChatService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = current_user(&req)?;
    let chat_id = path.into_inner();

    let receiver = match chat_service.subscribe(user, chat_id).await {
        Ok(receiver) => receiver,
        Err(e) => return Ok(e.error_response()),
    };
    log::debug!("User {} subscribed to chat {chat_id}", user.id);

    let stream = futures_util::stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match tokio::time::timeout(KEEP_ALIVE, receiver.recv()).await {
                Err(_) => {
                    return Some((
                        Ok::<_, actix_web::Error>(web::Bytes::from_static(b": ping\n\n")),
                        receiver,
                    ));
                }
                Ok(Ok(message)) => {
                    if let Some(frame) = message_frame(&message) {
                        return Some((Ok(frame), receiver));
                    }
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    log::warn!("Chat {chat_id} subscriber lagged, {skipped} messages skipped");
                }
                Ok(Err(RecvError::Closed)) => return None,
            }
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(stream))
}

pub fn chat_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chat")
            .route("", web::get().to(list_chats))
            .route("/requests", web::post().to(open_chat_request))
            .route("/requests", web::get().to(list_my_chat_requests))
            .route("/requests/pending", web::get().to(list_pending_chat_requests))
            .route("/requests/{id}/accept", web::post().to(accept_chat_request))
            .route("/{id}/close", web::post().to(close_chat))
            .route("/{id}/messages", web::get().to(list_messages))
            .route("/{id}/messages", web::post().to(post_message))
            .route("/{id}/stream", web::get().to(stream_messages)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_message_frame() {
        let message = messages::Model {
            id: 7,
            chat_id: 3,
            sender_id: 11,
            content: "hello".to_string(),
            created_at: Utc::now(),
        };

        let frame = message_frame(&message).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("event: message\ndata: {"));
        assert!(text.contains("\"content\":\"hello\""));
        assert!(text.ends_with("\n\n"));
    }
}
