use crate::entities::notifications::KIND_CHAT;
use crate::entities::{ChatRequestStatus, UserRole, chat_requests, chats, messages, users};
use crate::error::{AppError, AppResult};
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::NotificationService;
use crate::utils::PaginatedResponse;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;
const MAX_MESSAGE_CHARS: usize = 4000;

/// 进程内的聊天广播，每个会话一个 broadcast channel
#[derive(Clone, Default)]
pub struct ChatHub {
    channels: Arc<Mutex<HashMap<i64, broadcast::Sender<messages::Model>>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅时顺带清理已无人收听的 channel
    pub fn subscribe(&self, chat_id: i64) -> broadcast::Receiver<messages::Model> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.retain(|id, sender| *id == chat_id || sender.receiver_count() > 0);
        channels
            .entry(chat_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 返回收到消息的订阅者数量；没有订阅者时顺便清理 channel
    pub fn publish(&self, message: messages::Model) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let chat_id = message.chat_id;
        let delivered = match channels.get(&chat_id) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            channels.remove(&chat_id);
        }
        delivered
    }

    pub fn close(&self, chat_id: i64) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.remove(&chat_id);
    }
}

#[derive(Clone)]
pub struct ChatService {
    pool: DatabaseConnection,
    hub: ChatHub,
}

impl ChatService {
    pub fn new(pool: DatabaseConnection, hub: ChatHub) -> Self {
        Self { pool, hub }
    }

    /// 客户发起会话请求，同一时间只能有一个待处理请求
    pub async fn open_request(
        &self,
        customer_id: i64,
        request: OpenChatRequest,
    ) -> AppResult<chat_requests::Model> {
        let pending = chat_requests::Entity::find()
            .filter(chat_requests::Column::CustomerId.eq(customer_id))
            .filter(chat_requests::Column::Status.eq(ChatRequestStatus::Pending))
            .one(&self.pool)
            .await?;
        if pending.is_some() {
            return Err(AppError::Conflict(
                "You already have a pending chat request".to_string(),
            ));
        }

        let subject = request
            .subject
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let txn = self.pool.begin().await?;
        let chat_request = chat_requests::ActiveModel {
            customer_id: Set(customer_id),
            subject: Set(subject),
            status: Set(ChatRequestStatus::Pending),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let staff = users::Entity::find()
            .filter(users::Column::Role.ne(UserRole::Customer))
            .filter(users::Column::IsActive.eq(true))
            .all(&txn)
            .await?;
        NotificationService::notify_many(
            &txn,
            staff
                .iter()
                .map(|u| NewNotification {
                    user_id: u.id,
                    title: "New chat request".to_string(),
                    body: chat_request
                        .subject
                        .clone()
                        .unwrap_or_else(|| "A customer is waiting for help".to_string()),
                    kind: KIND_CHAT,
                    link: Some(format!("/chat/requests/{}", chat_request.id)),
                })
                .collect(),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Chat request {} opened by customer {customer_id}",
            chat_request.id
        );
        Ok(chat_request)
    }

    pub async fn list_own_requests(&self, customer_id: i64) -> AppResult<Vec<chat_requests::Model>> {
        let items = chat_requests::Entity::find()
            .filter(chat_requests::Column::CustomerId.eq(customer_id))
            .order_by_desc(chat_requests::Column::CreatedAt)
            .all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn list_pending_requests(&self) -> AppResult<Vec<chat_requests::Model>> {
        let items = chat_requests::Entity::find()
            .filter(chat_requests::Column::Status.eq(ChatRequestStatus::Pending))
            .order_by_asc(chat_requests::Column::CreatedAt)
            .all(&self.pool)
            .await?;
        Ok(items)
    }

    /// 员工接受请求并创建会话
    pub async fn accept_request(&self, employee_id: i64, request_id: i64) -> AppResult<chats::Model> {
        let txn = self.pool.begin().await?;

        let chat_request = chat_requests::Entity::find_by_id(request_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat request not found".to_string()))?;
        if chat_request.status != ChatRequestStatus::Pending {
            return Err(AppError::Conflict(
                "Chat request is no longer pending".to_string(),
            ));
        }

        let chat = chats::ActiveModel {
            customer_id: Set(chat_request.customer_id),
            employee_id: Set(employee_id),
            is_open: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let customer_id = chat_request.customer_id;
        let mut active = chat_request.into_active_model();
        active.status = Set(ChatRequestStatus::Accepted);
        active.accepted_by = Set(Some(employee_id));
        active.chat_id = Set(Some(chat.id));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        NotificationService::notify(
            &txn,
            NewNotification {
                user_id: customer_id,
                title: "Chat accepted".to_string(),
                body: "A consultant has joined your chat".to_string(),
                kind: KIND_CHAT,
                link: Some(format!("/chat/{}", chat.id)),
            },
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Chat request {request_id} accepted by {employee_id}, chat {}",
            chat.id
        );
        Ok(chat)
    }

    /// 客户和员工看到自己参与的会话，管理员看到全部
    pub async fn list_chats(&self, user: AuthUser) -> AppResult<Vec<chats::Model>> {
        let mut select = chats::Entity::find();
        if !user.is_admin() {
            select = select.filter(
                Condition::any()
                    .add(chats::Column::CustomerId.eq(user.id))
                    .add(chats::Column::EmployeeId.eq(user.id)),
            );
        }
        let items = select
            .order_by_desc(chats::Column::UpdatedAt)
            .all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn close_chat(&self, user: AuthUser, chat_id: i64) -> AppResult<chats::Model> {
        let chat = self.find_visible(user, chat_id).await?;
        if !chat.is_open {
            return Ok(chat);
        }

        let txn = self.pool.begin().await?;
        let mut active = chat.into_active_model();
        active.is_open = Set(false);
        active.updated_at = Set(Utc::now());
        let chat = active.update(&txn).await?;

        let linked = chat_requests::Entity::find()
            .filter(chat_requests::Column::ChatId.eq(chat.id))
            .one(&txn)
            .await?;
        if let Some(chat_request) = linked {
            let mut active = chat_request.into_active_model();
            active.status = Set(ChatRequestStatus::Closed);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        }
        txn.commit().await?;

        self.hub.close(chat.id);
        log::info!("Chat {} closed by {}", chat.id, user.id);
        Ok(chat)
    }

    /// 按时间正序分页
    pub async fn list_messages(
        &self,
        user: AuthUser,
        chat_id: i64,
        query: MessageQuery,
    ) -> AppResult<PaginatedResponse<messages::Model>> {
        let chat = self.find_visible(user, chat_id).await?;
        let params = query.pagination();

        let select = messages::Entity::find().filter(messages::Column::ChatId.eq(chat.id));
        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_asc(messages::Column::CreatedAt)
            .order_by_asc(messages::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 先落库再广播
    pub async fn post_message(
        &self,
        user: AuthUser,
        chat_id: i64,
        request: PostMessageRequest,
    ) -> AppResult<messages::Model> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError(
                "Message content is required".to_string(),
            ));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::ValidationError(format!(
                "Message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let chat = self.find_participant(user, chat_id).await?;
        if !chat.is_open {
            return Err(AppError::Conflict("Chat is closed".to_string()));
        }

        let message = messages::ActiveModel {
            chat_id: Set(chat.id),
            sender_id: Set(user.id),
            content: Set(content.to_string()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        let delivered = self.hub.publish(message.clone());
        log::debug!("Message {} delivered to {delivered} subscribers", message.id);
        Ok(message)
    }

    pub async fn subscribe(
        &self,
        user: AuthUser,
        chat_id: i64,
    ) -> AppResult<broadcast::Receiver<messages::Model>> {
        let chat = self.find_visible(user, chat_id).await?;
        Ok(self.hub.subscribe(chat.id))
    }

    async fn find(&self, chat_id: i64) -> AppResult<chats::Model> {
        chats::Entity::find_by_id(chat_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))
    }

    // 参与者或管理员可读
    async fn find_visible(&self, user: AuthUser, chat_id: i64) -> AppResult<chats::Model> {
        let chat = self.find(chat_id).await?;
        if chat.is_participant(user.id) || user.is_admin() {
            Ok(chat)
        } else {
            Err(AppError::Forbidden)
        }
    }

    // 只有参与者可以发言
    async fn find_participant(&self, user: AuthUser, chat_id: i64) -> AppResult<chats::Model> {
        let chat = self.find(chat_id).await?;
        if chat.is_participant(user.id) {
            Ok(chat)
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn chat(id: i64, is_open: bool) -> chats::Model {
        chats::Model {
            id,
            customer_id: 10,
            employee_id: 2,
            is_open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn message(id: i64, chat_id: i64) -> messages::Model {
        messages::Model {
            id,
            chat_id,
            sender_id: 10,
            content: "Is the oval still available?".to_string(),
            created_at: Utc::now(),
        }
    }

    fn customer(id: i64) -> AuthUser {
        AuthUser {
            id,
            role: UserRole::Customer,
        }
    }

    #[tokio::test]
    async fn test_hub_delivers_to_subscribers() {
        let hub = ChatHub::new();
        let mut rx = hub.subscribe(4);

        assert_eq!(hub.publish(message(1, 4)), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, 1);

        // 没有订阅者的会话
        assert_eq!(hub.publish(message(2, 5)), 0);
    }

    #[test]
    fn test_hub_prunes_abandoned_channels() {
        let hub = ChatHub::new();
        drop(hub.subscribe(1));
        drop(hub.subscribe(2));
        let _live = hub.subscribe(3);

        let channels = hub.channels.lock().unwrap();
        assert_eq!(channels.len(), 1);
        assert!(channels.contains_key(&3));
    }

    #[tokio::test]
    async fn test_outsider_cannot_post() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![chat(4, true)]])
            .into_connection();
        let service = ChatService::new(db, ChatHub::new());

        let err = service
            .post_message(
                customer(99),
                4,
                PostMessageRequest {
                    content: "hello".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_closed_chat_rejects_messages() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![chat(4, false)]])
            .into_connection();
        let service = ChatService::new(db, ChatHub::new());

        let err = service
            .post_message(
                customer(10),
                4,
                PostMessageRequest {
                    content: "hello".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_post_persists_then_broadcasts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![chat(4, true)]])
            .append_query_results([vec![message(7, 4)]])
            .into_connection();
        let hub = ChatHub::new();
        let mut rx = hub.subscribe(4);
        let service = ChatService::new(db, hub);

        let saved = service
            .post_message(
                customer(10),
                4,
                PostMessageRequest {
                    content: "Is the oval still available?".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.id, 7);
        assert_eq!(rx.recv().await.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = ChatService::new(db, ChatHub::new());

        let err = service
            .post_message(
                customer(10),
                4,
                PostMessageRequest {
                    content: "x".repeat(MAX_MESSAGE_CHARS + 1),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
