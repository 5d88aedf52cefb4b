use crate::entities::notifications;
use crate::error::{AppError, AppResult};
use crate::models::{MarkAllReadResponse, NewNotification, NotificationQuery, UnreadCountResponse};
use crate::utils::PaginatedResponse;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

#[derive(Clone)]
pub struct NotificationService {
    pool: DatabaseConnection,
}

impl NotificationService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 写入一条通知，可在调用方的事务内执行
    pub async fn notify<C: ConnectionTrait>(
        db: &C,
        notification: NewNotification,
    ) -> AppResult<notifications::Model> {
        let model = notifications::ActiveModel {
            user_id: Set(notification.user_id),
            title: Set(notification.title),
            body: Set(notification.body),
            kind: Set(notification.kind.to_string()),
            link: Set(notification.link),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(model)
    }

    pub async fn notify_many<C: ConnectionTrait>(
        db: &C,
        batch: Vec<NewNotification>,
    ) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let models = batch.into_iter().map(|n| notifications::ActiveModel {
            user_id: Set(n.user_id),
            title: Set(n.title),
            body: Set(n.body),
            kind: Set(n.kind.to_string()),
            link: Set(n.link),
            ..Default::default()
        });

        notifications::Entity::insert_many(models).exec(db).await?;
        Ok(())
    }

    pub async fn list(
        &self,
        user_id: i64,
        query: NotificationQuery,
    ) -> AppResult<PaginatedResponse<notifications::Model>> {
        let params = query.pagination();

        let mut select =
            notifications::Entity::find().filter(notifications::Column::UserId.eq(user_id));
        if query.unread_only.unwrap_or(false) {
            select = select.filter(notifications::Column::IsRead.eq(false));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(notifications::Column::CreatedAt)
            .order_by_desc(notifications::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn unread_count(&self, user_id: i64) -> AppResult<UnreadCountResponse> {
        let unread = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .count(&self.pool)
            .await?;

        Ok(UnreadCountResponse { unread })
    }

    /// 只能标记自己的通知
    pub async fn mark_read(&self, user_id: i64, id: i64) -> AppResult<notifications::Model> {
        let notification = notifications::Entity::find_by_id(id)
            .filter(notifications::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.is_read {
            return Ok(notification);
        }

        let mut active: notifications::ActiveModel = notification.into();
        active.is_read = Set(true);
        Ok(active.update(&self.pool).await?)
    }

    pub async fn mark_all_read(&self, user_id: i64) -> AppResult<MarkAllReadResponse> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .exec(&self.pool)
            .await?;

        Ok(MarkAllReadResponse {
            updated: result.rows_affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::notifications::KIND_TASK;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn notification(id: i64, user_id: i64, is_read: bool) -> notifications::Model {
        notifications::Model {
            id,
            user_id,
            title: "New task".to_string(),
            body: "You have been assigned a task".to_string(),
            kind: KIND_TASK.to_string(),
            link: Some("/tasks/1".to_string()),
            is_read,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mark_read_not_owned_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notifications::Model>::new()])
            .into_connection();
        let service = NotificationService::new(db);

        let err = service.mark_read(7, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_read_updates_flag() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notification(1, 7, false)]])
            .append_query_results([vec![notification(1, 7, true)]])
            .into_connection();
        let service = NotificationService::new(db);

        let updated = service.mark_read(7, 1).await.unwrap();
        assert!(updated.is_read);
    }

    #[tokio::test]
    async fn test_mark_all_read_reports_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();
        let service = NotificationService::new(db);

        let resp = service.mark_all_read(7).await.unwrap();
        assert_eq!(resp.updated, 3);
    }
}
