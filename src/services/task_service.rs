use crate::entities::notifications::KIND_TASK;
use crate::entities::{TaskPriority, TaskStatus, task_assignments, tasks, users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::NotificationService;
use crate::utils::{PaginatedResponse, require_non_empty};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set,
    TransactionTrait,
};
use std::collections::BTreeSet;

fn assigned_notice(task: &tasks::Model, user_id: i64) -> NewNotification {
    NewNotification {
        user_id,
        title: "New task assigned".to_string(),
        body: task.title.clone(),
        kind: KIND_TASK,
        link: Some(format!("/tasks/{}", task.id)),
    }
}

fn completed_notice(task: &tasks::Model, creator_id: i64) -> NewNotification {
    NewNotification {
        user_id: creator_id,
        title: "Task completed".to_string(),
        body: task.title.clone(),
        kind: KIND_TASK,
        link: Some(format!("/tasks/{}", task.id)),
    }
}

#[derive(Clone)]
pub struct TaskService {
    pool: DatabaseConnection,
}

impl TaskService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn create(&self, actor_id: i64, request: CreateTaskRequest) -> AppResult<TaskDetail> {
        require_non_empty("title", &request.title)?;
        let assignee_ids: BTreeSet<i64> = request.assignee_ids.iter().copied().collect();

        let txn = self.pool.begin().await?;
        Self::ensure_staff(&txn, &assignee_ids).await?;

        let task = tasks::ActiveModel {
            title: Set(request.title.trim().to_string()),
            description: Set(request.description),
            priority: Set(request.priority.unwrap_or(TaskPriority::Medium)),
            status: Set(TaskStatus::Todo),
            due_date: Set(request.due_date),
            created_by: Set(Some(actor_id)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        Self::assign(&txn, task.id, &assignee_ids).await?;
        NotificationService::notify_many(
            &txn,
            assignee_ids
                .iter()
                .filter(|&&id| id != actor_id)
                .map(|&id| assigned_notice(&task, id))
                .collect(),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Task {} created by {actor_id} with {} assignees",
            task.id,
            assignee_ids.len()
        );
        Ok(TaskDetail {
            task,
            assignee_ids: assignee_ids.into_iter().collect(),
        })
    }

    pub async fn get(&self, task_id: i64) -> AppResult<TaskDetail> {
        let task = self.find(task_id).await?;
        let assignee_ids = Self::assignees_of(&self.pool, task.id).await?;
        Ok(TaskDetail { task, assignee_ids })
    }

    pub async fn list_all(&self, query: TaskQuery) -> AppResult<PaginatedResponse<tasks::Model>> {
        let params = query.pagination();

        let mut select = tasks::Entity::find();
        if let Some(status) = query.status {
            select = select.filter(tasks::Column::Status.eq(status));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(tasks::Column::CreatedAt)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 指派给某员工的任务
    pub async fn list_assigned(
        &self,
        user_id: i64,
        query: TaskQuery,
    ) -> AppResult<PaginatedResponse<tasks::Model>> {
        let params = query.pagination();

        let assigned = task_assignments::Entity::find()
            .select_only()
            .column(task_assignments::Column::TaskId)
            .filter(task_assignments::Column::UserId.eq(user_id))
            .into_query();

        let mut select = tasks::Entity::find().filter(tasks::Column::Id.in_subquery(assigned));
        if let Some(status) = query.status {
            select = select.filter(tasks::Column::Status.eq(status));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_asc(tasks::Column::DueDate)
            .order_by_desc(tasks::Column::CreatedAt)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn update(&self, task_id: i64, request: UpdateTaskRequest) -> AppResult<TaskDetail> {
        let task = self.find(task_id).await?;
        let was_done = task.status == TaskStatus::Done;

        let txn = self.pool.begin().await?;
        let mut active = task.into_active_model();
        if let Some(title) = request.title {
            require_non_empty("title", &title)?;
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(priority) = request.priority {
            active.priority = Set(priority);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if let Some(due_date) = request.due_date {
            active.due_date = Set(Some(due_date));
        }
        active.updated_at = Set(Utc::now());
        let task = active.update(&txn).await?;

        let mut notices = Vec::new();
        let assignee_ids = match request.assignee_ids {
            Some(ids) => {
                let wanted: BTreeSet<i64> = ids.into_iter().collect();
                Self::ensure_staff(&txn, &wanted).await?;

                let current: BTreeSet<i64> =
                    Self::assignees_of(&txn, task.id).await?.into_iter().collect();

                task_assignments::Entity::delete_many()
                    .filter(task_assignments::Column::TaskId.eq(task.id))
                    .exec(&txn)
                    .await?;
                Self::assign(&txn, task.id, &wanted).await?;

                notices.extend(
                    wanted
                        .difference(&current)
                        .map(|&id| assigned_notice(&task, id)),
                );
                wanted.into_iter().collect()
            }
            None => Self::assignees_of(&txn, task.id).await?,
        };

        if !was_done && task.status == TaskStatus::Done {
            if let Some(creator_id) = task.created_by {
                notices.push(completed_notice(&task, creator_id));
            }
        }
        NotificationService::notify_many(&txn, notices).await?;
        txn.commit().await?;

        Ok(TaskDetail { task, assignee_ids })
    }

    /// 员工只能更新指派给自己的任务状态
    pub async fn update_status(
        &self,
        user_id: i64,
        task_id: i64,
        request: UpdateTaskStatusRequest,
    ) -> AppResult<tasks::Model> {
        let task = self.find(task_id).await?;

        let assigned = task_assignments::Entity::find()
            .filter(task_assignments::Column::TaskId.eq(task.id))
            .filter(task_assignments::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?;
        if assigned.is_none() {
            return Err(AppError::Forbidden);
        }

        if task.status == request.status {
            return Ok(task);
        }

        let txn = self.pool.begin().await?;
        let mut active = task.into_active_model();
        active.status = Set(request.status);
        active.updated_at = Set(Utc::now());
        let task = active.update(&txn).await?;

        if task.status == TaskStatus::Done {
            if let Some(creator_id) = task.created_by.filter(|&id| id != user_id) {
                NotificationService::notify(&txn, completed_notice(&task, creator_id)).await?;
            }
        }
        txn.commit().await?;

        log::info!("Task {} moved to {:?} by {user_id}", task.id, task.status);
        Ok(task)
    }

    pub async fn delete(&self, task_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        task_assignments::Entity::delete_many()
            .filter(task_assignments::Column::TaskId.eq(task_id))
            .exec(&txn)
            .await?;
        let result = tasks::Entity::delete_by_id(task_id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::NotFound("Task not found".to_string()));
        }
        txn.commit().await?;
        Ok(())
    }

    async fn find(&self, task_id: i64) -> AppResult<tasks::Model> {
        tasks::Entity::find_by_id(task_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }

    async fn assignees_of<C: ConnectionTrait>(db: &C, task_id: i64) -> AppResult<Vec<i64>> {
        let rows = task_assignments::Entity::find()
            .filter(task_assignments::Column::TaskId.eq(task_id))
            .order_by_asc(task_assignments::Column::UserId)
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|a| a.user_id).collect())
    }

    async fn assign<C: ConnectionTrait>(
        db: &C,
        task_id: i64,
        user_ids: &BTreeSet<i64>,
    ) -> AppResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let rows = user_ids.iter().map(|&user_id| task_assignments::ActiveModel {
            task_id: Set(task_id),
            user_id: Set(user_id),
            ..Default::default()
        });
        task_assignments::Entity::insert_many(rows).exec(db).await?;
        Ok(())
    }

    /// 指派人必须都是在职员工
    async fn ensure_staff<C: ConnectionTrait>(db: &C, user_ids: &BTreeSet<i64>) -> AppResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let found = users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids.iter().copied()))
            .all(db)
            .await?;

        for id in user_ids {
            match found.iter().find(|u| u.id == *id) {
                Some(user) if user.role.is_staff() && user.is_active => {}
                Some(_) => {
                    return Err(AppError::ValidationError(format!(
                        "User {id} is not active staff"
                    )));
                }
                None => return Err(AppError::NotFound(format!("User {id} not found"))),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UserRole;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn task(id: i64, status: TaskStatus) -> tasks::Model {
        tasks::Model {
            id,
            title: "Polish display case".to_string(),
            description: None,
            priority: TaskPriority::Medium,
            status,
            due_date: None,
            created_by: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(id: i64, role: UserRole) -> users::Model {
        users::Model {
            id,
            email: format!("user{id}@example.com"),
            name: format!("User {id}"),
            phone: None,
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assignment(task_id: i64, user_id: i64) -> task_assignments::Model {
        task_assignments::Model {
            id: 1,
            task_id,
            user_id,
            assigned_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_customer_assignee() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(5, UserRole::Customer)]])
            .into_connection();
        let service = TaskService::new(db);

        let err = service
            .create(
                1,
                CreateTaskRequest {
                    title: "Count stock".to_string(),
                    description: None,
                    priority: None,
                    due_date: None,
                    assignee_ids: vec![5],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_status_requires_assignment() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(3, TaskStatus::Todo)]])
            .append_query_results([Vec::<task_assignments::Model>::new()])
            .into_connection();
        let service = TaskService::new(db);

        let err = service
            .update_status(
                7,
                3,
                UpdateTaskStatusRequest {
                    status: TaskStatus::Done,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_done_notifies_creator() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(3, TaskStatus::InProgress)]])
            .append_query_results([vec![assignment(3, 7)]])
            .append_query_results([vec![task(3, TaskStatus::Done)]])
            .append_query_results([vec![crate::entities::notifications::Model {
                id: 1,
                user_id: 1,
                title: "Task completed".to_string(),
                body: "Polish display case".to_string(),
                kind: KIND_TASK.to_string(),
                link: Some("/tasks/3".to_string()),
                is_read: false,
                created_at: Utc::now(),
            }]])
            .into_connection();
        let service = TaskService::new(db);

        let updated = service
            .update_status(
                7,
                3,
                UpdateTaskStatusRequest {
                    status: TaskStatus::Done,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_delete_missing_task() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let service = TaskService::new(db);

        let err = service.delete(9).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
