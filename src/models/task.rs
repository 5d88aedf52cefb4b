use crate::entities::{TaskPriority, TaskStatus, tasks};
use crate::utils::PaginationParams;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assignee_ids: Vec<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
    /// 提供时整体替换指派人，新增的指派人会收到通知
    pub assignee_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TaskQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<TaskStatus>,
}

impl TaskQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: tasks::Model,
    pub assignee_ids: Vec<i64>,
}
