use crate::utils::PaginationParams;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub unread_only: Option<bool>,
}

impl NotificationQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// 内部创建通知用
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub kind: &'static str,
    pub link: Option<String>,
}
