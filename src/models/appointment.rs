use crate::entities::AppointmentStatus;
use crate::utils::PaginationParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateAppointmentRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// 必须是将来的时间
    pub preferred_at: DateTime<Utc>,
    #[schema(example = "Engagement ring consultation")]
    pub purpose: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AppointmentQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}
