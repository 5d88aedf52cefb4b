use crate::entities::notifications::KIND_APPOINTMENT;
use crate::entities::{AppointmentStatus, appointments, users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::NotificationService;
use crate::utils::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct AppointmentService {
    pool: DatabaseConnection,
}

impl AppointmentService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 公开预约；带有效 token 时关联到当前用户
    pub async fn create(
        &self,
        user_id: Option<i64>,
        request: CreateAppointmentRequest,
    ) -> AppResult<appointments::Model> {
        require_non_empty("name", &request.name)?;
        require_non_empty("purpose", &request.purpose)?;
        let email = normalize_email(&request.email);
        validate_email(&email)?;

        if request.preferred_at <= Utc::now() {
            return Err(AppError::ValidationError(
                "preferred_at must be in the future".to_string(),
            ));
        }

        let appointment = appointments::ActiveModel {
            user_id: Set(user_id),
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            phone: Set(request.phone),
            preferred_at: Set(request.preferred_at),
            purpose: Set(request.purpose.trim().to_string()),
            status: Set(AppointmentStatus::Requested),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Appointment {} requested for {}",
            appointment.id,
            appointment.preferred_at
        );
        Ok(appointment)
    }

    pub async fn list_own(
        &self,
        user_id: i64,
        query: AppointmentQuery,
    ) -> AppResult<PaginatedResponse<appointments::Model>> {
        self.list(Some(user_id), query).await
    }

    pub async fn list_all(
        &self,
        query: AppointmentQuery,
    ) -> AppResult<PaginatedResponse<appointments::Model>> {
        self.list(None, query).await
    }

    async fn list(
        &self,
        user_id: Option<i64>,
        query: AppointmentQuery,
    ) -> AppResult<PaginatedResponse<appointments::Model>> {
        let params = query.pagination();

        let mut select = appointments::Entity::find();
        if let Some(user_id) = user_id {
            select = select.filter(appointments::Column::UserId.eq(user_id));
        }
        if let Some(status) = query.status {
            select = select.filter(appointments::Column::Status.eq(status));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_asc(appointments::Column::PreferredAt)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 更新状态、备注或负责人；新负责人会收到通知
    pub async fn update(
        &self,
        appointment_id: i64,
        request: UpdateAppointmentRequest,
    ) -> AppResult<appointments::Model> {
        let appointment = appointments::Entity::find_by_id(appointment_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

        let new_assignee = request
            .assigned_to
            .filter(|id| appointment.assigned_to != Some(*id));

        if let Some(assignee_id) = new_assignee {
            let assignee = users::Entity::find_by_id(assignee_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Assignee not found".to_string()))?;
            if !assignee.role.is_staff() || !assignee.is_active {
                return Err(AppError::ValidationError(
                    "Appointments can only be assigned to active staff".to_string(),
                ));
            }
        }

        let txn = self.pool.begin().await?;

        let mut active = appointment.into_active_model();
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(assignee_id) = new_assignee {
            active.assigned_to = Set(Some(assignee_id));
        }
        active.updated_at = Set(Utc::now());
        let appointment = active.update(&txn).await?;

        if let Some(assignee_id) = new_assignee {
            NotificationService::notify(
                &txn,
                NewNotification {
                    user_id: assignee_id,
                    title: "New appointment assigned".to_string(),
                    body: format!(
                        "{} on {}: {}",
                        appointment.name,
                        appointment.preferred_at.format("%Y-%m-%d %H:%M UTC"),
                        appointment.purpose
                    ),
                    kind: KIND_APPOINTMENT,
                    link: Some(format!("/appointments/{}", appointment.id)),
                },
            )
            .await?;
        }

        txn.commit().await?;
        Ok(appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UserRole;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn request(offset: Duration) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            preferred_at: Utc::now() + offset,
            purpose: "Ring sizing".to_string(),
        }
    }

    fn appointment(assigned_to: Option<i64>) -> appointments::Model {
        appointments::Model {
            id: 5,
            user_id: None,
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            preferred_at: Utc::now() + Duration::days(2),
            purpose: "Ring sizing".to_string(),
            status: AppointmentStatus::Requested,
            notes: None,
            assigned_to,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_past_preferred_time_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = AppointmentService::new(db);

        let err = service
            .create(None, request(Duration::hours(-1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_guest_appointment_created() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![appointment(None)]])
            .into_connection();
        let service = AppointmentService::new(db);

        let created = service.create(None, request(Duration::days(2))).await.unwrap();
        assert_eq!(created.status, AppointmentStatus::Requested);
        assert!(created.user_id.is_none());
    }

    #[tokio::test]
    async fn test_assign_to_customer_rejected() {
        let customer = users::Model {
            id: 9,
            email: "c@example.com".to_string(),
            name: "C".to_string(),
            phone: None,
            password_hash: "x".to_string(),
            role: UserRole::Customer,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![appointment(None)]])
            .append_query_results([vec![customer]])
            .into_connection();
        let service = AppointmentService::new(db);

        let err = service
            .update(
                5,
                UpdateAppointmentRequest {
                    assigned_to: Some(9),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
