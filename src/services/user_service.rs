use crate::entities::{UserRole, users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::like_pattern;
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

/// 后台用户管理（仅管理员）
#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
}

impl UserService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list_users(
        &self,
        query: UserListQuery,
    ) -> AppResult<PaginatedResponse<UserResponse>> {
        let params = query.pagination();

        let mut select = users::Entity::find();
        if let Some(role) = query.role {
            select = select.filter(users::Column::Role.eq(role));
        }
        if let Some(pattern) = like_pattern(query.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(Expr::col(users::Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(users::Column::Email).ilike(pattern)),
            );
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(users::Column::CreatedAt)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total).map(UserResponse::from))
    }

    pub async fn get_user(&self, user_id: i64) -> AppResult<UserResponse> {
        Ok(UserResponse::from(self.find(user_id).await?))
    }

    /// 创建员工或管理员账号
    pub async fn create_staff(&self, request: CreateStaffRequest) -> AppResult<UserResponse> {
        if !request.role.is_staff() {
            return Err(AppError::ValidationError(
                "Role must be admin or employee".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        require_non_empty("name", &request.name)?;
        validate_password(&request.password)?;

        let exists = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .count(&self.pool)
            .await?;
        if exists > 0 {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let user = users::ActiveModel {
            email: Set(email),
            name: Set(request.name.trim().to_string()),
            phone: Set(request.phone),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(request.role),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Created {} account {}", user.role, user.id);
        Ok(UserResponse::from(user))
    }

    pub async fn update_user(
        &self,
        actor_id: i64,
        user_id: i64,
        request: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        let user = self.find(user_id).await?;

        // 管理员不能降级或停用自己
        if actor_id == user_id {
            if request.role.is_some_and(|r| r != UserRole::Admin) {
                return Err(AppError::ValidationError(
                    "You cannot change your own role".to_string(),
                ));
            }
            if request.is_active == Some(false) {
                return Err(AppError::ValidationError(
                    "You cannot deactivate your own account".to_string(),
                ));
            }
        }

        let mut active = user.into_active_model();
        if let Some(name) = request.name {
            require_non_empty("name", &name)?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone).filter(|p| !p.trim().is_empty()));
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(UserResponse::from(active.update(&self.pool).await?))
    }

    pub async fn delete_user(&self, actor_id: i64, user_id: i64) -> AppResult<()> {
        if actor_id == user_id {
            return Err(AppError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }

        let result = users::Entity::delete_by_id(user_id)
            .exec(&self.pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        log::info!("User {user_id} deleted by {actor_id}");
        Ok(())
    }

    async fn find(&self, user_id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    fn staff(id: i64) -> users::Model {
        users::Model {
            id,
            email: "admin@example.com".to_string(),
            name: "Admin".to_string(),
            phone: None,
            password_hash: "x".to_string(),
            role: UserRole::Admin,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_staff_rejects_customer_role() {
        let service = UserService::new(empty_db());
        let err = service
            .create_staff(CreateStaffRequest {
                email: "sales@example.com".to_string(),
                name: "Sales".to_string(),
                phone: None,
                password: "Password123".to_string(),
                role: UserRole::Customer,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_admin_cannot_demote_self() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![staff(1)]])
            .into_connection();
        let service = UserService::new(db);

        let err = service
            .update_user(
                1,
                1,
                UpdateUserRequest {
                    role: Some(UserRole::Employee),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_delete_self_rejected() {
        let service = UserService::new(empty_db());
        assert!(service.delete_user(4, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let service = UserService::new(db);

        let err = service.delete_user(1, 99).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
