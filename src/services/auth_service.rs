use crate::config::BootstrapConfig;
use crate::entities::{UserRole, users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

#[derive(Clone)]
pub struct AuthService {
    pool: DatabaseConnection,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DatabaseConnection, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    /// 顾客自助注册，角色固定为 customer
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        require_non_empty("name", &request.name)?;
        validate_password(&request.password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(&request.password)?;

        let user = users::ActiveModel {
            email: Set(email),
            name: Set(request.name.trim().to_string()),
            phone: Set(request.phone.filter(|p| !p.trim().is_empty())),
            password_hash: Set(password_hash),
            role: Set(UserRole::Customer),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            // 并发注册时由唯一索引兜底
            err if err.is_unique_violation() => {
                AppError::Conflict("Email is already registered".to_string())
            }
            err => err,
        })?;

        log::info!("Registered customer {} ({})", user.id, user.email);
        self.issue_tokens(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError("Invalid email or password".to_string()));
        }

        if !user.is_active {
            return Err(AppError::AuthError("Account is disabled".to_string()));
        }

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user = self.get_user_by_id(claims.user_id()?).await?;

        if !user.is_active {
            return Err(AppError::AuthError("Account is disabled".to_string()));
        }

        // 角色以数据库为准，刷新后立即生效
        let access_token = self.jwt_service.generate_access_token(user.id, user.role)?;

        Ok(AuthResponse {
            access_token,
            refresh_token: refresh_token.to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
            user: UserResponse::from(user),
        })
    }

    pub async fn me(&self, user_id: i64) -> AppResult<UserResponse> {
        Ok(UserResponse::from(self.get_user_by_id(user_id).await?))
    }

    /// 启动时根据配置创建首个管理员，已存在同邮箱用户则跳过
    pub async fn ensure_bootstrap_admin(&self, config: &BootstrapConfig) -> AppResult<()> {
        let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
            return Ok(());
        };

        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if self.find_by_email(&email).await?.is_some() {
            log::debug!("Bootstrap admin {email} already exists");
            return Ok(());
        }

        let user = users::ActiveModel {
            email: Set(email),
            name: Set(config
                .admin_name
                .clone()
                .unwrap_or_else(|| "Administrator".to_string())),
            phone: Set(None),
            password_hash: Set(hash_password(password)?),
            role: Set(UserRole::Admin),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Created bootstrap admin {} ({})", user.id, user.email);
        Ok(())
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(user.id, user.role)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id, user.role)?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
            user: UserResponse::from(user),
        })
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.pool)
            .await?)
    }

    async fn get_user_by_id(&self, user_id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn jwt() -> JwtService {
        JwtService::new("auth-service-secret", 3600, 86400)
    }

    fn user(id: i64, password: &str, is_active: bool) -> users::Model {
        users::Model {
            id,
            email: "jane@example.com".to_string(),
            name: "Jane".to_string(),
            phone: None,
            password_hash: hash_password(password).unwrap(),
            role: UserRole::Customer,
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_login_success_issues_tokens() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, "Password123", true)]])
            .into_connection();
        let service = AuthService::new(db, jwt());

        let resp = service
            .login(LoginRequest {
                email: " Jane@Example.com ".to_string(),
                password: "Password123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(resp.user.id, 1);
        assert_eq!(resp.token_type, "Bearer");
        let claims = jwt().verify_access_token(&resp.access_token).unwrap();
        assert_eq!(claims.role, UserRole::Customer);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, "Password123", true)]])
            .into_connection();
        let service = AuthService::new(db, jwt());

        let err = service
            .login(LoginRequest {
                email: "jane@example.com".to_string(),
                password: "Wrong12345".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_login_inactive_user_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, "Password123", false)]])
            .into_connection();
        let service = AuthService::new(db, jwt());

        let err = service
            .login(LoginRequest {
                email: "jane@example.com".to_string(),
                password: "Password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(1, "Password123", true)]])
            .into_connection();
        let service = AuthService::new(db, jwt());

        let err = service
            .register(RegisterRequest {
                email: "jane@example.com".to_string(),
                name: "Jane".to_string(),
                phone: None,
                password: "Password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = AuthService::new(db, jwt());

        let access = jwt().generate_access_token(1, UserRole::Customer).unwrap();
        assert!(service.refresh_token(&access).await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_skipped_without_config() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = AuthService::new(db, jwt());

        service
            .ensure_bootstrap_admin(&BootstrapConfig::default())
            .await
            .unwrap();
    }
}
