use crate::models::ErrorResponse;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Stripe error: {0}")]
    StripeError(#[from] stripe::StripeError),
}

impl AppError {
    /// 唯一约束冲突（例如重复的 email / stock_id）
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(err)
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        )
    }

    /// 仍被其他记录引用（外键约束）
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(err)
                if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
        )
    }

    fn status_and_code(&self) -> (actix_web::http::StatusCode, &'static str) {
        use actix_web::http::StatusCode;
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::AuthError(_) | AppError::JwtError(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_ERROR")
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::ExternalApiError(_) | AppError::ReqwestError(_) | AppError::StripeError(_) => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_API_ERROR")
            }
            AppError::DatabaseError(_)
                if self.is_unique_violation() || self.is_foreign_key_violation() =>
            {
                (StatusCode::CONFLICT, "CONFLICT")
            }
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.status_and_code().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code) = self.status_and_code();
        let message = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                msg.clone()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                "Invalid token".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::Conflict(msg) => {
                log::warn!("Conflict: {msg}");
                msg.clone()
            }
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                "Forbidden".to_string()
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                msg.clone()
            }
            AppError::ReqwestError(err) => {
                log::error!("External request failed: {err}");
                "External service unavailable".to_string()
            }
            AppError::StripeError(err) => {
                log::error!("Stripe error: {err}");
                "Payment provider error".to_string()
            }
            AppError::DatabaseError(err) if self.is_unique_violation() => {
                log::warn!("Unique constraint violation: {err}");
                "Record already exists".to_string()
            }
            AppError::DatabaseError(err) if self.is_foreign_key_violation() => {
                log::warn!("Foreign key violation: {err}");
                "Record is still referenced by other records".to_string()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(status_code).json(ErrorResponse::new(error_code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ValidationError("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AuthError("nope".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ExternalApiError("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::InternalError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_plain_db_error_is_not_unique_violation() {
        let err = AppError::DatabaseError(DbErr::Custom("whatever".into()));
        assert!(!err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_shape() {
        let resp = AppError::ValidationError("Missing field".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
