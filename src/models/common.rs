use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// 统一错误响应体
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: String) -> Self {
        Self {
            success: false,
            error: ApiError {
                code: code.to_string(),
                message,
            },
        }
    }
}

/// 闭区间日期过滤
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateRangeQuery {
    pub fn validate(&self) -> AppResult<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err(AppError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_validation() {
        let ok = DateRangeQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
        };
        assert!(ok.validate().is_ok());

        let inverted = DateRangeQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        assert!(inverted.validate().is_err());
        assert!(DateRangeQuery::default().validate().is_ok());
    }

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "Order not found".into()))
            .unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Order not found");
    }
}
