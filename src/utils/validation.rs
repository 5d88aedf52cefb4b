use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    })
}

/// 统一转小写、去空格
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if email.len() > 255 || !email_regex().is_match(email) {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(())
}

/// 必填文本字段
pub fn require_non_empty(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{field} is required")));
    }
    Ok(())
}

pub fn require_non_negative(field: &str, value: i64) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::ValidationError(format!(
            "{field} must not be negative"
        )));
    }
    Ok(())
}

/// 金额越界
pub fn amount_out_of_range() -> AppError {
    AppError::ValidationError("Amount is out of range".to_string())
}

/// 单价 x 数量，溢出时返回校验错误
pub fn line_amount_cents(unit_price_cents: i64, quantity: i32) -> AppResult<i64> {
    unit_price_cents
        .checked_mul(i64::from(quantity))
        .ok_or_else(amount_out_of_range)
}

pub fn sum_cents<I: IntoIterator<Item = i64>>(amounts: I) -> AppResult<i64> {
    amounts
        .into_iter()
        .try_fold(0i64, |acc, amount| acc.checked_add(amount))
        .ok_or_else(amount_out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("a.b+tag@shop.co.uk").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("x@y").is_err());
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn test_required_fields() {
        assert!(require_non_empty("name", "  ").is_err());
        assert!(require_non_empty("name", "Ring").is_ok());
        assert!(require_non_negative("price_cents", -1).is_err());
        assert!(require_non_negative("price_cents", 0).is_ok());
    }

    #[test]
    fn test_amount_overflow_is_validation_error() {
        assert_eq!(line_amount_cents(2_500, 4).unwrap(), 10_000);
        assert!(matches!(
            line_amount_cents(i64::MAX / 2, 4),
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(sum_cents([100, 200, 300]).unwrap(), 600);
        assert!(matches!(
            sum_cents([i64::MAX, 1]),
            Err(AppError::ValidationError(_))
        ));
    }
}
