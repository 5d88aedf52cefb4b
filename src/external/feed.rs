//! 合作方数据源共用的宽松解析

use crate::error::AppResult;
use crate::models::DiamondListing;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 字符串或数字 id，空串视为缺失
pub(crate) fn external_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 数字字段兼容 "1.50" 这样的字符串，无法识别时为 None
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// 编号类字段，数字也按字符串保存
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// 逐条解析一页记录，坏记录记日志后跳过，不影响整次同步
pub(crate) fn parse_records<F>(source: &str, values: Vec<Value>, parse: F) -> Vec<DiamondListing>
where
    F: Fn(Value) -> AppResult<Option<DiamondListing>>,
{
    let mut listings = Vec::with_capacity(values.len());
    let mut skipped = 0usize;

    for value in values {
        match parse(value) {
            Ok(Some(listing)) => listings.push(listing),
            Ok(None) => skipped += 1,
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping malformed {source} record: {e}");
            }
        }
    }

    if skipped > 0 {
        log::warn!("{skipped} {source} records skipped on this page");
    }
    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_external_id() {
        assert_eq!(external_id(Some(&json!(" KY-1 "))), Some("KY-1".to_string()));
        assert_eq!(external_id(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(external_id(Some(&json!(""))), None);
        assert_eq!(external_id(Some(&json!(null))), None);
        assert_eq!(external_id(None), None);
    }
}
