use chrono::NaiveDate;
use rand::Rng;
use rand::distributions::Alphanumeric;

pub const INVOICE_PREFIX: &str = "INV-";
pub const MEMO_PREFIX: &str = "MEMO-";
pub const MASTER_PREFIX: &str = "M";
pub const DOCUMENT_NUMBER_WIDTH: usize = 5;

/// 根据上一个单号生成下一个单号，例如 `INV-00041` -> `INV-00042`
///
/// 没有历史单号或者历史单号无法解析时从 1 开始
pub fn next_document_number(prefix: &str, last: Option<&str>, width: usize) -> String {
    let next = last
        .and_then(|n| n.strip_prefix(prefix))
        .and_then(|digits| digits.parse::<u64>().ok())
        .map(|n| n + 1)
        .unwrap_or(1);
    format!("{prefix}{next:0width$}")
}

/// 订单号 `ORD-YYYYMMDD-XXXXXX`
pub fn generate_order_number(date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", date.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_invoice_number() {
        assert_eq!(
            next_document_number(INVOICE_PREFIX, None, DOCUMENT_NUMBER_WIDTH),
            "INV-00001"
        );
        assert_eq!(
            next_document_number(INVOICE_PREFIX, Some("INV-00041"), DOCUMENT_NUMBER_WIDTH),
            "INV-00042"
        );
        // 超过位数后自然变长
        assert_eq!(
            next_document_number(INVOICE_PREFIX, Some("INV-99999"), DOCUMENT_NUMBER_WIDTH),
            "INV-100000"
        );
    }

    #[test]
    fn test_unparseable_last_number_restarts() {
        assert_eq!(
            next_document_number(MEMO_PREFIX, Some("legacy-7"), DOCUMENT_NUMBER_WIDTH),
            "MEMO-00001"
        );
        assert_eq!(
            next_document_number(MASTER_PREFIX, Some("M00009"), DOCUMENT_NUMBER_WIDTH),
            "M00010"
        );
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        let number = generate_order_number(date);
        assert!(number.starts_with("ORD-20240903-"));
        let suffix = &number["ORD-20240903-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }
}
