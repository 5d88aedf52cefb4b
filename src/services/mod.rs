pub mod appointment_service;
pub mod auth_service;
pub mod cart_service;
pub mod chat_service;
pub mod diamond_sync_service;
pub mod inventory_service;
pub mod invoice_service;
pub mod ledger_service;
pub mod master_service;
pub mod memo_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod report_service;
pub mod task_service;
pub mod user_service;
pub mod wishlist_service;

pub use appointment_service::*;
pub use auth_service::*;
pub use cart_service::*;
pub use chat_service::*;
pub use diamond_sync_service::*;
pub use inventory_service::*;
pub use invoice_service::*;
pub use ledger_service::*;
pub use master_service::*;
pub use memo_service::*;
pub use notification_service::*;
pub use order_service::*;
pub use product_service::*;
pub use report_service::*;
pub use task_service::*;
pub use user_service::*;
pub use wishlist_service::*;

/// 模糊搜索用的 ILIKE 模式，空白输入返回 None
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{t}%"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::DatabaseConnection;

    /// mock 连接执行过的全部语句（含 BEGIN/COMMIT），Debug 形式
    pub(crate) fn statement_log(db: DatabaseConnection) -> String {
        format!("{:?}", db.into_transaction_log())
    }

    /// 片段须按顺序出现
    pub(crate) fn assert_in_order(log: &str, fragments: &[&str]) {
        let mut rest = log;
        for fragment in fragments {
            match rest.find(fragment) {
                Some(pos) => rest = &rest[pos + fragment.len()..],
                None => panic!("`{fragment}` not found in order in {log}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(Some("  oval ")), Some("%oval%".to_string()));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
