use crate::entities::{LedgerEntryType, ledgers};
use chrono::NaiveDate;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ManualLedgerEntryRequest {
    /// payment / credit_note / adjustment
    pub entry_type: LedgerEntryType,
    /// payment、credit_note 取正数；adjustment 正数记借方，负数记贷方
    pub amount_cents: i64,
    pub entry_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerStatement {
    pub master_id: i64,
    pub entries: Vec<ledgers::Model>,
    pub total_debit_cents: i64,
    pub total_credit_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OutstandingBalance {
    pub master_id: i64,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromQueryResult, PartialEq)]
pub struct MasterBalance {
    pub master_id: i64,
    pub master_code: String,
    pub master_name: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub balance_cents: i64,
}

/// 借贷方向
pub fn split_amount(entry_type: LedgerEntryType, amount_cents: i64) -> (i64, i64) {
    match entry_type {
        LedgerEntryType::Invoice => (amount_cents, 0),
        LedgerEntryType::Payment | LedgerEntryType::CreditNote => (0, amount_cents),
        LedgerEntryType::Adjustment if amount_cents >= 0 => (amount_cents, 0),
        LedgerEntryType::Adjustment => (0, -amount_cents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_amount() {
        assert_eq!(split_amount(LedgerEntryType::Invoice, 900), (900, 0));
        assert_eq!(split_amount(LedgerEntryType::Payment, 300), (0, 300));
        assert_eq!(split_amount(LedgerEntryType::CreditNote, 50), (0, 50));
        assert_eq!(split_amount(LedgerEntryType::Adjustment, 25), (25, 0));
        assert_eq!(split_amount(LedgerEntryType::Adjustment, -25), (0, 25));
    }
}
