use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ledger_entry_type")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    #[sea_orm(string_value = "invoice")]
    Invoice,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "credit_note")]
    CreditNote,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

/// 往来账分录，余额 = Σdebit − Σcredit
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "ledgers")]
#[schema(as = LedgerEntry)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub master_id: i64,
    pub entry_type: LedgerEntryType,
    pub reference: Option<String>,
    pub invoice_id: Option<i64>,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub description: Option<String>,
    pub entry_date: NaiveDate,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
