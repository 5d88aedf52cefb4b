use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "invoice_status")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "partially_paid")]
    PartiallyPaid,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "void")]
    Void,
}

impl InvoiceStatus {
    /// 根据已付金额推导状态
    pub fn from_amounts(paid_cents: i64, total_cents: i64) -> Self {
        if paid_cents <= 0 {
            InvoiceStatus::Unpaid
        } else if paid_cents < total_cents {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Paid
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "invoices")]
#[schema(as = Invoice)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub invoice_number: String,
    pub master_id: i64,
    pub memo_id: Option<i64>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_amounts() {
        assert_eq!(InvoiceStatus::from_amounts(0, 1000), InvoiceStatus::Unpaid);
        assert_eq!(
            InvoiceStatus::from_amounts(400, 1000),
            InvoiceStatus::PartiallyPaid
        );
        assert_eq!(InvoiceStatus::from_amounts(1000, 1000), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_amounts(1200, 1000), InvoiceStatus::Paid);
    }
}
