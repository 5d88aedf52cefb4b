use crate::entities::{InvoiceStatus, invoice_items, invoices};
use crate::error::AppResult;
use crate::utils::{PaginationParams, amount_out_of_range, sum_cents};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 发票行：引用库存（inventory_id）或自由文本行
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InvoiceLineRequest {
    pub inventory_id: Option<i64>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    /// 库存行为空时取库存售价
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub master_id: i64,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<InvoiceLineRequest>,
    pub discount_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct InvoiceQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<InvoiceStatus>,
    pub master_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl InvoiceQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordPaymentRequest {
    pub amount_cents: i64,
    pub payment_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct VoidInvoiceRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: invoices::Model,
    pub items: Vec<invoice_items::Model>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NextNumberResponse {
    pub number: String,
}

/// 发票金额计算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl InvoiceTotals {
    pub fn compute(line_amounts: &[i64], discount_cents: i64, tax_cents: i64) -> AppResult<Self> {
        let subtotal_cents = sum_cents(line_amounts.iter().copied())?;
        let total_cents = subtotal_cents
            .checked_sub(discount_cents)
            .and_then(|v| v.checked_add(tax_cents))
            .ok_or_else(amount_out_of_range)?;
        Ok(Self {
            subtotal_cents,
            discount_cents,
            tax_cents,
            total_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_totals() {
        let t = InvoiceTotals::compute(&[500_000, 120_000], 20_000, 48_000).unwrap();
        assert_eq!(t.subtotal_cents, 620_000);
        assert_eq!(t.total_cents, 648_000);

        let empty = InvoiceTotals::compute(&[], 0, 0).unwrap();
        assert_eq!(empty.total_cents, 0);
    }

    #[test]
    fn test_invoice_totals_overflow() {
        assert!(InvoiceTotals::compute(&[i64::MAX - 10, 20], 0, 0).is_err());
        assert!(InvoiceTotals::compute(&[i64::MAX - 10], 0, 20).is_err());
    }
}
