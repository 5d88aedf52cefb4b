use chrono::NaiveDate;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::PaginationParams;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesReportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromQueryResult, PartialEq)]
pub struct EmployeeSales {
    pub employee_id: Option<i64>,
    pub employee_name: Option<String>,
    pub invoice_count: i64,
    pub sales_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromQueryResult, PartialEq)]
pub struct DailySales {
    pub date: NaiveDate,
    pub invoice_count: i64,
    pub sales_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub invoice_count: i64,
    pub gross_sales_cents: i64,
    pub collected_cents: i64,
    pub outstanding_cents: i64,
    pub by_employee: Vec<EmployeeSales>,
    pub by_day: Vec<DailySales>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GeneratePerformanceReportRequest {
    pub employee_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PerformanceReportQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub employee_id: Option<i64>,
}

impl PerformanceReportQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}
