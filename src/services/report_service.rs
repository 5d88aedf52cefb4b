use crate::entities::{performance_reports, users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::PaginatedResponse;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};

const SALES_TOTALS_SQL: &str = r#"
SELECT COUNT(*)::BIGINT AS invoice_count,
       COALESCE(SUM(total_cents), 0)::BIGINT AS gross_sales_cents,
       COALESCE(SUM(paid_cents), 0)::BIGINT AS collected_cents
FROM invoices
WHERE status <> 'void' AND issue_date BETWEEN $1 AND $2
"#;

const SALES_BY_EMPLOYEE_SQL: &str = r#"
SELECT i.created_by AS employee_id,
       u.name AS employee_name,
       COUNT(*)::BIGINT AS invoice_count,
       COALESCE(SUM(i.total_cents), 0)::BIGINT AS sales_cents
FROM invoices i
LEFT JOIN users u ON u.id = i.created_by
WHERE i.status <> 'void' AND i.issue_date BETWEEN $1 AND $2
GROUP BY i.created_by, u.name
ORDER BY sales_cents DESC
"#;

const SALES_BY_DAY_SQL: &str = r#"
SELECT issue_date AS date,
       COUNT(*)::BIGINT AS invoice_count,
       COALESCE(SUM(total_cents), 0)::BIGINT AS sales_cents
FROM invoices
WHERE status <> 'void' AND issue_date BETWEEN $1 AND $2
GROUP BY issue_date
ORDER BY issue_date
"#;

const PERFORMANCE_SQL: &str = r#"
SELECT
  (SELECT COUNT(*) FROM invoices
    WHERE created_by = $1 AND status <> 'void' AND issue_date BETWEEN $2 AND $3)::BIGINT AS invoices_count,
  (SELECT COALESCE(SUM(total_cents), 0) FROM invoices
    WHERE created_by = $1 AND status <> 'void' AND issue_date BETWEEN $2 AND $3)::BIGINT AS sales_cents,
  (SELECT COUNT(*) FROM memos
    WHERE created_by = $1 AND issue_date BETWEEN $2 AND $3)::BIGINT AS memos_count,
  (SELECT COUNT(*) FROM tasks t
    JOIN task_assignments a ON a.task_id = t.id
    WHERE a.user_id = $1 AND t.status = 'done'
      AND t.updated_at::date BETWEEN $2 AND $3)::BIGINT AS tasks_completed
"#;

#[derive(Debug, FromQueryResult)]
struct SalesTotalsRow {
    invoice_count: i64,
    gross_sales_cents: i64,
    collected_cents: i64,
}

#[derive(Debug, FromQueryResult)]
struct PerformanceRow {
    invoices_count: i64,
    sales_cents: i64,
    memos_count: i64,
    tasks_completed: i64,
}

fn check_period(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if start > end {
        return Err(AppError::ValidationError(
            "start date must not be after end date".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReportService {
    pool: DatabaseConnection,
}

impl ReportService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 销售报表，作废发票不计入
    pub async fn sales_report(&self, query: SalesReportQuery) -> AppResult<SalesReport> {
        check_period(query.start_date, query.end_date)?;
        let values = [query.start_date.into(), query.end_date.into()];

        let totals = SalesTotalsRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SALES_TOTALS_SQL,
            values.clone(),
        ))
        .one(&self.pool)
        .await?
        .unwrap_or(SalesTotalsRow {
            invoice_count: 0,
            gross_sales_cents: 0,
            collected_cents: 0,
        });

        let by_employee = EmployeeSales::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SALES_BY_EMPLOYEE_SQL,
            values.clone(),
        ))
        .all(&self.pool)
        .await?;

        let by_day = DailySales::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SALES_BY_DAY_SQL,
            values,
        ))
        .all(&self.pool)
        .await?;

        Ok(SalesReport {
            start_date: query.start_date,
            end_date: query.end_date,
            invoice_count: totals.invoice_count,
            gross_sales_cents: totals.gross_sales_cents,
            collected_cents: totals.collected_cents,
            outstanding_cents: totals.gross_sales_cents - totals.collected_cents,
            by_employee,
            by_day,
        })
    }

    /// 生成并保存员工绩效报表
    pub async fn generate_performance(
        &self,
        actor_id: i64,
        request: GeneratePerformanceReportRequest,
    ) -> AppResult<performance_reports::Model> {
        check_period(request.period_start, request.period_end)?;

        let employee = users::Entity::find_by_id(request.employee_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))?;
        if !employee.role.is_staff() {
            return Err(AppError::ValidationError(
                "Performance reports are only available for staff".to_string(),
            ));
        }

        let row = PerformanceRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            PERFORMANCE_SQL,
            [
                employee.id.into(),
                request.period_start.into(),
                request.period_end.into(),
            ],
        ))
        .one(&self.pool)
        .await?
        .ok_or_else(|| AppError::InternalError("Performance query returned no row".to_string()))?;

        let report = performance_reports::ActiveModel {
            employee_id: Set(employee.id),
            period_start: Set(request.period_start),
            period_end: Set(request.period_end),
            invoices_count: Set(row.invoices_count),
            sales_cents: Set(row.sales_cents),
            memos_count: Set(row.memos_count),
            tasks_completed: Set(row.tasks_completed),
            notes: Set(request.notes),
            generated_by: Set(Some(actor_id)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Performance report {} generated for employee {} ({} - {})",
            report.id,
            employee.id,
            report.period_start,
            report.period_end
        );
        Ok(report)
    }

    pub async fn list_performance(
        &self,
        query: PerformanceReportQuery,
    ) -> AppResult<PaginatedResponse<performance_reports::Model>> {
        let params = query.pagination();

        let mut select = performance_reports::Entity::find();
        if let Some(employee_id) = query.employee_id {
            select = select.filter(performance_reports::Column::EmployeeId.eq(employee_id));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(performance_reports::Column::CreatedAt)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    #[tokio::test]
    async fn test_inverted_period_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = ReportService::new(db);

        let err = service
            .sales_report(SalesReportQuery {
                start_date: date(10),
                end_date: date(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_sales_report_outstanding() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([
                ("invoice_count", Value::BigInt(Some(3))),
                ("gross_sales_cents", Value::BigInt(Some(900_000))),
                ("collected_cents", Value::BigInt(Some(400_000))),
            ])]])
            .append_query_results([vec![BTreeMap::from([
                ("employee_id", Value::BigInt(Some(2))),
                ("employee_name", Value::String(Some(Box::new("Sam".to_string())))),
                ("invoice_count", Value::BigInt(Some(3))),
                ("sales_cents", Value::BigInt(Some(900_000))),
            ])]])
            .append_query_results([vec![BTreeMap::from([
                ("date", Value::ChronoDate(Some(Box::new(date(2))))),
                ("invoice_count", Value::BigInt(Some(3))),
                ("sales_cents", Value::BigInt(Some(900_000))),
            ])]])
            .into_connection();
        let service = ReportService::new(db);

        let report = service
            .sales_report(SalesReportQuery {
                start_date: date(1),
                end_date: date(30),
            })
            .await
            .unwrap();
        assert_eq!(report.invoice_count, 3);
        assert_eq!(report.outstanding_cents, 500_000);
        assert_eq!(report.by_employee[0].employee_name.as_deref(), Some("Sam"));
        assert_eq!(report.by_day[0].date, date(2));
    }
}
