use crate::entities::{LedgerEntryType, ledgers, masters};
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
};

/// 内部记账参数，金额为正数，借贷方向由 entry_type 决定
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub master_id: i64,
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub invoice_id: Option<i64>,
    pub description: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct TotalsRow {
    debit_cents: i64,
    credit_cents: i64,
}

const BALANCES_SQL: &str = r#"
SELECT m.id AS master_id,
       m.code AS master_code,
       m.name AS master_name,
       COALESCE(SUM(l.debit_cents), 0)::BIGINT AS debit_cents,
       COALESCE(SUM(l.credit_cents), 0)::BIGINT AS credit_cents,
       (COALESCE(SUM(l.debit_cents), 0) - COALESCE(SUM(l.credit_cents), 0))::BIGINT AS balance_cents
FROM masters m
JOIN ledgers l ON l.master_id = m.id
GROUP BY m.id, m.code, m.name
HAVING COALESCE(SUM(l.debit_cents), 0) <> COALESCE(SUM(l.credit_cents), 0)
ORDER BY balance_cents DESC, m.code
"#;

#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 写一条分录，供发票、收款、作废在同一事务中调用
    pub async fn post<C: ConnectionTrait>(db: &C, entry: NewLedgerEntry) -> AppResult<ledgers::Model> {
        let (debit_cents, credit_cents) = split_amount(entry.entry_type, entry.amount_cents);

        let model = ledgers::ActiveModel {
            master_id: Set(entry.master_id),
            entry_type: Set(entry.entry_type),
            reference: Set(entry.reference),
            invoice_id: Set(entry.invoice_id),
            debit_cents: Set(debit_cents),
            credit_cents: Set(credit_cents),
            description: Set(entry.description),
            entry_date: Set(entry.entry_date),
            created_by: Set(entry.created_by),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(model)
    }

    pub async fn entries(&self, master_id: i64, range: DateRangeQuery) -> AppResult<LedgerStatement> {
        range.validate()?;
        self.ensure_master(master_id).await?;

        let mut select = ledgers::Entity::find().filter(ledgers::Column::MasterId.eq(master_id));
        if let Some(start) = range.start_date {
            select = select.filter(ledgers::Column::EntryDate.gte(start));
        }
        if let Some(end) = range.end_date {
            select = select.filter(ledgers::Column::EntryDate.lte(end));
        }

        let entries = select
            .order_by_asc(ledgers::Column::EntryDate)
            .order_by_asc(ledgers::Column::Id)
            .all(&self.pool)
            .await?;

        let total_debit_cents = entries.iter().map(|e| e.debit_cents).sum();
        let total_credit_cents = entries.iter().map(|e| e.credit_cents).sum();

        Ok(LedgerStatement {
            master_id,
            entries,
            total_debit_cents,
            total_credit_cents,
        })
    }

    /// 手工分录；发票分录只能由开票产生
    pub async fn manual_entry(
        &self,
        actor_id: i64,
        master_id: i64,
        request: ManualLedgerEntryRequest,
    ) -> AppResult<ledgers::Model> {
        match request.entry_type {
            LedgerEntryType::Invoice => {
                return Err(AppError::ValidationError(
                    "Invoice entries are created by invoicing".to_string(),
                ));
            }
            LedgerEntryType::Payment | LedgerEntryType::CreditNote if request.amount_cents <= 0 => {
                return Err(AppError::ValidationError(
                    "amount_cents must be greater than 0".to_string(),
                ));
            }
            LedgerEntryType::Adjustment if request.amount_cents == 0 => {
                return Err(AppError::ValidationError(
                    "amount_cents must not be 0".to_string(),
                ));
            }
            _ => {}
        }

        self.ensure_master(master_id).await?;

        let entry = Self::post(
            &self.pool,
            NewLedgerEntry {
                master_id,
                entry_type: request.entry_type,
                amount_cents: request.amount_cents,
                entry_date: request
                    .entry_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
                reference: request.reference,
                invoice_id: None,
                description: request.description,
                created_by: Some(actor_id),
            },
        )
        .await?;

        log::info!(
            "Manual ledger entry {} for master {master_id} by {actor_id}",
            entry.id
        );
        Ok(entry)
    }

    /// 未结余额 = Σ借方 − Σ贷方
    pub async fn outstanding(&self, master_id: i64) -> AppResult<OutstandingBalance> {
        self.ensure_master(master_id).await?;

        let totals = ledgers::Entity::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(SUM(debit_cents), 0)::BIGINT"), "debit_cents")
            .column_as(Expr::cust("COALESCE(SUM(credit_cents), 0)::BIGINT"), "credit_cents")
            .filter(ledgers::Column::MasterId.eq(master_id))
            .into_model::<TotalsRow>()
            .one(&self.pool)
            .await?;

        let balance_cents = totals
            .map(|t| t.debit_cents - t.credit_cents)
            .unwrap_or(0);

        Ok(OutstandingBalance {
            master_id,
            balance_cents,
        })
    }

    /// 所有余额不为 0 的档案
    pub async fn summary(&self) -> AppResult<Vec<MasterBalance>> {
        let rows = MasterBalance::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            BALANCES_SQL,
        ))
        .all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn ensure_master(&self, master_id: i64) -> AppResult<()> {
        masters::Entity::find_by_id(master_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Master not found".to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::master_service::tests::master;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    pub(crate) fn entry(id: i64, debit: i64, credit: i64) -> ledgers::Model {
        ledgers::Model {
            id,
            master_id: 1,
            entry_type: if debit > 0 {
                LedgerEntryType::Invoice
            } else {
                LedgerEntryType::Payment
            },
            reference: None,
            invoice_id: None,
            debit_cents: debit,
            credit_cents: credit,
            description: None,
            entry_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_manual_invoice_entry_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = LedgerService::new(db);

        let err = service
            .manual_entry(
                1,
                1,
                ManualLedgerEntryRequest {
                    entry_type: LedgerEntryType::Invoice,
                    amount_cents: 100,
                    entry_date: None,
                    reference: None,
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_statement_totals() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![entry(1, 10_000, 0), entry(2, 0, 4_000)]])
            .into_connection();
        let service = LedgerService::new(db);

        let statement = service.entries(1, DateRangeQuery::default()).await.unwrap();
        assert_eq!(statement.total_debit_cents, 10_000);
        assert_eq!(statement.total_credit_cents, 4_000);
        assert_eq!(statement.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_outstanding_balance() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![BTreeMap::from([
                ("debit_cents", Value::BigInt(Some(10_000))),
                ("credit_cents", Value::BigInt(Some(2_500))),
            ])]])
            .into_connection();
        let service = LedgerService::new(db);

        let balance = service.outstanding(1).await.unwrap();
        assert_eq!(balance.balance_cents, 7_500);
    }
}
