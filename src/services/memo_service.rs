use crate::entities::{InventoryStatus, MemoItemStatus, MemoStatus, masters, memo_items, memos};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::invoice_service::retry_on_collision;
use crate::services::{InventoryService, InvoiceService};
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::BTreeSet;

/// 寄售单（memo）：货品借出看货，退回或转为发票
#[derive(Clone)]
pub struct MemoService {
    pool: DatabaseConnection,
}

/// 根据寄售行状态推导寄售单状态
pub(crate) fn memo_status_for(items: &[memo_items::Model]) -> MemoStatus {
    let on_memo = items
        .iter()
        .filter(|i| i.status == MemoItemStatus::OnMemo)
        .count();
    let sold = items
        .iter()
        .filter(|i| i.status == MemoItemStatus::Sold)
        .count();

    match (on_memo, sold) {
        (0, 0) => MemoStatus::Returned,
        (0, _) => MemoStatus::Invoiced,
        (n, _) if n == items.len() => MemoStatus::Open,
        _ => MemoStatus::PartiallyReturned,
    }
}

impl MemoService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn next_memo_number(&self) -> AppResult<NextNumberResponse> {
        Ok(NextNumberResponse {
            number: Self::next_number_in(&self.pool).await?,
        })
    }

    async fn next_number_in<C: ConnectionTrait>(db: &C) -> AppResult<String> {
        let last = memos::Entity::find()
            .filter(Expr::cust("memo_number ~ '^MEMO-[0-9]+$'"))
            .order_by_desc(Expr::cust("LENGTH(memo_number)"))
            .order_by_desc(memos::Column::MemoNumber)
            .one(db)
            .await?;

        Ok(next_document_number(
            MEMO_PREFIX,
            last.as_ref().map(|m| m.memo_number.as_str()),
            DOCUMENT_NUMBER_WIDTH,
        ))
    }

    pub async fn create(&self, actor_id: i64, request: CreateMemoRequest) -> AppResult<MemoDetail> {
        if request.items.is_empty() {
            return Err(AppError::ValidationError(
                "Memo must have at least one item".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for line in &request.items {
            if !seen.insert(line.inventory_id) {
                return Err(AppError::ValidationError(format!(
                    "Inventory {} appears more than once",
                    line.inventory_id
                )));
            }
            if let Some(price) = line.price_cents {
                require_non_negative("price_cents", price)?;
            }
        }

        let pool = &self.pool;
        let request = &request;

        let detail = retry_on_collision("Memo", AppError::is_unique_violation, move || async move {
            let txn = pool.begin().await?;
            let detail = Self::create_in(&txn, request, actor_id).await?;
            txn.commit().await?;
            Ok::<_, AppError>(detail)
        })
        .await?;

        log::info!(
            "Memo {} issued to master {} with {} items",
            detail.memo.memo_number,
            detail.memo.master_id,
            detail.items.len()
        );
        Ok(detail)
    }

    async fn create_in<C: ConnectionTrait>(
        db: &C,
        request: &CreateMemoRequest,
        actor_id: i64,
    ) -> AppResult<MemoDetail> {
        let master = masters::Entity::find_by_id(request.master_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Master not found".to_string()))?;
        if !master.is_active {
            return Err(AppError::ValidationError(format!(
                "Master {} is inactive",
                master.code
            )));
        }

        let mut stocks = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let stock = InventoryService::lock_in(db, line.inventory_id).await?;
            if !matches!(stock.status, InventoryStatus::Available | InventoryStatus::Hold) {
                return Err(AppError::Conflict(format!(
                    "Inventory {} is {} and cannot go on memo",
                    stock.stock_id, stock.status
                )));
            }
            let price = line.price_cents.unwrap_or(stock.sale_price_cents);
            stocks.push((stock, price));
        }

        let total_cents = sum_cents(stocks.iter().map(|(_, price)| *price))?;
        let memo_number = Self::next_number_in(db).await?;
        let memo = memos::ActiveModel {
            memo_number: Set(memo_number.clone()),
            master_id: Set(master.id),
            issue_date: Set(request
                .issue_date
                .unwrap_or_else(|| Utc::now().date_naive())),
            due_date: Set(request.due_date),
            status: Set(MemoStatus::Open),
            total_cents: Set(total_cents),
            notes: Set(request.notes.clone()),
            created_by: Set(Some(actor_id)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let mut items = Vec::with_capacity(stocks.len());
        for (stock, price) in stocks {
            let item = memo_items::ActiveModel {
                memo_id: Set(memo.id),
                inventory_id: Set(stock.id),
                price_cents: Set(price),
                status: Set(MemoItemStatus::OnMemo),
                ..Default::default()
            }
            .insert(db)
            .await?;
            items.push(item);

            InventoryService::transition(
                db,
                stock,
                InventoryStatus::Memo,
                Some(memo_number.clone()),
                None,
                Some(actor_id),
            )
            .await?;
        }

        Ok(MemoDetail { memo, items })
    }

    /// 退回部分或全部寄售行，货品回到 AVAILABLE
    pub async fn return_items(
        &self,
        actor_id: i64,
        memo_id: i64,
        request: ReturnMemoItemsRequest,
    ) -> AppResult<MemoDetail> {
        if request.item_ids.is_empty() {
            return Err(AppError::ValidationError(
                "item_ids must not be empty".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;
        let memo = Self::lock_in(&txn, memo_id).await?;
        if memo.status.is_closed() {
            return Err(AppError::Conflict(format!(
                "Memo {} is already closed",
                memo.memo_number
            )));
        }

        let items = Self::items_of(&txn, memo.id).await?;
        let wanted: BTreeSet<i64> = request.item_ids.iter().copied().collect();

        for id in &wanted {
            let item = items
                .iter()
                .find(|i| i.id == *id)
                .ok_or_else(|| AppError::NotFound(format!("Memo item {id} not found")))?;
            if item.status != MemoItemStatus::OnMemo {
                return Err(AppError::Conflict(format!(
                    "Memo item {id} is no longer on memo"
                )));
            }
        }

        let reference = format!("RETURN {}", memo.memo_number);
        for item in items.into_iter().filter(|i| wanted.contains(&i.id)) {
            let stock = InventoryService::lock_in(&txn, item.inventory_id).await?;
            InventoryService::transition(
                &txn,
                stock,
                InventoryStatus::Available,
                Some(reference.clone()),
                request.note.clone(),
                Some(actor_id),
            )
            .await?;

            let mut active = item.into_active_model();
            active.status = Set(MemoItemStatus::Returned);
            active.returned_at = Set(Some(Utc::now()));
            active.update(&txn).await?;
        }

        let memo = Self::refresh_status(&txn, memo.id).await?;
        let items = Self::items_of(&txn, memo.id).await?;
        txn.commit().await?;

        log::info!(
            "{} items returned on memo {} ({:?})",
            wanted.len(),
            memo.memo_number,
            memo.status
        );
        Ok(MemoDetail { memo, items })
    }

    /// 剩余在寄售中的货品全部开票
    pub async fn convert_to_invoice(
        &self,
        actor_id: i64,
        memo_id: i64,
        request: ConvertMemoRequest,
    ) -> AppResult<InvoiceDetail> {
        let pool = &self.pool;
        let request = &request;

        let detail = retry_on_collision("Invoice", AppError::is_unique_violation, move || async move {
            let txn = pool.begin().await?;
            let detail = Self::convert_in(&txn, actor_id, memo_id, request).await?;
            txn.commit().await?;
            Ok::<_, AppError>(detail)
        })
        .await?;

        log::info!(
            "Memo {memo_id} converted to invoice {}",
            detail.invoice.invoice_number
        );
        Ok(detail)
    }

    async fn convert_in<C: ConnectionTrait>(
        db: &C,
        actor_id: i64,
        memo_id: i64,
        request: &ConvertMemoRequest,
    ) -> AppResult<InvoiceDetail> {
        let memo = Self::lock_in(db, memo_id).await?;
        if memo.status.is_closed() {
            return Err(AppError::Conflict(format!(
                "Memo {} is already closed",
                memo.memo_number
            )));
        }

        let on_memo: Vec<memo_items::Model> = Self::items_of(db, memo.id)
            .await?
            .into_iter()
            .filter(|i| i.status == MemoItemStatus::OnMemo)
            .collect();
        if on_memo.is_empty() {
            return Err(AppError::Conflict(
                "Memo has no items left to invoice".to_string(),
            ));
        }

        let invoice_request = CreateInvoiceRequest {
            master_id: memo.master_id,
            issue_date: None,
            due_date: request.due_date,
            items: on_memo
                .iter()
                .map(|i| InvoiceLineRequest {
                    inventory_id: Some(i.inventory_id),
                    description: None,
                    quantity: Some(1),
                    unit_price_cents: Some(i.price_cents),
                })
                .collect(),
            discount_cents: request.discount_cents,
            tax_cents: request.tax_cents,
            notes: request
                .notes
                .clone()
                .or_else(|| Some(format!("Converted from {}", memo.memo_number))),
        };

        let detail = InvoiceService::create_in(db, &invoice_request, Some(memo.id), actor_id).await?;

        for item in on_memo {
            let mut active = item.into_active_model();
            active.status = Set(MemoItemStatus::Sold);
            active.update(db).await?;
        }
        Self::refresh_status(db, memo.id).await?;

        Ok(detail)
    }

    /// 按寄售行重新计算寄售单状态
    pub(crate) async fn refresh_status<C: ConnectionTrait>(
        db: &C,
        memo_id: i64,
    ) -> AppResult<memos::Model> {
        let memo = Self::lock_in(db, memo_id).await?;
        let items = Self::items_of(db, memo.id).await?;
        let status = memo_status_for(&items);

        if status == memo.status {
            return Ok(memo);
        }

        let mut active = memo.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }

    pub async fn list(&self, query: MemoQuery) -> AppResult<PaginatedResponse<memos::Model>> {
        let params = query.pagination();

        let mut select = memos::Entity::find();
        if let Some(status) = query.status {
            select = select.filter(memos::Column::Status.eq(status));
        }
        if let Some(master_id) = query.master_id {
            select = select.filter(memos::Column::MasterId.eq(master_id));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(memos::Column::IssueDate)
            .order_by_desc(memos::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, memo_id: i64) -> AppResult<MemoDetail> {
        let memo = memos::Entity::find_by_id(memo_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Memo not found".to_string()))?;
        let items = Self::items_of(&self.pool, memo.id).await?;
        Ok(MemoDetail { memo, items })
    }

    async fn lock_in<C: ConnectionTrait>(db: &C, memo_id: i64) -> AppResult<memos::Model> {
        memos::Entity::find_by_id(memo_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Memo not found".to_string()))
    }

    async fn items_of<C: ConnectionTrait>(db: &C, memo_id: i64) -> AppResult<Vec<memo_items::Model>> {
        Ok(memo_items::Entity::find()
            .filter(memo_items::Column::MemoId.eq(memo_id))
            .order_by_asc(memo_items::Column::Id)
            .all(db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::InvoiceStatus;
    use crate::services::inventory_service::tests::{history, item};
    use crate::services::invoice_service::tests::{invoice, invoice_item};
    use crate::services::ledger_service::tests::entry;
    use crate::services::master_service::tests::master;
    use crate::services::test_support::{assert_in_order, statement_log};
    use chrono::NaiveDate;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn memo_item(id: i64, status: MemoItemStatus) -> memo_items::Model {
        memo_items::Model {
            id,
            memo_id: 1,
            inventory_id: id,
            price_cents: 500_000,
            status,
            returned_at: None,
            created_at: Utc::now(),
        }
    }

    fn memo(status: MemoStatus) -> memos::Model {
        memos::Model {
            id: 1,
            memo_number: "MEMO-00001".to_string(),
            master_id: 1,
            issue_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            due_date: None,
            status,
            total_cents: 1_000_000,
            notes: None,
            created_by: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_memo_status_derivation() {
        use MemoItemStatus::*;
        assert_eq!(
            memo_status_for(&[memo_item(1, OnMemo), memo_item(2, OnMemo)]),
            MemoStatus::Open
        );
        assert_eq!(
            memo_status_for(&[memo_item(1, Returned), memo_item(2, OnMemo)]),
            MemoStatus::PartiallyReturned
        );
        assert_eq!(
            memo_status_for(&[memo_item(1, Returned), memo_item(2, Returned)]),
            MemoStatus::Returned
        );
        assert_eq!(
            memo_status_for(&[memo_item(1, Returned), memo_item(2, Sold)]),
            MemoStatus::Invoiced
        );
    }

    #[tokio::test]
    async fn test_sold_item_cannot_go_on_memo() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![item(3, InventoryStatus::Sold)]])
            .into_connection();

        let request = CreateMemoRequest {
            master_id: 1,
            issue_date: None,
            due_date: None,
            items: vec![MemoLineRequest {
                inventory_id: 3,
                price_cents: None,
            }],
            notes: None,
        };
        let err = MemoService::create_in(&db, &request, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_return_on_closed_memo_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![memo(MemoStatus::Invoiced)]])
            .into_connection();
        let service = MemoService::new(db);

        let err = service
            .return_items(
                1,
                1,
                ReturnMemoItemsRequest {
                    item_ids: vec![1],
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_return_item_already_returned() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![memo(MemoStatus::PartiallyReturned)]])
            .append_query_results([vec![
                memo_item(1, MemoItemStatus::Returned),
                memo_item(2, MemoItemStatus::OnMemo),
            ]])
            .into_connection();
        let service = MemoService::new(db);

        let err = service
            .return_items(
                1,
                1,
                ReturnMemoItemsRequest {
                    item_ids: vec![1],
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_moves_stock_onto_memo() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![item(3, InventoryStatus::Available)]])
            .append_query_results([vec![item(4, InventoryStatus::Hold)]])
            .append_query_results([Vec::<memos::Model>::new()])
            .append_query_results([vec![memo(MemoStatus::Open)]])
            .append_query_results([vec![memo_item(3, MemoItemStatus::OnMemo)]])
            .append_query_results([vec![item(3, InventoryStatus::Memo)]])
            .append_query_results([vec![history(3)]])
            .append_query_results([vec![memo_item(4, MemoItemStatus::OnMemo)]])
            .append_query_results([vec![item(4, InventoryStatus::Memo)]])
            .append_query_results([vec![history(4)]])
            .into_connection();
        let service = MemoService::new(db);

        let detail = service
            .create(
                1,
                CreateMemoRequest {
                    master_id: 1,
                    issue_date: None,
                    due_date: None,
                    items: vec![
                        MemoLineRequest {
                            inventory_id: 3,
                            price_cents: None,
                        },
                        MemoLineRequest {
                            inventory_id: 4,
                            price_cents: Some(700_000),
                        },
                    ],
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(detail.memo.memo_number, "MEMO-00001");
        assert_eq!(detail.items.len(), 2);

        let log = statement_log(service.pool);
        assert_in_order(
            &log,
            &[
                "BEGIN",
                "FOR UPDATE",
                "FOR UPDATE",
                r#"INSERT INTO \"memos\""#,
                r#"INSERT INTO \"memo_items\""#,
                r#"UPDATE \"inventory\""#,
                r#"INSERT INTO \"inventory_history\""#,
                r#"INSERT INTO \"memo_items\""#,
                r#"UPDATE \"inventory\""#,
                r#"INSERT INTO \"inventory_history\""#,
                "COMMIT",
            ],
        );
        // 650000 取库存售价 + 700000 指定价
        assert!(log.contains("BigInt(Some(1350000))"));
        assert!(log.contains(r#""MEMO""#));
    }

    #[tokio::test]
    async fn test_convert_invoices_remaining_items() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![memo(MemoStatus::PartiallyReturned)]])
            .append_query_results([vec![
                memo_item(7, MemoItemStatus::OnMemo),
                memo_item(8, MemoItemStatus::Returned),
            ]])
            // 开票
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![item(7, InventoryStatus::Memo)]])
            .append_query_results([Vec::<crate::entities::invoices::Model>::new()])
            .append_query_results([vec![invoice(InvoiceStatus::Unpaid, 500_000, 0)]])
            .append_query_results([vec![invoice_item(1, Some(7), 500_000)]])
            .append_query_results([vec![item(7, InventoryStatus::Sold)]])
            .append_query_results([vec![history(7)]])
            .append_query_results([vec![entry(1, 500_000, 0)]])
            // 关闭寄售行并刷新寄售单
            .append_query_results([vec![memo_item(7, MemoItemStatus::Sold)]])
            .append_query_results([vec![memo(MemoStatus::PartiallyReturned)]])
            .append_query_results([vec![
                memo_item(7, MemoItemStatus::Sold),
                memo_item(8, MemoItemStatus::Returned),
            ]])
            .append_query_results([vec![memo(MemoStatus::Invoiced)]])
            .into_connection();
        let service = MemoService::new(db);

        let detail = service
            .convert_to_invoice(1, 1, ConvertMemoRequest::default())
            .await
            .unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.invoice.total_cents, 500_000);

        let log = statement_log(service.pool);
        assert_in_order(
            &log,
            &[
                "BEGIN",
                r#"FROM \"memos\""#,
                r#"FROM \"memo_items\""#,
                r#"INSERT INTO \"invoices\""#,
                r#"UPDATE \"inventory\""#,
                r#"INSERT INTO \"ledgers\""#,
                r#"UPDATE \"memo_items\""#,
                r#"UPDATE \"memos\""#,
                "COMMIT",
            ],
        );
        assert!(log.contains("Converted from MEMO-00001"));
        assert!(log.contains(r#""invoiced""#));
    }
}
