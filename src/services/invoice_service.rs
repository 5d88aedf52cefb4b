use crate::entities::{
    InventoryStatus, InvoiceStatus, LedgerEntryType, MemoItemStatus, invoice_items, invoices,
    masters, memo_items,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{InventoryService, LedgerService, MemoService, NewLedgerEntry};
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::BTreeSet;
use std::future::Future;

/// 单号冲突时的最大尝试次数
const MAX_NUMBER_ATTEMPTS: usize = 3;

/// 自由文本行数量上限
const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Clone)]
pub struct InvoiceService {
    pool: DatabaseConnection,
}

/// 校验后的发票行
struct PreparedLine {
    inventory: Option<crate::entities::inventory::Model>,
    description: String,
    quantity: i32,
    unit_price_cents: i64,
}

impl PreparedLine {
    fn amount_cents(&self) -> AppResult<i64> {
        line_amount_cents(self.unit_price_cents, self.quantity)
    }
}

fn describe_inventory(item: &crate::entities::inventory::Model) -> String {
    format!(
        "{} {:.2}ct {} {} ({})",
        item.shape, item.carat, item.color, item.clarity, item.stock_id
    )
}

/// 单号被并发占用时重跑整笔事务，最多 MAX_NUMBER_ATTEMPTS 次
pub(crate) async fn retry_on_collision<T, F, Fut, P>(
    document: &str,
    is_collision: P,
    mut run: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    P: Fn(&AppError) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match run().await {
            Err(err) if is_collision(&err) && attempt < MAX_NUMBER_ATTEMPTS => {
                log::warn!("{document} number collision, retrying ({attempt})");
            }
            result => return result,
        }
    }
}

/// 同一张发票里同一件库存只能出现一次
pub(crate) fn check_duplicate_inventory(lines: &[InvoiceLineRequest]) -> AppResult<()> {
    let mut seen = BTreeSet::new();
    for id in lines.iter().filter_map(|l| l.inventory_id) {
        if !seen.insert(id) {
            return Err(AppError::ValidationError(format!(
                "Inventory {id} appears more than once"
            )));
        }
    }
    Ok(())
}

impl InvoiceService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn next_invoice_number(&self) -> AppResult<NextNumberResponse> {
        Ok(NextNumberResponse {
            number: Self::next_number_in(&self.pool).await?,
        })
    }

    async fn next_number_in<C: ConnectionTrait>(db: &C) -> AppResult<String> {
        let last = invoices::Entity::find()
            .filter(Expr::cust("invoice_number ~ '^INV-[0-9]+$'"))
            .order_by_desc(Expr::cust("LENGTH(invoice_number)"))
            .order_by_desc(invoices::Column::InvoiceNumber)
            .one(db)
            .await?;

        Ok(next_document_number(
            INVOICE_PREFIX,
            last.as_ref().map(|i| i.invoice_number.as_str()),
            DOCUMENT_NUMBER_WIDTH,
        ))
    }

    /// 开票；单号被并发占用时整笔事务重试
    pub async fn create(&self, actor_id: i64, request: CreateInvoiceRequest) -> AppResult<InvoiceDetail> {
        let pool = &self.pool;
        let request = &request;

        let detail = retry_on_collision("Invoice", AppError::is_unique_violation, move || async move {
            let txn = pool.begin().await?;
            let detail = Self::create_in(&txn, request, None, actor_id).await?;
            txn.commit().await?;
            Ok::<_, AppError>(detail)
        })
        .await?;

        log::info!(
            "Invoice {} created for master {}, total {} cents",
            detail.invoice.invoice_number,
            detail.invoice.master_id,
            detail.invoice.total_cents
        );
        Ok(detail)
    }

    /// 在调用方事务内开票；memo_id 不为空表示由寄售单转换而来
    pub(crate) async fn create_in<C: ConnectionTrait>(
        db: &C,
        request: &CreateInvoiceRequest,
        memo_id: Option<i64>,
        actor_id: i64,
    ) -> AppResult<InvoiceDetail> {
        if request.items.is_empty() {
            return Err(AppError::ValidationError(
                "Invoice must have at least one item".to_string(),
            ));
        }
        check_duplicate_inventory(&request.items)?;

        let discount_cents = request.discount_cents.unwrap_or(0);
        let tax_cents = request.tax_cents.unwrap_or(0);
        require_non_negative("discount_cents", discount_cents)?;
        require_non_negative("tax_cents", tax_cents)?;

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

        let mut lines = Vec::with_capacity(request.items.len());
        for line in &request.items {
            lines.push(Self::prepare_line(db, line).await?);
        }

        let amounts = lines
            .iter()
            .map(PreparedLine::amount_cents)
            .collect::<AppResult<Vec<i64>>>()?;
        let totals = InvoiceTotals::compute(&amounts, discount_cents, tax_cents)?;
        if discount_cents > totals.subtotal_cents {
            return Err(AppError::ValidationError(
                "discount_cents must not exceed the subtotal".to_string(),
            ));
        }
        if totals.total_cents <= 0 {
            return Err(AppError::ValidationError(
                "Invoice total must be greater than 0".to_string(),
            ));
        }

        let invoice_number = Self::next_number_in(db).await?;
        let issue_date = request
            .issue_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let invoice = invoices::ActiveModel {
            invoice_number: Set(invoice_number.clone()),
            master_id: Set(master.id),
            memo_id: Set(memo_id),
            issue_date: Set(issue_date),
            due_date: Set(request.due_date),
            status: Set(InvoiceStatus::Unpaid),
            subtotal_cents: Set(totals.subtotal_cents),
            discount_cents: Set(totals.discount_cents),
            tax_cents: Set(totals.tax_cents),
            total_cents: Set(totals.total_cents),
            paid_cents: Set(0),
            notes: Set(request.notes.clone()),
            created_by: Set(Some(actor_id)),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut touched_memos = BTreeSet::new();

        for (line, amount_cents) in lines.into_iter().zip(amounts) {
            let item = invoice_items::ActiveModel {
                invoice_id: Set(invoice.id),
                inventory_id: Set(line.inventory.as_ref().map(|i| i.id)),
                description: Set(line.description),
                quantity: Set(line.quantity),
                unit_price_cents: Set(line.unit_price_cents),
                amount_cents: Set(amount_cents),
                ..Default::default()
            }
            .insert(db)
            .await?;
            items.push(item);

            let Some(stock) = line.inventory else {
                continue;
            };

            // 直接对寄售中的货品开票，同步关闭对应的寄售行
            if stock.status == InventoryStatus::Memo && memo_id.is_none() {
                let on_memo = memo_items::Entity::find()
                    .filter(memo_items::Column::InventoryId.eq(stock.id))
                    .filter(memo_items::Column::Status.eq(MemoItemStatus::OnMemo))
                    .all(db)
                    .await?;
                for memo_item in on_memo {
                    touched_memos.insert(memo_item.memo_id);
                    let mut active = memo_item.into_active_model();
                    active.status = Set(MemoItemStatus::Sold);
                    active.update(db).await?;
                }
            }

            InventoryService::transition(
                db,
                stock,
                InventoryStatus::Sold,
                Some(invoice_number.clone()),
                None,
                Some(actor_id),
            )
            .await?;
        }

        for memo in touched_memos {
            MemoService::refresh_status(db, memo).await?;
        }

        LedgerService::post(
            db,
            NewLedgerEntry {
                master_id: master.id,
                entry_type: LedgerEntryType::Invoice,
                amount_cents: invoice.total_cents,
                entry_date: invoice.issue_date,
                reference: Some(invoice.invoice_number.clone()),
                invoice_id: Some(invoice.id),
                description: None,
                created_by: Some(actor_id),
            },
        )
        .await?;

        Ok(InvoiceDetail { invoice, items })
    }

    async fn prepare_line<C: ConnectionTrait>(
        db: &C,
        line: &InvoiceLineRequest,
    ) -> AppResult<PreparedLine> {
        if let Some(price) = line.unit_price_cents {
            require_non_negative("unit_price_cents", price)?;
        }

        match line.inventory_id {
            Some(inventory_id) => {
                // 单件货品数量固定为 1
                if line.quantity.is_some_and(|q| q != 1) {
                    return Err(AppError::ValidationError(
                        "Inventory lines must have quantity 1".to_string(),
                    ));
                }

                let stock = InventoryService::lock_in(db, inventory_id).await?;
                if !stock.status.is_invoiceable() {
                    return Err(AppError::Conflict(format!(
                        "Inventory {} is {} and cannot be invoiced",
                        stock.stock_id, stock.status
                    )));
                }

                Ok(PreparedLine {
                    description: line
                        .description
                        .clone()
                        .filter(|d| !d.trim().is_empty())
                        .unwrap_or_else(|| describe_inventory(&stock)),
                    quantity: 1,
                    unit_price_cents: line.unit_price_cents.unwrap_or(stock.sale_price_cents),
                    inventory: Some(stock),
                })
            }
            None => {
                let description = line
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::ValidationError(
                            "description is required for free-text lines".to_string(),
                        )
                    })?;
                let quantity = line.quantity.unwrap_or(1);
                if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
                    return Err(AppError::ValidationError(format!(
                        "quantity must be between 1 and {MAX_LINE_QUANTITY}"
                    )));
                }
                let unit_price_cents = line.unit_price_cents.ok_or_else(|| {
                    AppError::ValidationError(
                        "unit_price_cents is required for free-text lines".to_string(),
                    )
                })?;

                Ok(PreparedLine {
                    inventory: None,
                    description,
                    quantity,
                    unit_price_cents,
                })
            }
        }
    }

    pub async fn list(&self, query: InvoiceQuery) -> AppResult<PaginatedResponse<invoices::Model>> {
        DateRangeQuery {
            start_date: query.start_date,
            end_date: query.end_date,
        }
        .validate()?;
        let params = query.pagination();

        let mut select = invoices::Entity::find();
        if let Some(status) = query.status {
            select = select.filter(invoices::Column::Status.eq(status));
        }
        if let Some(master_id) = query.master_id {
            select = select.filter(invoices::Column::MasterId.eq(master_id));
        }
        if let Some(start) = query.start_date {
            select = select.filter(invoices::Column::IssueDate.gte(start));
        }
        if let Some(end) = query.end_date {
            select = select.filter(invoices::Column::IssueDate.lte(end));
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(invoices::Column::IssueDate)
            .order_by_desc(invoices::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, invoice_id: i64) -> AppResult<InvoiceDetail> {
        let invoice = invoices::Entity::find_by_id(invoice_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;
        let items = Self::items_of(&self.pool, invoice.id).await?;
        Ok(InvoiceDetail { invoice, items })
    }

    /// 收款：金额不能超过未付余额
    pub async fn record_payment(
        &self,
        actor_id: i64,
        invoice_id: i64,
        request: RecordPaymentRequest,
    ) -> AppResult<invoices::Model> {
        if request.amount_cents <= 0 {
            return Err(AppError::ValidationError(
                "amount_cents must be greater than 0".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;
        let invoice = Self::lock_in(&txn, invoice_id).await?;

        if invoice.status == InvoiceStatus::Void {
            return Err(AppError::Conflict("Invoice is void".to_string()));
        }
        let outstanding = invoice.total_cents - invoice.paid_cents;
        if request.amount_cents > outstanding {
            return Err(AppError::ValidationError(format!(
                "Payment exceeds the outstanding amount of {outstanding} cents"
            )));
        }

        let paid_cents = invoice.paid_cents + request.amount_cents;
        let total_cents = invoice.total_cents;
        let master_id = invoice.master_id;
        let reference = request
            .reference
            .clone()
            .unwrap_or_else(|| invoice.invoice_number.clone());

        let mut active = invoice.into_active_model();
        active.paid_cents = Set(paid_cents);
        active.status = Set(InvoiceStatus::from_amounts(paid_cents, total_cents));
        active.updated_at = Set(Utc::now());
        let invoice = active.update(&txn).await?;

        LedgerService::post(
            &txn,
            NewLedgerEntry {
                master_id,
                entry_type: LedgerEntryType::Payment,
                amount_cents: request.amount_cents,
                entry_date: request
                    .payment_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
                reference: Some(reference),
                invoice_id: Some(invoice.id),
                description: request.note,
                created_by: Some(actor_id),
            },
        )
        .await?;

        txn.commit().await?;
        log::info!(
            "Payment of {} cents recorded on {} ({:?})",
            request.amount_cents,
            invoice.invoice_number,
            invoice.status
        );
        Ok(invoice)
    }

    /// 作废（管理员）：货品退回 AVAILABLE，并按发票总额记一笔贷项
    pub async fn void(
        &self,
        actor_id: i64,
        invoice_id: i64,
        request: VoidInvoiceRequest,
    ) -> AppResult<invoices::Model> {
        let txn = self.pool.begin().await?;
        let invoice = Self::lock_in(&txn, invoice_id).await?;

        if invoice.status == InvoiceStatus::Void {
            return Err(AppError::Conflict("Invoice is already void".to_string()));
        }

        let reference = format!("VOID {}", invoice.invoice_number);
        for item in Self::items_of(&txn, invoice.id).await? {
            let Some(inventory_id) = item.inventory_id else {
                continue;
            };
            let stock = InventoryService::lock_in(&txn, inventory_id).await?;
            if stock.status != InventoryStatus::Sold {
                log::warn!(
                    "Inventory {} is {} while voiding {}, leaving it unchanged",
                    stock.stock_id,
                    stock.status,
                    invoice.invoice_number
                );
                continue;
            }
            InventoryService::transition(
                &txn,
                stock,
                InventoryStatus::Available,
                Some(reference.clone()),
                request.reason.clone(),
                Some(actor_id),
            )
            .await?;
        }

        let master_id = invoice.master_id;
        let total_cents = invoice.total_cents;
        let notes = match (&invoice.notes, &request.reason) {
            (Some(notes), Some(reason)) => Some(format!("{notes}\nVoid: {reason}")),
            (None, Some(reason)) => Some(format!("Void: {reason}")),
            (notes, None) => notes.clone(),
        };

        let mut active = invoice.into_active_model();
        active.status = Set(InvoiceStatus::Void);
        active.notes = Set(notes);
        active.updated_at = Set(Utc::now());
        let invoice = active.update(&txn).await?;

        LedgerService::post(
            &txn,
            NewLedgerEntry {
                master_id,
                entry_type: LedgerEntryType::CreditNote,
                amount_cents: total_cents,
                entry_date: Utc::now().date_naive(),
                reference: Some(reference),
                invoice_id: Some(invoice.id),
                description: request.reason,
                created_by: Some(actor_id),
            },
        )
        .await?;

        txn.commit().await?;
        log::info!("Invoice {} voided by {actor_id}", invoice.invoice_number);
        Ok(invoice)
    }

    async fn lock_in<C: ConnectionTrait>(db: &C, invoice_id: i64) -> AppResult<invoices::Model> {
        invoices::Entity::find_by_id(invoice_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))
    }

    async fn items_of<C: ConnectionTrait>(db: &C, invoice_id: i64) -> AppResult<Vec<invoice_items::Model>> {
        Ok(invoice_items::Entity::find()
            .filter(invoice_items::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_items::Column::Id)
            .all(db)
            .await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::inventory_service::tests::{history, item};
    use crate::services::ledger_service::tests::entry;
    use crate::services::master_service::tests::master;
    use crate::services::test_support::{assert_in_order, statement_log};
    use chrono::NaiveDate;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::cell::Cell;

    pub(crate) fn invoice(status: InvoiceStatus, total: i64, paid: i64) -> invoices::Model {
        invoices::Model {
            id: 1,
            invoice_number: "INV-00001".to_string(),
            master_id: 1,
            memo_id: None,
            issue_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            due_date: None,
            status,
            subtotal_cents: total,
            discount_cents: 0,
            tax_cents: 0,
            total_cents: total,
            paid_cents: paid,
            notes: None,
            created_by: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn invoice_item(id: i64, inventory_id: Option<i64>, amount: i64) -> invoice_items::Model {
        invoice_items::Model {
            id,
            invoice_id: 1,
            inventory_id,
            description: "Round 1.01ct G VS1".to_string(),
            quantity: 1,
            unit_price_cents: amount,
            amount_cents: amount,
            created_at: Utc::now(),
        }
    }

    fn stock_line(inventory_id: i64) -> InvoiceLineRequest {
        InvoiceLineRequest {
            inventory_id: Some(inventory_id),
            ..Default::default()
        }
    }

    fn request(items: Vec<InvoiceLineRequest>, discount: Option<i64>) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            master_id: 1,
            issue_date: None,
            due_date: None,
            items,
            discount_cents: discount,
            tax_cents: None,
            notes: None,
        }
    }

    #[test]
    fn test_duplicate_inventory_lines() {
        assert!(check_duplicate_inventory(&[stock_line(1), stock_line(2)]).is_ok());
        assert!(check_duplicate_inventory(&[stock_line(1), stock_line(1)]).is_err());
        assert!(
            check_duplicate_inventory(&[InvoiceLineRequest::default(), InvoiceLineRequest::default()])
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_sold_inventory_cannot_be_invoiced() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![item(5, InventoryStatus::Sold)]])
            .into_connection();

        let err = InvoiceService::create_in(&db, &request(vec![stock_line(5)], None), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_discount_cannot_exceed_subtotal() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![item(5, InventoryStatus::Available)]])
            .into_connection();

        let err = InvoiceService::create_in(
            &db,
            &request(vec![stock_line(5)], Some(10_000_000)),
            None,
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_free_text_line_requires_price() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .into_connection();

        let line = InvoiceLineRequest {
            description: Some("Ring resizing".to_string()),
            ..Default::default()
        };
        let err = InvoiceService::create_in(&db, &request(vec![line], None), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_overpayment_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![invoice(InvoiceStatus::PartiallyPaid, 10_000, 8_000)]])
            .into_connection();
        let service = InvoiceService::new(db);

        let err = service
            .record_payment(
                1,
                1,
                RecordPaymentRequest {
                    amount_cents: 3_000,
                    payment_date: None,
                    reference: None,
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_payment_on_void_invoice_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![invoice(InvoiceStatus::Void, 10_000, 0)]])
            .into_connection();
        let service = InvoiceService::new(db);

        let err = service
            .record_payment(
                1,
                1,
                RecordPaymentRequest {
                    amount_cents: 1_000,
                    payment_date: None,
                    reference: None,
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_void_twice_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![invoice(InvoiceStatus::Void, 10_000, 0)]])
            .into_connection();
        let service = InvoiceService::new(db);

        let err = service
            .void(1, 1, VoidInvoiceRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_retry_on_collision_gives_up_after_limit() {
        let calls = Cell::new(0);
        let result: AppResult<()> = retry_on_collision(
            "Invoice",
            |e| matches!(e, AppError::Conflict(_)),
            || {
                calls.set(calls.get() + 1);
                async { Err(AppError::Conflict("INV-00001 taken".to_string())) }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls.get(), MAX_NUMBER_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_retry_on_collision_recovers() {
        let calls = Cell::new(0);
        let number = retry_on_collision(
            "Invoice",
            |e| matches!(e, AppError::Conflict(_)),
            || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt == 1 {
                        Err(AppError::Conflict("INV-00001 taken".to_string()))
                    } else {
                        Ok("INV-00002")
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(number, "INV-00002");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: AppResult<()> = retry_on_collision(
            "Invoice",
            |e| matches!(e, AppError::Conflict(_)),
            || {
                calls.set(calls.get() + 1);
                async { Err(AppError::ValidationError("bad line".to_string())) }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_free_text_amount_overflow_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .into_connection();

        let line = InvoiceLineRequest {
            description: Some("Loose melee parcel".to_string()),
            quantity: Some(4),
            unit_price_cents: Some(i64::MAX / 2),
            ..Default::default()
        };
        let err = InvoiceService::create_in(&db, &request(vec![line], None), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_free_text_quantity_capped() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .into_connection();

        let line = InvoiceLineRequest {
            description: Some("Gift boxes".to_string()),
            quantity: Some(MAX_LINE_QUANTITY + 1),
            unit_price_cents: Some(100),
            ..Default::default()
        };
        let err = InvoiceService::create_in(&db, &request(vec![line], None), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_sells_stock_and_debits_ledger() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![item(5, InventoryStatus::Available)]])
            .append_query_results([Vec::<invoices::Model>::new()])
            .append_query_results([vec![invoice(InvoiceStatus::Unpaid, 670_000, 0)]])
            .append_query_results([vec![invoice_item(1, Some(5), 650_000)]])
            .append_query_results([vec![item(5, InventoryStatus::Sold)]])
            .append_query_results([vec![history(5)]])
            .append_query_results([vec![invoice_item(2, None, 10_000)]])
            .append_query_results([vec![entry(1, 670_000, 0)]])
            .into_connection();
        let service = InvoiceService::new(db);

        let mut req = request(
            vec![
                stock_line(5),
                InvoiceLineRequest {
                    description: Some("Ring sizing".to_string()),
                    quantity: Some(2),
                    unit_price_cents: Some(5_000),
                    ..Default::default()
                },
            ],
            Some(10_000),
        );
        req.tax_cents = Some(20_000);

        let detail = service.create(1, req).await.unwrap();
        assert_eq!(detail.invoice.invoice_number, "INV-00001");
        assert_eq!(detail.items.len(), 2);

        let log = statement_log(service.pool);
        assert_in_order(
            &log,
            &[
                "BEGIN",
                r#"FROM \"masters\""#,
                "FOR UPDATE",
                r#"INSERT INTO \"invoices\""#,
                r#"INSERT INTO \"invoice_items\""#,
                r#"UPDATE \"inventory\""#,
                r#"INSERT INTO \"inventory_history\""#,
                r#"INSERT INTO \"invoice_items\""#,
                r#"INSERT INTO \"ledgers\""#,
                "COMMIT",
            ],
        );
        // 650000 + 2 x 5000 - 10000 + 20000
        assert!(log.contains("BigInt(Some(660000))"));
        assert!(log.contains("BigInt(Some(670000))"));
        assert!(log.contains(r#""SOLD""#));
    }

    #[tokio::test]
    async fn test_void_returns_stock_and_posts_credit_note() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![invoice(InvoiceStatus::Unpaid, 670_000, 0)]])
            .append_query_results([vec![
                invoice_item(1, Some(5), 650_000),
                invoice_item(2, None, 20_000),
            ]])
            .append_query_results([vec![item(5, InventoryStatus::Sold)]])
            .append_query_results([vec![item(5, InventoryStatus::Available)]])
            .append_query_results([vec![history(5)]])
            .append_query_results([vec![invoice(InvoiceStatus::Void, 670_000, 0)]])
            .append_query_results([vec![entry(2, 0, 670_000)]])
            .into_connection();
        let service = InvoiceService::new(db);

        let voided = service
            .void(
                1,
                1,
                VoidInvoiceRequest {
                    reason: Some("customer returned".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(voided.status, InvoiceStatus::Void);

        let log = statement_log(service.pool);
        assert_in_order(
            &log,
            &[
                "BEGIN",
                r#"FROM \"invoices\""#,
                "FOR UPDATE",
                r#"FROM \"invoice_items\""#,
                r#"FROM \"inventory\""#,
                r#"UPDATE \"inventory\""#,
                r#"INSERT INTO \"inventory_history\""#,
                r#"UPDATE \"invoices\""#,
                r#"INSERT INTO \"ledgers\""#,
                "COMMIT",
            ],
        );
        assert!(log.contains(r#""AVAILABLE""#));
        assert!(log.contains(r#""credit_note""#));
        assert!(log.contains("VOID INV-00001"));
    }
}
