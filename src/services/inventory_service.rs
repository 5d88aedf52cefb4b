use crate::entities::inventory_history::{ACTION_CREATED, ACTION_STATUS_CHANGED, ACTION_UPDATED};
use crate::entities::{InventoryStatus, inventory, inventory_history};
use crate::error::{AppError, AppResult};
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::like_pattern;
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};

#[derive(Clone)]
pub struct InventoryService {
    pool: DatabaseConnection,
}

#[derive(Debug, FromQueryResult)]
pub(crate) struct StatusCountRow {
    pub status: InventoryStatus,
    pub count: i64,
    pub value_cents: i64,
}

pub(crate) fn summarize(rows: Vec<StatusCountRow>) -> InventorySummary {
    let mut summary = InventorySummary::default();
    for row in rows {
        summary.total += row.count;
        match row.status {
            InventoryStatus::Available => summary.available = row.count,
            InventoryStatus::Hold => summary.hold = row.count,
            InventoryStatus::Memo => summary.memo = row.count,
            InventoryStatus::Sold => summary.sold = row.count,
        }
        if row.status != InventoryStatus::Sold {
            summary.unsold_value_cents += row.value_cents;
        }
    }
    summary
}

/// MEMO 与 SOLD 由单据流程维护
pub(crate) fn manual_transition_allowed(from: InventoryStatus, to: InventoryStatus) -> bool {
    from != InventoryStatus::Memo && !matches!(to, InventoryStatus::Memo | InventoryStatus::Sold)
}

fn validate_attributes(carat: Option<f64>, cost: Option<i64>, sale: Option<i64>) -> AppResult<()> {
    if let Some(carat) = carat
        && !(carat > 0.0 && carat.is_finite())
    {
        return Err(AppError::ValidationError(
            "carat must be greater than 0".to_string(),
        ));
    }
    if let Some(cost) = cost {
        require_non_negative("cost_price_cents", cost)?;
    }
    if let Some(sale) = sale {
        require_non_negative("sale_price_cents", sale)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn write_history<C: ConnectionTrait>(
    db: &C,
    inventory_id: i64,
    action: &str,
    from_status: Option<InventoryStatus>,
    to_status: Option<InventoryStatus>,
    reference: Option<String>,
    note: Option<String>,
    performed_by: Option<i64>,
) -> AppResult<()> {
    inventory_history::ActiveModel {
        inventory_id: Set(inventory_id),
        action: Set(action.to_string()),
        from_status: Set(from_status),
        to_status: Set(to_status),
        reference: Set(reference),
        note: Set(note),
        performed_by: Set(performed_by),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

impl InventoryService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        query: InventoryQuery,
    ) -> AppResult<PaginatedResponse<inventory::Model>> {
        let params = query.pagination();

        let mut select = inventory::Entity::find();
        if let Some(status) = query.status {
            select = select.filter(inventory::Column::Status.eq(status));
        }
        if let Some(shape) = query.shape.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(Expr::col(inventory::Column::Shape).ilike(shape));
        }
        if let Some(color) = query.color.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(inventory::Column::Color.eq(color.to_uppercase()));
        }
        if let Some(clarity) = query.clarity.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(inventory::Column::Clarity.eq(clarity.to_uppercase()));
        }
        if let Some(min) = query.min_carat {
            select = select.filter(inventory::Column::Carat.gte(min));
        }
        if let Some(max) = query.max_carat {
            select = select.filter(inventory::Column::Carat.lte(max));
        }
        if let Some(pattern) = like_pattern(query.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(Expr::col(inventory::Column::StockId).ilike(pattern.clone()))
                    .add(Expr::col(inventory::Column::CertificateNo).ilike(pattern)),
            );
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_desc(inventory::Column::CreatedAt)
            .order_by_desc(inventory::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, inventory_id: i64) -> AppResult<InventoryDetail> {
        let item = Self::find_in(&self.pool, inventory_id).await?;

        let history = inventory_history::Entity::find()
            .filter(inventory_history::Column::InventoryId.eq(item.id))
            .order_by_desc(inventory_history::Column::CreatedAt)
            .order_by_desc(inventory_history::Column::Id)
            .all(&self.pool)
            .await?;

        Ok(InventoryDetail { item, history })
    }

    pub async fn create(
        &self,
        actor_id: i64,
        request: CreateInventoryRequest,
    ) -> AppResult<inventory::Model> {
        require_non_empty("stock_id", &request.stock_id)?;
        require_non_empty("shape", &request.shape)?;
        require_non_empty("color", &request.color)?;
        require_non_empty("clarity", &request.clarity)?;
        validate_attributes(
            Some(request.carat),
            Some(request.cost_price_cents),
            Some(request.sale_price_cents),
        )?;

        let txn = self.pool.begin().await?;

        let item = inventory::ActiveModel {
            stock_id: Set(request.stock_id.trim().to_string()),
            shape: Set(request.shape.trim().to_string()),
            carat: Set(request.carat),
            color: Set(request.color.trim().to_uppercase()),
            clarity: Set(request.clarity.trim().to_uppercase()),
            cut: Set(request.cut),
            polish: Set(request.polish),
            symmetry: Set(request.symmetry),
            fluorescence: Set(request.fluorescence),
            lab: Set(request.lab),
            certificate_no: Set(request.certificate_no),
            measurements: Set(request.measurements),
            cost_price_cents: Set(request.cost_price_cents),
            sale_price_cents: Set(request.sale_price_cents),
            status: Set(InventoryStatus::Available),
            location: Set(request.location),
            image_url: Set(request.image_url),
            notes: Set(request.notes),
            created_by: Set(Some(actor_id)),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.is_unique_violation() => {
                AppError::Conflict("stock_id already exists".to_string())
            }
            err => err,
        })?;

        write_history(
            &txn,
            item.id,
            ACTION_CREATED,
            None,
            Some(InventoryStatus::Available),
            None,
            None,
            Some(actor_id),
        )
        .await?;

        txn.commit().await?;
        log::info!("Inventory {} created by {actor_id}", item.stock_id);
        Ok(item)
    }

    /// 修改属性，不涉及状态
    pub async fn update(
        &self,
        actor_id: i64,
        inventory_id: i64,
        request: UpdateInventoryRequest,
    ) -> AppResult<inventory::Model> {
        validate_attributes(
            request.carat,
            request.cost_price_cents,
            request.sale_price_cents,
        )?;

        let txn = self.pool.begin().await?;
        let item = Self::lock_in(&txn, inventory_id).await?;
        let mut active = item.into_active_model();
        let mut changed: Vec<&str> = Vec::new();

        macro_rules! apply {
            ($field:ident, $value:expr) => {
                if let Some(v) = $value {
                    active.$field = Set(v);
                    changed.push(stringify!($field));
                }
            };
        }

        apply!(shape, request.shape.map(|s| s.trim().to_string()));
        apply!(carat, request.carat);
        apply!(color, request.color.map(|s| s.trim().to_uppercase()));
        apply!(clarity, request.clarity.map(|s| s.trim().to_uppercase()));
        apply!(cut, request.cut.map(Some));
        apply!(polish, request.polish.map(Some));
        apply!(symmetry, request.symmetry.map(Some));
        apply!(fluorescence, request.fluorescence.map(Some));
        apply!(lab, request.lab.map(Some));
        apply!(certificate_no, request.certificate_no.map(Some));
        apply!(measurements, request.measurements.map(Some));
        apply!(cost_price_cents, request.cost_price_cents);
        apply!(sale_price_cents, request.sale_price_cents);
        apply!(location, request.location.map(Some));
        apply!(image_url, request.image_url.map(Some));
        apply!(notes, request.notes.map(Some));

        if changed.is_empty() {
            return Err(AppError::ValidationError("Nothing to update".to_string()));
        }

        active.updated_at = Set(Utc::now());
        let item = active.update(&txn).await?;

        write_history(
            &txn,
            item.id,
            ACTION_UPDATED,
            None,
            None,
            None,
            Some(format!("Updated {}", changed.join(", "))),
            Some(actor_id),
        )
        .await?;

        txn.commit().await?;
        Ok(item)
    }

    /// 手动改状态；SOLD 退回 AVAILABLE 仅管理员。
    /// 进出 MEMO 和转为 SOLD 只能走寄售单、发票流程
    pub async fn change_status(
        &self,
        actor: AuthUser,
        inventory_id: i64,
        request: ChangeInventoryStatusRequest,
    ) -> AppResult<inventory::Model> {
        let txn = self.pool.begin().await?;
        let item = Self::lock_in(&txn, inventory_id).await?;

        if !manual_transition_allowed(item.status, request.status) {
            return Err(AppError::Conflict(format!(
                "Inventory {} cannot be moved from {} to {} manually, use memos or invoices",
                item.stock_id, item.status, request.status
            )));
        }
        if item.status == InventoryStatus::Sold && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let item = Self::transition(
            &txn,
            item,
            request.status,
            request.reference,
            request.note,
            Some(actor.id),
        )
        .await?;

        txn.commit().await?;
        Ok(item)
    }

    /// 状态流转并记录历史，由调用方提供事务
    pub(crate) async fn transition<C: ConnectionTrait>(
        db: &C,
        item: inventory::Model,
        to: InventoryStatus,
        reference: Option<String>,
        note: Option<String>,
        performed_by: Option<i64>,
    ) -> AppResult<inventory::Model> {
        let from = item.status;
        if !from.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "Inventory {} cannot move from {from} to {to}",
                item.stock_id
            )));
        }

        let mut active = item.into_active_model();
        active.status = Set(to);
        active.updated_at = Set(Utc::now());
        let item = active.update(db).await?;

        write_history(
            db,
            item.id,
            ACTION_STATUS_CHANGED,
            Some(from),
            Some(to),
            reference,
            note,
            performed_by,
        )
        .await?;

        log::info!("Inventory {} status {from} -> {to}", item.stock_id);
        Ok(item)
    }

    /// 删除货品（管理员），已售出的不能删
    pub async fn delete(&self, inventory_id: i64) -> AppResult<()> {
        let item = Self::find_in(&self.pool, inventory_id).await?;
        if item.status == InventoryStatus::Sold {
            return Err(AppError::Conflict(
                "Sold inventory cannot be deleted".to_string(),
            ));
        }

        inventory::Entity::delete_by_id(item.id)
            .exec(&self.pool)
            .await?;
        log::info!("Inventory {} deleted", item.stock_id);
        Ok(())
    }

    pub async fn summary(&self) -> AppResult<InventorySummary> {
        let rows = inventory::Entity::find()
            .select_only()
            .column(inventory::Column::Status)
            .column_as(Expr::col(inventory::Column::Id).count(), "count")
            .column_as(
                Expr::cust("COALESCE(SUM(sale_price_cents), 0)::BIGINT"),
                "value_cents",
            )
            .group_by(inventory::Column::Status)
            .into_model::<StatusCountRow>()
            .all(&self.pool)
            .await?;

        Ok(summarize(rows))
    }

    pub(crate) async fn find_in<C: ConnectionTrait>(
        db: &C,
        inventory_id: i64,
    ) -> AppResult<inventory::Model> {
        inventory::Entity::find_by_id(inventory_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory {inventory_id} not found")))
    }

    /// SELECT ... FOR UPDATE，防止并发改状态
    pub(crate) async fn lock_in<C: ConnectionTrait>(
        db: &C,
        inventory_id: i64,
    ) -> AppResult<inventory::Model> {
        inventory::Entity::find_by_id(inventory_id)
            .lock_exclusive()
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory {inventory_id} not found")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::UserRole;
    use sea_orm::{DatabaseBackend, MockDatabase};

    pub(crate) fn item(id: i64, status: InventoryStatus) -> inventory::Model {
        inventory::Model {
            id,
            stock_id: format!("D-{id}"),
            shape: "Round".to_string(),
            carat: 1.01,
            color: "G".to_string(),
            clarity: "VS1".to_string(),
            cut: Some("EX".to_string()),
            polish: None,
            symmetry: None,
            fluorescence: None,
            lab: Some("GIA".to_string()),
            certificate_no: Some(format!("GIA-{id}")),
            measurements: None,
            cost_price_cents: 400_000,
            sale_price_cents: 650_000,
            status,
            location: None,
            image_url: None,
            notes: None,
            created_by: Some(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn history(inventory_id: i64) -> inventory_history::Model {
        inventory_history::Model {
            id: 1,
            inventory_id,
            action: ACTION_STATUS_CHANGED.to_string(),
            from_status: None,
            to_status: None,
            reference: None,
            note: None,
            performed_by: Some(1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(vec![
            StatusCountRow {
                status: InventoryStatus::Available,
                count: 3,
                value_cents: 300,
            },
            StatusCountRow {
                status: InventoryStatus::Memo,
                count: 1,
                value_cents: 50,
            },
            StatusCountRow {
                status: InventoryStatus::Sold,
                count: 2,
                value_cents: 1000,
            },
        ]);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.available, 3);
        assert_eq!(summary.hold, 0);
        assert_eq!(summary.sold, 2);
        assert_eq!(summary.unsold_value_cents, 350);
    }

    #[tokio::test]
    async fn test_transition_rejects_memo_to_hold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = InventoryService::transition(
            &db,
            item(1, InventoryStatus::Memo),
            InventoryStatus::Hold,
            None,
            None,
            Some(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_transition_writes_history() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, InventoryStatus::Hold)]])
            .append_query_results([vec![history(1)]])
            .into_connection();

        let updated = InventoryService::transition(
            &db,
            item(1, InventoryStatus::Available),
            InventoryStatus::Hold,
            Some("customer request".to_string()),
            None,
            Some(1),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, InventoryStatus::Hold);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_employee_cannot_reopen_sold_item() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, InventoryStatus::Sold)]])
            .into_connection();
        let service = InventoryService::new(db);

        let err = service
            .change_status(
                AuthUser {
                    id: 2,
                    role: UserRole::Employee,
                },
                1,
                ChangeInventoryStatusRequest {
                    status: InventoryStatus::Available,
                    reference: None,
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn test_manual_transition_allowed() {
        use InventoryStatus::*;
        assert!(manual_transition_allowed(Available, Hold));
        assert!(manual_transition_allowed(Hold, Available));
        assert!(manual_transition_allowed(Sold, Available));
        assert!(!manual_transition_allowed(Memo, Available));
        assert!(!manual_transition_allowed(Memo, Sold));
        assert!(!manual_transition_allowed(Available, Memo));
        assert!(!manual_transition_allowed(Hold, Sold));
    }

    #[tokio::test]
    async fn test_memo_item_cannot_be_released_manually() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, InventoryStatus::Memo)]])
            .into_connection();
        let service = InventoryService::new(db);

        let err = service
            .change_status(
                AuthUser {
                    id: 1,
                    role: UserRole::Admin,
                },
                1,
                ChangeInventoryStatusRequest {
                    status: InventoryStatus::Available,
                    reference: None,
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_manual_sale_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, InventoryStatus::Available)]])
            .into_connection();
        let service = InventoryService::new(db);

        let err = service
            .change_status(
                AuthUser {
                    id: 2,
                    role: UserRole::Employee,
                },
                1,
                ChangeInventoryStatusRequest {
                    status: InventoryStatus::Sold,
                    reference: None,
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_sold_refused() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, InventoryStatus::Sold)]])
            .into_connection();
        let service = InventoryService::new(db);

        let err = service.delete(1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
