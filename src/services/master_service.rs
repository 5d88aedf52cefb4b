use crate::entities::{invoices, masters, memos};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::like_pattern;
use crate::utils::*;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

const MAX_CODE_ATTEMPTS: usize = 3;

/// 客户 / 供应商档案
#[derive(Clone)]
pub struct MasterService {
    pool: DatabaseConnection,
}

impl MasterService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: MasterQuery) -> AppResult<PaginatedResponse<masters::Model>> {
        let params = query.pagination();

        let mut select = masters::Entity::find();
        if !query.include_inactive.unwrap_or(false) {
            select = select.filter(masters::Column::IsActive.eq(true));
        }
        if let Some(master_type) = query.master_type {
            select = select.filter(masters::Column::MasterType.eq(master_type));
        }
        if let Some(pattern) = like_pattern(query.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(Expr::col(masters::Column::Code).ilike(pattern.clone()))
                    .add(Expr::col(masters::Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(masters::Column::Company).ilike(pattern)),
            );
        }

        let total = select.clone().count(&self.pool).await?;
        let items = select
            .order_by_asc(masters::Column::Code)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get(&self, master_id: i64) -> AppResult<masters::Model> {
        masters::Entity::find_by_id(master_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Master not found".to_string()))
    }

    /// 当前最大的自动编号 + 1
    async fn next_code(&self) -> AppResult<String> {
        let last = masters::Entity::find()
            .filter(Expr::cust("code ~ '^M[0-9]+$'"))
            .order_by_desc(Expr::cust("LENGTH(code)"))
            .order_by_desc(masters::Column::Code)
            .one(&self.pool)
            .await?;

        Ok(next_document_number(
            MASTER_PREFIX,
            last.as_ref().map(|m| m.code.as_str()),
            DOCUMENT_NUMBER_WIDTH,
        ))
    }

    pub async fn create(&self, request: CreateMasterRequest) -> AppResult<masters::Model> {
        require_non_empty("name", &request.name)?;
        if let Some(email) = request.email.as_deref().filter(|e| !e.is_empty()) {
            validate_email(&normalize_email(email))?;
        }
        if let Some(limit) = request.credit_limit_cents {
            require_non_negative("credit_limit_cents", limit)?;
        }

        let explicit_code = request
            .code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = match &explicit_code {
                Some(code) => code.clone(),
                None => self.next_code().await?,
            };

            let result = masters::ActiveModel {
                code: Set(code.clone()),
                name: Set(request.name.trim().to_string()),
                company: Set(request.company.clone()),
                master_type: Set(request.master_type),
                email: Set(request
                    .email
                    .as_deref()
                    .map(normalize_email)
                    .filter(|e| !e.is_empty())),
                phone: Set(request.phone.clone()),
                address: Set(request.address.clone()),
                city: Set(request.city.clone()),
                country: Set(request.country.clone()),
                tax_id: Set(request.tax_id.clone()),
                credit_limit_cents: Set(request.credit_limit_cents),
                notes: Set(request.notes.clone()),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(&self.pool)
            .await
            .map_err(AppError::from);

            match result {
                Ok(master) => {
                    log::info!("Created master {} ({})", master.code, master.name);
                    return Ok(master);
                }
                Err(err) if err.is_unique_violation() && explicit_code.is_some() => {
                    return Err(AppError::Conflict(format!("Master code {code} already exists")));
                }
                // 并发生成了同一编号，重新取号
                Err(err) if err.is_unique_violation() && attempt < MAX_CODE_ATTEMPTS => {
                    log::warn!("Master code {code} taken, retrying ({attempt})");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn update(
        &self,
        master_id: i64,
        request: UpdateMasterRequest,
    ) -> AppResult<masters::Model> {
        let master = self.get(master_id).await?;
        let mut active = master.into_active_model();

        if let Some(name) = request.name {
            require_non_empty("name", &name)?;
            active.name = Set(name.trim().to_string());
        }
        if let Some(company) = request.company {
            active.company = Set(Some(company));
        }
        if let Some(master_type) = request.master_type {
            active.master_type = Set(master_type);
        }
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            if !email.is_empty() {
                validate_email(&email)?;
            }
            active.email = Set(Some(email).filter(|e| !e.is_empty()));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(city) = request.city {
            active.city = Set(Some(city));
        }
        if let Some(country) = request.country {
            active.country = Set(Some(country));
        }
        if let Some(tax_id) = request.tax_id {
            active.tax_id = Set(Some(tax_id));
        }
        if let Some(limit) = request.credit_limit_cents {
            require_non_negative("credit_limit_cents", limit)?;
            active.credit_limit_cents = Set(Some(limit));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.pool).await?)
    }

    pub async fn deactivate(&self, master_id: i64) -> AppResult<masters::Model> {
        self.update(
            master_id,
            UpdateMasterRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// 已有发票或寄售单的档案只能停用，不能删除
    pub async fn delete(&self, master_id: i64) -> AppResult<()> {
        let master = self.get(master_id).await?;

        let invoice_count = invoices::Entity::find()
            .filter(invoices::Column::MasterId.eq(master.id))
            .count(&self.pool)
            .await?;
        let memo_count = memos::Entity::find()
            .filter(memos::Column::MasterId.eq(master.id))
            .count(&self.pool)
            .await?;
        if invoice_count > 0 || memo_count > 0 {
            return Err(AppError::Conflict(
                "Master has invoices or memos; deactivate it instead".to_string(),
            ));
        }

        masters::Entity::delete_by_id(master.id)
            .exec(&self.pool)
            .await?;
        log::info!("Deleted master {}", master.code);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::MasterType;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    pub(crate) fn master(id: i64, code: &str) -> masters::Model {
        masters::Model {
            id,
            code: code.to_string(),
            name: "Brilliant Co".to_string(),
            company: None,
            master_type: MasterType::Customer,
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            tax_id: None,
            credit_limit_cents: None,
            notes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// PaginatorTrait::count 的结果行
    pub(crate) fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    fn request(code: Option<&str>) -> CreateMasterRequest {
        CreateMasterRequest {
            code: code.map(str::to_string),
            name: "Brilliant Co".to_string(),
            company: None,
            master_type: MasterType::Customer,
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            tax_id: None,
            credit_limit_cents: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_generated_code_follows_last() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00041")]])
            .append_query_results([vec![master(2, "M00042")]])
            .into_connection();
        let service = MasterService::new(db);

        let created = service.create(request(None)).await.unwrap();
        assert_eq!(created.code, "M00042");
    }

    #[tokio::test]
    async fn test_delete_refused_with_invoices() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![master(1, "M00001")]])
            .append_query_results([vec![count_row(2)]])
            .append_query_results([vec![count_row(0)]])
            .into_connection();
        let service = MasterService::new(db);

        let err = service.delete(1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
