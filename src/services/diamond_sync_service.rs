use crate::entities::{SyncState, cranberri_diamonds, diamond_sync_status, kyrah_diamonds};
use crate::error::{AppError, AppResult};
use crate::external::{CranberriClient, KyrahClient};
use crate::models::*;
use crate::utils::PaginatedResponse;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

const UPSERT_CHUNK: usize = 500;

/// 同一批数据里 external_id 重复时保留最后一条，避免 ON CONFLICT 同一行被更新两次
pub(crate) fn dedupe_listings(listings: Vec<DiamondListing>) -> Vec<DiamondListing> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<DiamondListing> = Vec::with_capacity(listings.len());

    for listing in listings {
        match index.get(&listing.external_id) {
            Some(&pos) => unique[pos] = listing,
            None => {
                index.insert(listing.external_id.clone(), unique.len());
                unique.push(listing);
            }
        }
    }
    unique
}

// 两张供应商表结构相同，upsert 与下架逻辑共用
macro_rules! apply_listings {
    ($module:ident, $db:expr, $listings:expr, $synced_at:expr) => {{
        let mut processed: u64 = 0;
        for chunk in $listings.chunks(UPSERT_CHUNK) {
            let rows = chunk.iter().map(|l| $module::ActiveModel {
                external_id: Set(l.external_id.clone()),
                stock_number: Set(l.stock_number.clone()),
                shape: Set(l.shape.clone()),
                carat: Set(l.carat),
                color: Set(l.color.clone()),
                clarity: Set(l.clarity.clone()),
                cut: Set(l.cut.clone()),
                lab: Set(l.lab.clone()),
                certificate_no: Set(l.certificate_no.clone()),
                price_cents: Set(l.price_cents),
                image_url: Set(l.image_url.clone()),
                video_url: Set(l.video_url.clone()),
                is_available: Set(true),
                raw: Set(Some(l.raw.clone())),
                last_synced_at: Set($synced_at),
                updated_at: Set($synced_at),
                ..Default::default()
            });

            $module::Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::column($module::Column::ExternalId)
                        .update_columns([
                            $module::Column::StockNumber,
                            $module::Column::Shape,
                            $module::Column::Carat,
                            $module::Column::Color,
                            $module::Column::Clarity,
                            $module::Column::Cut,
                            $module::Column::Lab,
                            $module::Column::CertificateNo,
                            $module::Column::PriceCents,
                            $module::Column::ImageUrl,
                            $module::Column::VideoUrl,
                            $module::Column::IsAvailable,
                            $module::Column::Raw,
                            $module::Column::LastSyncedAt,
                            $module::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec($db)
                .await?;
            processed += chunk.len() as u64;
        }

        // 本轮没有出现的记录下架
        let stale = $module::Entity::update_many()
            .col_expr($module::Column::IsAvailable, Expr::value(false))
            .col_expr($module::Column::UpdatedAt, Expr::value($synced_at))
            .filter($module::Column::LastSyncedAt.lt($synced_at))
            .filter($module::Column::IsAvailable.eq(true))
            .exec($db)
            .await?;

        (processed, stale.rows_affected)
    }};
}

macro_rules! list_available {
    ($module:ident, $db:expr, $query:expr) => {{
        let query = $query;
        let params = query.pagination();

        let mut select = $module::Entity::find().filter($module::Column::IsAvailable.eq(true));
        if let Some(shape) = query.shape.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(Expr::col($module::Column::Shape).ilike(shape));
        }
        if let Some(color) = query.color.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(Expr::col($module::Column::Color).ilike(color));
        }
        if let Some(clarity) = query.clarity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(Expr::col($module::Column::Clarity).ilike(clarity));
        }
        if let Some(min) = query.min_carat {
            select = select.filter($module::Column::Carat.gte(min));
        }
        if let Some(max) = query.max_carat {
            select = select.filter($module::Column::Carat.lte(max));
        }
        if let Some(min) = query.min_price_cents {
            select = select.filter($module::Column::PriceCents.gte(min));
        }
        if let Some(max) = query.max_price_cents {
            select = select.filter($module::Column::PriceCents.lte(max));
        }

        let total = select.clone().count($db).await?;
        let items = select
            .order_by_asc($module::Column::PriceCents)
            .order_by_asc($module::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all($db)
            .await?;

        PaginatedResponse::new(items, &params, total).map(PartnerDiamond::from)
    }};
}

/// 供应商钻石同步
#[derive(Clone)]
pub struct DiamondSyncService {
    pool: DatabaseConnection,
    cranberri: CranberriClient,
    kyrah: KyrahClient,
}

impl DiamondSyncService {
    pub fn new(pool: DatabaseConnection, cranberri: CranberriClient, kyrah: KyrahClient) -> Self {
        Self {
            pool,
            cranberri,
            kyrah,
        }
    }

    /// 一次完整同步；同一来源正在运行时返回 409
    pub async fn sync(&self, source: DiamondSource) -> AppResult<SyncOutcome> {
        self.claim(source).await?;
        let run_started = Utc::now();
        log::info!("Diamond sync started for {source}");

        let result = self.run(source, run_started).await;
        match &result {
            Ok(outcome) => {
                self.finish(source, SyncState::Succeeded, outcome.processed as i64, None)
                    .await?;
                log::info!(
                    "Diamond sync for {source} succeeded: {} processed, {} marked unavailable",
                    outcome.processed,
                    outcome.marked_unavailable
                );
            }
            Err(err) => {
                log::error!("Diamond sync for {source} failed: {err}");
                // 返回同步本身的错误，状态写入失败只记日志
                if let Err(finish_err) = self
                    .finish(source, SyncState::Failed, 0, Some(err.to_string()))
                    .await
                {
                    log::error!("Failed to record {source} sync failure: {finish_err}");
                }
            }
        }
        result
    }

    async fn run(&self, source: DiamondSource, run_started: DateTime<Utc>) -> AppResult<SyncOutcome> {
        let listings = match source {
            DiamondSource::Cranberri => self.cranberri.fetch_all().await?,
            DiamondSource::Kyrah => self.kyrah.fetch_all().await?,
        };
        let listings = dedupe_listings(listings);

        let txn = self.pool.begin().await?;
        let (processed, marked_unavailable) = match source {
            DiamondSource::Cranberri => {
                apply_listings!(cranberri_diamonds, &txn, listings, run_started)
            }
            DiamondSource::Kyrah => apply_listings!(kyrah_diamonds, &txn, listings, run_started),
        };
        txn.commit().await?;

        Ok(SyncOutcome {
            source,
            processed,
            marked_unavailable,
        })
    }

    /// 原子地把状态置为 running
    async fn claim(&self, source: DiamondSource) -> AppResult<()> {
        let now = Utc::now();
        let claimed = diamond_sync_status::Entity::update_many()
            .col_expr(
                diamond_sync_status::Column::State,
                Expr::val(SyncState::Running.to_value()).as_enum(Alias::new("sync_state")),
            )
            .col_expr(diamond_sync_status::Column::LastStartedAt, Expr::value(now))
            .col_expr(
                diamond_sync_status::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .col_expr(diamond_sync_status::Column::UpdatedAt, Expr::value(now))
            .filter(diamond_sync_status::Column::Source.eq(source.as_str()))
            .filter(diamond_sync_status::Column::State.ne(SyncState::Running))
            .exec(&self.pool)
            .await?;
        if claimed.rows_affected == 1 {
            return Ok(());
        }

        let existing = diamond_sync_status::Entity::find()
            .filter(diamond_sync_status::Column::Source.eq(source.as_str()))
            .one(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "Sync for {source} is already running"
            )));
        }

        // 第一次同步，状态行还不存在
        let inserted = diamond_sync_status::ActiveModel {
            source: Set(source.as_str().to_string()),
            state: Set(SyncState::Running),
            last_started_at: Set(Some(now)),
            processed_count: Set(0),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(AppError::from);

        match inserted {
            Ok(_) => Ok(()),
            Err(err) if err.is_unique_violation() => Err(AppError::Conflict(format!(
                "Sync for {source} is already running"
            ))),
            Err(err) => Err(err),
        }
    }

    async fn finish(
        &self,
        source: DiamondSource,
        state: SyncState,
        processed: i64,
        error_message: Option<String>,
    ) -> AppResult<()> {
        let row = diamond_sync_status::Entity::find()
            .filter(diamond_sync_status::Column::Source.eq(source.as_str()))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("Sync status for {source} missing")))?;

        let now = Utc::now();
        let mut active = row.into_active_model();
        active.state = Set(state);
        active.last_finished_at = Set(Some(now));
        if state == SyncState::Succeeded {
            active.last_success_at = Set(Some(now));
            active.processed_count = Set(processed);
        }
        active.error_message = Set(error_message);
        active.updated_at = Set(now);
        active.update(&self.pool).await?;
        Ok(())
    }

    /// 进程重启后，遗留的 running 状态视为中断
    pub async fn reset_stale(&self) -> AppResult<u64> {
        let stale = diamond_sync_status::Entity::find()
            .filter(diamond_sync_status::Column::State.eq(SyncState::Running))
            .all(&self.pool)
            .await?;

        let count = stale.len() as u64;
        for row in stale {
            let source = row.source.clone();
            let mut active = row.into_active_model();
            active.state = Set(SyncState::Failed);
            active.error_message = Set(Some("interrupted".to_string()));
            active.updated_at = Set(Utc::now());
            active.update(&self.pool).await?;
            log::warn!("Sync for {source} was interrupted, marked as failed");
        }
        Ok(count)
    }

    pub async fn statuses(&self) -> AppResult<Vec<diamond_sync_status::Model>> {
        let rows = diamond_sync_status::Entity::find()
            .order_by_asc(diamond_sync_status::Column::Source)
            .all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// 只返回在售的供应商钻石
    pub async fn list(
        &self,
        source: DiamondSource,
        query: DiamondQuery,
    ) -> AppResult<PaginatedResponse<PartnerDiamond>> {
        let page = match source {
            DiamondSource::Cranberri => list_available!(cranberri_diamonds, &self.pool, query),
            DiamondSource::Kyrah => list_available!(kyrah_diamonds, &self.pool, query),
        };
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CranberriConfig, KyrahConfig};
    use crate::services::master_service::tests::count_row;
    use crate::services::test_support::{assert_in_order, statement_log};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing(external_id: &str, price: i64) -> DiamondListing {
        DiamondListing {
            external_id: external_id.to_string(),
            stock_number: None,
            shape: Some("Round".to_string()),
            carat: Some(1.01),
            color: Some("F".to_string()),
            clarity: Some("VS1".to_string()),
            cut: None,
            lab: Some("GIA".to_string()),
            certificate_no: None,
            price_cents: Some(price),
            image_url: None,
            video_url: None,
            raw: serde_json::json!({ "id": external_id }),
        }
    }

    fn status_row(state: SyncState) -> diamond_sync_status::Model {
        diamond_sync_status::Model {
            id: 1,
            source: "cranberri".to_string(),
            state,
            last_started_at: None,
            last_finished_at: None,
            last_success_at: None,
            processed_count: 0,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    fn service(db: DatabaseConnection) -> DiamondSyncService {
        DiamondSyncService::new(
            db,
            CranberriClient::new(CranberriConfig {
                base_url: "http://localhost:9".to_string(),
                api_key: String::new(),
                page_size: 100,
            }),
            KyrahClient::new(KyrahConfig {
                base_url: "http://localhost:9".to_string(),
                username: String::new(),
                password: String::new(),
                page_size: 100,
            }),
        )
    }

    #[test]
    fn test_dedupe_keeps_last_in_first_position() {
        let unique = dedupe_listings(vec![
            listing("A", 100),
            listing("B", 200),
            listing("A", 150),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].external_id, "A");
        assert_eq!(unique[0].price_cents, Some(150));
        assert_eq!(unique[1].external_id, "B");
    }

    #[tokio::test]
    async fn test_running_source_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![status_row(SyncState::Running)]])
            .into_connection();

        let err = service(db).sync(DiamondSource::Cranberri).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_recorded() {
        // 未配置 API key，拉取失败后状态写为 failed
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![status_row(SyncState::Running)]])
            .append_query_results([vec![status_row(SyncState::Failed)]])
            .into_connection();

        let err = service(db).sync(DiamondSource::Cranberri).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_sync_error_survives_status_write_failure() {
        // 没有可用的查询结果，finish 读取状态行失败
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let err = service(db).sync(DiamondSource::Cranberri).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    fn stored(id: i64, external_id: &str) -> cranberri_diamonds::Model {
        let now = Utc::now();
        cranberri_diamonds::Model {
            id,
            external_id: external_id.to_string(),
            stock_number: None,
            shape: None,
            carat: None,
            color: None,
            clarity: None,
            cut: None,
            lab: None,
            certificate_no: None,
            price_cents: None,
            image_url: None,
            video_url: None,
            is_available: true,
            raw: None,
            last_synced_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_sync_upserts_then_retires_unseen_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/diamonds"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "id": 101, "shape": "Round", "carat": 1.01, "price": 5200 },
                    { "id": "102", "shape": "Oval", "carat": "0.90", "price": 4100.5 },
                    { "id": 101, "shape": "Round", "carat": 1.01, "price": 5000 },
                    { "shape": "Pear" }
                ],
                "meta": { "page": 1, "total_pages": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // 抢占 running
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            // upsert RETURNING id
            .append_query_results([vec![stored(1, "101"), stored(2, "102")]])
            // 本轮未出现的记录下架
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .append_query_results([vec![status_row(SyncState::Running)]])
            .append_query_results([vec![status_row(SyncState::Succeeded)]])
            .into_connection();

        let svc = DiamondSyncService::new(
            db,
            CranberriClient::new(CranberriConfig {
                base_url: server.uri(),
                api_key: "test-key".to_string(),
                page_size: 100,
            }),
            KyrahClient::new(KyrahConfig::default()),
        );

        let outcome = svc.sync(DiamondSource::Cranberri).await.unwrap();
        assert_eq!(outcome.source, DiamondSource::Cranberri);
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.marked_unavailable, 3);

        let log = statement_log(svc.pool);
        assert_in_order(
            &log,
            &[
                r#"UPDATE \"diamond_sync_status\""#,
                "BEGIN",
                r#"INSERT INTO \"cranberri_diamonds\""#,
                "ON CONFLICT",
                r#"UPDATE \"cranberri_diamonds\""#,
                "COMMIT",
                r#"UPDATE \"diamond_sync_status\""#,
            ],
        );
        assert!(log.contains("succeeded"));
    }

    #[tokio::test]
    async fn test_list_maps_source() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(1)]])
            .append_query_results([vec![kyrah_diamonds::Model {
                id: 3,
                external_id: "K-1".to_string(),
                stock_number: None,
                shape: Some("Oval".to_string()),
                carat: Some(1.5),
                color: Some("G".to_string()),
                clarity: Some("VS2".to_string()),
                cut: None,
                lab: Some("IGI".to_string()),
                certificate_no: None,
                price_cents: Some(820_000),
                image_url: None,
                video_url: None,
                is_available: true,
                raw: None,
                last_synced_at: now,
                created_at: now,
                updated_at: now,
            }]])
            .into_connection();

        let page = service(db)
            .list(
                DiamondSource::Kyrah,
                DiamondQuery {
                    shape: Some("oval".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].source, DiamondSource::Kyrah);
        assert_eq!(page.items[0].external_id, "K-1");
    }
}
