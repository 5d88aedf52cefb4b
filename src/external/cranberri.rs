use crate::config::CranberriConfig;
use crate::error::{AppError, AppResult};
use crate::external::feed::{external_id, lenient_f64, lenient_string, parse_records};
use crate::models::DiamondListing;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct CranberriPage {
    pub data: Vec<serde_json::Value>,
    pub meta: CranberriMeta,
}

#[derive(Debug, Deserialize)]
pub struct CranberriMeta {
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct CranberriRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    stock_no: Option<String>,
    shape: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    carat: Option<f64>,
    color: Option<String>,
    clarity: Option<String>,
    cut: Option<String>,
    lab: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    certificate_number: Option<String>,
    /// 美元
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    image_url: Option<String>,
    video_url: Option<String>,
}

/// 把单条 Cranberri 记录转换为统一结构，id 缺失的记录跳过
pub fn parse_listing(value: serde_json::Value) -> AppResult<Option<DiamondListing>> {
    let record: CranberriRecord = serde_json::from_value(value.clone())?;

    let Some(external_id) = external_id(record.id.as_ref()) else {
        return Ok(None);
    };

    Ok(Some(DiamondListing {
        external_id,
        stock_number: record.stock_no,
        shape: record.shape,
        carat: record.carat,
        color: record.color,
        clarity: record.clarity,
        cut: record.cut,
        lab: record.lab,
        certificate_no: record.certificate_number,
        price_cents: record.price.map(|p| (p * 100.0).round() as i64),
        image_url: record.image_url,
        video_url: record.video_url,
        raw: value,
    }))
}

#[derive(Clone)]
pub struct CranberriClient {
    client: Client,
    config: CranberriConfig,
}

impl CranberriClient {
    pub fn new(config: CranberriConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub async fn fetch_page(&self, page: u32) -> AppResult<CranberriPage> {
        let url = format!(
            "{}/api/v1/diamonds",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("page", page.to_string()),
                ("limit", self.config.page_size.to_string()),
            ])
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApiError(format!(
                "Cranberri request failed ({status}): {body}"
            )));
        }

        Ok(response.json().await?)
    }

    /// 拉取全部分页
    pub async fn fetch_all(&self) -> AppResult<Vec<DiamondListing>> {
        if self.config.api_key.is_empty() {
            return Err(AppError::ConfigError(
                "Cranberri API key is not configured".to_string(),
            ));
        }

        let mut listings = Vec::new();
        let mut current_page = 1;

        loop {
            let page = self.fetch_page(current_page).await?;
            let page_len = page.data.len();

            listings.extend(parse_records("Cranberri", page.data, parse_listing));

            log::debug!(
                "Cranberri page {}/{} fetched ({} rows)",
                page.meta.page,
                page.meta.total_pages,
                page_len
            );

            if page_len == 0 || current_page >= page.meta.total_pages {
                break;
            }
            current_page += 1;
        }

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing_converts_price() {
        let listing = parse_listing(json!({
            "id": 9912,
            "stock_no": "CR-1",
            "shape": "Oval",
            "carat": 1.5,
            "color": "F",
            "clarity": "VVS2",
            "lab": "GIA",
            "certificate_number": "2141438171",
            "price": 8450.5
        }))
        .unwrap()
        .unwrap();

        assert_eq!(listing.external_id, "9912");
        assert_eq!(listing.price_cents, Some(845050));
        assert_eq!(listing.certificate_no.as_deref(), Some("2141438171"));
        assert_eq!(listing.raw["stock_no"], "CR-1");
    }

    #[test]
    fn test_parse_listing_without_id_is_skipped() {
        assert!(parse_listing(json!({ "id": null, "shape": "Round" }))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_mistyped_field_skips_only_that_record() {
        let listings = parse_records(
            "Cranberri",
            vec![
                json!({ "id": 1, "carat": "1.50", "price": 1000 }),
                json!({ "id": 2, "shape": ["Round"] }),
                json!({ "shape": "Pear" }),
                json!({ "id": "3", "certificate_number": 2141438171u64 }),
            ],
            parse_listing,
        );

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].external_id, "1");
        assert_eq!(listings[0].carat, Some(1.5));
        assert_eq!(listings[1].external_id, "3");
        assert_eq!(listings[1].certificate_no.as_deref(), Some("2141438171"));
    }

    #[test]
    fn test_page_shape() {
        let page: CranberriPage = serde_json::from_value(json!({
            "data": [{ "id": "a" }],
            "meta": { "page": 1, "total_pages": 4 }
        }))
        .unwrap();
        assert_eq!(page.meta.total_pages, 4);
        assert_eq!(page.data.len(), 1);
    }
}
