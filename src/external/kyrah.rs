use crate::config::KyrahConfig;
use crate::error::{AppError, AppResult};
use crate::external::feed::{external_id, lenient_f64, lenient_string, parse_records};
use crate::models::DiamondListing;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct KyrahSearchResponse {
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
struct KyrahRecord {
    #[serde(default)]
    diamond_id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    sku: Option<String>,
    shape: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    weight: Option<f64>,
    color: Option<String>,
    clarity: Option<String>,
    cut_grade: Option<String>,
    lab: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    report_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_price: Option<f64>,
    #[serde(default)]
    images: Vec<String>,
    video: Option<String>,
}

pub fn parse_listing(value: serde_json::Value) -> AppResult<Option<DiamondListing>> {
    let record: KyrahRecord = serde_json::from_value(value.clone())?;
    let Some(external_id) = external_id(record.diamond_id.as_ref()) else {
        return Ok(None);
    };

    Ok(Some(DiamondListing {
        external_id,
        stock_number: record.sku,
        shape: record.shape,
        carat: record.weight,
        color: record.color,
        clarity: record.clarity,
        cut: record.cut_grade,
        lab: record.lab,
        certificate_no: record.report_no,
        price_cents: record.total_price.map(|p| (p * 100.0).round() as i64),
        image_url: record.images.into_iter().next(),
        video_url: record.video,
        raw: value,
    }))
}

#[derive(Clone)]
pub struct KyrahClient {
    client: Client,
    config: KyrahConfig,
}

impl KyrahClient {
    pub fn new(config: KyrahConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub async fn search(&self, page: u32) -> AppResult<KyrahSearchResponse> {
        let url = format!(
            "{}/inventory/search",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "page": page,
            "page_size": self.config.page_size,
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApiError(format!(
                "Kyrah search failed ({status}): {text}"
            )));
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_all(&self) -> AppResult<Vec<DiamondListing>> {
        if self.config.username.is_empty() {
            return Err(AppError::ConfigError(
                "Kyrah credentials are not configured".to_string(),
            ));
        }

        let mut listings = Vec::new();
        let mut page = 1;

        loop {
            let resp = self.search(page).await?;
            let page_len = resp.items.len();

            listings.extend(parse_records("Kyrah", resp.items, parse_listing));

            log::debug!("Kyrah page {page} fetched ({page_len} rows)");

            if !resp.has_more || page_len == 0 {
                break;
            }
            page += 1;
        }

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing_takes_first_image() {
        let listing = parse_listing(json!({
            "diamond_id": "KY-777",
            "sku": "S777",
            "shape": "Cushion",
            "weight": 2.02,
            "color": "H",
            "clarity": "SI1",
            "cut_grade": "EX",
            "report_no": "IGI-55",
            "total_price": 12000,
            "images": ["https://cdn.example.com/1.jpg", "https://cdn.example.com/2.jpg"]
        }))
        .unwrap()
        .unwrap();

        assert_eq!(listing.external_id, "KY-777");
        assert_eq!(listing.carat, Some(2.02));
        assert_eq!(listing.price_cents, Some(1_200_000));
        assert_eq!(
            listing.image_url.as_deref(),
            Some("https://cdn.example.com/1.jpg")
        );
        assert!(listing.video_url.is_none());
    }

    #[test]
    fn test_missing_diamond_id_is_skipped() {
        assert!(parse_listing(json!({ "sku": "x" })).unwrap().is_none());
        assert!(parse_listing(json!({ "diamond_id": " " })).unwrap().is_none());
    }

    #[test]
    fn test_numeric_id_and_string_weight() {
        let listing = parse_listing(json!({
            "diamond_id": 31337,
            "weight": "1.50",
            "report_no": 7421,
            "total_price": "9800"
        }))
        .unwrap()
        .unwrap();

        assert_eq!(listing.external_id, "31337");
        assert_eq!(listing.carat, Some(1.5));
        assert_eq!(listing.certificate_no.as_deref(), Some("7421"));
        assert_eq!(listing.price_cents, Some(980_000));
    }

    #[test]
    fn test_bad_record_does_not_abort_page() {
        let listings = parse_records(
            "Kyrah",
            vec![
                json!({ "diamond_id": "KY-1", "weight": 1.01 }),
                json!({ "diamond_id": "KY-2", "images": 5 }),
                json!("garbage"),
                json!({ "diamond_id": "KY-3" }),
            ],
            parse_listing,
        );

        let ids: Vec<&str> = listings.iter().map(|l| l.external_id.as_str()).collect();
        assert_eq!(ids, ["KY-1", "KY-3"]);
    }

    #[test]
    fn test_search_response_defaults() {
        let resp: KyrahSearchResponse = serde_json::from_value(json!({ "items": [] })).unwrap();
        assert!(!resp.has_more);
    }
}
