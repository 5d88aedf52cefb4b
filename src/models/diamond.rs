use crate::entities::{cranberri_diamonds, kyrah_diamonds};
use crate::error::AppError;
use crate::utils::PaginationParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiamondSource {
    Cranberri,
    Kyrah,
}

impl DiamondSource {
    pub const ALL: [DiamondSource; 2] = [DiamondSource::Cranberri, DiamondSource::Kyrah];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiamondSource::Cranberri => "cranberri",
            DiamondSource::Kyrah => "kyrah",
        }
    }
}

impl std::str::FromStr for DiamondSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cranberri" => Ok(DiamondSource::Cranberri),
            "kyrah" => Ok(DiamondSource::Kyrah),
            other => Err(AppError::NotFound(format!("Unknown diamond source: {other}"))),
        }
    }
}

impl std::fmt::Display for DiamondSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 各供应商数据归一化后的钻石记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiamondListing {
    pub external_id: String,
    pub stock_number: Option<String>,
    pub shape: Option<String>,
    pub carat: Option<f64>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub lab: Option<String>,
    pub certificate_no: Option<String>,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DiamondQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub shape: Option<String>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub min_carat: Option<f64>,
    pub max_carat: Option<f64>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
}

impl DiamondQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

/// 对外展示的供应商钻石，两张表统一成一个结构
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartnerDiamond {
    pub id: i64,
    pub source: DiamondSource,
    pub external_id: String,
    pub stock_number: Option<String>,
    pub shape: Option<String>,
    pub carat: Option<f64>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub lab: Option<String>,
    pub certificate_no: Option<String>,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

macro_rules! partner_diamond_from {
    ($module:ident, $source:expr) => {
        impl From<$module::Model> for PartnerDiamond {
            fn from(m: $module::Model) -> Self {
                Self {
                    id: m.id,
                    source: $source,
                    external_id: m.external_id,
                    stock_number: m.stock_number,
                    shape: m.shape,
                    carat: m.carat,
                    color: m.color,
                    clarity: m.clarity,
                    cut: m.cut,
                    lab: m.lab,
                    certificate_no: m.certificate_no,
                    price_cents: m.price_cents,
                    image_url: m.image_url,
                    video_url: m.video_url,
                    last_synced_at: m.last_synced_at,
                }
            }
        }
    };
}

partner_diamond_from!(cranberri_diamonds, DiamondSource::Cranberri);
partner_diamond_from!(kyrah_diamonds, DiamondSource::Kyrah);

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SyncOutcome {
    pub source: DiamondSource,
    pub processed: u64,
    pub marked_unavailable: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse() {
        assert_eq!(
            "kyrah".parse::<DiamondSource>().unwrap(),
            DiamondSource::Kyrah
        );
        assert!(matches!(
            "rapnet".parse::<DiamondSource>(),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(DiamondSource::Cranberri.to_string(), "cranberri");
    }
}
