use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "inventory_status")]
#[serde(rename_all = "UPPERCASE")]
pub enum InventoryStatus {
    #[sea_orm(string_value = "AVAILABLE")]
    Available,
    #[sea_orm(string_value = "HOLD")]
    Hold,
    #[sea_orm(string_value = "MEMO")]
    Memo,
    #[sea_orm(string_value = "SOLD")]
    Sold,
}

impl InventoryStatus {
    /// 库存状态流转表
    ///
    /// SOLD -> AVAILABLE 只在作废发票等管理员操作时出现，权限由调用方检查
    pub fn can_transition_to(&self, to: InventoryStatus) -> bool {
        use InventoryStatus::*;
        matches!(
            (self, to),
            (Available, Hold | Memo | Sold)
                | (Hold, Available | Memo | Sold)
                | (Memo, Available | Sold)
                | (Sold, Available)
        )
    }

    /// 可以开票的状态
    pub fn is_invoiceable(&self) -> bool {
        matches!(
            self,
            InventoryStatus::Available | InventoryStatus::Hold | InventoryStatus::Memo
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Available => "AVAILABLE",
            InventoryStatus::Hold => "HOLD",
            InventoryStatus::Memo => "MEMO",
            InventoryStatus::Sold => "SOLD",
        }
    }
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "inventory")]
#[schema(as = InventoryItem)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub stock_id: String,
    pub shape: String,
    pub carat: f64,
    pub color: String,
    pub clarity: String,
    pub cut: Option<String>,
    pub polish: Option<String>,
    pub symmetry: Option<String>,
    pub fluorescence: Option<String>,
    pub lab: Option<String>,
    pub certificate_no: Option<String>,
    pub measurements: Option<String>,
    pub cost_price_cents: i64,
    pub sale_price_cents: i64,
    pub status: InventoryStatus,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::InventoryStatus::*;
    use super::*;

    #[test]
    fn test_lifecycle_table() {
        assert!(Available.can_transition_to(Hold));
        assert!(Available.can_transition_to(Memo));
        assert!(Available.can_transition_to(Sold));
        assert!(Hold.can_transition_to(Available));
        assert!(Hold.can_transition_to(Memo));
        assert!(Hold.can_transition_to(Sold));
        assert!(Memo.can_transition_to(Available));
        assert!(Memo.can_transition_to(Sold));
        assert!(Sold.can_transition_to(Available));
    }

    #[test]
    fn test_lifecycle_rejections() {
        assert!(!Memo.can_transition_to(Hold));
        assert!(!Sold.can_transition_to(Hold));
        assert!(!Sold.can_transition_to(Memo));
        for s in [Available, Hold, Memo, Sold] {
            assert!(!s.can_transition_to(s), "{s} -> {s} should be rejected");
        }
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Hold).unwrap(), "\"HOLD\"");
        let parsed: InventoryStatus = serde_json::from_str("\"SOLD\"").unwrap();
        assert_eq!(parsed, Sold);
        assert!(!Sold.is_invoiceable());
    }
}
