use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromotionKind {
    /// `percent` is expressed in whole percent, `15` meaning 15%.
    Percentage { percent: Decimal },
    Flat { amount: Decimal },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub code: String,
    pub kind: PromotionKind,
    pub cap: Option<Decimal>,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionAvailability {
    Available,
    Inactive,
    NotYetValid,
    Expired,
}

impl Promotion {
    pub fn availability_at(&self, at: DateTime<Utc>) -> PromotionAvailability {
        if !self.active {
            return PromotionAvailability::Inactive;
        }
        if self.starts_at.is_some_and(|starts_at| at < starts_at) {
            return PromotionAvailability::NotYetValid;
        }
        if self.expires_at.is_some_and(|expires_at| at >= expires_at) {
            return PromotionAvailability::Expired;
        }
        PromotionAvailability::Available
    }
}

/// Codes are matched case-insensitively with surrounding whitespace ignored.
pub fn normalize_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_uppercase())
}
