use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::promotion::{Promotion, PromotionAvailability, PromotionKind};
use crate::leads::valuation::money;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PromotionLookupError {
    #[error("promotions source unavailable: {0}")]
    Unavailable(String),
}

/// External promotions table.
#[async_trait]
pub trait PromotionSource: Send + Sync {
    /// `code` is already normalized (trimmed, upper case).
    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>, PromotionLookupError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionOutcome {
    NoCode,
    Applied { code: String, discount: Decimal },
    Unknown { code: String },
    Inactive { code: String },
    NotYetValid { code: String },
    Expired { code: String },
    LookupFailed { code: String },
}

impl PromotionOutcome {
    pub fn discount(&self) -> Decimal {
        match self {
            Self::Applied { discount, .. } => *discount,
            _ => Decimal::ZERO,
        }
    }

    /// Note surfaced to staff when a submitted code did not produce a discount.
    pub fn note(&self) -> Option<String> {
        let reason = match self {
            Self::NoCode | Self::Applied { .. } => return None,
            Self::Unknown { code } => format!("promo code {code} not recognized"),
            Self::Inactive { code } => format!("promo code {code} is inactive"),
            Self::NotYetValid { code } => format!("promo code {code} is not valid yet"),
            Self::Expired { code } => format!("promo code {code} is invalid (expired)"),
            Self::LookupFailed { code } => {
                format!("promo code {code} could not be verified; confirm manually")
            }
        };
        Some(reason)
    }
}

/// Pure resolution of an already looked-up promotion against an estimate.
///
/// `lookup` is the collaborator's answer for `code`: `Ok(None)` for an unknown code,
/// `Err` when the lookup itself failed. Neither case is an error here; both produce a
/// zero discount and a note.
pub fn resolve(
    code: Option<&str>,
    lookup: Result<Option<&Promotion>, &PromotionLookupError>,
    estimated_value: Decimal,
    at: DateTime<Utc>,
) -> PromotionOutcome {
    let Some(code) = code else {
        return PromotionOutcome::NoCode;
    };
    let code = code.to_string();

    let promotion = match lookup {
        Ok(Some(promotion)) => promotion,
        Ok(None) => return PromotionOutcome::Unknown { code },
        Err(_) => return PromotionOutcome::LookupFailed { code },
    };

    match promotion.availability_at(at) {
        PromotionAvailability::Available => {}
        PromotionAvailability::Inactive => return PromotionOutcome::Inactive { code },
        PromotionAvailability::NotYetValid => return PromotionOutcome::NotYetValid { code },
        PromotionAvailability::Expired => return PromotionOutcome::Expired { code },
    }

    PromotionOutcome::Applied { code, discount: discount_for(promotion, estimated_value) }
}

/// `min(value * percent, cap)` (or `min(amount, cap)` for flat codes), never above `value`.
pub fn discount_for(promotion: &Promotion, estimated_value: Decimal) -> Decimal {
    let value = estimated_value.max(Decimal::ZERO);
    let raw = match &promotion.kind {
        PromotionKind::Percentage { percent } => {
            value * (*percent).clamp(Decimal::ZERO, Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED
        }
        PromotionKind::Flat { amount } => (*amount).max(Decimal::ZERO),
    };
    let capped = match promotion.cap {
        Some(cap) => raw.min(cap.max(Decimal::ZERO)),
        None => raw,
    };

    money(capped).min(value)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{discount_for, resolve, PromotionLookupError, PromotionOutcome};
    use crate::domain::promotion::{Promotion, PromotionKind};

    fn percent(code: &str, percent: i64, cap: Option<i64>) -> Promotion {
        Promotion {
            code: code.to_string(),
            kind: PromotionKind::Percentage { percent: Decimal::from(percent) },
            cap: cap.map(Decimal::from),
            active: true,
            starts_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn percentage_discount_is_capped() {
        let promo = percent("SPRING15", 15, Some(50));
        assert_eq!(discount_for(&promo, Decimal::from(200)), Decimal::from(30));
        assert_eq!(discount_for(&promo, Decimal::from(1_000)), Decimal::from(50));
    }

    #[test]
    fn flat_discount_never_exceeds_estimate() {
        let promo = Promotion {
            kind: PromotionKind::Flat { amount: Decimal::from(75) },
            ..percent("FLAT75", 0, None)
        };
        assert_eq!(discount_for(&promo, Decimal::from(40)), Decimal::from(40));
        assert_eq!(discount_for(&promo, Decimal::from(400)), Decimal::from(75));
    }

    #[test]
    fn expired_code_yields_zero_discount_and_note() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().expect("timestamp");
        let promo = Promotion {
            expires_at: Some(now - Duration::days(400)),
            ..percent("EXPIRED2023", 20, None)
        };

        let outcome = resolve(Some("EXPIRED2023"), Ok(Some(&promo)), Decimal::from(500), now);

        assert_eq!(outcome, PromotionOutcome::Expired { code: "EXPIRED2023".to_string() });
        assert_eq!(outcome.discount(), Decimal::ZERO);
        assert!(outcome.note().expect("note").contains("EXPIRED2023"));
    }

    #[test]
    fn unknown_and_unreachable_lookups_soft_fail() {
        let now = Utc::now();
        let unknown = resolve(Some("NOPE"), Ok(None), Decimal::from(500), now);
        assert_eq!(unknown.discount(), Decimal::ZERO);
        assert!(matches!(unknown, PromotionOutcome::Unknown { .. }));

        let error = PromotionLookupError::Unavailable("timeout".to_string());
        let failed = resolve(Some("SPRING15"), Err(&error), Decimal::from(500), now);
        assert_eq!(failed.discount(), Decimal::ZERO);
        assert!(failed.note().expect("note").contains("could not be verified"));
    }

    #[test]
    fn inactive_and_future_codes_do_not_apply() {
        let now = Utc::now();
        let inactive = Promotion { active: false, ..percent("PAUSED", 10, None) };
        let future =
            Promotion { starts_at: Some(now + Duration::days(3)), ..percent("SOON", 10, None) };

        assert!(matches!(
            resolve(Some("PAUSED"), Ok(Some(&inactive)), Decimal::from(100), now),
            PromotionOutcome::Inactive { .. }
        ));
        assert!(matches!(
            resolve(Some("SOON"), Ok(Some(&future)), Decimal::from(100), now),
            PromotionOutcome::NotYetValid { .. }
        ));
    }

    #[test]
    fn missing_code_has_no_note() {
        let outcome = resolve(None, Ok(None), Decimal::from(100), Utc::now());
        assert_eq!(outcome, PromotionOutcome::NoCode);
        assert_eq!(outcome.note(), None);
    }

    #[test]
    fn discount_is_bounded_by_estimate_for_any_percent() {
        for pct in [0, 5, 50, 100, 250, -10] {
            let promo = percent("ANY", pct, None);
            let discount = discount_for(&promo, Decimal::new(12_345, 2));
            assert!(discount >= Decimal::ZERO);
            assert!(discount <= Decimal::new(12_345, 2));
        }
    }
}
