use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lead::{CustomerType, QuoteRequest};
use crate::domain::quote::LeadPriority;
use crate::leads::promotion::PromotionOutcome;

pub fn default_competitor_keywords() -> Vec<String> {
    [
        "trugreen",
        "brightview",
        "lawn doctor",
        "weed man",
        "davey",
        "yellowstone",
        "another company",
        "other company",
        "another quote",
        "competitor",
        "current provider",
        "cheaper",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Jobs at or above this estimate get the high-value wording.
pub const HIGH_VALUE_ESTIMATE: i64 = 1_500;

/// One row of the action table. `None` matches any value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRule {
    #[serde(default)]
    pub priority: Option<LeadPriority>,
    #[serde(default)]
    pub customer_type: Option<CustomerType>,
    #[serde(default)]
    pub competitor_mentioned: Option<bool>,
    /// Inclusive lower bound on the estimated value.
    #[serde(default)]
    pub min_estimated_value: Option<Decimal>,
    pub action: String,
}

impl RecommendationRule {
    fn new(
        priority: Option<LeadPriority>,
        customer_type: Option<CustomerType>,
        competitor_mentioned: Option<bool>,
        action: &str,
    ) -> Self {
        Self {
            priority,
            customer_type,
            competitor_mentioned,
            min_estimated_value: None,
            action: action.to_string(),
        }
    }

    fn worth_at_least(mut self, value: i64) -> Self {
        self.min_estimated_value = Some(Decimal::from(value));
        self
    }

    fn matches(&self, key: &RecommendationKey) -> bool {
        self.priority.map_or(true, |priority| priority == key.priority)
            && self.customer_type.map_or(true, |customer_type| customer_type == key.customer_type)
            && self
                .competitor_mentioned
                .map_or(true, |mentioned| mentioned == key.competitor_mentioned)
            && self.min_estimated_value.map_or(true, |floor| key.estimated_value >= floor)
    }
}

pub fn default_recommendation_rules() -> Vec<RecommendationRule> {
    use CustomerType::Commercial;
    use LeadPriority::{High, Low, Medium, Urgent};

    vec![
        RecommendationRule::new(
            Some(Urgent),
            None,
            Some(true),
            "Call within 2 hours; mentions competitor, lead with a price-match walkthrough",
        ),
        RecommendationRule::new(
            Some(Urgent),
            Some(Commercial),
            None,
            "Call within 2 hours and book an on-site commercial assessment",
        ),
        RecommendationRule::new(Some(Urgent), None, None, "Call within 2 hours"),
        RecommendationRule::new(
            Some(High),
            None,
            Some(true),
            "Call within 24 hours; mentions competitor, send comparison sheet",
        ),
        RecommendationRule::new(
            Some(High),
            None,
            None,
            "Call within 24 hours; high-value job, book an on-site estimate",
        )
        .worth_at_least(HIGH_VALUE_ESTIMATE),
        RecommendationRule::new(
            Some(High),
            Some(Commercial),
            None,
            "Call within 24 hours and schedule a commercial site walk",
        ),
        RecommendationRule::new(
            Some(High),
            None,
            None,
            "Call within 24 hours and schedule a site visit",
        ),
        RecommendationRule::new(
            Some(Medium),
            None,
            Some(true),
            "Email a competitive quote within 3 days",
        ),
        RecommendationRule::new(
            Some(Medium),
            None,
            None,
            "Call within 3 days; high-value job, quote by phone before emailing",
        )
        .worth_at_least(HIGH_VALUE_ESTIMATE),
        RecommendationRule::new(Some(Medium), None, None, "Send quote by email within 3 days"),
        RecommendationRule::new(
            Some(Low),
            None,
            None,
            "Add to seasonal nurture sequence; follow up within 1 week",
        ),
    ]
}

fn fallback_action(priority: LeadPriority) -> &'static str {
    match priority {
        LeadPriority::Urgent => "Call within 2 hours",
        LeadPriority::High => "Call within 24 hours",
        LeadPriority::Medium => "Follow up within 3 days",
        LeadPriority::Low => "Follow up within 1 week",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecommendationKey {
    pub priority: LeadPriority,
    pub customer_type: CustomerType,
    pub competitor_mentioned: bool,
    pub estimated_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub competitor_context: Option<String>,
    pub recommended_action: String,
}

/// Keywords found in `additionalInfo` and `source`, in keyword-list order.
pub fn competitor_mentions(request: &QuoteRequest, keywords: &[String]) -> Vec<String> {
    let info = request.additional_info.as_deref().unwrap_or("").to_lowercase();
    let source = request.source.to_lowercase();

    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| info.contains(keyword.as_str()) || source.contains(keyword.as_str()))
        .collect()
}

pub fn recommend(
    request: &QuoteRequest,
    priority: LeadPriority,
    estimated_value: Decimal,
    promotion: &PromotionOutcome,
    keywords: &[String],
    rules: &[RecommendationRule],
) -> Recommendation {
    let mentions = competitor_mentions(request, keywords);
    let key = RecommendationKey {
        priority,
        customer_type: request.customer_type,
        competitor_mentioned: !mentions.is_empty(),
        estimated_value,
    };

    let competitor_context =
        (!mentions.is_empty()).then(|| format!("Mentions competitor: {}", mentions.join(", ")));

    let mut recommended_action = rules
        .iter()
        .find(|rule| rule.matches(&key))
        .map(|rule| rule.action.clone())
        .unwrap_or_else(|| fallback_action(priority).to_string());

    if let Some(note) = promotion.note() {
        recommended_action.push_str(&format!(" ({note})"));
    }

    Recommendation { competitor_context, recommended_action }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{
        competitor_mentions, default_competitor_keywords, default_recommendation_rules,
        recommend, RecommendationRule,
    };
    use crate::domain::lead::{
        CustomerType, PropertySize, QuoteRequest, QuoteRequestId, ServiceId, Urgency,
    };
    use crate::domain::quote::LeadPriority;
    use crate::leads::promotion::PromotionOutcome;

    fn request(info: Option<&str>, source: &str, customer_type: CustomerType) -> QuoteRequest {
        QuoteRequest {
            id: QuoteRequestId(Uuid::nil()),
            name: "Riley Chen".to_string(),
            email: "riley@example.com".to_string(),
            phone: "5125550175".to_string(),
            address: "77 Pine Rd".to_string(),
            property_size: PropertySize::Medium,
            services: BTreeSet::from([ServiceId("fertilization".to_string())]),
            additional_info: info.map(str::to_string),
            urgency: Urgency::ThisWeek,
            location_slug: None,
            customer_type,
            source: source.to_string(),
            used_ai_planner: false,
            used_audit: false,
            page_view_count: 1,
            is_return_visit: false,
            promo_code: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn urgent_lead_mentioning_competitor_gets_competitive_callback() {
        let lead = request(
            Some("TruGreen quoted us last week, looking for something cheaper"),
            "organic",
            CustomerType::Residential,
        );

        let recommendation = recommend(
            &lead,
            LeadPriority::Urgent,
            Decimal::from(400),
            &PromotionOutcome::NoCode,
            &default_competitor_keywords(),
            &default_recommendation_rules(),
        );

        assert_eq!(
            recommendation.competitor_context.as_deref(),
            Some("Mentions competitor: trugreen, cheaper")
        );
        assert!(recommendation.recommended_action.starts_with("Call within 2 hours"));
        assert!(recommendation.recommended_action.contains("mentions competitor"));
    }

    #[test]
    fn source_is_scanned_for_competitor_keywords() {
        let lead = request(None, "brightview-switchers-ad", CustomerType::Residential);
        assert_eq!(competitor_mentions(&lead, &default_competitor_keywords()), vec!["brightview"]);
    }

    #[test]
    fn no_mention_leaves_context_absent() {
        let lead = request(Some("Backyard needs help"), "organic", CustomerType::Commercial);
        let recommendation = recommend(
            &lead,
            LeadPriority::High,
            Decimal::from(400),
            &PromotionOutcome::NoCode,
            &default_competitor_keywords(),
            &default_recommendation_rules(),
        );
        assert_eq!(recommendation.competitor_context, None);
        assert_eq!(
            recommendation.recommended_action,
            "Call within 24 hours and schedule a commercial site walk"
        );
    }

    #[test]
    fn invalid_promo_code_is_noted_in_action() {
        let lead = request(None, "email", CustomerType::Residential);
        let recommendation = recommend(
            &lead,
            LeadPriority::Medium,
            Decimal::from(500),
            &PromotionOutcome::Expired { code: "EXPIRED2023".to_string() },
            &default_competitor_keywords(),
            &default_recommendation_rules(),
        );
        assert_eq!(
            recommendation.recommended_action,
            "Send quote by email within 3 days (promo code EXPIRED2023 is invalid (expired))"
        );
    }

    #[test]
    fn applied_promo_adds_no_note() {
        let lead = request(None, "email", CustomerType::Residential);
        let recommendation = recommend(
            &lead,
            LeadPriority::Low,
            Decimal::from(90),
            &PromotionOutcome::Applied { code: "SPRING15".to_string(), discount: Decimal::TEN },
            &[],
            &default_recommendation_rules(),
        );
        assert!(!recommendation.recommended_action.contains("promo"));
    }

    #[test]
    fn empty_rule_table_falls_back_to_priority_default() {
        let lead = request(None, "organic", CustomerType::Residential);
        let recommendation = recommend(
            &lead,
            LeadPriority::High,
            Decimal::ZERO,
            &PromotionOutcome::NoCode,
            &[],
            &[],
        );
        assert_eq!(recommendation.recommended_action, "Call within 24 hours");
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            RecommendationRule {
                priority: None,
                customer_type: Some(CustomerType::Commercial),
                competitor_mentioned: None,
                min_estimated_value: None,
                action: "Route to commercial desk".to_string(),
            },
            RecommendationRule {
                priority: None,
                customer_type: None,
                competitor_mentioned: None,
                min_estimated_value: None,
                action: "Generic".to_string(),
            },
        ];
        let commercial = request(None, "organic", CustomerType::Commercial);
        let residential = request(None, "organic", CustomerType::Residential);

        let no_code = PromotionOutcome::NoCode;
        let value = Decimal::from(200);
        let first = recommend(&commercial, LeadPriority::Low, value, &no_code, &[], &rules);
        let second = recommend(&residential, LeadPriority::Low, value, &no_code, &[], &rules);
        assert_eq!(first.recommended_action, "Route to commercial desk");
        assert_eq!(second.recommended_action, "Generic");
    }

    #[test]
    fn estimated_value_selects_high_value_wording() {
        let lead = request(Some("Front and back yard"), "organic", CustomerType::Residential);
        let rules = default_recommendation_rules();
        let keywords = default_competitor_keywords();
        let no_code = PromotionOutcome::NoCode;

        let modest =
            recommend(&lead, LeadPriority::High, Decimal::from(1_499), &no_code, &keywords, &rules);
        let large =
            recommend(&lead, LeadPriority::High, Decimal::from(1_500), &no_code, &keywords, &rules);

        assert_eq!(modest.recommended_action, "Call within 24 hours and schedule a site visit");
        assert_eq!(
            large.recommended_action,
            "Call within 24 hours; high-value job, book an on-site estimate"
        );
    }

    #[test]
    fn value_floor_parses_from_toml() {
        let rule: RecommendationRule = toml::from_str(
            r#"
            priority = "LOW"
            min_estimated_value = 2000
            action = "Hand to the estate crew"
            "#,
        )
        .expect("rule parses");

        assert_eq!(rule.min_estimated_value, Some(Decimal::from(2_000)));
        assert_eq!(rule.customer_type, None);
    }
}
