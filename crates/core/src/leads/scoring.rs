//! Lead scoring: a weighted sum of discrete submission signals, clamped to `0..=100`.

use serde::{Deserialize, Serialize};

use crate::domain::lead::{CustomerType, PropertySize, QuoteRequest, Urgency};
use crate::domain::quote::{LeadPriority, LeadScore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyPoints {
    pub emergency: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub flexible: i64,
}

impl Default for UrgencyPoints {
    fn default() -> Self {
        Self { emergency: 30, this_week: 20, this_month: 10, flexible: 0 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizePoints {
    pub small: i64,
    pub medium: i64,
    pub large: i64,
    pub estate: i64,
}

impl Default for SizePoints {
    fn default() -> Self {
        Self { small: 5, medium: 10, large: 15, estate: 20 }
    }
}

/// Points awarded per signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub urgency: UrgencyPoints,
    pub property_size: SizePoints,
    /// Points per requested service, summed up to `service_cap`.
    pub per_service: i64,
    pub service_cap: i64,
    pub residential: i64,
    pub commercial: i64,
    /// `page_view_bonus` applies once `page_view_count >= page_view_threshold`.
    pub page_view_threshold: u32,
    pub page_view_bonus: i64,
    pub return_visit_bonus: i64,
    pub ai_planner_bonus: i64,
    pub audit_bonus: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            urgency: UrgencyPoints::default(),
            property_size: SizePoints::default(),
            per_service: 6,
            service_cap: 24,
            residential: 5,
            commercial: 15,
            page_view_threshold: 3,
            page_view_bonus: 5,
            return_visit_bonus: 5,
            ai_planner_bonus: 10,
            audit_bonus: 10,
        }
    }
}

/// Per-signal contributions, kept so a score can be explained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub urgency: i64,
    pub property_size: i64,
    pub services: i64,
    pub customer_type: i64,
    pub intent: i64,
}

impl ScoreBreakdown {
    pub fn raw_total(&self) -> i64 {
        self.urgency + self.property_size + self.services + self.customer_type + self.intent
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadAssessment {
    pub score: LeadScore,
    pub priority: LeadPriority,
    pub breakdown: ScoreBreakdown,
}

pub trait LeadScorer: Send + Sync {
    fn assess(&self, request: &QuoteRequest) -> LeadAssessment;
}

#[derive(Clone, Debug, Default)]
pub struct WeightedLeadScorer {
    weights: ScoringWeights,
}

impl WeightedLeadScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }
}

impl LeadScorer for WeightedLeadScorer {
    fn assess(&self, request: &QuoteRequest) -> LeadAssessment {
        assess_lead(request, &self.weights)
    }
}

pub fn score(request: &QuoteRequest, weights: &ScoringWeights) -> LeadScore {
    assess_lead(request, weights).score
}

pub fn assess_lead(request: &QuoteRequest, weights: &ScoringWeights) -> LeadAssessment {
    let urgency = match request.urgency {
        Urgency::Emergency => weights.urgency.emergency,
        Urgency::ThisWeek => weights.urgency.this_week,
        Urgency::ThisMonth => weights.urgency.this_month,
        Urgency::Flexible => weights.urgency.flexible,
    };

    let property_size = match request.property_size.resolved() {
        PropertySize::Small => weights.property_size.small,
        PropertySize::Large => weights.property_size.large,
        PropertySize::Estate => weights.property_size.estate,
        PropertySize::Medium | PropertySize::Unrecognized(_) => weights.property_size.medium,
    };

    let service_count = i64::try_from(request.services.len()).unwrap_or(i64::MAX);
    let services =
        weights.per_service.saturating_mul(service_count).min(weights.service_cap.max(0));

    let customer_type = match request.customer_type {
        CustomerType::Residential => weights.residential,
        CustomerType::Commercial => weights.commercial,
    };

    let mut intent = 0;
    if request.page_view_count >= weights.page_view_threshold {
        intent += weights.page_view_bonus;
    }
    if request.is_return_visit {
        intent += weights.return_visit_bonus;
    }
    if request.used_ai_planner {
        intent += weights.ai_planner_bonus;
    }
    if request.used_audit {
        intent += weights.audit_bonus;
    }

    let breakdown = ScoreBreakdown { urgency, property_size, services, customer_type, intent };
    let score = LeadScore::clamped(breakdown.raw_total());

    LeadAssessment { score, priority: score.priority(), breakdown }
}
