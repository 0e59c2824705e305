use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lead::QuoteRequest;
use crate::domain::staff::StaffId;
use crate::errors::DomainError;

pub const URGENT_THRESHOLD: u8 = 80;
pub const HIGH_THRESHOLD: u8 = 60;
pub const MEDIUM_THRESHOLD: u8 = 35;

/// Lead score, always within `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct LeadScore(u8);

impl LeadScore {
    pub const MAX: u8 = 100;

    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(0, i64::from(Self::MAX)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn priority(self) -> LeadPriority {
        LeadPriority::from_score(self)
    }
}

impl From<i64> for LeadScore {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<LeadScore> for u8 {
    fn from(value: LeadScore) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl LeadPriority {
    pub fn from_score(score: LeadScore) -> Self {
        match score.value() {
            s if s >= URGENT_THRESHOLD => Self::Urgent,
            s if s >= HIGH_THRESHOLD => Self::High,
            s if s >= MEDIUM_THRESHOLD => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Scored,
    Assigned,
    Contacted,
    Quoted,
    Won,
    Lost,
    Archived,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Scored => "SCORED",
            Self::Assigned => "ASSIGNED",
            Self::Contacted => "CONTACTED",
            Self::Quoted => "QUOTED",
            Self::Won => "WON",
            Self::Lost => "LOST",
            Self::Archived => "ARCHIVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEW" => Some(Self::New),
            "SCORED" => Some(Self::Scored),
            "ASSIGNED" => Some(Self::Assigned),
            "CONTACTED" => Some(Self::Contacted),
            "QUOTED" => Some(Self::Quoted),
            "WON" => Some(Self::Won),
            "LOST" => Some(Self::Lost),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Archived)
    }

    /// Statuses that only the engine sets; everything later belongs to staff workflow.
    pub fn is_engine_owned(&self) -> bool {
        matches!(self, Self::New | Self::Scored)
    }
}

/// A quote request together with every field derived by the scoring engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredQuote {
    pub request: QuoteRequest,
    pub lead_score: LeadScore,
    pub lead_priority: LeadPriority,
    pub estimated_value: Decimal,
    pub seasonal_modifier: Decimal,
    pub promo_discount: Decimal,
    pub clv_first_year: Decimal,
    pub clv_three_year: Decimal,
    pub competitor_context: Option<String>,
    pub recommended_action: String,
    pub follow_up_due: DateTime<Utc>,
    pub assigned_to: StaffId,
    pub status: LeadStatus,
    pub input_fingerprint: String,
    pub scoring_notes: Vec<String>,
}

/// The staff-owned part of a stored lead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadWorkflow {
    pub status: LeadStatus,
    pub assigned_to: StaffId,
}

impl ScoredQuote {
    pub fn workflow(&self) -> LeadWorkflow {
        LeadWorkflow { status: self.status, assigned_to: self.assigned_to.clone() }
    }

    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        matches!(
            (self.status, next),
            (LeadStatus::New, LeadStatus::Scored)
                | (LeadStatus::Scored, LeadStatus::Assigned)
                | (LeadStatus::Scored, LeadStatus::Contacted)
                | (LeadStatus::Assigned, LeadStatus::Contacted)
                | (LeadStatus::Contacted, LeadStatus::Quoted)
                | (LeadStatus::Contacted, LeadStatus::Lost)
                | (LeadStatus::Quoted, LeadStatus::Won)
                | (LeadStatus::Quoted, LeadStatus::Lost)
                | (_, LeadStatus::Archived)
        )
    }

    pub fn transition_to(&mut self, next: LeadStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }

    /// Staff reassignment. A freshly scored lead moves to `ASSIGNED`; later statuses are kept.
    pub fn reassign(&mut self, staff: StaffId) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvariantViolation(format!(
                "cannot reassign a lead in terminal status {}",
                self.status.as_str()
            )));
        }

        self.assigned_to = staff;
        if self.status == LeadStatus::Scored {
            self.status = LeadStatus::Assigned;
        }
        Ok(())
    }

    /// Keeps a workflow-owned status across a wholesale re-score.
    pub fn carry_workflow_status(&mut self, previous: &ScoredQuote) {
        if !previous.status.is_engine_owned() {
            self.status = previous.status;
        }
    }

    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let violation = |message: String| -> Result<(), DomainError> {
            Err(DomainError::InvariantViolation(message))
        };

        if self.lead_priority != self.lead_score.priority() {
            return violation(format!(
                "lead priority {} does not match score {}",
                self.lead_priority.as_str(),
                self.lead_score.value()
            ));
        }
        if self.estimated_value < Decimal::ZERO {
            return violation("estimated value must be >= 0".to_string());
        }
        if self.seasonal_modifier <= Decimal::ZERO {
            return violation("seasonal modifier must be > 0".to_string());
        }
        if self.promo_discount < Decimal::ZERO || self.promo_discount > self.estimated_value {
            return violation("promo discount must be within 0..=estimated value".to_string());
        }
        if self.clv_first_year < Decimal::ZERO || self.clv_three_year < self.clv_first_year {
            return violation(
                "clv projections must satisfy 0 <= first year <= three year".to_string(),
            );
        }
        if self.follow_up_due <= self.request.created_at {
            return violation("follow-up must be due after the request was created".to_string());
        }
        if self.assigned_to.0.trim().is_empty() {
            return violation("scored lead must be assigned to a staff member".to_string());
        }
        Ok(())
    }
}
