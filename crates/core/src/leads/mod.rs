//! Lead scoring pipeline.
//!
//! [`LeadScoringEngine`] runs a submission through normalization, scoring, valuation,
//! promotion resolution, recommendation and follow-up scheduling, then assembles the
//! [`ScoredQuote`]. Only normalization can fail; every later stage degrades to a safe
//! default and records a note instead.

pub mod followup;
pub mod normalizer;
pub mod promotion;
pub mod recommendation;
pub mod scoring;
pub mod tables;
pub mod valuation;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::lead::QuoteRequest;
use crate::domain::quote::{LeadStatus, ScoredQuote};
use crate::errors::{ConfigurationError, ValidationError};
use followup::{
    assign_staff, follow_up_due, Assignment, AssignmentPolicy, StaffDirectory, WorkloadStore,
};
use normalizer::RawSubmission;
use promotion::{PromotionOutcome, PromotionSource};
use scoring::{LeadScorer, WeightedLeadScorer};
use tables::EngineTables;

pub struct LeadScoringEngine<P, D, W> {
    tables: EngineTables,
    scorer: WeightedLeadScorer,
    promotions: P,
    staff: D,
    workload: W,
    policy: AssignmentPolicy,
}

impl<P, D, W> LeadScoringEngine<P, D, W>
where
    P: PromotionSource,
    D: StaffDirectory,
    W: WorkloadStore,
{
    pub fn new(
        tables: EngineTables,
        promotions: P,
        staff: D,
        workload: W,
        policy: AssignmentPolicy,
    ) -> Result<Self, ConfigurationError> {
        tables.validate()?;
        if policy.default_staff.0.trim().is_empty() {
            return Err(ConfigurationError::InvalidEntry {
                table: "assignment",
                detail: "default_staff must name a staff member".to_string(),
            });
        }

        Ok(Self {
            scorer: WeightedLeadScorer::new(tables.scoring.clone()),
            tables,
            promotions,
            staff,
            workload,
            policy,
        })
    }

    pub fn tables(&self) -> &EngineTables {
        &self.tables
    }

    pub fn policy(&self) -> &AssignmentPolicy {
        &self.policy
    }

    pub fn normalize(
        &self,
        raw: &RawSubmission,
        received_at: DateTime<Utc>,
    ) -> Result<QuoteRequest, ValidationError> {
        normalizer::normalize(raw, &|service| self.tables.is_known_service(service), received_at)
    }

    pub async fn score_quote(
        &self,
        raw: &RawSubmission,
        received_at: DateTime<Utc>,
    ) -> Result<ScoredQuote, ValidationError> {
        let request = self.normalize(raw, received_at)?;
        Ok(self.score_request(request).await)
    }

    /// Computes every derived field for `request` and routes it to a staff member.
    pub async fn score_request(&self, request: QuoteRequest) -> ScoredQuote {
        let assignment =
            assign_staff(&request, &self.staff, &self.workload, &self.policy).await;
        self.assemble(request, assignment).await
    }

    /// Recomputes the derived fields of a stored lead from its request snapshot.
    ///
    /// The lead keeps its assignee and workflow status. Its workload slot was taken when
    /// it was first scored, so the counters are not touched again.
    pub async fn rescore(&self, previous: &ScoredQuote) -> ScoredQuote {
        let kept = Assignment { staff: previous.assigned_to.clone(), degraded: None };
        let mut rescored = self.assemble(previous.request.clone(), kept).await;
        rescored.carry_workflow_status(previous);

        info!(
            event_name = "lead.rescored",
            quote_id = %rescored.request.id,
            previous_score = previous.lead_score.value(),
            lead_score = rescored.lead_score.value(),
            "lead re-scored"
        );
        rescored
    }

    async fn assemble(&self, request: QuoteRequest, assignment: Assignment) -> ScoredQuote {
        let mut notes = Vec::new();
        if !request.property_size.is_recognized() {
            notes.push(format!(
                "property size `{}` not recognized; valued as {}",
                request.property_size.as_str(),
                request.property_size.resolved().as_str()
            ));
        }

        let assessment = self.scorer.assess(&request);
        let valuation = valuation::estimate(&request, self.tables.valuation());
        let promotion = self.resolve_promotion(&request, valuation.estimated_value).await;
        if let Some(note) = promotion.note() {
            notes.push(note);
        }
        let recommendation = recommendation::recommend(
            &request,
            assessment.priority,
            valuation.estimated_value,
            &promotion,
            &self.tables.competitor_keywords,
            &self.tables.recommendation_rules,
        );
        let follow_up_due =
            follow_up_due(request.created_at, assessment.priority, &self.tables.follow_up_sla);
        if let Some(note) = assignment.degraded {
            notes.push(note);
        }

        let scored = ScoredQuote {
            input_fingerprint: request.fingerprint(),
            lead_score: assessment.score,
            lead_priority: assessment.priority,
            estimated_value: valuation.estimated_value,
            seasonal_modifier: valuation.seasonal_modifier,
            promo_discount: promotion.discount(),
            clv_first_year: valuation.clv_first_year,
            clv_three_year: valuation.clv_three_year,
            competitor_context: recommendation.competitor_context,
            recommended_action: recommendation.recommended_action,
            follow_up_due,
            assigned_to: assignment.staff,
            status: LeadStatus::Scored,
            scoring_notes: notes,
            request,
        };
        debug_assert!(scored.check_invariants().is_ok());

        info!(
            event_name = "lead.scored",
            quote_id = %scored.request.id,
            lead_score = scored.lead_score.value(),
            lead_priority = scored.lead_priority.as_str(),
            assigned_to = %scored.assigned_to,
            "lead scored"
        );
        scored
    }

    async fn resolve_promotion(
        &self,
        request: &QuoteRequest,
        estimated_value: Decimal,
    ) -> PromotionOutcome {
        let Some(code) = request.promo_code.as_deref() else {
            return PromotionOutcome::NoCode;
        };

        let lookup = self.promotions.find_by_code(code).await;
        if let Err(error) = &lookup {
            warn!(
                event_name = "lead.promotion.lookup_failed",
                quote_id = %request.id,
                promo_code = code,
                error = %error,
                "promotion lookup failed; no discount applied"
            );
        }

        promotion::resolve(
            Some(code),
            lookup.as_ref().map(Option::as_ref),
            estimated_value,
            request.created_at,
        )
    }
}
