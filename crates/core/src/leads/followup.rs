use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::lead::QuoteRequest;
use crate::domain::quote::LeadPriority;
use crate::domain::staff::{StaffId, StaffMember};

/// Longest follow-up delay a table may configure: one year.
pub const MAX_SLA_MINUTES: i64 = 365 * 24 * 60;

/// Maximum delay before first contact, in minutes per priority tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaTable {
    pub urgent_minutes: i64,
    pub high_minutes: i64,
    pub medium_minutes: i64,
    pub low_minutes: i64,
}

impl Default for SlaTable {
    fn default() -> Self {
        Self {
            urgent_minutes: 2 * 60,
            high_minutes: 24 * 60,
            medium_minutes: 72 * 60,
            low_minutes: 168 * 60,
        }
    }
}

impl SlaTable {
    /// Offset for `priority`, clamped to `1..=MAX_SLA_MINUTES` minutes. Validated tables
    /// never hit the clamp.
    pub fn offset(&self, priority: LeadPriority) -> Duration {
        let minutes = match priority {
            LeadPriority::Urgent => self.urgent_minutes,
            LeadPriority::High => self.high_minutes,
            LeadPriority::Medium => self.medium_minutes,
            LeadPriority::Low => self.low_minutes,
        };
        Duration::try_minutes(minutes.clamp(1, MAX_SLA_MINUTES)).unwrap_or_else(Duration::zero)
    }

    pub fn entries(&self) -> [(LeadPriority, i64); 4] {
        [
            (LeadPriority::Urgent, self.urgent_minutes),
            (LeadPriority::High, self.high_minutes),
            (LeadPriority::Medium, self.medium_minutes),
            (LeadPriority::Low, self.low_minutes),
        ]
    }
}

/// Saturates at the latest representable instant instead of overflowing.
pub fn follow_up_due(
    created_at: DateTime<Utc>,
    priority: LeadPriority,
    sla: &SlaTable,
) -> DateTime<Utc> {
    created_at.checked_add_signed(sla.offset(priority)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StaffDirectoryError {
    #[error("staff directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn list_staff(&self) -> Result<Vec<StaffMember>, StaffDirectoryError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkloadStoreError {
    #[error("workload store unavailable: {0}")]
    Unavailable(String),
    #[error("none of the candidate staff members has a workload counter")]
    NoCounter,
}

/// Open-lead counters per staff member.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Picks the candidate with the fewest open leads and increments its counter in one
    /// atomic step. Ties go to the earliest candidate in the given order.
    async fn assign_least_loaded(
        &self,
        candidates: &[StaffId],
    ) -> Result<StaffId, WorkloadStoreError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentPolicy {
    pub default_staff: StaffId,
    /// Extra attempts after the first failed workload update.
    pub retry_attempts: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub staff: StaffId,
    pub degraded: Option<String>,
}

impl Assignment {
    fn routed(staff: StaffId) -> Self {
        Self { staff, degraded: None }
    }

    fn fallback(policy: &AssignmentPolicy, reason: String) -> Self {
        Self {
            staff: policy.default_staff.clone(),
            degraded: Some(format!(
                "assignment degraded ({reason}); routed to default staff {}",
                policy.default_staff
            )),
        }
    }
}

/// Active members able to take the request, in rotation order.
///
/// Customer-type specialization is always enforced. When no one covers the request's
/// location, the location filter is dropped rather than leaving the lead unassigned.
pub fn select_candidates(staff: &[StaffMember], request: &QuoteRequest) -> Vec<StaffId> {
    let mut eligible: Vec<&StaffMember> = staff
        .iter()
        .filter(|member| member.active && member.handles(request.customer_type))
        .collect();
    eligible.sort_by(|a, b| a.rotation_order.cmp(&b.rotation_order).then(a.id.cmp(&b.id)));

    let local: Vec<StaffId> = eligible
        .iter()
        .filter(|member| member.covers_location(request.location_slug.as_deref()))
        .map(|member| member.id.clone())
        .collect();
    if !local.is_empty() {
        return local;
    }

    eligible.into_iter().map(|member| member.id.clone()).collect()
}

pub async fn assign_staff(
    request: &QuoteRequest,
    directory: &dyn StaffDirectory,
    workload: &dyn WorkloadStore,
    policy: &AssignmentPolicy,
) -> Assignment {
    let staff = match directory.list_staff().await {
        Ok(staff) => staff,
        Err(error) => return degrade(request, policy, error.to_string()),
    };

    let candidates = select_candidates(&staff, request);
    if candidates.is_empty() {
        return degrade(request, policy, "no eligible staff member".to_string());
    }

    let mut last_error = None;
    for _ in 0..=policy.retry_attempts {
        match workload.assign_least_loaded(&candidates).await {
            Ok(staff) => return Assignment::routed(staff),
            Err(error) => last_error = Some(error),
        }
    }

    let reason = last_error.map_or_else(|| "workload store failed".to_string(), |e| e.to_string());
    degrade(request, policy, reason)
}

fn degrade(request: &QuoteRequest, policy: &AssignmentPolicy, reason: String) -> Assignment {
    warn!(
        event_name = "lead.assignment.degraded",
        quote_id = %request.id,
        default_staff = %policy.default_staff,
        reason = %reason,
        "staff assignment fell back to default staff member"
    );
    Assignment::fallback(policy, reason)
}
