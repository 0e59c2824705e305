use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use leadflow_core::domain::lead::QuoteRequestId;
use leadflow_core::domain::promotion::{normalize_code, Promotion};
use leadflow_core::domain::quote::{LeadWorkflow, ScoredQuote};
use leadflow_core::domain::staff::{StaffId, StaffMember};
use leadflow_core::leads::followup::{
    StaffDirectory, StaffDirectoryError, WorkloadStore, WorkloadStoreError,
};
use leadflow_core::leads::promotion::{PromotionLookupError, PromotionSource};

use super::{RepositoryError, ScoredQuoteRepository};

#[derive(Default)]
pub struct InMemoryScoredQuoteRepository {
    quotes: RwLock<HashMap<QuoteRequestId, ScoredQuote>>,
}

#[async_trait]
impl ScoredQuoteRepository for InMemoryScoredQuoteRepository {
    async fn find_by_id(
        &self,
        id: &QuoteRequestId,
    ) -> Result<Option<ScoredQuote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(id).cloned())
    }

    async fn insert(&self, quote: &ScoredQuote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if quotes.contains_key(&quote.request.id) {
            return Err(RepositoryError::Conflict(format!(
                "quote request {} is already stored",
                quote.request.id
            )));
        }
        quotes.insert(quote.request.id, quote.clone());
        Ok(())
    }

    async fn update_scoring(&self, quote: &ScoredQuote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let stored = match quotes.get_mut(&quote.request.id) {
            Some(stored) if stored.input_fingerprint == quote.input_fingerprint => stored,
            _ => {
                return Err(RepositoryError::Conflict(format!(
                    "quote request {} is not stored with fingerprint {}",
                    quote.request.id, quote.input_fingerprint
                )))
            }
        };

        let workflow = stored.workflow();
        *stored = quote.clone();
        stored.status = workflow.status;
        stored.assigned_to = workflow.assigned_to;
        Ok(())
    }

    async fn update_workflow(
        &self,
        id: &QuoteRequestId,
        expected: &LeadWorkflow,
        next: &LeadWorkflow,
    ) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let stored = match quotes.get_mut(id) {
            Some(stored) if stored.workflow() == *expected => stored,
            _ => {
                return Err(RepositoryError::Conflict(format!(
                    "quote request {id} is no longer {} for {}",
                    expected.status.as_str(),
                    expected.assigned_to
                )))
            }
        };

        stored.status = next.status;
        stored.assigned_to = next.assigned_to.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPromotionSource {
    promotions: RwLock<HashMap<String, Promotion>>,
}

impl InMemoryPromotionSource {
    pub fn with_promotions(promotions: impl IntoIterator<Item = Promotion>) -> Self {
        let promotions = promotions
            .into_iter()
            .filter_map(|promotion| {
                normalize_code(&promotion.code).map(|code| (code, promotion))
            })
            .collect();
        Self { promotions: RwLock::new(promotions) }
    }

    pub async fn upsert(&self, promotion: Promotion) {
        if let Some(code) = normalize_code(&promotion.code) {
            self.promotions.write().await.insert(code, promotion);
        }
    }
}

#[async_trait]
impl PromotionSource for InMemoryPromotionSource {
    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>, PromotionLookupError> {
        let Some(code) = normalize_code(code) else {
            return Ok(None);
        };
        let promotions = self.promotions.read().await;
        Ok(promotions.get(&code).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryStaffDirectory {
    staff: RwLock<Vec<StaffMember>>,
}

impl InMemoryStaffDirectory {
    pub fn with_staff(staff: Vec<StaffMember>) -> Self {
        Self { staff: RwLock::new(staff) }
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn list_staff(&self) -> Result<Vec<StaffMember>, StaffDirectoryError> {
        Ok(self.staff.read().await.clone())
    }
}

/// Open-lead counters guarded by a single lock, so selecting and incrementing the
/// least-loaded member cannot interleave with another assignment.
#[derive(Default)]
pub struct InMemoryWorkloadStore {
    open_leads: Mutex<HashMap<StaffId, u32>>,
}

impl InMemoryWorkloadStore {
    pub fn with_counters(counters: impl IntoIterator<Item = (StaffId, u32)>) -> Self {
        Self { open_leads: Mutex::new(counters.into_iter().collect()) }
    }

    pub async fn open_leads(&self, staff: &StaffId) -> Option<u32> {
        self.open_leads.lock().await.get(staff).copied()
    }
}

#[async_trait]
impl WorkloadStore for InMemoryWorkloadStore {
    async fn assign_least_loaded(
        &self,
        candidates: &[StaffId],
    ) -> Result<StaffId, WorkloadStoreError> {
        let mut open_leads = self.open_leads.lock().await;
        let chosen = candidates
            .iter()
            .filter_map(|candidate| open_leads.get(candidate).map(|count| (candidate, *count)))
            .min_by_key(|(_, count)| *count)
            .map(|(candidate, _)| candidate.clone())
            .ok_or(WorkloadStoreError::NoCounter)?;

        if let Some(count) = open_leads.get_mut(&chosen) {
            *count = count.saturating_add(1);
        }
        Ok(chosen)
    }
}
