use async_trait::async_trait;
use thiserror::Error;

use leadflow_core::domain::lead::QuoteRequestId;
use leadflow_core::domain::quote::{LeadWorkflow, ScoredQuote};
use leadflow_core::leads::followup::{StaffDirectoryError, WorkloadStoreError};
use leadflow_core::leads::promotion::PromotionLookupError;

pub mod memory;
pub mod promotion;
pub mod quote;
pub mod staff;

pub use memory::{
    InMemoryPromotionSource, InMemoryScoredQuoteRepository, InMemoryStaffDirectory,
    InMemoryWorkloadStore,
};
pub use promotion::SqlPromotionSource;
pub use quote::SqlScoredQuoteRepository;
pub use staff::{SqlStaffDirectory, SqlWorkloadStore};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for PromotionLookupError {
    fn from(error: RepositoryError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

impl From<RepositoryError> for StaffDirectoryError {
    fn from(error: RepositoryError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

impl From<RepositoryError> for WorkloadStoreError {
    fn from(error: RepositoryError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Persistence for completed lead records.
///
/// A stored lead is never overwritten wholesale. Intake inserts it once, re-scoring
/// replaces the engine-derived columns only, and staff updates are compare-and-set on
/// the workflow fields.
#[async_trait]
pub trait ScoredQuoteRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &QuoteRequestId,
    ) -> Result<Option<ScoredQuote>, RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] when the id is already stored.
    async fn insert(&self, quote: &ScoredQuote) -> Result<(), RepositoryError>;

    /// Replaces the derived fields of the stored lead with the same id and request
    /// fingerprint. `status` and `assigned_to` are left as stored.
    async fn update_scoring(&self, quote: &ScoredQuote) -> Result<(), RepositoryError>;

    /// Moves the lead's workflow from `expected` to `next`. Fails with
    /// [`RepositoryError::Conflict`] when the stored workflow no longer equals `expected`.
    async fn update_workflow(
        &self,
        id: &QuoteRequestId,
        expected: &LeadWorkflow,
        next: &LeadWorkflow,
    ) -> Result<(), RepositoryError>;
}

pub(crate) fn column<'r, T>(
    row: &'r sqlx::sqlite::SqliteRow,
    name: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    use sqlx::Row;
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn parse_decimal(
    column: &str,
    value: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value.parse().map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(value).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn to_json<T: serde::Serialize>(
    column: &str,
    value: &T,
) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}
