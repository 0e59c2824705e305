pub mod config;
pub mod domain;
pub mod errors;
pub mod leads;

pub use domain::lead::{
    CustomerType, PropertySize, QuoteRequest, QuoteRequestId, ServiceId, Urgency,
};
pub use domain::promotion::{Promotion, PromotionKind};
pub use domain::quote::{LeadPriority, LeadScore, LeadStatus, LeadWorkflow, ScoredQuote};
pub use domain::staff::{StaffId, StaffMember};
pub use errors::{
    ApplicationError, ConfigurationError, DomainError, FieldIssue, InterfaceError, IssueKind,
    ValidationError,
};
pub use leads::followup::{
    AssignmentPolicy, StaffDirectory, StaffDirectoryError, WorkloadStore, WorkloadStoreError,
};
pub use leads::normalizer::RawSubmission;
pub use leads::promotion::{PromotionLookupError, PromotionOutcome, PromotionSource};
pub use leads::tables::EngineTables;
pub use leads::LeadScoringEngine;
