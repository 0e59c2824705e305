pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, ping, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    InMemoryPromotionSource, InMemoryScoredQuoteRepository, InMemoryStaffDirectory,
    InMemoryWorkloadStore, RepositoryError, ScoredQuoteRepository, SqlPromotionSource,
    SqlScoredQuoteRepository, SqlStaffDirectory, SqlWorkloadStore,
};
