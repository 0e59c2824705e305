use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use leadflow_core::domain::lead::CustomerType;
use leadflow_core::domain::promotion::{Promotion, PromotionKind};
use leadflow_core::domain::staff::{StaffId, StaffMember};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlPromotionSource, SqlStaffDirectory};

struct StaffSeed {
    id: &'static str,
    name: &'static str,
    locations: &'static [&'static str],
    specializations: &'static [CustomerType],
    rotation_order: u32,
}

/// Demo crew covering the Austin metro.
const SEED_STAFF: &[StaffSeed] = &[
    StaffSeed {
        id: "avery",
        name: "Avery Collins",
        locations: &["austin", "round-rock"],
        specializations: &[],
        rotation_order: 1,
    },
    StaffSeed {
        id: "blake",
        name: "Blake Moreno",
        locations: &["*"],
        specializations: &[CustomerType::Commercial],
        rotation_order: 2,
    },
    StaffSeed {
        id: "casey",
        name: "Casey Nguyen",
        locations: &["georgetown", "round-rock", "cedar-park"],
        specializations: &[CustomerType::Residential],
        rotation_order: 3,
    },
];

const SEED_PROMOTION_CODES: &[&str] = &["SPRING15", "WELCOME25", "EXPIRED2023", "FALL10"];

fn utc(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

fn seed_promotions() -> Vec<Promotion> {
    vec![
        Promotion {
            code: "SPRING15".to_string(),
            kind: PromotionKind::Percentage { percent: Decimal::from(15) },
            cap: Some(Decimal::from(50)),
            active: true,
            starts_at: None,
            expires_at: None,
        },
        Promotion {
            code: "WELCOME25".to_string(),
            kind: PromotionKind::Flat { amount: Decimal::from(25) },
            cap: None,
            active: true,
            starts_at: None,
            expires_at: None,
        },
        Promotion {
            code: "EXPIRED2023".to_string(),
            kind: PromotionKind::Percentage { percent: Decimal::from(20) },
            cap: None,
            active: true,
            starts_at: utc(2023, 3, 1),
            expires_at: utc(2024, 1, 1),
        },
        Promotion {
            code: "FALL10".to_string(),
            kind: PromotionKind::Percentage { percent: Decimal::from(10) },
            cap: Some(Decimal::from(40)),
            active: false,
            starts_at: None,
            expires_at: None,
        },
    ]
}

/// Deterministic demo staff and promotions for local runs and tests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub fn staff() -> Vec<StaffMember> {
        SEED_STAFF
            .iter()
            .map(|seed| StaffMember {
                id: StaffId(seed.id.to_string()),
                name: seed.name.to_string(),
                location_slugs: seed.locations.iter().map(|slug| slug.to_string()).collect(),
                specializations: seed.specializations.to_vec(),
                rotation_order: seed.rotation_order,
                active: true,
            })
            .collect()
    }

    pub fn promotions() -> Vec<Promotion> {
        seed_promotions()
    }

    /// Upserts the dataset. Re-running is safe and keeps workload counters.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let directory = SqlStaffDirectory::new(pool.clone());
        let promotions = SqlPromotionSource::new(pool.clone());

        let staff = Self::staff();
        for member in &staff {
            directory.upsert(member).await?;
        }
        let seeded_promotions = Self::promotions();
        for promotion in &seeded_promotions {
            promotions.upsert(promotion).await?;
        }

        Ok(SeedResult {
            staff_seeded: staff.into_iter().map(|member| member.id.0).collect(),
            promotions_seeded: seeded_promotions
                .into_iter()
                .map(|promotion| promotion.code)
                .collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for seed in SEED_STAFF {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM staff_member m
                     JOIN staff_workload w ON w.staff_id = m.id
                     WHERE m.id = ?1 AND m.rotation_order = ?2
                 )",
            )
            .bind(seed.id)
            .bind(i64::from(seed.rotation_order))
            .fetch_one(pool)
            .await?;
            checks.push((seed.id, present == 1));
        }

        for &code in SEED_PROMOTION_CODES {
            let present: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM promotion WHERE code = ?1)")
                    .bind(code)
                    .fetch_one(pool)
                    .await?;
            checks.push((code, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub staff_seeded: Vec<String>,
    pub promotions_seeded: Vec<String>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
