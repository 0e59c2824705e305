use async_trait::async_trait;

use leadflow_core::domain::promotion::{normalize_code, Promotion, PromotionKind};
use leadflow_core::leads::promotion::{PromotionLookupError, PromotionSource};

use super::{column, parse_decimal, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlPromotionSource {
    pool: DbPool,
}

impl SqlPromotionSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, code: &str) -> Result<Option<Promotion>, RepositoryError> {
        let Some(code) = normalize_code(code) else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT code, kind, amount, cap, active, starts_at, expires_at
             FROM promotion WHERE code = ?",
        )
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_promotion(r)?)),
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, promotion: &Promotion) -> Result<(), RepositoryError> {
        let code = normalize_code(&promotion.code)
            .ok_or_else(|| RepositoryError::Decode("promotion code is blank".to_string()))?;
        let (kind, amount) = match &promotion.kind {
            PromotionKind::Percentage { percent } => ("percentage", percent),
            PromotionKind::Flat { amount } => ("flat", amount),
        };

        sqlx::query(
            "INSERT INTO promotion (code, kind, amount, cap, active, starts_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                 kind = excluded.kind,
                 amount = excluded.amount,
                 cap = excluded.cap,
                 active = excluded.active,
                 starts_at = excluded.starts_at,
                 expires_at = excluded.expires_at",
        )
        .bind(&code)
        .bind(kind)
        .bind(amount.to_string())
        .bind(promotion.cap.map(|cap| cap.to_string()))
        .bind(promotion.active)
        .bind(promotion.starts_at.map(|dt| dt.to_rfc3339()))
        .bind(promotion.expires_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_promotion(row: &sqlx::sqlite::SqliteRow) -> Result<Promotion, RepositoryError> {
    let kind: String = column(row, "kind")?;
    let amount: String = column(row, "amount")?;
    let amount = parse_decimal("amount", &amount)?;
    let cap: Option<String> = column(row, "cap")?;
    let starts_at: Option<String> = column(row, "starts_at")?;
    let expires_at: Option<String> = column(row, "expires_at")?;

    let kind = match kind.as_str() {
        "percentage" => PromotionKind::Percentage { percent: amount },
        "flat" => PromotionKind::Flat { amount },
        other => {
            return Err(RepositoryError::Decode(format!("kind: unknown promotion kind `{other}`")))
        }
    };

    Ok(Promotion {
        code: column(row, "code")?,
        kind,
        cap: cap.as_deref().map(|cap| parse_decimal("cap", cap)).transpose()?,
        active: column(row, "active")?,
        starts_at: starts_at.as_deref().map(|at| parse_timestamp("starts_at", at)).transpose()?,
        expires_at: expires_at
            .as_deref()
            .map(|at| parse_timestamp("expires_at", at))
            .transpose()?,
    })
}

#[async_trait]
impl PromotionSource for SqlPromotionSource {
    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>, PromotionLookupError> {
        Ok(self.find(code).await?)
    }
}
