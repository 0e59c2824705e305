use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use leadflow_core::domain::lead::{
    CustomerType, PropertySize, QuoteRequest, QuoteRequestId, ServiceId, Urgency,
};
use leadflow_core::domain::quote::{
    LeadPriority, LeadScore, LeadStatus, LeadWorkflow, ScoredQuote,
};
use leadflow_core::domain::staff::StaffId;

use super::{
    column, parse_decimal, parse_json, parse_timestamp, to_json, RepositoryError,
    ScoredQuoteRepository,
};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT id, name, email, phone, address, property_size,
        services_json, additional_info, urgency, location_slug, customer_type, source,
        used_ai_planner, used_audit, page_view_count, is_return_visit, promo_code, created_at,
        lead_score, lead_priority, estimated_value, seasonal_modifier, promo_discount,
        clv_first_year, clv_three_year, competitor_context, recommended_action, follow_up_due,
        assigned_to, status, input_fingerprint, scoring_notes_json
 FROM quote_request";

pub struct SqlScoredQuoteRepository {
    pool: DbPool,
}

impl SqlScoredQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_priority(value: &str) -> Result<LeadPriority, RepositoryError> {
    match value {
        "LOW" => Ok(LeadPriority::Low),
        "MEDIUM" => Ok(LeadPriority::Medium),
        "HIGH" => Ok(LeadPriority::High),
        "URGENT" => Ok(LeadPriority::Urgent),
        other => Err(RepositoryError::Decode(format!("lead_priority: unknown value `{other}`"))),
    }
}

fn row_to_scored_quote(row: &sqlx::sqlite::SqliteRow) -> Result<ScoredQuote, RepositoryError> {
    let id: String = column(row, "id")?;
    let id = Uuid::parse_str(&id).map_err(|e| RepositoryError::Decode(format!("id: {e}")))?;
    let property_size: String = column(row, "property_size")?;
    let services: String = column(row, "services_json")?;
    let services: Vec<String> = parse_json("services_json", &services)?;
    let urgency: String = column(row, "urgency")?;
    let customer_type: String = column(row, "customer_type")?;
    let page_view_count: i64 = column(row, "page_view_count")?;
    let created_at: String = column(row, "created_at")?;

    let request = QuoteRequest {
        id: QuoteRequestId(id),
        name: column(row, "name")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        address: column(row, "address")?,
        property_size: PropertySize::parse(&property_size),
        services: services.into_iter().map(ServiceId).collect::<BTreeSet<_>>(),
        additional_info: column(row, "additional_info")?,
        urgency: urgency
            .parse::<Urgency>()
            .map_err(|e| RepositoryError::Decode(format!("urgency: {e}")))?,
        location_slug: column(row, "location_slug")?,
        customer_type: customer_type
            .parse::<CustomerType>()
            .map_err(|e| RepositoryError::Decode(format!("customer_type: {e}")))?,
        source: column(row, "source")?,
        used_ai_planner: column(row, "used_ai_planner")?,
        used_audit: column(row, "used_audit")?,
        page_view_count: u32::try_from(page_view_count).unwrap_or(0),
        is_return_visit: column(row, "is_return_visit")?,
        promo_code: column(row, "promo_code")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    };

    let lead_score: i64 = column(row, "lead_score")?;
    let lead_priority: String = column(row, "lead_priority")?;
    let follow_up_due: String = column(row, "follow_up_due")?;
    let assigned_to: String = column(row, "assigned_to")?;
    let status: String = column(row, "status")?;
    let scoring_notes: String = column(row, "scoring_notes_json")?;
    let decimal = |name: &str| -> Result<rust_decimal::Decimal, RepositoryError> {
        parse_decimal(name, &column::<String>(row, name)?)
    };

    let quote = ScoredQuote {
        request,
        lead_score: LeadScore::clamped(lead_score),
        lead_priority: parse_priority(&lead_priority)?,
        estimated_value: decimal("estimated_value")?,
        seasonal_modifier: decimal("seasonal_modifier")?,
        promo_discount: decimal("promo_discount")?,
        clv_first_year: decimal("clv_first_year")?,
        clv_three_year: decimal("clv_three_year")?,
        competitor_context: column(row, "competitor_context")?,
        recommended_action: column(row, "recommended_action")?,
        follow_up_due: parse_timestamp("follow_up_due", &follow_up_due)?,
        assigned_to: StaffId(assigned_to),
        status: LeadStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("status: unknown value `{status}`")))?,
        input_fingerprint: column(row, "input_fingerprint")?,
        scoring_notes: parse_json("scoring_notes_json", &scoring_notes)?,
    };
    quote
        .check_invariants()
        .map_err(|error| RepositoryError::Decode(format!("quote request {id}: {error}")))?;
    Ok(quote)
}

#[async_trait::async_trait]
impl ScoredQuoteRepository for SqlScoredQuoteRepository {
    async fn find_by_id(
        &self,
        id: &QuoteRequestId,
    ) -> Result<Option<ScoredQuote>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_scored_quote(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, quote: &ScoredQuote) -> Result<(), RepositoryError> {
        let request = &quote.request;
        let services = request.services.iter().map(ServiceId::as_str).collect::<Vec<_>>();
        let services_json = to_json("services_json", &services)?;
        let notes_json = to_json("scoring_notes_json", &quote.scoring_notes)?;

        let inserted = sqlx::query(
            "INSERT INTO quote_request (
                 id, name, email, phone, address, property_size, services_json,
                 additional_info, urgency, location_slug, customer_type, source,
                 used_ai_planner, used_audit, page_view_count, is_return_visit, promo_code,
                 created_at, lead_score, lead_priority, estimated_value, seasonal_modifier,
                 promo_discount, clv_first_year, clv_three_year, competitor_context,
                 recommended_action, follow_up_due, assigned_to, status, input_fingerprint,
                 scoring_notes_json, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(request.id.to_string())
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.address)
        .bind(request.property_size.as_str())
        .bind(&services_json)
        .bind(&request.additional_info)
        .bind(request.urgency.as_str())
        .bind(&request.location_slug)
        .bind(request.customer_type.as_str())
        .bind(&request.source)
        .bind(request.used_ai_planner)
        .bind(request.used_audit)
        .bind(i64::from(request.page_view_count))
        .bind(request.is_return_visit)
        .bind(&request.promo_code)
        .bind(request.created_at.to_rfc3339())
        .bind(i64::from(quote.lead_score.value()))
        .bind(quote.lead_priority.as_str())
        .bind(quote.estimated_value.to_string())
        .bind(quote.seasonal_modifier.to_string())
        .bind(quote.promo_discount.to_string())
        .bind(quote.clv_first_year.to_string())
        .bind(quote.clv_three_year.to_string())
        .bind(&quote.competitor_context)
        .bind(&quote.recommended_action)
        .bind(quote.follow_up_due.to_rfc3339())
        .bind(&quote.assigned_to.0)
        .bind(quote.status.as_str())
        .bind(&quote.input_fingerprint)
        .bind(&notes_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "quote request {} is already stored",
                request.id
            )));
        }
        Ok(())
    }

    async fn update_scoring(&self, quote: &ScoredQuote) -> Result<(), RepositoryError> {
        let notes_json = to_json("scoring_notes_json", &quote.scoring_notes)?;

        let updated = sqlx::query(
            "UPDATE quote_request
             SET lead_score = ?, lead_priority = ?, estimated_value = ?, seasonal_modifier = ?,
                 promo_discount = ?, clv_first_year = ?, clv_three_year = ?,
                 competitor_context = ?, recommended_action = ?, follow_up_due = ?,
                 scoring_notes_json = ?, updated_at = ?
             WHERE id = ? AND input_fingerprint = ?",
        )
        .bind(i64::from(quote.lead_score.value()))
        .bind(quote.lead_priority.as_str())
        .bind(quote.estimated_value.to_string())
        .bind(quote.seasonal_modifier.to_string())
        .bind(quote.promo_discount.to_string())
        .bind(quote.clv_first_year.to_string())
        .bind(quote.clv_three_year.to_string())
        .bind(&quote.competitor_context)
        .bind(&quote.recommended_action)
        .bind(quote.follow_up_due.to_rfc3339())
        .bind(&notes_json)
        .bind(Utc::now().to_rfc3339())
        .bind(quote.request.id.to_string())
        .bind(&quote.input_fingerprint)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "quote request {} is not stored with fingerprint {}",
                quote.request.id, quote.input_fingerprint
            )));
        }
        Ok(())
    }

    async fn update_workflow(
        &self,
        id: &QuoteRequestId,
        expected: &LeadWorkflow,
        next: &LeadWorkflow,
    ) -> Result<(), RepositoryError> {
        let updated = sqlx::query(
            "UPDATE quote_request
             SET status = ?, assigned_to = ?, updated_at = ?
             WHERE id = ? AND status = ? AND assigned_to = ?",
        )
        .bind(next.status.as_str())
        .bind(&next.assigned_to.0)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .bind(expected.status.as_str())
        .bind(&expected.assigned_to.0)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "quote request {id} is no longer {} for {}",
                expected.status.as_str(),
                expected.assigned_to
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use leadflow_core::domain::lead::{
        CustomerType, PropertySize, QuoteRequest, QuoteRequestId, ServiceId, Urgency,
    };
    use leadflow_core::domain::quote::{LeadScore, LeadStatus, LeadWorkflow, ScoredQuote};
    use leadflow_core::domain::staff::StaffId;

    use super::SqlScoredQuoteRepository;
    use crate::repositories::{RepositoryError, ScoredQuoteRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn scored_quote() -> ScoredQuote {
        let created_at =
            Utc.with_ymd_and_hms(2026, 6, 2, 14, 5, 30).single().expect("timestamp");
        let request = QuoteRequest {
            id: QuoteRequestId(Uuid::from_u128(0x5eed)),
            name: "Morgan Lee".to_string(),
            email: "morgan@example.com".to_string(),
            phone: "5125550142".to_string(),
            address: "77 Live Oak Dr".to_string(),
            property_size: PropertySize::parse("about two soccer fields"),
            services: BTreeSet::from([
                ServiceId("lawn-mowing".to_string()),
                ServiceId("tree-service".to_string()),
            ]),
            additional_info: Some("Weed Man quoted us last week".to_string()),
            urgency: Urgency::ThisWeek,
            location_slug: Some("austin".to_string()),
            customer_type: CustomerType::Commercial,
            source: "google-ads".to_string(),
            used_ai_planner: true,
            used_audit: false,
            page_view_count: 4,
            is_return_visit: true,
            promo_code: Some("SPRING15".to_string()),
            created_at,
        };
        let score = LeadScore::clamped(72);
        ScoredQuote {
            input_fingerprint: request.fingerprint(),
            request,
            lead_score: score,
            lead_priority: score.priority(),
            estimated_value: Decimal::new(48_750, 2),
            seasonal_modifier: Decimal::new(130, 2),
            promo_discount: Decimal::new(5_000, 2),
            clv_first_year: Decimal::new(438_750, 2),
            clv_three_year: Decimal::new(1_040_000, 2),
            competitor_context: Some("Mentions competitor: weed man".to_string()),
            recommended_action: "Call within 24 hours; mentions competitor".to_string(),
            follow_up_due: created_at + Duration::hours(24),
            assigned_to: StaffId("avery".to_string()),
            status: LeadStatus::Scored,
            scoring_notes: vec!["property size not recognized".to_string()],
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_every_field() {
        let repo = SqlScoredQuoteRepository::new(setup().await);
        let quote = scored_quote();

        repo.insert(&quote).await.expect("insert");
        let loaded = repo.find_by_id(&quote.request.id).await.expect("find").expect("present");

        assert_eq!(loaded, quote);
        assert_eq!(
            serde_json::to_string(&loaded).expect("serialize"),
            serde_json::to_string(&quote).expect("serialize")
        );
    }

    #[tokio::test]
    async fn second_insert_with_the_same_id_is_a_conflict() {
        let repo = SqlScoredQuoteRepository::new(setup().await);
        let quote = scored_quote();
        repo.insert(&quote).await.expect("insert");

        let mut resubmitted = scored_quote();
        resubmitted.request.name = "Someone Else".to_string();
        resubmitted.status = LeadStatus::New;
        let error = repo.insert(&resubmitted).await.expect_err("duplicate id");

        assert!(matches!(error, RepositoryError::Conflict(_)));
        let loaded = repo.find_by_id(&quote.request.id).await.expect("find").expect("present");
        assert_eq!(loaded, quote);
    }

    #[tokio::test]
    async fn workflow_update_is_compare_and_set() {
        let repo = SqlScoredQuoteRepository::new(setup().await);
        let quote = scored_quote();
        repo.insert(&quote).await.expect("insert");
        let snapshot = quote.workflow();

        let contacted = LeadWorkflow {
            status: LeadStatus::Contacted,
            assigned_to: StaffId("avery".to_string()),
        };
        repo.update_workflow(&quote.request.id, &snapshot, &contacted).await.expect("first");

        let reassigned = LeadWorkflow {
            status: LeadStatus::Assigned,
            assigned_to: StaffId("blake".to_string()),
        };
        let stale = repo.update_workflow(&quote.request.id, &snapshot, &reassigned).await;

        assert!(matches!(stale, Err(RepositoryError::Conflict(_))));
        let loaded = repo.find_by_id(&quote.request.id).await.expect("find").expect("present");
        assert_eq!(loaded.workflow(), contacted);
    }

    #[tokio::test]
    async fn scoring_update_leaves_workflow_fields_alone() {
        let repo = SqlScoredQuoteRepository::new(setup().await);
        let quote = scored_quote();
        repo.insert(&quote).await.expect("insert");
        let contacted = LeadWorkflow {
            status: LeadStatus::Contacted,
            assigned_to: StaffId("casey".to_string()),
        };
        repo.update_workflow(&quote.request.id, &quote.workflow(), &contacted)
            .await
            .expect("staff update");

        let mut rescored = quote.clone();
        rescored.recommended_action = "Call within 24 hours".to_string();
        rescored.scoring_notes.clear();
        repo.update_scoring(&rescored).await.expect("rescore");

        let loaded = repo.find_by_id(&quote.request.id).await.expect("find").expect("present");
        assert_eq!(loaded.workflow(), contacted);
        assert_eq!(loaded.recommended_action, "Call within 24 hours");
        assert!(loaded.scoring_notes.is_empty());
    }

    #[tokio::test]
    async fn row_breaking_invariants_fails_to_load() {
        let pool = setup().await;
        let repo = SqlScoredQuoteRepository::new(pool.clone());
        let quote = scored_quote();
        repo.insert(&quote).await.expect("insert");

        sqlx::query("UPDATE quote_request SET lead_priority = 'URGENT' WHERE id = ?")
            .bind(quote.request.id.to_string())
            .execute(&pool)
            .await
            .expect("tamper");

        let error = repo.find_by_id(&quote.request.id).await.expect_err("invariant");
        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.contains("lead priority")
        ));
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let repo = SqlScoredQuoteRepository::new(setup().await);
        let missing = repo.find_by_id(&QuoteRequestId(Uuid::nil())).await.expect("find");
        assert!(missing.is_none());
    }
}
