//! Quote intake API.
//!
//! `POST /api/quotes` scores and stores a submission, `GET`/`PATCH /api/quotes/{id}` read
//! and update the staff-owned fields of a stored lead, and `POST /api/quotes/{id}/rescore`
//! recomputes it from its request snapshot. Every response carries the request's
//! correlation id in the `x-correlation-id` header.
//!
//! A submission carrying the id of a stored lead is refused with 409. A PATCH whose
//! snapshot went stale before it was written is refused with 409 as well.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use leadflow_core::{
    ApplicationError, FieldIssue, InterfaceError, LeadScoringEngine, LeadStatus,
    QuoteRequestId, RawSubmission, ScoredQuote, StaffId, ValidationError,
};
use leadflow_db::{
    RepositoryError, ScoredQuoteRepository, SqlPromotionSource, SqlStaffDirectory,
    SqlWorkloadStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

pub type SqlEngine = LeadScoringEngine<SqlPromotionSource, SqlStaffDirectory, SqlWorkloadStore>;

const NO_ISSUES: &[FieldIssue] = &[];

type Correlated<T> = (StatusCode, [(&'static str, String); 1], Json<T>);

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SqlEngine>,
    pub quotes: Arc<dyn ScoredQuoteRepository>,
}

/// Staff-owned fields a PATCH may change. Everything else is engine-derived.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuoteUpdate {
    pub assigned_to: Option<String>,
    pub status: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/quotes", post(create_quote))
        .route("/api/quotes/{id}", get(get_quote).patch(update_quote))
        .route("/api/quotes/{id}/rescore", post(rescore_quote))
        .with_state(state)
}

pub async fn create_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Correlated<ScoredQuote>, ApiError> {
    let correlation_id = correlation_id(&headers);

    let raw = RawSubmission::from_value(body)
        .map_err(|error| reject(error.into(), &correlation_id, None))?;
    let request = state
        .engine
        .normalize(&raw, Utc::now())
        .map_err(|error| reject(error.into(), &correlation_id, None))?;
    let quote_id = request.id;

    // Checked before assignment so a duplicate never takes a workload slot.
    let existing = state
        .quotes
        .find_by_id(&quote_id)
        .await
        .map_err(|error| reject(persistence(error), &correlation_id, Some(&quote_id)))?;
    if existing.is_some() {
        let message = format!("quote request {quote_id} already exists");
        return Err(reject(ApplicationError::Conflict(message), &correlation_id, Some(&quote_id)));
    }

    let scored = state.engine.score_request(request).await;
    state
        .quotes
        .insert(&scored)
        .await
        .map_err(|error| reject(persistence(error), &correlation_id, Some(&quote_id)))?;

    info!(
        event_name = "api.quote.scored",
        correlation_id = %correlation_id,
        quote_id = %scored.request.id,
        lead_score = scored.lead_score.value(),
        lead_priority = scored.lead_priority.as_str(),
        assigned_to = %scored.assigned_to,
        "quote request scored and stored"
    );
    Ok((StatusCode::CREATED, [(CORRELATION_HEADER, correlation_id)], Json(scored)))
}

pub async fn get_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Correlated<ScoredQuote>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let quote = load(&state, &id, &correlation_id).await?;
    Ok((StatusCode::OK, [(CORRELATION_HEADER, correlation_id)], Json(quote)))
}

pub async fn rescore_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Correlated<ScoredQuote>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let previous = load(&state, &id, &correlation_id).await?;
    let quote_id = previous.request.id;

    let rescored = state.engine.rescore(&previous).await;
    state
        .quotes
        .update_scoring(&rescored)
        .await
        .map_err(|error| reject(persistence(error), &correlation_id, Some(&quote_id)))?;
    // Staff may have moved the lead meanwhile; report what is stored now.
    let rescored = load(&state, &id, &correlation_id).await?;

    info!(
        event_name = "api.quote.rescored",
        correlation_id = %correlation_id,
        quote_id = %rescored.request.id,
        lead_score = rescored.lead_score.value(),
        status = rescored.status.as_str(),
        "stored quote request re-scored"
    );
    Ok((StatusCode::OK, [(CORRELATION_HEADER, correlation_id)], Json(rescored)))
}

pub async fn update_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<QuoteUpdate>,
) -> Result<Correlated<ScoredQuote>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let (assignee, status) =
        parse_update(&update).map_err(|error| reject(error.into(), &correlation_id, None))?;

    let mut quote = load(&state, &id, &correlation_id).await?;
    let quote_id = quote.request.id;
    let expected = quote.workflow();
    if let Some(staff) = assignee {
        quote
            .reassign(staff)
            .map_err(|error| reject(error.into(), &correlation_id, Some(&quote_id)))?;
    }
    if let Some(status) = status {
        if status != quote.status {
            quote
                .transition_to(status)
                .map_err(|error| reject(error.into(), &correlation_id, Some(&quote_id)))?;
        }
    }

    state
        .quotes
        .update_workflow(&quote_id, &expected, &quote.workflow())
        .await
        .map_err(|error| reject(persistence(error), &correlation_id, Some(&quote_id)))?;

    info!(
        event_name = "api.quote.updated",
        correlation_id = %correlation_id,
        quote_id = %quote_id,
        status = quote.status.as_str(),
        assigned_to = %quote.assigned_to,
        "staff update applied"
    );
    Ok((StatusCode::OK, [(CORRELATION_HEADER, correlation_id)], Json(quote)))
}

fn parse_update(
    update: &QuoteUpdate,
) -> Result<(Option<StaffId>, Option<LeadStatus>), ValidationError> {
    let mut error = ValidationError::default();

    let assignee = match update.assigned_to.as_deref().map(str::trim) {
        Some("") => {
            error.push(FieldIssue::malformed("assignedTo", "assignedTo must name a staff member"));
            None
        }
        Some(staff) => Some(StaffId(staff.to_string())),
        None => None,
    };
    let status = match update.status.as_deref() {
        Some(raw) => {
            let parsed = LeadStatus::parse(raw);
            if parsed.is_none() {
                let message = format!("`{raw}` is not a lead status");
                error.push(FieldIssue::malformed("status", message));
            }
            parsed
        }
        None => None,
    };
    if update.assigned_to.is_none() && update.status.is_none() {
        error.push(FieldIssue::missing("status"));
    }

    if error.is_empty() {
        Ok((assignee, status))
    } else {
        Err(error)
    }
}

async fn load(
    state: &AppState,
    raw_id: &str,
    correlation_id: &str,
) -> Result<ScoredQuote, ApiError> {
    let id = Uuid::parse_str(raw_id.trim()).map(QuoteRequestId).map_err(|_| {
        ApiError(InterfaceError::BadRequest {
            message: format!("`{raw_id}` is not a quote request id"),
            issues: Vec::new(),
            correlation_id: correlation_id.to_string(),
        })
    })?;

    state
        .quotes
        .find_by_id(&id)
        .await
        .map_err(|error| reject(persistence(error), correlation_id, Some(&id)))?
        .ok_or_else(|| {
            reject(ApplicationError::NotFound(id.to_string()), correlation_id, Some(&id))
        })
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn persistence(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::Conflict(message) => ApplicationError::Conflict(message),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

fn reject(
    error: ApplicationError,
    correlation_id: &str,
    quote_id: Option<&QuoteRequestId>,
) -> ApiError {
    let mapped = error.into_interface(correlation_id);
    let quote_id = quote_id.map(ToString::to_string).unwrap_or_else(|| "unknown".to_string());
    warn!(
        event_name = "api.quote.rejected",
        correlation_id = %correlation_id,
        quote_id = %quote_id,
        error = %mapped,
        "quote request rejected"
    );
    ApiError(mapped)
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    #[serde(rename = "correlationId")]
    correlation_id: &'a str,
    #[serde(skip_serializing_if = "<[FieldIssue]>::is_empty")]
    issues: &'a [FieldIssue],
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { issues, .. } if !issues.is_empty() => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (detail, issues) = match &self.0 {
            InterfaceError::BadRequest { message, issues, .. } => {
                (Some(message.as_str()), issues.as_slice())
            }
            InterfaceError::NotFound { message, .. } | InterfaceError::Conflict { message, .. } => {
                (Some(message.as_str()), NO_ISSUES)
            }
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                (None, NO_ISSUES)
            }
        };
        let correlation_id = self.0.correlation_id();
        let body = ErrorBody { error: self.0.user_message(), detail, correlation_id, issues };

        (status, [(CORRELATION_HEADER, correlation_id.to_string())], Json(body)).into_response()
    }
}
