use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use leadflow_core::StaffDirectory;
use leadflow_db::{ping, DbPool, SqlStaffDirectory};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub routing: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Reports 503 only when the database is unreachable. An empty crew degrades routing to
/// the fallback staff member but the service keeps accepting leads.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";
    let routing = routing_check(&state.db_pool).await;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "leadflow-server runtime initialized".to_string(),
        },
        database,
        routing,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn routing_check(pool: &DbPool) -> HealthCheck {
    match SqlStaffDirectory::new(pool.clone()).list_staff().await {
        Ok(staff) => match staff.iter().filter(|member| member.active).count() {
            0 => HealthCheck {
                status: "degraded",
                detail: "no active staff; leads route to the fallback staff member".to_string(),
            },
            active => HealthCheck {
                status: "ready",
                detail: format!("{active} active staff members available for routing"),
            },
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("staff directory failed: {error}") }
        }
    }
}
