use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::fraud::{FraudReport, FraudStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fraud-reports", post(create_report).get(list_reports))
        .route("/fraud-reports/:id", patch(resolve_report))
}

#[derive(Deserialize)]
pub struct CreateFraudReportRequest {
    pub request_id: Uuid,
    pub description: String,
}

#[derive(Deserialize)]
pub struct ResolveFraudReportRequest {
    pub status: FraudStatus,
    #[serde(default)]
    pub refund_sender: bool,
}

async fn create_report(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateFraudReportRequest>,
) -> Result<Json<FraudReport>, AppError> {
    if payload.description.trim().is_empty() {
        return Err(AppError::Validation(
            "description cannot be empty".to_string(),
        ));
    }

    {
        let request = state.requests.get(&payload.request_id).ok_or_else(|| {
            AppError::NotFound(format!("delivery request {} not found", payload.request_id))
        })?;
        if !request.is_party(actor.id) && !actor.is_admin() {
            return Err(AppError::Authorization(
                "not a party to this delivery".to_string(),
            ));
        }
    }

    let report = FraudReport {
        id: Uuid::new_v4(),
        reported_by: actor.id,
        request: payload.request_id,
        description: payload.description,
        status: FraudStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
    };

    state.fraud_reports.insert(report.id, report.clone());
    Ok(Json(report))
}

/// Admins see every report; other users only their own.
async fn list_reports(State(state): State<Arc<AppState>>, actor: Actor) -> Json<Vec<FraudReport>> {
    let mut reports: Vec<FraudReport> = state
        .fraud_reports
        .iter()
        .filter(|entry| actor.is_admin() || entry.value().reported_by == actor.id)
        .map(|entry| entry.value().clone())
        .collect();
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(reports)
}

async fn resolve_report(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveFraudReportRequest>,
) -> Result<Json<FraudReport>, AppError> {
    let report =
        lifecycle::resolve_fraud_report(&state, &actor, id, payload.status, payload.refund_sender)?;
    Ok(Json(report))
}
