use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::matching::{self, MatchCandidate};
use crate::engine::{lifecycle, lifecycle::NewRequest};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::delivery::{
    DeliveryRequest, DeliveryStatus, PathCheckpoint, RequestStatus, StatusTimestamps,
};
use crate::models::trip::TripStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/open", get(list_open_deliveries))
        .route(
            "/deliveries/:id",
            get(get_delivery).delete(delete_delivery),
        )
        .route("/deliveries/:id/tracking", get(get_tracking))
        .route("/deliveries/:id/request", post(request_traveler))
        .route("/deliveries/:id/approve", post(approve_traveler))
        .route("/deliveries/:id/reject", post(reject_traveler))
        .route("/deliveries/:id/cancel", post(cancel_delivery))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/matches", get(list_matches))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub title: String,
    pub description: Option<String>,
    pub origin: String,
    pub origin_address: Option<String>,
    pub destination: String,
    pub destination_address: Option<String>,
    pub weight_kg: f64,
    pub deadline: DateTime<Utc>,
    pub cost: i64,
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    pub trip_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub target: DeliveryStatus,
}

#[derive(Serialize)]
pub struct TrackingView {
    pub tracking_id: String,
    pub status: DeliveryStatus,
    pub status_timestamps: StatusTimestamps,
    pub path: Vec<PathCheckpoint>,
    pub total_estimated_minutes: u32,
    pub overdue: bool,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = lifecycle::create_request(
        &state,
        &actor,
        NewRequest {
            title: payload.title,
            description: payload.description,
            origin: payload.origin,
            origin_address: payload.origin_address,
            destination: payload.destination,
            destination_address: payload.destination_address,
            weight_kg: payload.weight_kg,
            deadline: payload.deadline,
            cost: payload.cost,
        },
    )?;

    Ok(Json(request))
}

/// Requests the caller is a party to, newest first.
async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Json<Vec<DeliveryRequest>> {
    let mut requests: Vec<DeliveryRequest> = state
        .requests
        .iter()
        .filter(|entry| entry.value().is_party(actor.id))
        .map(|entry| entry.value().clone())
        .collect();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(requests)
}

/// The open pool travelers browse for work.
async fn list_open_deliveries(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Json<Vec<DeliveryRequest>> {
    let mut requests: Vec<DeliveryRequest> = state
        .requests
        .iter()
        .filter(|entry| {
            let request = entry.value();
            request.status == DeliveryStatus::Posted
                && request.request_status == RequestStatus::None
        })
        .map(|entry| entry.value().clone())
        .collect();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(requests)
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery request {id} not found")))?;

    if !request.is_party(actor.id) && !actor.is_admin() {
        return Err(AppError::Authorization(
            "not a party to this delivery".to_string(),
        ));
    }

    Ok(Json(request.value().clone()))
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingView>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery request {id} not found")))?;

    if !request.is_party(actor.id) && !actor.is_admin() {
        return Err(AppError::Authorization(
            "not a party to this delivery".to_string(),
        ));
    }

    let request = request.value();
    Ok(Json(TrackingView {
        tracking_id: request.tracking_id.clone(),
        status: request.status,
        status_timestamps: request.status_timestamps.clone(),
        path: request.path.clone(),
        total_estimated_minutes: request.total_estimated_minutes,
        overdue: request.is_overdue(Utc::now()),
    }))
}

async fn delete_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    lifecycle::delete_request(&state, &actor, id)?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn request_traveler(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = lifecycle::request_traveler(&state, &actor, id)?;
    Ok(Json(request))
}

async fn approve_traveler(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<ApproveRequest>>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let trip_id = payload.and_then(|Json(body)| body.trip_id);
    let request = lifecycle::approve_traveler(&state, &actor, id, trip_id)?;
    Ok(Json(request))
}

async fn reject_traveler(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = lifecycle::reject_request(&state, &actor, id)?;
    Ok(Json(request))
}

async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = lifecycle::cancel_request(&state, &actor, id)?;
    Ok(Json(request))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = lifecycle::advance_status(&state, &actor, id, payload.target)?;
    Ok(Json(request))
}

/// Deterministic match candidates for the caller: a sender matches their own
/// open requests against all active trips, a traveler matches all open
/// requests against their own trips, an admin sees the full cross product.
async fn list_matches(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Json<Vec<MatchCandidate>> {
    let started = Instant::now();

    let requests: Vec<DeliveryRequest> = state
        .requests
        .iter()
        .filter(|entry| actor.role != Role::Sender || entry.value().sender == actor.id)
        .map(|entry| entry.value().clone())
        .collect();

    let trips: Vec<_> = state
        .trips
        .iter()
        .filter(|entry| {
            let trip = entry.value();
            trip.status == TripStatus::Active
                && (actor.role != Role::Traveler || trip.traveler == actor.id)
        })
        .map(|entry| entry.value().clone())
        .collect();

    let reviews: Vec<_> = state
        .reviews
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    let ratings = matching::mean_ratings(reviews.iter());

    let matches = matching::find_matches(&requests, &trips, &ratings);

    state
        .metrics
        .match_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    Json(matches)
}
