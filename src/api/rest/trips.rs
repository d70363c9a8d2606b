use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::trip::{TravelerTrip, TripStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip).get(list_trips))
        .route("/trips/active", get(list_active_trips))
        .route("/trips/:id", get(get_trip).delete(delete_trip))
        .route("/trips/:id/cancel", post(cancel_trip))
}

#[derive(Deserialize)]
pub struct CreateTripRequest {
    pub origin: String,
    pub destination: String,
    pub travel_date: DateTime<Utc>,
    pub max_weight_kg: f64,
    pub cost_per_kg: i64,
    pub description: Option<String>,
}

async fn create_trip(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateTripRequest>,
) -> Result<Json<TravelerTrip>, AppError> {
    if actor.role != Role::Traveler && !actor.is_admin() {
        return Err(AppError::Authorization(
            "only travelers may post trips".to_string(),
        ));
    }
    if payload.origin.trim().is_empty() || payload.destination.trim().is_empty() {
        return Err(AppError::Validation(
            "origin and destination are required".to_string(),
        ));
    }
    if !(payload.max_weight_kg > 0.0) {
        return Err(AppError::Validation(
            "max weight must be positive".to_string(),
        ));
    }
    if payload.cost_per_kg <= 0 {
        return Err(AppError::Validation(
            "cost per kg must be positive".to_string(),
        ));
    }
    if payload.travel_date <= Utc::now() {
        return Err(AppError::Validation(
            "travel date must be in the future".to_string(),
        ));
    }

    let trip = TravelerTrip {
        id: Uuid::new_v4(),
        traveler: actor.id,
        origin: payload.origin,
        destination: payload.destination,
        travel_date: payload.travel_date,
        max_weight_kg: payload.max_weight_kg,
        available_weight_kg: payload.max_weight_kg,
        cost_per_kg: payload.cost_per_kg,
        description: payload.description,
        status: TripStatus::Active,
        in_flight: 0,
        created_at: Utc::now(),
    };

    state.trips.insert(trip.id, trip.clone());
    Ok(Json(trip))
}

async fn list_trips(State(state): State<Arc<AppState>>, actor: Actor) -> Json<Vec<TravelerTrip>> {
    let mut trips: Vec<TravelerTrip> = state
        .trips
        .iter()
        .filter(|entry| entry.value().traveler == actor.id)
        .map(|entry| entry.value().clone())
        .collect();
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Json(trips)
}

/// Active trips with spare capacity, for senders shopping for a carrier.
async fn list_active_trips(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
) -> Json<Vec<TravelerTrip>> {
    let mut trips: Vec<TravelerTrip> = state
        .trips
        .iter()
        .filter(|entry| {
            let trip = entry.value();
            trip.status == TripStatus::Active && trip.available_weight_kg > 0.0
        })
        .map(|entry| entry.value().clone())
        .collect();
    trips.sort_by(|a, b| a.travel_date.cmp(&b.travel_date));

    Json(trips)
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TravelerTrip>, AppError> {
    let trip = state
        .trips
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;

    Ok(Json(trip.value().clone()))
}

/// A trip with deliveries in flight cannot be cancelled; the bound requests
/// must be cancelled (and refunded) first.
async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TravelerTrip>, AppError> {
    let mut trip = state
        .trips
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;

    if trip.traveler != actor.id && !actor.is_admin() {
        return Err(AppError::Authorization(
            "only the owning traveler may cancel a trip".to_string(),
        ));
    }
    if trip.status != TripStatus::Active {
        return Err(AppError::Conflict("trip is not active".to_string()));
    }
    if trip.in_flight > 0 {
        return Err(AppError::Conflict(
            "trip has deliveries in flight".to_string(),
        ));
    }

    trip.status = TripStatus::Cancelled;
    Ok(Json(trip.clone()))
}

async fn delete_trip(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    {
        let trip = state
            .trips
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;

        if trip.traveler != actor.id && !actor.is_admin() {
            return Err(AppError::Authorization(
                "only the owning traveler may delete a trip".to_string(),
            ));
        }
        if trip.in_flight > 0 {
            return Err(AppError::Conflict(
                "trip has deliveries in flight".to_string(),
            ));
        }
    }

    let removed = state.trips.remove_if(&id, |_, trip| trip.in_flight == 0);
    match removed {
        Some(_) => Ok(Json(serde_json::json!({ "deleted": id }))),
        None => Err(AppError::Conflict(
            "trip changed state during deletion".to_string(),
        )),
    }
}
