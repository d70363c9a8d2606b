use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde::Serialize;

use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::delivery::{DeliveryRequest, DeliveryStatus, SettlementState};
use crate::models::trip::{TravelerTrip, TripStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/deliveries", get(list_all_deliveries))
        .route("/admin/trips", get(list_all_trips))
        .route("/admin/analytics", get(analytics))
}

fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Authorization("admin only".to_string()))
    }
}

async fn list_all_deliveries(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<DeliveryRequest>>, AppError> {
    require_admin(&actor)?;

    let mut requests: Vec<DeliveryRequest> = state
        .requests
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(requests))
}

async fn list_all_trips(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<TravelerTrip>>, AppError> {
    require_admin(&actor)?;

    let mut trips: Vec<TravelerTrip> = state
        .trips
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(trips))
}

#[derive(Serialize)]
struct AnalyticsResponse {
    requests_total: usize,
    requests_by_status: BTreeMap<&'static str, usize>,
    trips_total: usize,
    trips_active: usize,
    wallets_total: usize,
    /// Sum of costs for delivered-and-paid requests.
    volume_released: i64,
}

async fn analytics(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<AnalyticsResponse>, AppError> {
    require_admin(&actor)?;

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut volume_released = 0i64;

    for entry in state.requests.iter() {
        let request = entry.value();
        let label = match request.status {
            DeliveryStatus::Posted => "posted",
            DeliveryStatus::Requested => "requested",
            DeliveryStatus::Approved => "approved",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        };
        *by_status.entry(label).or_insert(0) += 1;

        if request.settlement == SettlementState::Released {
            volume_released += request.cost;
        }
    }

    let trips_active = state
        .trips
        .iter()
        .filter(|entry| entry.value().status == TripStatus::Active)
        .count();

    Ok(Json(AnalyticsResponse {
        requests_total: state.requests.len(),
        requests_by_status: by_status,
        trips_total: state.trips.len(),
        trips_active,
        wallets_total: state.wallets.len(),
        volume_released,
    }))
}
