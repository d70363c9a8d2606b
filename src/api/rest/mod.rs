pub mod admin;
pub mod deliveries;
pub mod fraud;
pub mod messages;
pub mod notifications;
pub mod reviews;
pub mod trips;
pub mod wallets;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(deliveries::router())
        .merge(trips::router())
        .merge(wallets::router())
        .merge(notifications::router())
        .merge(reviews::router())
        .merge(fraud::router())
        .merge(admin::router())
        .merge(messages::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Identity is established upstream; the core only reads the forwarded
/// identity headers and authorizes against them.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| {
                AppError::Authorization("missing or invalid x-user-id header".to_string())
            })?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_role)
            .ok_or_else(|| {
                AppError::Authorization("missing or invalid x-user-role header".to_string())
            })?;

        Ok(Actor { id, role })
    }
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw.to_ascii_lowercase().as_str() {
        "sender" => Some(Role::Sender),
        "traveler" => Some(Role::Traveler),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    requests: usize,
    trips: usize,
    wallets: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        requests: state.requests.len(),
        trips: state.trips.len(),
        wallets: state.wallets.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
