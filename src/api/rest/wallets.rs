use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::settlement;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::wallet::{TransactionKind, Wallet};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/wallet", get(get_wallet))
        .route("/wallet/transactions", post(add_transaction))
}

#[derive(Deserialize)]
pub struct AddTransactionRequest {
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub request_id: Option<Uuid>,
}

/// The wallet is created lazily on first read.
async fn get_wallet(State(state): State<Arc<AppState>>, actor: Actor) -> Json<Wallet> {
    let wallet = state
        .wallets
        .entry(actor.id)
        .or_insert_with(|| Wallet::new(actor.id))
        .clone();

    Json(wallet)
}

/// Top-ups and withdrawals share the settlement path used by holds and
/// payouts, so every balance change lives in the same append-only log.
async fn add_transaction(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<AddTransactionRequest>,
) -> Result<Json<Wallet>, AppError> {
    let wallet = settlement::add_transaction(
        &state,
        actor.id,
        payload.kind,
        payload.amount,
        payload.description,
        payload.request_id,
    )?;

    Ok(Json(wallet))
}
