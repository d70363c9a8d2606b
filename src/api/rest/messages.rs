use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::message::Message;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", post(send_message))
        .route("/messages/:request_id", get(list_messages))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub request_id: Uuid,
    pub body: String,
}

/// Messages flow between the two parties of a request; there is no
/// counterpart to talk to before a traveler is bound.
async fn send_message(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    if payload.body.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let (sender, traveler) = {
        let request = state.requests.get(&payload.request_id).ok_or_else(|| {
            AppError::NotFound(format!("delivery request {} not found", payload.request_id))
        })?;
        (request.sender, request.traveler)
    };

    let traveler = traveler.ok_or_else(|| {
        AppError::Conflict("no traveler is bound to this delivery yet".to_string())
    })?;

    let to = if actor.id == sender {
        traveler
    } else if actor.id == traveler {
        sender
    } else {
        return Err(AppError::Authorization(
            "not a party to this delivery".to_string(),
        ));
    };

    let message = Message {
        id: Uuid::new_v4(),
        request: payload.request_id,
        from: actor.id,
        to,
        body: payload.body,
        created_at: Utc::now(),
    };

    state.messages.insert(message.id, message.clone());
    Ok(Json(message))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    {
        let request = state.requests.get(&request_id).ok_or_else(|| {
            AppError::NotFound(format!("delivery request {request_id} not found"))
        })?;
        if !request.is_party(actor.id) && !actor.is_admin() {
            return Err(AppError::Authorization(
                "not a party to this delivery".to_string(),
            ));
        }
    }

    let mut messages: Vec<Message> = state
        .messages
        .iter()
        .filter(|entry| entry.value().request == request_id)
        .map(|entry| entry.value().clone())
        .collect();
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Ok(Json(messages))
}
